use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crate::app::{App, InputMode};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => {
            app.tick_animation();
            app.poll_products().await;
        }
        AppEvent::Session(event) => app.apply_session_event(event),
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    // A notice blocks everything until it is dismissed
    if app.notice.is_some() {
        app.dismiss_notice();
        return;
    }

    if app.show_product_picker {
        handle_product_picker(app, key);
        return;
    }

    if app.show_quick_questions {
        handle_quick_questions(app, key);
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

fn handle_product_picker(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.show_product_picker = false;
        }
        KeyCode::Char('j') | KeyCode::Down => {
            app.product_picker_nav_down();
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.product_picker_nav_up();
        }
        KeyCode::Enter => {
            if !app.products_loading {
                app.select_product();
            }
        }
        _ => {}
    }
}

fn handle_quick_questions(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.show_quick_questions = false;
        }
        KeyCode::Char('j') | KeyCode::Down => {
            app.quick_question_nav_down();
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.quick_question_nav_up();
        }
        KeyCode::Enter => {
            app.use_quick_question();
        }
        _ => {}
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => {
            app.should_quit = true;
        }
        KeyCode::Char('i') | KeyCode::Char('a') | KeyCode::Tab => {
            app.input_mode = InputMode::Editing;
        }
        KeyCode::Char('j') | KeyCode::Down => {
            app.select_next_answer();
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.select_prev_answer();
        }
        KeyCode::Char('s') => {
            app.save_selected();
        }
        KeyCode::Char('p') => {
            app.open_product_picker();
        }
        KeyCode::Char('c') => {
            app.set_context_product(None);
        }
        KeyCode::Char('?') => {
            app.show_quick_questions = true;
        }
        KeyCode::PageUp => {
            app.scroll_up();
        }
        KeyCode::PageDown => {
            app.scroll_down();
        }
        KeyCode::Char('G') | KeyCode::End => {
            app.follow_chat = true;
        }
        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Tab => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Enter => {
            app.submit_query();
        }
        KeyCode::Backspace => {
            if app.query_cursor > 0 {
                app.query_cursor -= 1;
                let byte_pos = char_to_byte_index(&app.query_input, app.query_cursor);
                app.query_input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.query_input.chars().count();
            if app.query_cursor < char_count {
                let byte_pos = char_to_byte_index(&app.query_input, app.query_cursor);
                app.query_input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.query_cursor = app.query_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.query_input.chars().count();
            app.query_cursor = (app.query_cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.query_cursor = 0;
        }
        KeyCode::End => {
            app.query_cursor = app.query_input.chars().count();
        }
        KeyCode::PageUp => {
            app.scroll_up();
        }
        KeyCode::PageDown => {
            app.scroll_down();
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.query_input, app.query_cursor);
            app.query_input.insert(byte_pos, c);
            app.query_cursor += 1;
        }
        _ => {}
    }
}
