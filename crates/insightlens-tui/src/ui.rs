use insightlens_core::{BadgeColor, ChatRole, Turn, TurnStatus};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
};
use unicode_width::UnicodeWidthChar;

use crate::app::{App, InputMode, NoticeKind, EXAMPLE_QUESTIONS, QUICK_QUESTIONS};
use crate::chart_view;

/// Parse a line of text and convert **bold** markdown to styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut rest = text;

    while let Some(open) = rest.find("**") {
        let after_open = &rest[open + 2..];
        let Some(close) = after_open.find("**") else {
            break;
        };
        if close == 0 {
            // "****" is not emphasis
            spans.push(Span::raw(rest[..open + 4].to_string()));
            rest = &after_open[2..];
            continue;
        }
        if open > 0 {
            spans.push(Span::raw(rest[..open].to_string()));
        }
        spans.push(Span::styled(
            after_open[..close].to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        ));
        rest = &after_open[close + 2..];
    }

    if !rest.is_empty() {
        spans.push(Span::raw(rest.to_string()));
    }

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

fn badge_color(color: BadgeColor) -> Color {
    match color {
        BadgeColor::Blue => Color::Blue,
        BadgeColor::Green => Color::Green,
        BadgeColor::Magenta => Color::Magenta,
        BadgeColor::Yellow => Color::Yellow,
        BadgeColor::Cyan => Color::Cyan,
        BadgeColor::Red => Color::Red,
        BadgeColor::Neutral => Color::Gray,
    }
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_chat_screen(app, frame, body_area);
    render_footer(app, frame, footer_area);

    // Render popups (in order of priority)
    if app.notice.is_some() {
        render_notice(app, frame, area);
    } else if app.show_product_picker {
        render_product_picker(app, frame, area);
    } else if app.show_quick_questions {
        render_quick_questions(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let context = match app.context_product_name() {
        Some(name) => format!(" [context: {}]", name),
        None => " [all products]".to_string(),
    };
    let user = app
        .user_email
        .as_ref()
        .map(|email| format!(" {}", email))
        .unwrap_or_default();

    let title = Line::from(vec![
        Span::styled(" InsightLens ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(context, Style::default().fg(Color::White)),
        Span::styled(user, Style::default().fg(Color::Gray)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let (mode_text, mode_style) = match app.input_mode {
        InputMode::Normal => (" CHAT ", Style::default().bg(Color::Blue).fg(Color::White)),
        InputMode::Editing => (" ASK ", Style::default().bg(Color::Yellow).fg(Color::Black)),
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hint = |key: &'static str, label: &'static str| {
        [Span::styled(key, key_style), Span::styled(label, label_style)]
    };

    let hints: Vec<Span> = if app.notice.is_some() {
        hint(" any key ", " dismiss ").to_vec()
    } else if app.show_product_picker || app.show_quick_questions {
        [hint(" j/k ", " nav "), hint(" Enter ", " select "), hint(" Esc ", " close ")].concat()
    } else {
        match app.input_mode {
            InputMode::Editing => [
                hint(" Enter ", " ask "),
                hint(" Esc ", " browse "),
                hint(" PgUp/PgDn ", " scroll "),
            ]
            .concat(),
            InputMode::Normal => [
                hint(" j/k ", " answer "),
                hint(" s ", " save "),
                hint(" p ", " product "),
                hint(" c ", " clear "),
                hint(" ? ", " quick "),
                hint(" i ", " ask "),
                hint(" q ", " quit "),
            ]
            .concat(),
        }
    };

    let mut spans = vec![Span::styled(mode_text, mode_style), Span::raw(" ")];
    spans.extend(hints);

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_chat_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    // Conversation on the left, chart for the selected answer on the right
    let [conversation_area, chart_area] = Layout::horizontal([
        Constraint::Percentage(55),
        Constraint::Percentage(45),
    ])
    .areas(area);

    let [chat_area, input_area] =
        Layout::vertical([Constraint::Min(0), Constraint::Length(3)]).areas(conversation_area);

    render_conversation(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_chart_panel(app, frame, chart_area);
}

fn turn_lines(app: &App, turn: &Turn) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    match turn.role {
        ChatRole::User => {
            lines.push(Line::from(Span::styled(
                "You:",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )));
            lines.push(Line::from(turn.text.clone()));
        }
        ChatRole::Assistant => {
            let selected = app.selected_turn == Some(turn.id);
            let mut header = vec![Span::styled(
                if selected { "> AI:" } else { "AI:" },
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )];

            if let Some(badge) = turn.tool_used.as_ref().map(|tool| tool.describe()) {
                header.push(Span::raw(" "));
                header.push(Span::styled(
                    format!("[{} {}]", badge.icon, badge.label),
                    Style::default().fg(badge_color(badge.color)),
                ));
            }
            if turn.saved {
                header.push(Span::styled(" ✓ Saved", Style::default().fg(Color::Green)));
            } else if app.chat.is_saving(turn.id) {
                header.push(Span::styled(
                    " Saving...",
                    Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC),
                ));
            }
            lines.push(Line::from(header));

            match turn.status {
                TurnStatus::Pending => {
                    // Animated ellipsis: cycles through ".", "..", "..."
                    let dots = ".".repeat((app.animation_frame as usize) + 1);
                    lines.push(Line::from(Span::styled(
                        format!("Thinking{}", dots),
                        Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC),
                    )));
                }
                TurnStatus::Error => {
                    lines.push(Line::from(Span::styled(
                        turn.text.clone(),
                        Style::default().fg(Color::Red),
                    )));
                }
                TurnStatus::Ready => {
                    for line in turn.text.lines() {
                        lines.push(parse_markdown_line(line));
                    }
                    if let Some(spec) = &turn.chart_spec {
                        let title = if spec.title.is_empty() { "chart" } else { spec.title.as_str() };
                        lines.push(Line::from(Span::styled(
                            format!("📊 {} (select with j/k to view)", title),
                            Style::default().fg(Color::Magenta),
                        )));
                    }
                }
            }
        }
    }

    lines.push(Line::default());
    lines
}

fn welcome_lines() -> Vec<Line<'static>> {
    let mut lines = vec![
        Line::from(Span::styled(
            "AI:",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )),
        Line::from(
            "Hello! I'm your AI analytics assistant. You can ask me questions about product \
             reviews, NPS scores, customer sentiment, and more. Try asking:",
        ),
    ];
    for question in EXAMPLE_QUESTIONS {
        lines.push(Line::from(Span::styled(
            format!("  • {}", question),
            Style::default().fg(Color::Gray),
        )));
    }
    lines
}

/// Terminal sizes are `u16`; counts past that stick at the maximum.
pub(crate) fn clamp_u16(n: usize) -> u16 {
    u16::try_from(n).unwrap_or(u16::MAX)
}

fn char_width(ch: char) -> usize {
    UnicodeWidthChar::width(ch).unwrap_or(0)
}

/// Join a row of styled cells back into spans.
fn row_line(row: Vec<(char, Style)>) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut text = String::new();
    let mut style = Style::default();
    for (ch, cell_style) in row {
        if cell_style != style && !text.is_empty() {
            spans.push(Span::styled(std::mem::take(&mut text), style));
        }
        style = cell_style;
        text.push(ch);
    }
    if !text.is_empty() {
        spans.push(Span::styled(text, style));
    }
    Line::from(spans)
}

/// Word-wrap a styled line to `width` columns. Words only break when they
/// are wider than a whole row; leading indentation is kept.
fn wrap_line(line: Line<'static>, width: usize) -> Vec<Line<'static>> {
    let width = width.max(1);
    let line_style = line.style;
    let cells: Vec<(char, Style)> = line
        .spans
        .iter()
        .flat_map(|span| span.content.chars().map(move |ch| (ch, span.style)))
        .collect();
    if cells.is_empty() {
        return vec![line];
    }

    let mut rows: Vec<Vec<(char, Style)>> = Vec::new();
    let mut row: Vec<(char, Style)> = Vec::new();
    let mut row_width = 0;
    // Whitespace waiting for the next word; dropped at a row break
    let mut gap: Vec<(char, Style)> = Vec::new();

    let mut i = 0;
    while i < cells.len() {
        if cells[i].0.is_whitespace() {
            gap.push(cells[i]);
            i += 1;
            continue;
        }
        let start = i;
        while i < cells.len() && !cells[i].0.is_whitespace() {
            i += 1;
        }
        let word = &cells[start..i];
        let word_width: usize = word.iter().map(|(ch, _)| char_width(*ch)).sum();
        let gap_width: usize = gap.iter().map(|(ch, _)| char_width(*ch)).sum();

        if row_width + gap_width + word_width <= width {
            row_width += gap_width + word_width;
            row.append(&mut gap);
            row.extend_from_slice(word);
            continue;
        }

        gap.clear();
        if !row.is_empty() {
            rows.push(std::mem::take(&mut row));
            row_width = 0;
        }
        for &cell in word {
            let w = char_width(cell.0);
            if row_width + w > width && !row.is_empty() {
                rows.push(std::mem::take(&mut row));
                row_width = 0;
            }
            row.push(cell);
            row_width += w;
        }
    }
    if !row.is_empty() || rows.is_empty() {
        rows.push(row);
    }

    rows.into_iter()
        .map(|row| row_line(row).style(line_style))
        .collect()
}

fn render_conversation(app: &mut App, frame: &mut Frame, area: Rect) {
    // Store chat area dimensions for scroll calculations (inner size minus borders)
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);

    let lines: Vec<Line> = if app.chat.store().is_empty() {
        welcome_lines()
    } else {
        app.chat
            .store()
            .iter()
            .flat_map(|turn| turn_lines(app, turn))
            .collect()
    };

    // Pre-wrapped so the scroll target counts exactly the rows drawn
    let lines: Vec<Line> = lines
        .into_iter()
        .flat_map(|line| wrap_line(line, app.chat_width as usize))
        .collect();
    let total = clamp_u16(lines.len());
    let max_scroll = total.saturating_sub(app.chat_height);
    if app.follow_chat || app.chat_scroll > max_scroll {
        app.chat_scroll = max_scroll;
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Conversation ");

    let chat = Paragraph::new(Text::from(lines))
        .block(block)
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing;
    let border_color = if editing { Color::Yellow } else { Color::DarkGray };

    let title = if app.chat.is_busy() {
        " Ask (waiting for answer...) "
    } else {
        " Ask a question about product reviews "
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Calculate visible portion of input with horizontal scrolling
    // Inner width = total width - 2 (for borders)
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.query_cursor;

    // Calculate scroll offset to keep cursor visible
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app
        .query_input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(block);

    frame.render_widget(input, area);

    // Show cursor when editing
    if editing && app.notice.is_none() {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_chart_panel(app: &App, frame: &mut Frame, area: Rect) {
    match app.selected_chart() {
        Some(chart) => chart_view::render_chart(&chart, frame, area),
        None => {
            let block = Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray))
                .title(" Chart ");
            let hint = Paragraph::new("No chart for the selected answer.")
                .style(Style::default().fg(Color::Gray))
                .wrap(Wrap { trim: true })
                .block(block);
            frame.render_widget(hint, area);
        }
    }
}

/// Centered popup area, clamped to the screen.
fn popup_area(area: Rect, width: u16, height: u16) -> Rect {
    let popup_width = width.min(area.width.saturating_sub(4));
    let popup_height = height.min(area.height.saturating_sub(4));

    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;

    Rect::new(popup_x, popup_y, popup_width, popup_height)
}

fn render_product_picker(app: &mut App, frame: &mut Frame, area: Rect) {
    let popup = popup_area(area, 50, clamp_u16(app.products.len()).saturating_add(3));

    // Clear the area behind the popup
    frame.render_widget(Clear, popup);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Context Product ");

    if app.products_loading {
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        let loading = Paragraph::new(format!("Loading products{}", dots))
            .style(Style::default().fg(Color::Gray))
            .block(block);
        frame.render_widget(loading, popup);
        return;
    }

    let current = app.chat.context_product();
    let mut items = vec![ListItem::new(" All products ").style(if current.is_none() {
        Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    })];
    items.extend(app.products.iter().map(|product| {
        let style = if current == Some(product.id) {
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        ListItem::new(Line::from(vec![
            Span::raw(format!(" {} ", product.name)),
            Span::styled(product.category.clone(), Style::default().fg(Color::Gray)),
        ]))
        .style(style)
    }));

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, popup, &mut app.product_picker_state);
}

fn render_quick_questions(app: &mut App, frame: &mut Frame, area: Rect) {
    let popup = popup_area(area, 64, clamp_u16(QUICK_QUESTIONS.len()).saturating_add(2));

    frame.render_widget(Clear, popup);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Quick Questions ");

    let items: Vec<ListItem> = QUICK_QUESTIONS
        .iter()
        .map(|question| ListItem::new(format!(" {} ", question)))
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, popup, &mut app.quick_question_state);
}

fn render_notice(app: &App, frame: &mut Frame, area: Rect) {
    let Some(notice) = &app.notice else {
        return;
    };

    let color = match notice.kind {
        NoticeKind::Info => Color::Cyan,
        NoticeKind::Error | NoticeKind::SessionExpired => Color::Red,
    };

    let popup = popup_area(area, 60, 7);
    frame.render_widget(Clear, popup);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color))
        .title(format!(" {} ", notice.title));

    let text = Text::from(vec![
        Line::from(notice.message.clone()),
        Line::default(),
        Line::from(Span::styled(
            "Press any key to continue",
            Style::default().fg(Color::Gray),
        )),
    ]);

    let body = Paragraph::new(text).wrap(Wrap { trim: true }).block(block);
    frame.render_widget(body, popup);
}
