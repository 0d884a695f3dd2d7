use std::path::PathBuf;

use anyhow::{anyhow, Result};
use insightlens_core::{
    render_chart, ApiError, ChatError, ChatRole, ChatSession, Config, InsightClient, Product,
    RenderableChart, Session, SessionEvent, TurnId,
};
use ratatui::widgets::ListState;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub type Chat = ChatSession<InsightClient, InsightClient>;

/// Shown under the greeting of an empty conversation.
pub const EXAMPLE_QUESTIONS: [&str; 4] = [
    "Why is iPhone 13 Pro getting mixed ratings?",
    "Show me the best performing products",
    "What are common complaints about Coffee Maker Pro?",
    "Analyze NPS trends for Electronics category",
];

pub const QUICK_QUESTIONS: [&str; 3] = [
    "Why is iPhone 13 Pro getting mixed ratings?",
    "Show me top performing products in Home & Kitchen",
    "What are the main complaints about low-rated products?",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Error,
    /// Dismissing this one closes the chat screen.
    SessionExpired,
}

/// A blocking popup; every key dismisses it.
#[derive(Debug, Clone)]
pub struct Notice {
    pub kind: NoticeKind,
    pub title: String,
    pub message: String,
}

impl Notice {
    pub fn info(title: &str, message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Info,
            title: title.to_string(),
            message: message.into(),
        }
    }

    pub fn error(title: &str, message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            title: title.to_string(),
            message: message.into(),
        }
    }

    fn session_expired() -> Self {
        Self {
            kind: NoticeKind::SessionExpired,
            title: "Session expired".to_string(),
            message: "Your session has expired. Run `insightlens login` to sign in again."
                .to_string(),
        }
    }
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,

    // Conversation
    pub chat: Chat,
    pub client: InsightClient,
    pub query_input: String,
    pub query_cursor: usize, // cursor position in query_input
    pub chat_scroll: u16,
    pub chat_height: u16, // Height of chat area for scroll calculations
    pub chat_width: u16,  // Width of chat area for wrap calculations
    pub follow_chat: bool,
    pub selected_turn: Option<TurnId>,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Product picker state
    pub show_product_picker: bool,
    pub products: Vec<Product>,
    pub product_picker_state: ListState,
    pub products_loading: bool,
    pub products_task: Option<JoinHandle<Result<Vec<Product>, ApiError>>>,

    // Quick questions
    pub show_quick_questions: bool,
    pub quick_question_state: ListState,

    pub notice: Option<Notice>,
    pub user_email: Option<String>,

    // Where the context product and token are persisted; `None` keeps them in memory.
    pub config_path: Option<PathBuf>,
    pub session_path: Option<PathBuf>,
}

impl App {
    /// Build the chat screen from the config and the stored login session.
    pub fn new(config: &Config) -> Result<(Self, UnboundedReceiver<SessionEvent>)> {
        let session = Session::load()?
            .ok_or_else(|| anyhow!("Not logged in. Run `insightlens login` first."))?;

        let client = InsightClient::new(&config.api_url()).with_token(session.token);
        let (mut app, events) = Self::with_client(client, config);
        app.user_email = session.email;
        app.config_path = Config::get_config_path().ok();
        app.session_path = Session::get_session_path().ok();

        info!(api = %app.client.base_url(), "Chat screen ready");
        Ok((app, events))
    }

    pub fn with_client(
        client: InsightClient,
        config: &Config,
    ) -> (Self, UnboundedReceiver<SessionEvent>) {
        let (chat, events) = ChatSession::with_client(client.clone(), config);

        let mut quick_question_state = ListState::default();
        quick_question_state.select(Some(0));

        let app = Self {
            should_quit: false,
            input_mode: InputMode::Editing,

            chat,
            client,
            query_input: String::new(),
            query_cursor: 0,
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            follow_chat: true,
            selected_turn: None,

            animation_frame: 0,

            show_product_picker: false,
            products: Vec::new(),
            product_picker_state: ListState::default(),
            products_loading: false,
            products_task: None,

            show_quick_questions: false,
            quick_question_state,

            notice: None,
            user_email: None,

            config_path: None,
            session_path: None,
        };
        (app, events)
    }

    /// Send the input box as a question. Blank input and a busy chat are ignored.
    pub fn submit_query(&mut self) {
        match self.chat.submit(&mut self.query_input) {
            Ok(turn) => {
                self.query_cursor = 0;
                self.selected_turn = Some(turn);
                self.follow_chat = true;
            }
            Err(e) if e.is_silent() => debug!("Ignoring submit: {}", e),
            Err(e) => self.notice = Some(Notice::error("Could not ask", e.to_string())),
        }
    }

    /// Apply a finished Ask or Save call to the conversation.
    pub fn apply_session_event(&mut self, event: SessionEvent) {
        let is_save = matches!(event, SessionEvent::Saved(_));

        match self.chat.apply(event) {
            Ok(()) => {}
            Err(e) if e.is_unauthorized() => self.expire_session(),
            Err(e) if is_save => {
                self.notice = Some(Notice::error(
                    "Save failed",
                    format!("Failed to save report: {}", e),
                ));
            }
            // The turn itself now carries the error text
            Err(e) => debug!("Question settled with an error: {}", e),
        }
    }

    /// Save the selected answer as a report.
    pub fn save_selected(&mut self) {
        let Some(turn) = self.selected_turn else {
            return;
        };

        match self.chat.save(turn) {
            Ok(true) => debug!(%turn, "Save requested"),
            Ok(false) => {}
            Err(ChatError::NotSaveable(_)) => {
                self.notice = Some(Notice::info(
                    "Nothing to save",
                    "Only answered questions can be saved as reports.",
                ));
            }
            Err(e) => self.notice = Some(Notice::error("Save failed", e.to_string())),
        }
    }

    /// Drop the stored token and block the screen until the user acknowledges.
    pub fn expire_session(&mut self) {
        warn!("API rejected the session token");
        self.chat.shutdown();
        if let Some(path) = &self.session_path {
            if let Err(e) = Session::clear_at(path) {
                warn!("Could not clear stored session: {}", e);
            }
        }
        self.notice = Some(Notice::session_expired());
    }

    pub fn dismiss_notice(&mut self) {
        if let Some(notice) = self.notice.take() {
            if notice.kind == NoticeKind::SessionExpired {
                self.should_quit = true;
            }
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.chat.is_busy() || self.products_loading {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    // Answer selection: only assistant turns can be selected
    fn assistant_turns(&self) -> Vec<TurnId> {
        self.chat
            .store()
            .iter()
            .filter(|turn| turn.role == ChatRole::Assistant)
            .map(|turn| turn.id)
            .collect()
    }

    pub fn select_next_answer(&mut self) {
        let answers = self.assistant_turns();
        let next = match self.selected_turn.and_then(|id| answers.iter().position(|a| *a == id)) {
            Some(i) => answers.get(i + 1).or(answers.last()),
            None => answers.last(),
        };
        self.selected_turn = next.copied();
    }

    pub fn select_prev_answer(&mut self) {
        let answers = self.assistant_turns();
        let prev = match self.selected_turn.and_then(|id| answers.iter().position(|a| *a == id)) {
            Some(i) => answers.get(i.saturating_sub(1)),
            None => answers.last(),
        };
        self.selected_turn = prev.copied();
    }

    /// The chart attached to the selected answer, interpreted for drawing.
    pub fn selected_chart(&self) -> Option<RenderableChart> {
        self.selected_turn
            .and_then(|id| self.chat.store().get(id))
            .and_then(|turn| turn.chart_spec.as_ref())
            .map(render_chart)
    }

    pub fn scroll_up(&mut self) {
        self.follow_chat = false;
        self.chat_scroll = self.chat_scroll.saturating_sub(3);
    }

    pub fn scroll_down(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_add(3);
    }

    // Product picker methods
    pub fn open_product_picker(&mut self) {
        self.show_product_picker = true;
        if self.products.is_empty() && self.products_task.is_none() {
            let client = self.client.clone();
            self.products_loading = true;
            self.products_task = Some(tokio::spawn(async move { client.list_products().await }));
        }
        self.sync_product_picker();
    }

    /// Collect the product list once its fetch has finished.
    pub async fn poll_products(&mut self) {
        let finished = self
            .products_task
            .as_ref()
            .map(|task| task.is_finished())
            .unwrap_or(false);
        if !finished {
            return;
        }

        if let Some(task) = self.products_task.take() {
            self.products_loading = false;
            match task.await {
                Ok(Ok(products)) => {
                    info!(count = products.len(), "Products loaded");
                    self.products = products;
                    self.sync_product_picker();
                }
                Ok(Err(ApiError::Unauthorized)) => self.expire_session(),
                Ok(Err(e)) => {
                    self.show_product_picker = false;
                    self.notice = Some(Notice::error(
                        "Products unavailable",
                        format!("Could not load products: {}", e),
                    ));
                }
                Err(e) => warn!("Product fetch task failed: {}", e),
            }
        }
    }

    // Row 0 is "all products", so product i sits at row i + 1
    fn sync_product_picker(&mut self) {
        let row = self
            .chat
            .context_product()
            .and_then(|id| self.products.iter().position(|p| p.id == id))
            .map(|i| i + 1)
            .unwrap_or(0);
        self.product_picker_state.select(Some(row));
    }

    pub fn product_picker_nav_down(&mut self) {
        let len = self.products.len() + 1;
        let i = self.product_picker_state.selected().unwrap_or(0);
        self.product_picker_state.select(Some((i + 1).min(len - 1)));
    }

    pub fn product_picker_nav_up(&mut self) {
        let i = self.product_picker_state.selected().unwrap_or(0);
        self.product_picker_state.select(Some(i.saturating_sub(1)));
    }

    pub fn select_product(&mut self) {
        let Some(row) = self.product_picker_state.selected() else {
            return;
        };
        let product_id = match row {
            0 => None,
            i => match self.products.get(i - 1) {
                Some(product) => Some(product.id),
                None => return,
            },
        };
        self.set_context_product(product_id);
        self.show_product_picker = false;
    }

    pub fn set_context_product(&mut self, product_id: Option<i64>) {
        self.chat.set_context_product(product_id);
        if let Some(path) = &self.config_path {
            if let Err(e) = Config::save_default_context_product(path, product_id) {
                warn!("Could not remember context product: {}", e);
            }
        }
    }

    /// Display name of the current context product.
    pub fn context_product_name(&self) -> Option<String> {
        self.chat.context_product().map(|id| {
            self.products
                .iter()
                .find(|p| p.id == id)
                .map(|p| p.name.clone())
                .unwrap_or_else(|| format!("Product {}", id))
        })
    }

    // Quick question methods
    pub fn quick_question_nav_down(&mut self) {
        let i = self.quick_question_state.selected().unwrap_or(0);
        self.quick_question_state
            .select(Some((i + 1).min(QUICK_QUESTIONS.len() - 1)));
    }

    pub fn quick_question_nav_up(&mut self) {
        let i = self.quick_question_state.selected().unwrap_or(0);
        self.quick_question_state.select(Some(i.saturating_sub(1)));
    }

    /// Put the highlighted quick question in the input box.
    pub fn use_quick_question(&mut self) {
        if let Some(question) = self
            .quick_question_state
            .selected()
            .and_then(|i| QUICK_QUESTIONS.get(i))
        {
            self.query_input = question.to_string();
            self.query_cursor = self.query_input.chars().count();
            self.input_mode = InputMode::Editing;
        }
        self.show_quick_questions = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use insightlens_core::TurnStatus;
    use serde_json::json;

    fn app_for(server: &MockServer) -> (App, UnboundedReceiver<SessionEvent>) {
        let client = InsightClient::new(&server.base_url()).with_token("test-token");
        App::with_client(client, &Config::new())
    }

    async fn settle(app: &mut App, events: &mut UnboundedReceiver<SessionEvent>) {
        let event = events.recv().await.expect("session event");
        app.apply_session_event(event);
    }

    async fn wait_for_products(app: &mut App) {
        while app.products_task.is_some() {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            app.poll_products().await;
        }
    }

    #[tokio::test]
    async fn test_submit_selects_new_answer() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/ask");
                then.status(200)
                    .json_body(json!({"answer": "NPS is 62", "tool_used": "get_nps", "chart_data": null}));
            })
            .await;

        let (mut app, mut events) = app_for(&server);
        app.query_input = "What is the NPS for Electronics?".to_string();
        app.query_cursor = app.query_input.chars().count();
        app.submit_query();

        assert!(app.query_input.is_empty());
        assert_eq!(app.query_cursor, 0);
        let selected = app.selected_turn.unwrap();
        assert_eq!(app.chat.store().get(selected).unwrap().status, TurnStatus::Pending);

        settle(&mut app, &mut events).await;
        assert_eq!(app.chat.store().get(selected).unwrap().text, "NPS is 62");
        assert!(app.notice.is_none());
    }

    #[tokio::test]
    async fn test_unauthorized_answer_expires_session() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/ask");
                then.status(401).json_body(json!({"detail": "Invalid token"}));
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let session_path = dir.path().join("session.json");
        Session {
            token: "stale".to_string(),
            email: None,
        }
        .save_to(&session_path)
        .unwrap();

        let (mut app, mut events) = app_for(&server);
        app.session_path = Some(session_path.clone());
        app.query_input = "q".to_string();
        app.submit_query();
        settle(&mut app, &mut events).await;

        assert_eq!(app.notice.as_ref().unwrap().kind, NoticeKind::SessionExpired);
        assert!(Session::load_from(&session_path).unwrap().is_none());
        assert!(!app.should_quit);

        app.dismiss_notice();
        assert!(app.should_quit);
    }

    #[tokio::test]
    async fn test_failed_save_shows_notice_and_stays_unsaved() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/ask");
                then.status(200)
                    .json_body(json!({"answer": "Top product: Kettle", "tool_used": "get_best_worst_products"}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/save");
                then.status(500).body("database locked");
            })
            .await;

        let (mut app, mut events) = app_for(&server);
        app.query_input = "Best products?".to_string();
        app.submit_query();
        settle(&mut app, &mut events).await;

        app.save_selected();
        settle(&mut app, &mut events).await;

        let notice = app.notice.as_ref().unwrap();
        assert_eq!(notice.kind, NoticeKind::Error);
        assert!(notice.message.starts_with("Failed to save report"));
        let turn = app.selected_turn.unwrap();
        assert!(!app.chat.store().get(turn).unwrap().saved);

        app.dismiss_notice();
        assert!(!app.should_quit);
    }

    #[tokio::test]
    async fn test_pick_context_product() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/analytics/products");
                then.status(200).json_body(json!([
                    {"id": 1, "name": "iPhone 13 Pro", "category": "Electronics"},
                    {"id": 2, "name": "Coffee Maker Pro", "category": "Home & Kitchen"}
                ]));
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        let (mut app, _events) = app_for(&server);
        app.config_path = Some(config_path.clone());

        app.open_product_picker();
        assert!(app.products_loading);
        wait_for_products(&mut app).await;
        assert_eq!(app.products.len(), 2);
        assert_eq!(app.product_picker_state.selected(), Some(0));

        app.product_picker_nav_down();
        app.product_picker_nav_down();
        app.product_picker_nav_down();
        app.select_product();

        assert!(!app.show_product_picker);
        assert_eq!(app.chat.context_product(), Some(2));
        assert_eq!(app.context_product_name().as_deref(), Some("Coffee Maker Pro"));
        assert_eq!(
            Config::load_from(&config_path).unwrap().default_context_product,
            Some(2)
        );

        app.open_product_picker();
        assert_eq!(app.product_picker_state.selected(), Some(2));
        app.product_picker_state.select(Some(0));
        app.select_product();
        assert!(app.chat.context_product().is_none());
    }

    #[test]
    fn test_quick_question_prefills_input() {
        let client = InsightClient::new("http://localhost:9");
        let (mut app, _events) = App::with_client(client, &Config::new());
        app.input_mode = InputMode::Normal;
        app.show_quick_questions = true;

        app.quick_question_nav_down();
        app.use_quick_question();

        assert_eq!(app.query_input, QUICK_QUESTIONS[1]);
        assert_eq!(app.query_cursor, QUICK_QUESTIONS[1].chars().count());
        assert_eq!(app.input_mode, InputMode::Editing);
        assert!(!app.show_quick_questions);
    }
}
