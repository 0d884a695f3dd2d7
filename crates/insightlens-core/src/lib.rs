pub mod api;
pub mod chart;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod saver;
pub mod session;
pub mod state;
pub mod store;
pub mod tool;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use api::{AskResponse, AskService, HistoryEntry, InsightClient, Product, SaveRequest, SaveService};
pub use chart::{render as render_chart, ChartKind, ChartSpec, RenderableChart};
pub use config::{Config, Session};
pub use dispatcher::QueryDispatcher;
pub use error::{ApiError, ChatError};
pub use saver::ReportSaver;
pub use session::{ChatSession, SessionEvent};
pub use state::{ChatRole, Turn, TurnId, TurnStatus};
pub use store::ConversationStore;
pub use tool::{describe as describe_tool, BadgeColor, Tool, ToolBadge};
