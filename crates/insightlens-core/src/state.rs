//! UI-agnostic conversation state types
//!
//! These are shared by every front-end (the TUI chat screen, the one-shot
//! CLI) and don't depend on any specific UI framework.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::chart::ChartSpec;
use crate::tool::Tool;

/// Stable identifier of a turn within one [`ConversationStore`](crate::store::ConversationStore).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TurnId(pub u64);

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatRole {
    User,
    Assistant,
}

/// Lifecycle state of a turn. User turns are always `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnStatus {
    Pending,
    Ready,
    Error,
}

/// One entry in the conversation log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub id: TurnId,
    pub role: ChatRole,
    pub text: String,
    pub status: TurnStatus,
    pub tool_used: Option<Tool>,
    pub chart_spec: Option<ChartSpec>,
    /// The question this answer belongs to; filled in when the answer lands.
    pub question_ref: Option<String>,
    /// Context product the question was asked under.
    pub context_product_id: Option<i64>,
    pub saved: bool,
}

impl Turn {
    pub fn user(id: TurnId, text: impl Into<String>) -> Self {
        Self {
            id,
            role: ChatRole::User,
            text: text.into(),
            status: TurnStatus::Ready,
            tool_used: None,
            chart_spec: None,
            question_ref: None,
            context_product_id: None,
            saved: false,
        }
    }

    pub fn pending(id: TurnId, context_product_id: Option<i64>) -> Self {
        Self {
            id,
            role: ChatRole::Assistant,
            text: String::new(),
            status: TurnStatus::Pending,
            tool_used: None,
            chart_spec: None,
            question_ref: None,
            context_product_id,
            saved: false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == TurnStatus::Pending
    }

    /// Whether this turn can be handed to the report saver.
    pub fn is_saveable(&self) -> bool {
        self.role == ChatRole::Assistant && self.status == TurnStatus::Ready
    }
}

/// How a pending assistant turn ends.
#[derive(Debug, Clone)]
pub enum Resolution {
    Answered {
        text: String,
        tool_used: Option<Tool>,
        chart_spec: Option<ChartSpec>,
        question: String,
    },
    Failed {
        message: String,
    },
}
