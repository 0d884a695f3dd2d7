//! Ordered conversation log.
//!
//! Turns live in an id-keyed map; the display order is a separate list of
//! ids. Turns are only ever appended. The two permitted mutations are
//! resolving a pending assistant turn and flipping `saved`.

use std::collections::HashMap;

use crate::error::ChatError;
use crate::state::{Resolution, Turn, TurnId, TurnStatus};

#[derive(Debug, Default)]
pub struct ConversationStore {
    order: Vec<TurnId>,
    turns: HashMap<TurnId, Turn>,
    next_id: u64,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self) -> TurnId {
        let id = TurnId(self.next_id);
        self.next_id += 1;
        id
    }

    fn append(&mut self, turn: Turn) -> TurnId {
        let id = turn.id;
        self.order.push(id);
        self.turns.insert(id, turn);
        id
    }

    pub fn push_user(&mut self, text: impl Into<String>) -> TurnId {
        let id = self.allocate();
        self.append(Turn::user(id, text))
    }

    pub fn push_pending(&mut self, context_product_id: Option<i64>) -> TurnId {
        let id = self.allocate();
        self.append(Turn::pending(id, context_product_id))
    }

    /// Settle a pending assistant turn. Fails for any other turn, so a turn
    /// can be resolved at most once.
    pub fn resolve(&mut self, id: TurnId, resolution: Resolution) -> Result<(), ChatError> {
        let turn = self.turns.get_mut(&id).ok_or(ChatError::UnknownTurn(id))?;
        if !turn.is_pending() {
            return Err(ChatError::UnknownTurn(id));
        }

        match resolution {
            Resolution::Answered {
                text,
                tool_used,
                chart_spec,
                question,
            } => {
                turn.status = TurnStatus::Ready;
                turn.text = text;
                turn.tool_used = tool_used;
                turn.chart_spec = chart_spec;
                turn.question_ref = Some(question);
            }
            Resolution::Failed { message } => {
                turn.status = TurnStatus::Error;
                turn.text = message;
                turn.tool_used = None;
                turn.chart_spec = None;
            }
        }
        Ok(())
    }

    /// Flip `saved`. Only ready assistant turns can be saved.
    pub fn mark_saved(&mut self, id: TurnId) -> Result<(), ChatError> {
        let turn = self.turns.get_mut(&id).ok_or(ChatError::UnknownTurn(id))?;
        if !turn.is_saveable() {
            return Err(ChatError::NotSaveable(id));
        }
        turn.saved = true;
        Ok(())
    }

    pub fn get(&self, id: TurnId) -> Option<&Turn> {
        self.turns.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Turn> + '_ {
        self.order.iter().filter_map(|id| self.turns.get(id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn id_at(&self, index: usize) -> Option<TurnId> {
        self.order.get(index).copied()
    }

    pub fn position(&self, id: TurnId) -> Option<usize> {
        self.order.iter().position(|t| *t == id)
    }

    /// The pending assistant turn, if any.
    pub fn pending(&self) -> Option<TurnId> {
        self.iter().find(|t| t.is_pending()).map(|t| t.id)
    }
}
