//! Persist an answered turn as a report, at most once.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::api::{SaveAck, SaveRequest, SaveService};
use crate::error::{ApiError, ChatError};
use crate::session::SessionEvent;
use crate::state::TurnId;
use crate::store::ConversationStore;
use crate::tool::Tool;

#[derive(Debug)]
pub enum SaveOutcome {
    Saved(SaveAck),
    Failed(ApiError),
    TimedOut(Duration),
    Abandoned,
}

#[derive(Debug)]
pub struct SaveCompletion {
    pub turn: TurnId,
    pub outcome: SaveOutcome,
}

struct SaveReporter {
    events: UnboundedSender<SessionEvent>,
    turn: TurnId,
    done: bool,
}

impl SaveReporter {
    fn report(mut self, outcome: SaveOutcome) {
        self.send(outcome);
    }

    fn send(&mut self, outcome: SaveOutcome) {
        if self.done {
            return;
        }
        self.done = true;
        let _ = self.events.send(SessionEvent::Saved(SaveCompletion {
            turn: self.turn,
            outcome,
        }));
    }

    fn disarm(&mut self) {
        self.done = true;
    }
}

impl Drop for SaveReporter {
    fn drop(&mut self) {
        if !self.done {
            self.send(SaveOutcome::Abandoned);
        }
    }
}

pub struct ReportSaver<S: SaveService> {
    save: Arc<S>,
    in_flight: HashSet<TurnId>,
    timeout: Duration,
}

impl<S: SaveService> ReportSaver<S> {
    pub fn new(save: Arc<S>, timeout: Duration) -> Self {
        Self {
            save,
            in_flight: HashSet::new(),
            timeout,
        }
    }

    pub fn is_saving(&self, turn: TurnId) -> bool {
        self.in_flight.contains(&turn)
    }

    /// Start saving `turn` under the product it was asked about. Returns
    /// `Ok(false)` when there is nothing to do: the turn is already saved or
    /// a save for it is already running.
    pub fn save(
        &mut self,
        store: &ConversationStore,
        turn: TurnId,
        events: &UnboundedSender<SessionEvent>,
        cancel: &CancellationToken,
    ) -> Result<bool, ChatError> {
        let entry = store.get(turn).ok_or(ChatError::UnknownTurn(turn))?;
        if entry.saved || self.in_flight.contains(&turn) {
            return Ok(false);
        }
        if !entry.is_saveable() {
            return Err(ChatError::NotSaveable(turn));
        }

        let request = SaveRequest {
            query: entry.question_ref.clone().unwrap_or_default(),
            answer: entry.text.clone(),
            tool_used: entry.tool_used.as_ref().map(|t| t.as_str().to_string()),
            product_id: entry.context_product_id,
        };
        self.in_flight.insert(turn);
        info!(%turn, tool = entry.tool_used.as_ref().map(Tool::as_str).unwrap_or("none"), "Saving report");

        let reporter = SaveReporter {
            events: events.clone(),
            turn,
            done: false,
        };
        let save = Arc::clone(&self.save);
        let timeout = self.timeout;
        let cancel = cancel.clone();

        tokio::spawn(async move {
            let mut reporter = reporter;
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    reporter.disarm();
                    return;
                }
                result = tokio::time::timeout(timeout, save.save(request)) => {
                    match result {
                        Ok(Ok(ack)) => SaveOutcome::Saved(ack),
                        Ok(Err(e)) => SaveOutcome::Failed(e),
                        Err(_) => SaveOutcome::TimedOut(timeout),
                    }
                }
            };
            reporter.report(outcome);
        });

        Ok(true)
    }

    /// Apply a save result. On failure the turn stays unsaved so the user
    /// can retry; the returned error is what the user should be shown.
    pub fn complete(
        &mut self,
        store: &mut ConversationStore,
        completion: SaveCompletion,
    ) -> Result<(), ChatError> {
        let SaveCompletion { turn, outcome } = completion;
        self.in_flight.remove(&turn);

        match outcome {
            SaveOutcome::Saved(ack) => {
                info!(%turn, message = %ack.message, "Report saved");
                store.mark_saved(turn)
            }
            SaveOutcome::Failed(e) => {
                warn!(%turn, "Save failed: {}", e);
                Err(ChatError::Save(e))
            }
            SaveOutcome::TimedOut(after) => {
                warn!(%turn, ?after, "Save timed out");
                Err(ChatError::Timeout(after))
            }
            SaveOutcome::Abandoned => {
                warn!(%turn, "Save task ended without a result");
                Err(ChatError::Save(ApiError::Transport(
                    "request ended without a response".to_string(),
                )))
            }
        }
    }
}
