//! Ask/answer lifecycle: one question in flight at a time.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::api::{AskResponse, AskService};
use crate::error::{ApiError, ChatError};
use crate::session::SessionEvent;
use crate::state::{Resolution, TurnId};
use crate::store::ConversationStore;
use crate::tool::Tool;

pub const APOLOGY_TEXT: &str =
    "Sorry, I couldn't get an answer for that question. Please try again.";
pub const TIMEOUT_TEXT: &str =
    "The analysis service took too long to respond. Please try asking again.";

#[derive(Debug)]
pub enum AskOutcome {
    Answered(AskResponse),
    Failed(ApiError),
    TimedOut(Duration),
    /// The ask task ended without producing a result (e.g. it panicked).
    Abandoned,
}

/// Result of one Ask call, addressed to the turn it was issued for.
#[derive(Debug)]
pub struct AskCompletion {
    pub turn: TurnId,
    pub question: String,
    pub outcome: AskOutcome,
}

/// Reports exactly one completion per ask task, even if the task dies.
struct AskReporter {
    events: UnboundedSender<SessionEvent>,
    turn: TurnId,
    question: String,
    done: bool,
}

impl AskReporter {
    fn report(mut self, outcome: AskOutcome) {
        self.send(outcome);
    }

    fn send(&mut self, outcome: AskOutcome) {
        if self.done {
            return;
        }
        self.done = true;
        let completion = AskCompletion {
            turn: self.turn,
            question: std::mem::take(&mut self.question),
            outcome,
        };
        // Receiver gone means the session was torn down; nothing to patch.
        let _ = self.events.send(SessionEvent::Answered(completion));
    }

    fn disarm(&mut self) {
        self.done = true;
    }
}

impl Drop for AskReporter {
    fn drop(&mut self) {
        if !self.done {
            self.send(AskOutcome::Abandoned);
        }
    }
}

pub struct QueryDispatcher<A: AskService> {
    ask: Arc<A>,
    in_flight: Option<TurnId>,
    timeout: Duration,
}

impl<A: AskService> QueryDispatcher<A> {
    pub fn new(ask: Arc<A>, timeout: Duration) -> Self {
        Self {
            ask,
            in_flight: None,
            timeout,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Append the user turn and a pending answer, then ask in the background.
    ///
    /// Blank input and a busy dispatcher are rejected without touching the
    /// store or the input buffer. On success the input buffer is cleared.
    pub fn submit(
        &mut self,
        store: &mut ConversationStore,
        input: &mut String,
        context_product_id: Option<i64>,
        events: &UnboundedSender<SessionEvent>,
        cancel: &CancellationToken,
    ) -> Result<TurnId, ChatError> {
        if input.trim().is_empty() {
            return Err(ChatError::EmptyQuery);
        }
        if self.in_flight.is_some() || store.pending().is_some() {
            return Err(ChatError::Busy);
        }

        let question = std::mem::take(input);
        store.push_user(question.clone());
        let turn = store.push_pending(context_product_id);
        self.in_flight = Some(turn);
        info!(%turn, ?context_product_id, "Dispatching question");

        let reporter = AskReporter {
            events: events.clone(),
            turn,
            question: question.clone(),
            done: false,
        };
        let ask = Arc::clone(&self.ask);
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
                result = tokio::time::timeout(timeout, ask.ask(&question, context_product_id)) => {
                    match result {
                        Ok(Ok(response)) => AskOutcome::Answered(response),
                        Ok(Err(e)) => AskOutcome::Failed(e),
                        Err(_) => AskOutcome::TimedOut(timeout),
                    }
                }
            };
            reporter.report(outcome);
        });

        Ok(turn)
    }

    /// Settle the pending turn a completion belongs to and release the guard.
    ///
    /// The turn is patched on every path. An `Err` tells the owner why the
    /// answer failed (it has already been turned into an error turn).
    pub fn resolve(
        &mut self,
        store: &mut ConversationStore,
        completion: AskCompletion,
    ) -> Result<(), ChatError> {
        let AskCompletion {
            turn,
            question,
            outcome,
        } = completion;

        if self.in_flight == Some(turn) {
            self.in_flight = None;
        }

        let (resolution, failure) = match outcome {
            AskOutcome::Answered(response) => {
                let tool_used = Tool::parse(response.tool_used.as_deref());
                info!(
                    %turn,
                    tool = tool_used.as_ref().map(Tool::as_str).unwrap_or("none"),
                    has_chart = response.chart_data.is_some(),
                    "Answer received"
                );
                (
                    Resolution::Answered {
                        text: response.answer,
                        tool_used,
                        chart_spec: response.chart_data,
                        question,
                    },
                    None,
                )
            }
            AskOutcome::Failed(e) => {
                warn!(%turn, "Ask failed: {}", e);
                (failed(APOLOGY_TEXT), Some(ChatError::Answer(e)))
            }
            AskOutcome::TimedOut(after) => {
                warn!(%turn, ?after, "Ask timed out");
                (failed(TIMEOUT_TEXT), Some(ChatError::Timeout(after)))
            }
            AskOutcome::Abandoned => {
                warn!(%turn, "Ask task ended without a result");
                (
                    failed(APOLOGY_TEXT),
                    Some(ChatError::Answer(ApiError::Transport(
                        "request ended without a response".to_string(),
                    ))),
                )
            }
        };

        if let Err(e) = store.resolve(turn, resolution) {
            warn!(%turn, "Discarding answer for settled turn: {}", e);
            return Err(e);
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn failed(message: &str) -> Resolution {
    Resolution::Failed {
        message: message.to_string(),
    }
}
