//! Wiring for one chat screen: the store plus the dispatcher/saver pair
//! that are the only things allowed to write to it.
//!
//! Background calls report back over the channel returned by
//! [`ChatSession::new`]; the owner feeds each [`SessionEvent`] to
//! [`ChatSession::apply`] from its own event loop, so the store only ever
//! has one writer.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::api::{AskService, InsightClient, SaveService};
use crate::config::Config;
use crate::dispatcher::{AskCompletion, QueryDispatcher};
use crate::error::ChatError;
use crate::saver::{ReportSaver, SaveCompletion};
use crate::state::TurnId;
use crate::store::ConversationStore;

#[derive(Debug)]
pub enum SessionEvent {
    Answered(AskCompletion),
    Saved(SaveCompletion),
}

pub struct ChatSession<A: AskService, S: SaveService> {
    store: ConversationStore,
    dispatcher: QueryDispatcher<A>,
    saver: ReportSaver<S>,
    context_product_id: Option<i64>,
    events: UnboundedSender<SessionEvent>,
    cancel: CancellationToken,
}

impl ChatSession<InsightClient, InsightClient> {
    /// A session whose Ask and Save calls both go through `client`.
    pub fn with_client(
        client: InsightClient,
        config: &Config,
    ) -> (Self, UnboundedReceiver<SessionEvent>) {
        let client = Arc::new(client);
        let (mut session, events) = Self::new(
            Arc::clone(&client),
            client,
            config.ask_timeout(),
            config.save_timeout(),
        );
        session.context_product_id = config.default_context_product;
        (session, events)
    }
}

impl<A: AskService, S: SaveService> ChatSession<A, S> {
    pub fn new(
        ask: Arc<A>,
        save: Arc<S>,
        ask_timeout: Duration,
        save_timeout: Duration,
    ) -> (Self, UnboundedReceiver<SessionEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let session = Self {
            store: ConversationStore::new(),
            dispatcher: QueryDispatcher::new(ask, ask_timeout),
            saver: ReportSaver::new(save, save_timeout),
            context_product_id: None,
            events,
            cancel: CancellationToken::new(),
        };
        (session, rx)
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn context_product(&self) -> Option<i64> {
        self.context_product_id
    }

    pub fn set_context_product(&mut self, product_id: Option<i64>) {
        debug!(?product_id, "Context product changed");
        self.context_product_id = product_id;
    }

    pub fn is_busy(&self) -> bool {
        self.dispatcher.is_busy()
    }

    pub fn is_saving(&self, turn: TurnId) -> bool {
        self.saver.is_saving(turn)
    }

    /// Ask the text in `input` under the current context product.
    pub fn submit(&mut self, input: &mut String) -> Result<TurnId, ChatError> {
        if self.cancel.is_cancelled() {
            return Err(ChatError::Cancelled);
        }
        self.dispatcher.submit(
            &mut self.store,
            input,
            self.context_product_id,
            &self.events,
            &self.cancel,
        )
    }

    /// Save an answered turn as a report. `Ok(false)` means nothing was sent.
    pub fn save(&mut self, turn: TurnId) -> Result<bool, ChatError> {
        if self.cancel.is_cancelled() {
            return Err(ChatError::Cancelled);
        }
        self.saver.save(&self.store, turn, &self.events, &self.cancel)
    }

    /// Apply a background completion to the store.
    pub fn apply(&mut self, event: SessionEvent) -> Result<(), ChatError> {
        match event {
            SessionEvent::Answered(completion) => {
                self.dispatcher.resolve(&mut self.store, completion)
            }
            SessionEvent::Saved(completion) => self.saver.complete(&mut self.store, completion),
        }
    }

    /// Cancel every in-flight call. Late results are dropped.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl<A: AskService, S: SaveService> Drop for ChatSession<A, S> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::{APOLOGY_TEXT, TIMEOUT_TEXT};
    use crate::error::ApiError;
    use crate::state::{ChatRole, TurnStatus};
    use crate::testing::{FakeAsk, FakeSave};
    use crate::tool::Tool;

    fn new_session(
        ask: FakeAsk,
        save: FakeSave,
    ) -> (
        ChatSession<FakeAsk, FakeSave>,
        UnboundedReceiver<SessionEvent>,
        Arc<FakeAsk>,
        Arc<FakeSave>,
    ) {
        let ask = Arc::new(ask);
        let save = Arc::new(save);
        let (session, rx) = ChatSession::new(
            Arc::clone(&ask),
            Arc::clone(&save),
            Duration::from_secs(5),
            Duration::from_secs(5),
        );
        (session, rx, ask, save)
    }

    async fn settle(
        session: &mut ChatSession<FakeAsk, FakeSave>,
        rx: &mut UnboundedReceiver<SessionEvent>,
    ) -> Result<(), ChatError> {
        let event = rx.recv().await.expect("session event");
        session.apply(event)
    }

    #[tokio::test]
    async fn test_submit_appends_user_then_pending() {
        let (mut session, mut rx, ask, _) =
            new_session(FakeAsk::answering("NPS is 62", Some("get_nps")), FakeSave::ok());

        let mut input = "What is the NPS for Electronics?".to_string();
        let id = session.submit(&mut input).unwrap();

        assert!(input.is_empty());
        let turns: Vec<_> = session.store().iter().cloned().collect();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, ChatRole::User);
        assert_eq!(turns[0].status, TurnStatus::Ready);
        assert_eq!(turns[0].text, "What is the NPS for Electronics?");
        assert_eq!(turns[1].id, id);
        assert_eq!(turns[1].role, ChatRole::Assistant);
        assert_eq!(turns[1].status, TurnStatus::Pending);
        assert!(turns[1].question_ref.is_none());

        settle(&mut session, &mut rx).await.unwrap();

        let answered = session.store().get(id).unwrap();
        assert_eq!(answered.status, TurnStatus::Ready);
        assert_eq!(answered.text, "NPS is 62");
        assert_eq!(answered.tool_used, Some(Tool::NpsLookup));
        assert!(answered.chart_spec.is_none());
        assert_eq!(
            answered.question_ref.as_deref(),
            Some("What is the NPS for Electronics?")
        );
        assert!(!answered.saved);
        assert_eq!(
            ask.calls(),
            vec![("What is the NPS for Electronics?".to_string(), None)]
        );
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn test_submit_while_pending_is_a_no_op() {
        let (mut session, mut rx, ask, _) = new_session(FakeAsk::gated("slow answer"), FakeSave::ok());

        let mut first = "first".to_string();
        session.submit(&mut first).unwrap();
        assert!(session.is_busy());

        for text in ["second", "", "   ", "first"] {
            let mut input = text.to_string();
            let err = session.submit(&mut input).unwrap_err();
            assert!(err.is_silent());
            assert_eq!(input, text);
            assert_eq!(session.store().len(), 2);
        }

        ask.release();
        settle(&mut session, &mut rx).await.unwrap();
        assert!(!session.is_busy());

        let mut next = "next".to_string();
        session.submit(&mut next).unwrap();
        assert_eq!(session.store().len(), 4);
    }

    #[tokio::test]
    async fn test_context_product_is_forwarded() {
        let (mut session, mut rx, ask, _) =
            new_session(FakeAsk::answering("ok", None), FakeSave::ok());
        session.set_context_product(Some(17));

        let mut input = "Summarize reviews".to_string();
        session.submit(&mut input).unwrap();
        settle(&mut session, &mut rx).await.unwrap();

        assert_eq!(ask.calls(), vec![("Summarize reviews".to_string(), Some(17))]);
    }

    #[tokio::test]
    async fn test_failure_resolves_to_apology() {
        for failure in [
            ApiError::Status {
                status: 500,
                body: "boom".to_string(),
            },
            ApiError::Transport("connection refused".to_string()),
            ApiError::Unauthorized,
        ] {
            let (mut session, mut rx, _, _) = new_session(FakeAsk::failing(failure), FakeSave::ok());
            let mut input = "q".to_string();
            let id = session.submit(&mut input).unwrap();

            let err = settle(&mut session, &mut rx).await.unwrap_err();
            assert!(matches!(err, ChatError::Answer(_)));

            let turn = session.store().get(id).unwrap();
            assert_eq!(turn.status, TurnStatus::Error);
            assert_eq!(turn.text, APOLOGY_TEXT);
            assert!(turn.tool_used.is_none());
            assert!(turn.chart_spec.is_none());
            assert!(!session.is_busy());
        }
    }

    #[tokio::test]
    async fn test_unauthorized_is_reported_to_owner() {
        let (mut session, mut rx, _, _) =
            new_session(FakeAsk::failing(ApiError::Unauthorized), FakeSave::ok());
        let mut input = "q".to_string();
        session.submit(&mut input).unwrap();

        let err = settle(&mut session, &mut rx).await.unwrap_err();
        assert!(err.is_unauthorized());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_ask_times_out() {
        let (mut session, mut rx, _, _) = new_session(FakeAsk::hanging(), FakeSave::ok());
        let mut input = "q".to_string();
        let id = session.submit(&mut input).unwrap();

        let err = settle(&mut session, &mut rx).await.unwrap_err();
        assert!(matches!(err, ChatError::Timeout(_)));
        assert_eq!(session.store().get(id).unwrap().text, TIMEOUT_TEXT);
        assert_eq!(session.store().get(id).unwrap().status, TurnStatus::Error);
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn test_panicking_ask_still_releases_guard() {
        let (mut session, mut rx, _, _) = new_session(FakeAsk::panicking(), FakeSave::ok());
        let mut input = "q".to_string();
        let id = session.submit(&mut input).unwrap();

        assert!(settle(&mut session, &mut rx).await.is_err());
        assert_eq!(session.store().get(id).unwrap().status, TurnStatus::Error);
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn test_teardown_discards_late_answer() {
        let (mut session, mut rx, ask, _) = new_session(FakeAsk::gated("late"), FakeSave::ok());
        let mut input = "q".to_string();
        session.submit(&mut input).unwrap();

        drop(session);
        ask.release();

        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_save_twice_issues_one_call() {
        let (mut session, mut rx, _, save) =
            new_session(FakeAsk::answering("NPS is 62", Some("get_nps")), FakeSave::gated());
        session.set_context_product(Some(3));
        let mut input = "What is the NPS?".to_string();
        let id = session.submit(&mut input).unwrap();
        settle(&mut session, &mut rx).await.unwrap();

        assert!(session.save(id).unwrap());
        assert!(!session.save(id).unwrap());
        assert!(session.is_saving(id));

        save.release();
        settle(&mut session, &mut rx).await.unwrap();

        assert!(session.store().get(id).unwrap().saved);
        assert!(!session.save(id).unwrap());
        let calls = save.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].query, "What is the NPS?");
        assert_eq!(calls[0].answer, "NPS is 62");
        assert_eq!(calls[0].tool_used.as_deref(), Some("get_nps"));
        assert_eq!(calls[0].product_id, Some(3));
    }

    #[tokio::test]
    async fn test_save_files_report_under_asked_product() {
        let (mut session, mut rx, _, save) =
            new_session(FakeAsk::answering("Mostly positive", None), FakeSave::ok());
        session.set_context_product(Some(3));
        let mut input = "How is the Kettle doing?".to_string();
        let id = session.submit(&mut input).unwrap();
        settle(&mut session, &mut rx).await.unwrap();
        assert_eq!(session.store().get(id).unwrap().context_product_id, Some(3));

        session.set_context_product(Some(9));
        assert!(session.save(id).unwrap());
        settle(&mut session, &mut rx).await.unwrap();

        assert_eq!(save.calls()[0].product_id, Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_save_times_out() {
        let (mut session, mut rx, _, save) =
            new_session(FakeAsk::answering("a", None), FakeSave::hanging());
        let mut input = "q".to_string();
        let id = session.submit(&mut input).unwrap();
        settle(&mut session, &mut rx).await.unwrap();

        assert!(session.save(id).unwrap());
        assert!(session.is_saving(id));

        let err = settle(&mut session, &mut rx).await.unwrap_err();
        assert!(matches!(err, ChatError::Timeout(after) if after == Duration::from_secs(5)));
        assert!(!session.store().get(id).unwrap().saved);
        assert!(!session.is_saving(id));
        assert_eq!(save.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_panicking_save_is_reported_and_retryable() {
        let (mut session, mut rx, _, _) =
            new_session(FakeAsk::answering("a", None), FakeSave::panicking());
        let mut input = "q".to_string();
        let id = session.submit(&mut input).unwrap();
        settle(&mut session, &mut rx).await.unwrap();

        assert!(session.save(id).unwrap());
        let err = settle(&mut session, &mut rx).await.unwrap_err();
        assert!(matches!(err, ChatError::Save(ApiError::Transport(_))));
        assert!(!session.store().get(id).unwrap().saved);
        assert!(!session.is_saving(id));
        assert!(session.save(id).unwrap());
    }

    #[tokio::test]
    async fn test_failed_save_is_retryable() {
        let (mut session, mut rx, _, save) = new_session(
            FakeAsk::answering("a", None),
            FakeSave::failing_once(ApiError::Status {
                status: 503,
                body: String::new(),
            }),
        );
        let mut input = "q".to_string();
        let id = session.submit(&mut input).unwrap();
        settle(&mut session, &mut rx).await.unwrap();

        assert!(session.save(id).unwrap());
        let err = settle(&mut session, &mut rx).await.unwrap_err();
        assert!(matches!(err, ChatError::Save(_)));
        assert!(!session.store().get(id).unwrap().saved);

        assert!(session.save(id).unwrap());
        settle(&mut session, &mut rx).await.unwrap();
        assert!(session.store().get(id).unwrap().saved);
        assert_eq!(save.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_only_answered_turns_can_be_saved() {
        let (mut session, mut rx, _, save) =
            new_session(FakeAsk::failing(ApiError::Transport("down".into())), FakeSave::ok());
        let mut input = "q".to_string();
        let id = session.submit(&mut input).unwrap();

        assert!(matches!(session.save(id), Err(ChatError::NotSaveable(_))));
        let _ = settle(&mut session, &mut rx).await;
        assert!(matches!(session.save(id), Err(ChatError::NotSaveable(_))));

        let user_turn = session.store().id_at(0).unwrap();
        assert!(matches!(session.save(user_turn), Err(ChatError::NotSaveable(_))));
        assert!(save.calls().is_empty());
    }

    #[tokio::test]
    async fn test_shut_down_session_refuses_new_work() {
        let (mut session, _rx, ask, _) = new_session(FakeAsk::answering("a", None), FakeSave::ok());
        session.shutdown();

        let mut input = "late question".to_string();
        assert!(matches!(session.submit(&mut input), Err(ChatError::Cancelled)));
        assert_eq!(input, "late question");
        assert!(session.store().is_empty());
        assert!(ask.calls().is_empty());
    }
}
