//! Scriptable Ask/Save collaborators for unit tests.

use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::api::{AskResponse, AskService, SaveAck, SaveRequest, SaveService};
use crate::error::ApiError;

enum AskBehavior {
    Answer {
        answer: String,
        tool: Option<String>,
    },
    Gated {
        answer: String,
    },
    Fail(Mutex<Option<ApiError>>),
    Hang,
    Panic,
}

pub struct FakeAsk {
    behavior: AskBehavior,
    gate: Notify,
    calls: Mutex<Vec<(String, Option<i64>)>>,
}

impl FakeAsk {
    fn with(behavior: AskBehavior) -> Self {
        Self {
            behavior,
            gate: Notify::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn answering(answer: &str, tool: Option<&str>) -> Self {
        Self::with(AskBehavior::Answer {
            answer: answer.to_string(),
            tool: tool.map(str::to_string),
        })
    }

    /// Answers only after [`FakeAsk::release`].
    pub fn gated(answer: &str) -> Self {
        Self::with(AskBehavior::Gated {
            answer: answer.to_string(),
        })
    }

    pub fn failing(error: ApiError) -> Self {
        Self::with(AskBehavior::Fail(Mutex::new(Some(error))))
    }

    pub fn hanging() -> Self {
        Self::with(AskBehavior::Hang)
    }

    pub fn panicking() -> Self {
        Self::with(AskBehavior::Panic)
    }

    pub fn release(&self) {
        self.gate.notify_one();
    }

    pub fn calls(&self) -> Vec<(String, Option<i64>)> {
        self.calls.lock().unwrap().clone()
    }
}

fn answer(text: &str, tool: Option<String>) -> AskResponse {
    AskResponse {
        answer: text.to_string(),
        tool_used: tool,
        chart_data: None,
    }
}

#[async_trait]
impl AskService for FakeAsk {
    async fn ask(
        &self,
        query: &str,
        context_product_id: Option<i64>,
    ) -> Result<AskResponse, ApiError> {
        self.calls
            .lock()
            .unwrap()
            .push((query.to_string(), context_product_id));

        match &self.behavior {
            AskBehavior::Answer { answer: text, tool } => Ok(answer(text, tool.clone())),
            AskBehavior::Gated { answer: text } => {
                self.gate.notified().await;
                Ok(answer(text, None))
            }
            AskBehavior::Fail(error) => Err(error
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| ApiError::Transport("fake failure".to_string()))),
            AskBehavior::Hang => std::future::pending().await,
            AskBehavior::Panic => panic!("ask collaborator blew up"),
        }
    }
}

#[derive(Clone, Copy, PartialEq)]
enum SaveBehavior {
    Ack,
    Gated,
    Hang,
    Panic,
}

pub struct FakeSave {
    behavior: SaveBehavior,
    gate: Notify,
    fail_once: Mutex<Option<ApiError>>,
    calls: Mutex<Vec<SaveRequest>>,
}

impl FakeSave {
    fn with(behavior: SaveBehavior, fail_once: Option<ApiError>) -> Self {
        Self {
            behavior,
            gate: Notify::new(),
            fail_once: Mutex::new(fail_once),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn ok() -> Self {
        Self::with(SaveBehavior::Ack, None)
    }

    /// Acknowledges only after [`FakeSave::release`].
    pub fn gated() -> Self {
        Self::with(SaveBehavior::Gated, None)
    }

    pub fn hanging() -> Self {
        Self::with(SaveBehavior::Hang, None)
    }

    pub fn panicking() -> Self {
        Self::with(SaveBehavior::Panic, None)
    }

    pub fn failing_once(error: ApiError) -> Self {
        Self::with(SaveBehavior::Ack, Some(error))
    }

    pub fn release(&self) {
        self.gate.notify_one();
    }

    pub fn calls(&self) -> Vec<SaveRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SaveService for FakeSave {
    async fn save(&self, request: SaveRequest) -> Result<SaveAck, ApiError> {
        self.calls.lock().unwrap().push(request);
        match self.behavior {
            SaveBehavior::Ack => {}
            SaveBehavior::Gated => self.gate.notified().await,
            SaveBehavior::Hang => std::future::pending::<()>().await,
            SaveBehavior::Panic => panic!("save collaborator blew up"),
        }
        if let Some(error) = self.fail_once.lock().unwrap().take() {
            return Err(error);
        }
        Ok(SaveAck {
            message: "Report saved successfully".to_string(),
        })
    }
}
