//! Driving a conversation turn through the tool layer
//!
//! A turn starts with the caller's input and ends when the model answers
//! without requesting any tools. In between, every batch of function calls
//! goes through the invoker and the responses are appended to the history.
//!
//! ```text
//! input ─▶ model ─▶ text ─▶ session
//!            ▲        │
//!            │        ▼ function calls
//!            └── responses ◀── invoker
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::invoker::{FunctionResponse, ResponseBody, ToolCallResult, ToolExecutor, ToolInvoker};
use crate::role::RoleFilter;
use crate::schema::FunctionDeclaration;
use crate::session::{SessionError, SessionMessage, SessionRegistry};
use crate::types::{Message, Subject, ToolCall};

/// Upper bound on model round-trips within one turn
pub const DEFAULT_MAX_ROUNDS: usize = 10;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model request failed: {0}")]
    Request(String),

    #[error("model returned an empty response")]
    EmptyResponse,
}

/// A model that can answer with text and function calls
#[async_trait]
pub trait FunctionCallingModel: Send + Sync {
    /// Produce the next model message for the history and the visible tools
    async fn generate(
        &self,
        history: &[Message],
        tools: &[FunctionDeclaration],
    ) -> Result<Message, ModelError>;
}

#[derive(Debug, Error)]
pub enum TurnError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("turn exceeded {0} model rounds")]
    TooManyRounds(usize),
}

/// Runs turns for connected callers
pub struct TurnDriver<E> {
    model: Arc<dyn FunctionCallingModel>,
    invoker: Arc<ToolInvoker<E>>,
    sessions: Arc<SessionRegistry>,
    declarations: Vec<FunctionDeclaration>,
    roles: RoleFilter,
    max_rounds: usize,
}

impl<E: ToolExecutor> TurnDriver<E> {
    pub fn new(
        model: Arc<dyn FunctionCallingModel>,
        invoker: Arc<ToolInvoker<E>>,
        sessions: Arc<SessionRegistry>,
        declarations: Vec<FunctionDeclaration>,
    ) -> Self {
        Self {
            model,
            invoker,
            sessions,
            declarations,
            roles: RoleFilter::default(),
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }

    pub fn with_roles(mut self, roles: RoleFilter) -> Self {
        self.roles = roles;
        self
    }

    pub fn with_max_rounds(mut self, rounds: usize) -> Self {
        self.max_rounds = rounds.max(1);
        self
    }

    /// Tools the subject's role may see
    pub fn visible_tools(&self, subject: &Subject) -> Vec<FunctionDeclaration> {
        self.roles.filter(&self.declarations, &subject.role)
    }

    /// Run one turn for `subject`, appending to `history`.
    ///
    /// Failures are also reported to the caller as an `error` message.
    pub async fn run_turn(
        &self,
        subject: &Subject,
        history: &mut Vec<Message>,
        input: &str,
    ) -> Result<(), TurnError> {
        let result = self.drive(subject, history, input).await;
        if let Err(err) = &result {
            log::warn!("turn for '{}' failed: {}", subject.id, err);
            // The caller may already be gone
            let _ = self
                .sessions
                .send(&subject.id, SessionMessage::Error(err.to_string()));
        }
        result
    }

    async fn drive(
        &self,
        subject: &Subject,
        history: &mut Vec<Message>,
        input: &str,
    ) -> Result<(), TurnError> {
        let tools = self.visible_tools(subject);
        history.push(Message::user(input));

        for _ in 0..self.max_rounds {
            let reply = self.model.generate(history, &tools).await?;
            if reply.parts.is_empty() {
                return Err(ModelError::EmptyResponse.into());
            }

            let text = reply.text();
            if !text.is_empty() {
                self.sessions.send(&subject.id, SessionMessage::Text(text))?;
            }

            let calls: Vec<ToolCall> = reply.function_calls().into_iter().cloned().collect();
            history.push(reply);

            if calls.is_empty() {
                self.sessions.send(
                    &subject.id,
                    SessionMessage::HistoryUpdate(history.clone()),
                )?;
                return Ok(());
            }

            let names: Vec<&str> = calls.iter().map(|c| c.name.as_str()).collect();
            self.sessions.send(
                &subject.id,
                SessionMessage::Status(format!("Running {}", names.join(", "))),
            )?;

            let responses = self
                .sessions
                .run_cancellable(&subject.id, self.run_calls(subject, calls))
                .await?;
            history.push(Message::function_responses(responses));
        }

        Err(TurnError::TooManyRounds(self.max_rounds))
    }

    async fn run_calls(&self, subject: &Subject, calls: Vec<ToolCall>) -> Vec<FunctionResponse> {
        let (allowed, hidden): (Vec<_>, Vec<_>) = calls
            .into_iter()
            .partition(|c| self.roles.permits(&subject.role, &c.name));

        let mut responses = self.invoker.invoke_many(allowed).await;
        responses.extend(hidden.into_iter().map(|call| {
            log::warn!(
                "role '{}' requested hidden tool '{}'",
                subject.role,
                call.name
            );
            FunctionResponse {
                id: call.id,
                response: ResponseBody {
                    result: ToolCallResult::Failure {
                        message: format!("Tool '{}' not found", call.name),
                    },
                },
                name: call.name,
            }
        }));
        responses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoker::{CallOutcome, InvokeError};
    use crate::types::{Part, Role};
    use parking_lot::Mutex;
    use serde_json::{json, Value};

    struct Echo;

    #[async_trait]
    impl ToolExecutor for Echo {
        async fn call_tool(&self, name: &str, _: Value) -> Result<CallOutcome, InvokeError> {
            Ok(CallOutcome::text(format!("ran {}", name)))
        }
    }

    /// Replays scripted replies and records the tools it was shown
    struct ScriptedModel {
        replies: Mutex<Vec<Message>>,
        seen_tools: Mutex<Vec<Vec<String>>>,
    }

    impl ScriptedModel {
        fn new(mut replies: Vec<Message>) -> Self {
            replies.reverse();
            Self {
                replies: Mutex::new(replies),
                seen_tools: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl FunctionCallingModel for ScriptedModel {
        async fn generate(
            &self,
            _: &[Message],
            tools: &[FunctionDeclaration],
        ) -> Result<Message, ModelError> {
            self.seen_tools
                .lock()
                .push(tools.iter().map(|t| t.name.clone()).collect());
            self.replies
                .lock()
                .pop()
                .ok_or_else(|| ModelError::Request("script exhausted".into()))
        }
    }

    fn decl(name: &str) -> FunctionDeclaration {
        FunctionDeclaration {
            name: name.into(),
            description: format!("Executes the {} tool.", name),
            parameters: None,
        }
    }

    fn call_message(names: &[&str]) -> Message {
        Message {
            role: Role::Model,
            parts: names
                .iter()
                .map(|n| Part::FunctionCall(ToolCall::new(*n, json!({}))))
                .collect(),
        }
    }

    fn driver(model: Arc<ScriptedModel>, sessions: Arc<SessionRegistry>) -> TurnDriver<Echo> {
        TurnDriver::new(
            model,
            Arc::new(ToolInvoker::new(Echo)),
            sessions,
            vec![decl("list_dishes"), decl("approve_access_request")],
        )
    }

    #[tokio::test]
    async fn test_turn_runs_calls_then_publishes_history() {
        let model = Arc::new(ScriptedModel::new(vec![
            call_message(&["list_dishes"]),
            Message::model("Here are the dishes."),
        ]));
        let sessions = Arc::new(SessionRegistry::new());
        let subject = Subject::new("u1", "child");
        let mut rx = sessions.connect(subject.clone());

        let mut history = Vec::new();
        driver(model.clone(), sessions.clone())
            .run_turn(&subject, &mut history, "what can I eat?")
            .await
            .unwrap();

        assert_eq!(history.len(), 4);
        assert_eq!(model.seen_tools.lock()[0], vec!["list_dishes"]);

        let mut kinds = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            kinds.push(msg);
        }
        assert!(matches!(kinds[0], SessionMessage::Status(_)));
        assert_eq!(kinds[1], SessionMessage::Text("Here are the dishes.".into()));
        assert!(matches!(&kinds[2], SessionMessage::HistoryUpdate(h) if h.len() == 4));
    }

    #[tokio::test]
    async fn test_hidden_tool_call_is_refused() {
        let model = Arc::new(ScriptedModel::new(vec![
            call_message(&["approve_access_request"]),
            Message::model("ok"),
        ]));
        let sessions = Arc::new(SessionRegistry::new());
        let subject = Subject::new("u1", "child");
        let _rx = sessions.connect(subject.clone());

        let mut history = Vec::new();
        driver(model, sessions)
            .run_turn(&subject, &mut history, "approve it")
            .await
            .unwrap();

        let Part::FunctionResponse(response) = &history[2].parts[0] else {
            panic!("expected a function response");
        };
        assert!(response.result().is_failure());
    }

    #[tokio::test]
    async fn test_model_failure_reported_as_error_message() {
        let model = Arc::new(ScriptedModel::new(vec![]));
        let sessions = Arc::new(SessionRegistry::new());
        let subject = Subject::new("u1", "parent");
        let mut rx = sessions.connect(subject.clone());

        let err = driver(model, sessions)
            .run_turn(&subject, &mut Vec::new(), "hi")
            .await
            .unwrap_err();

        assert!(matches!(err, TurnError::Model(_)));
        assert!(matches!(rx.try_recv(), Ok(SessionMessage::Error(_))));
    }

    #[tokio::test]
    async fn test_round_limit() {
        let model = Arc::new(ScriptedModel::new(vec![
            call_message(&["list_dishes"]),
            call_message(&["list_dishes"]),
        ]));
        let sessions = Arc::new(SessionRegistry::new());
        let subject = Subject::new("u1", "parent");
        let _rx = sessions.connect(subject.clone());

        let err = driver(model, sessions)
            .with_max_rounds(2)
            .run_turn(&subject, &mut Vec::new(), "loop")
            .await
            .unwrap_err();
        assert!(matches!(err, TurnError::TooManyRounds(2)));
    }
}
