//! Test utilities for tollgate-core.
//!
//! Mock implementations of the model and executor seams, so tool flows can
//! be tested without a real model or policy service.
//!
//! Enable with the `test-utils` feature:
//!
//! ```toml
//! [dev-dependencies]
//! tollgate-core = { version = "...", features = ["test-utils"] }
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::conversation::{FunctionCallingModel, ModelError};
use crate::invoker::{CallOutcome, InvokeError, ToolExecutor};
use crate::schema::FunctionDeclaration;
use crate::types::{Message, Part, Role, ToolCall};

/// A mock function-calling model.
///
/// Returns pre-programmed replies in order.
///
/// # Example
///
/// ```rust
/// use tollgate_core::test_utils::MockModel;
/// use serde_json::json;
///
/// let model = MockModel::new()
///     .with_function_call("list_dishes", json!({"restaurant_id": "1"}))
///     .with_text("Here is the menu");
/// ```
#[derive(Clone, Default)]
pub struct MockModel {
    replies: Arc<Mutex<Vec<Message>>>,
    seen_tools: Arc<Mutex<Vec<Vec<String>>>>,
}

impl MockModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a plain text reply
    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.push(Message::model(text))
    }

    /// Queue a reply requesting a single function call
    pub fn with_function_call(self, name: impl Into<String>, arguments: Value) -> Self {
        self.push(Message {
            role: Role::Model,
            parts: vec![Part::FunctionCall(ToolCall::new(name, arguments))],
        })
    }

    /// Queue an arbitrary reply
    pub fn with_message(self, message: Message) -> Self {
        self.push(message)
    }

    fn push(self, message: Message) -> Self {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push(message);
        }
        self
    }

    /// Names of the tools offered on each call, in call order
    pub fn seen_tools(&self) -> Vec<Vec<String>> {
        self.seen_tools.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl FunctionCallingModel for MockModel {
    async fn generate(
        &self,
        _history: &[Message],
        tools: &[FunctionDeclaration],
    ) -> Result<Message, ModelError> {
        if let Ok(mut seen) = self.seen_tools.lock() {
            seen.push(tools.iter().map(|t| t.name.clone()).collect());
        }

        let mut replies = self
            .replies
            .lock()
            .map_err(|_| ModelError::Request("mock poisoned".into()))?;
        if replies.is_empty() {
            return Err(ModelError::Request("no more mock replies".into()));
        }
        Ok(replies.remove(0))
    }
}

/// A mock executor that answers every call to a tool with a fixed outcome
/// and counts calls per tool.
#[derive(Clone, Default)]
pub struct MockExecutor {
    outcomes: Arc<Mutex<HashMap<String, Result<CallOutcome, InvokeError>>>>,
    calls: Arc<Mutex<HashMap<String, u32>>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_outcome(self, name: impl Into<String>, outcome: CallOutcome) -> Self {
        if let Ok(mut outcomes) = self.outcomes.lock() {
            outcomes.insert(name.into(), Ok(outcome));
        }
        self
    }

    pub fn with_error(self, name: impl Into<String>, error: InvokeError) -> Self {
        if let Ok(mut outcomes) = self.outcomes.lock() {
            outcomes.insert(name.into(), Err(error));
        }
        self
    }

    /// How many times the named tool was called
    pub fn call_count(&self, name: &str) -> u32 {
        self.calls
            .lock()
            .ok()
            .and_then(|c| c.get(name).copied())
            .unwrap_or(0)
    }
}

#[async_trait]
impl ToolExecutor for MockExecutor {
    async fn call_tool(&self, name: &str, _arguments: Value) -> Result<CallOutcome, InvokeError> {
        if let Ok(mut calls) = self.calls.lock() {
            *calls.entry(name.to_string()).or_default() += 1;
        }

        self.outcomes
            .lock()
            .ok()
            .and_then(|o| o.get(name).cloned())
            .unwrap_or_else(|| Err(InvokeError::ToolNotFound(name.to_string())))
    }
}
