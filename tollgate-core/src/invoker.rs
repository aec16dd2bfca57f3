//! Execution of agent-requested tool calls
//!
//! The invoker gives every call at most two attempts and folds the outcome
//! into a [`FunctionResponse`] the agent can read. Failures never escape as
//! errors: when every attempt fails, the last failure becomes the payload.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::events::{ToolEvent, ToolHook};
use crate::types::ToolCall;

/// Attempts made per call before giving up
pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;

/// Message used when a failed call produced no text of its own
pub const EXHAUSTED_MESSAGE: &str = "Tool execution failed after multiple attempts";

/// One block of text returned by a tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextContent {
    pub text: String,
}

/// What a single execution attempt produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallOutcome {
    pub content: Vec<TextContent>,
    #[serde(default)]
    pub is_error: bool,
}

impl CallOutcome {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![TextContent { text: text.into() }],
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![TextContent { text: text.into() }],
            is_error: true,
        }
    }

    /// All content blocks joined with newlines
    pub fn joined_text(&self) -> String {
        self.content
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Errors raised by a [`ToolExecutor`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvokeError {
    #[error("Tool '{0}' not found")]
    ToolNotFound(String),

    #[error("Invalid arguments for '{name}': {message}")]
    InvalidArguments { name: String, message: String },

    #[error("{0}")]
    Execution(String),
}

impl InvokeError {
    /// Whether another attempt could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Execution(_))
    }
}

/// Something that can run a named tool with JSON arguments
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallOutcome, InvokeError>;
}

#[async_trait]
impl<T: ToolExecutor + ?Sized> ToolExecutor for Arc<T> {
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallOutcome, InvokeError> {
        (**self).call_tool(name, arguments).await
    }
}

/// Final result of a call as reported to the agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolCallResult {
    Success {
        content: Vec<TextContent>,
        is_error: bool,
    },
    Failure {
        #[serde(rename = "error")]
        message: String,
    },
}

impl ToolCallResult {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }

    /// Text of the result, or the failure message
    pub fn text(&self) -> String {
        match self {
            Self::Success { content, .. } => content
                .iter()
                .map(|c| c.text.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
            Self::Failure { message } => message.clone(),
        }
    }
}

impl From<CallOutcome> for ToolCallResult {
    fn from(outcome: CallOutcome) -> Self {
        Self::Success {
            content: outcome.content,
            is_error: outcome.is_error,
        }
    }
}

/// Wrapper matching the `{"result": ...}` envelope agents expect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseBody {
    pub result: ToolCallResult,
}

/// A tool result tagged with the name of the call that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub response: ResponseBody,
}

impl FunctionResponse {
    pub fn result(&self) -> &ToolCallResult {
        &self.response.result
    }
}

/// Runs tool calls against an executor with bounded retry
pub struct ToolInvoker<E> {
    executor: E,
    max_attempts: u32,
    max_concurrent_calls: Option<usize>,
    hooks: Arc<parking_lot::RwLock<Vec<Arc<dyn ToolHook>>>>,
}

impl<E: ToolExecutor> ToolInvoker<E> {
    pub fn new(executor: E) -> Self {
        Self {
            executor,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            max_concurrent_calls: None,
            hooks: Arc::new(parking_lot::RwLock::new(Vec::new())),
        }
    }

    /// Override the number of attempts per call (at least one)
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Cap the number of calls running at once in a batch
    pub fn with_max_concurrent_calls(mut self, limit: usize) -> Self {
        self.max_concurrent_calls = Some(limit.max(1));
        self
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Add an event hook to observe tool execution
    pub fn add_hook(&self, hook: impl ToolHook + 'static) {
        self.hooks.write().push(Arc::new(hook));
    }

    fn emit_event(&self, event: ToolEvent) {
        let hooks = self.hooks.read();
        for hook in hooks.iter() {
            hook.on_event(&event);
        }
    }

    /// Execute one call, retrying failed attempts, and never fail
    pub async fn invoke(&self, mut call: ToolCall) -> FunctionResponse {
        let start = Instant::now();
        self.emit_event(ToolEvent::Requested {
            name: call.name.clone(),
            arguments: call.arguments.clone(),
        });

        let mut last_error = String::new();
        while call.attempt_count < self.max_attempts {
            call.attempt_count += 1;

            match self
                .executor
                .call_tool(&call.name, call.arguments.clone())
                .await
            {
                Ok(outcome) if !outcome.is_error => {
                    self.emit_event(ToolEvent::Completed {
                        name: call.name.clone(),
                        attempts: call.attempt_count,
                        duration: start.elapsed(),
                    });
                    return respond(&call, outcome.into());
                }
                Ok(outcome) => {
                    last_error = outcome.joined_text();
                }
                Err(err) => {
                    last_error = err.to_string();
                    if !err.is_retryable() {
                        log::debug!("'{}' failed permanently: {}", call.name, err);
                        break;
                    }
                }
            }

            log::warn!(
                "tool '{}' attempt {}/{} failed: {}",
                call.name,
                call.attempt_count,
                self.max_attempts,
                last_error
            );
            self.emit_event(ToolEvent::AttemptFailed {
                name: call.name.clone(),
                attempt: call.attempt_count,
                error: last_error.clone(),
            });
        }

        if last_error.trim().is_empty() {
            last_error = EXHAUSTED_MESSAGE.to_string();
        }

        self.emit_event(ToolEvent::Exhausted {
            name: call.name.clone(),
            attempts: call.attempt_count,
            error: last_error.clone(),
            duration: start.elapsed(),
        });

        respond(&call, ToolCallResult::Failure { message: last_error })
    }

    /// Execute calls concurrently. Results arrive in completion order.
    pub async fn invoke_many(&self, calls: Vec<ToolCall>) -> Vec<FunctionResponse> {
        if calls.is_empty() {
            return Vec::new();
        }

        let limit = self.max_concurrent_calls.unwrap_or(calls.len());
        stream::iter(calls.into_iter().map(|call| self.invoke(call)))
            .buffer_unordered(limit)
            .collect()
            .await
    }
}

fn respond(call: &ToolCall, result: ToolCallResult) -> FunctionResponse {
    FunctionResponse {
        id: call.id.clone(),
        name: call.name.clone(),
        response: ResponseBody { result },
    }
}
