use std::time::Duration;

use serde_json::Value;

/// Events emitted while the invoker executes tool calls
///
/// These events allow observers (audit logs, progress displays) to track
/// each call and its retries in real-time.
#[derive(Debug, Clone)]
pub enum ToolEvent {
    /// The agent requested a tool (fires exactly once per call)
    Requested {
        /// Tool name
        name: String,
        /// Arguments as sent by the agent
        arguments: Value,
    },

    /// One attempt failed; another may follow
    AttemptFailed {
        name: String,
        /// 1-based attempt number
        attempt: u32,
        error: String,
    },

    /// The call produced a successful result
    Completed {
        name: String,
        attempts: u32,
        duration: Duration,
    },

    /// Every attempt failed; the last failure is returned to the agent
    Exhausted {
        name: String,
        attempts: u32,
        error: String,
        duration: Duration,
    },
}

impl ToolEvent {
    /// Name of the tool the event is about
    pub fn tool_name(&self) -> &str {
        match self {
            ToolEvent::Requested { name, .. }
            | ToolEvent::AttemptFailed { name, .. }
            | ToolEvent::Completed { name, .. }
            | ToolEvent::Exhausted { name, .. } => name,
        }
    }
}

/// Hook for observing tool events
///
/// # Example
/// ```
/// use tollgate_core::events::{ToolEvent, ToolHook};
///
/// struct Logger;
///
/// impl ToolHook for Logger {
///     fn on_event(&self, event: &ToolEvent) {
///         if let ToolEvent::Exhausted { name, error, .. } = event {
///             println!("{} gave up: {}", name, error);
///         }
///     }
/// }
/// ```
pub trait ToolHook: Send + Sync {
    /// Called when an event occurs
    fn on_event(&self, event: &ToolEvent);
}

/// Blanket implementation for closures
impl<F> ToolHook for F
where
    F: Fn(&ToolEvent) + Send + Sync,
{
    fn on_event(&self, event: &ToolEvent) {
        self(event)
    }
}
