//! Live caller sessions
//!
//! Each connected caller owns an outbound message channel and a
//! cancellation token. Disconnecting cancels the token, which aborts any
//! tool calls still running on that caller's behalf without touching other
//! sessions.

use std::collections::HashMap;
use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::types::{Message, Subject};

/// Message pushed to a caller's display surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum SessionMessage {
    Text(String),
    Status(String),
    HistoryUpdate(Vec<Message>),
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("no session for caller '{0}'")]
    NotConnected(String),

    #[error("session for caller '{0}' was closed")]
    Closed(String),
}

/// Receiving end of a session, held by the transport
pub type SessionReceiver = mpsc::UnboundedReceiver<SessionMessage>;

#[derive(Clone)]
struct SessionHandle {
    subject: Subject,
    sender: mpsc::UnboundedSender<SessionMessage>,
    cancel: CancellationToken,
}

/// Caller id to session handle, safe for concurrent use
#[derive(Default)]
pub struct SessionRegistry {
    sessions: parking_lot::RwLock<HashMap<String, SessionHandle>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a session for the subject, replacing and closing any previous one
    pub fn connect(&self, subject: Subject) -> SessionReceiver {
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = SessionHandle {
            subject: subject.clone(),
            sender,
            cancel: CancellationToken::new(),
        };

        if let Some(previous) = self.sessions.write().insert(subject.id.clone(), handle) {
            log::info!("caller '{}' reconnected, closing previous session", subject.id);
            previous.cancel.cancel();
        } else {
            log::info!("caller '{}' connected as '{}'", subject.id, subject.role);
        }

        receiver
    }

    /// Close the caller's session. Returns whether one existed.
    pub fn disconnect(&self, caller_id: &str) -> bool {
        match self.sessions.write().remove(caller_id) {
            Some(handle) => {
                handle.cancel.cancel();
                log::info!("caller '{}' disconnected", caller_id);
                true
            }
            None => false,
        }
    }

    pub fn is_connected(&self, caller_id: &str) -> bool {
        self.sessions.read().contains_key(caller_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// The subject a caller connected as
    pub fn subject(&self, caller_id: &str) -> Option<Subject> {
        self.sessions.read().get(caller_id).map(|h| h.subject.clone())
    }

    /// Push a message to a caller
    pub fn send(&self, caller_id: &str, message: SessionMessage) -> Result<(), SessionError> {
        let sender = self
            .sessions
            .read()
            .get(caller_id)
            .map(|h| h.sender.clone())
            .ok_or_else(|| SessionError::NotConnected(caller_id.to_string()))?;

        sender
            .send(message)
            .map_err(|_| SessionError::Closed(caller_id.to_string()))
    }

    /// Run `fut` until it finishes or the caller's session is closed
    pub async fn run_cancellable<F, T>(&self, caller_id: &str, fut: F) -> Result<T, SessionError>
    where
        F: Future<Output = T>,
    {
        let token = self
            .sessions
            .read()
            .get(caller_id)
            .map(|h| h.cancel.clone())
            .ok_or_else(|| SessionError::NotConnected(caller_id.to_string()))?;

        tokio::select! {
            _ = token.cancelled() => {
                log::debug!("dropping pending work for closed session '{}'", caller_id);
                Err(SessionError::Closed(caller_id.to_string()))
            }
            out = fut => Ok(out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_message_wire_format() {
        let text = serde_json::to_value(SessionMessage::Text("hi".into())).unwrap();
        assert_eq!(text, serde_json::json!({"type": "text", "content": "hi"}));

        let history = serde_json::to_value(SessionMessage::HistoryUpdate(vec![])).unwrap();
        assert_eq!(history["type"], "history_update");
    }

    #[tokio::test]
    async fn test_send_delivers_to_connected_caller() {
        let registry = SessionRegistry::new();
        let mut rx = registry.connect(Subject::new("u1", "child"));

        registry
            .send("u1", SessionMessage::Status("working".into()))
            .unwrap();
        assert_eq!(
            rx.recv().await,
            Some(SessionMessage::Status("working".into()))
        );
        assert_eq!(registry.subject("u1").unwrap().role, "child");
    }

    #[test]
    fn test_send_to_unknown_caller_fails() {
        let registry = SessionRegistry::new();
        let err = registry
            .send("ghost", SessionMessage::Text("x".into()))
            .unwrap_err();
        assert_eq!(err, SessionError::NotConnected("ghost".into()));
    }

    #[test]
    fn test_send_after_receiver_dropped_reports_closed() {
        let registry = SessionRegistry::new();
        drop(registry.connect(Subject::new("u1", "parent")));

        let err = registry
            .send("u1", SessionMessage::Text("x".into()))
            .unwrap_err();
        assert_eq!(err, SessionError::Closed("u1".into()));
    }

    #[tokio::test]
    async fn test_disconnect_cancels_only_that_session() {
        let registry = Arc::new(SessionRegistry::new());
        let _rx1 = registry.connect(Subject::new("u1", "child"));
        let _rx2 = registry.connect(Subject::new("u2", "parent"));

        let (result, disconnected) = tokio::join!(
            registry.run_cancellable("u1", tokio::time::sleep(Duration::from_secs(30))),
            async { registry.disconnect("u1") },
        );

        assert!(disconnected);
        assert_eq!(result, Err(SessionError::Closed("u1".into())));

        let other = registry.run_cancellable("u2", async { 7 }).await;
        assert_eq!(other, Ok(7));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_disconnect_unknown_is_false() {
        let registry = SessionRegistry::new();
        assert!(!registry.disconnect("nobody"));
        assert!(registry.is_empty());
    }
}
