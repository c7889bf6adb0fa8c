//! Scripted Backend (test support)
//!
//! Returns pre-canned contents in order, letting the dispatch loop be
//! exercised without a network. Exhausting the script is an error, as is a
//! real transport failure.

use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use super::{ChatBackend, ChatContent, ChatSession};

/// Backend that replays a fixed script of model contents.
pub struct ScriptedBackend {
    script: Mutex<VecDeque<ChatContent>>,
    /// When set, every `generate` call fails with this message instead.
    failure: Option<String>,
}

impl ScriptedBackend {
    pub fn new(script: Vec<ChatContent>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            failure: None,
        }
    }

    /// Backend whose every call fails (transport-error path).
    pub fn failing(message: &str) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            failure: Some(message.to_string()),
        }
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn generate(&self, _session: &ChatSession) -> Result<ChatContent> {
        if let Some(message) = &self.failure {
            return Err(anyhow!("{message}"));
        }
        self.script
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .pop_front()
            .ok_or_else(|| anyhow!("scripted backend exhausted"))
    }

    fn backend_name(&self) -> &'static str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replays_in_order_then_errors() {
        let backend = ScriptedBackend::new(vec![
            ChatContent::model_text("first"),
            ChatContent::model_text("second"),
        ]);
        let session = ChatSession::default();

        let a = backend.generate(&session).await.unwrap();
        assert_eq!(a.parts[0].text.as_deref(), Some("first"));
        let b = backend.generate(&session).await.unwrap();
        assert_eq!(b.parts[0].text.as_deref(), Some("second"));
        assert!(backend.generate(&session).await.is_err());
    }

    #[tokio::test]
    async fn test_failing_backend() {
        let backend = ScriptedBackend::failing("boom");
        let err = backend.generate(&ChatSession::default()).await.unwrap_err();
        assert!(err.to_string().contains("boom"));
    }
}
