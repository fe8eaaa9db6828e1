use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{CompletionError, CompletionService};
use crate::types::PromptMessage;

/// Completion provider that replays queued replies.
///
/// Used in tests and for running the service without network access. Each
/// call pops the next queued reply; once the queue is drained the fallback
/// reply is returned (`SELECT 1` unless overridden). Every request is
/// recorded so callers can inspect the composed prompts.
pub struct ScriptedCompletion {
    replies: Mutex<VecDeque<Result<String, String>>>,
    fallback: String,
    requests: Mutex<Vec<Vec<PromptMessage>>>,
}

impl Default for ScriptedCompletion {
    fn default() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback: "SELECT 1".to_string(),
            requests: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply.
    pub fn with_reply(self, reply: impl Into<String>) -> Self {
        self.push(Ok(reply.into()));
        self
    }

    /// Queue a provider failure.
    pub fn with_failure(self, message: impl Into<String>) -> Self {
        self.push(Err(message.into()));
        self
    }

    /// Reply returned once the queue is drained.
    pub fn with_fallback(mut self, reply: impl Into<String>) -> Self {
        self.fallback = reply.into();
        self
    }

    /// Message sequences received so far, oldest first.
    pub fn requests(&self) -> Vec<Vec<PromptMessage>> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    fn push(&self, reply: Result<String, String>) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, messages: &[PromptMessage]) -> Result<String, CompletionError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(messages.to_vec());
        }

        let next = self
            .replies
            .lock()
            .map_err(|e| CompletionError::Transport(format!("script lock poisoned: {}", e)))?
            .pop_front();

        match next {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(CompletionError::Transport(message)),
            None => Ok(self.fallback.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replies_in_order_then_fallback() {
        let provider = ScriptedCompletion::new()
            .with_reply("SELECT 2")
            .with_failure("boom")
            .with_fallback("SELECT 9");

        assert_eq!(provider.complete(&[]).await.unwrap(), "SELECT 2");
        assert!(matches!(
            provider.complete(&[]).await,
            Err(CompletionError::Transport(ref m)) if m == "boom"
        ));
        assert_eq!(provider.complete(&[]).await.unwrap(), "SELECT 9");
    }

    #[tokio::test]
    async fn test_requests_are_recorded() {
        let provider = ScriptedCompletion::new();
        provider
            .complete(&[PromptMessage::user("hello")])
            .await
            .unwrap();
        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0][0].content, "hello");
    }
}
