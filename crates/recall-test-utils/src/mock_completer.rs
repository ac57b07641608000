// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock completion adapter for deterministic extraction tests.
//!
//! `MockCompleter` implements `CompletionAdapter` with pre-configured
//! responses, so extraction runs without a real model.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use recall_core::{CompletionAdapter, RecallError};

/// One queued outcome of a `complete` call.
#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Fail(String),
}

/// A completion adapter that answers from a FIFO queue.
///
/// When the queue is empty it answers `"{}"`, which extracts to nothing.
/// Every prompt is recorded for later inspection.
#[derive(Clone, Default)]
pub struct MockCompleter {
    replies: Arc<Mutex<VecDeque<Reply>>>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl MockCompleter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock pre-loaded with the given responses.
    pub fn with_responses<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let replies = responses.into_iter().map(|r| Reply::Text(r.into())).collect();
        Self {
            replies: Arc::new(Mutex::new(replies)),
            prompts: Arc::default(),
        }
    }

    /// Queue a response.
    pub async fn add_response(&self, text: impl Into<String>) {
        self.replies.lock().await.push_back(Reply::Text(text.into()));
    }

    /// Queue a provider failure.
    pub async fn add_failure(&self, message: impl Into<String>) {
        self.replies.lock().await.push_back(Reply::Fail(message.into()));
    }

    /// Number of `complete` calls made so far.
    pub async fn call_count(&self) -> usize {
        self.prompts.lock().await.len()
    }

    /// Every prompt received, in order.
    pub async fn prompts(&self) -> Vec<String> {
        self.prompts.lock().await.clone()
    }
}

#[async_trait]
impl CompletionAdapter for MockCompleter {
    async fn complete(&self, prompt: &str) -> Result<String, RecallError> {
        self.prompts.lock().await.push(prompt.to_string());
        match self.replies.lock().await.pop_front() {
            Some(Reply::Text(text)) => Ok(text),
            Some(Reply::Fail(message)) => Err(RecallError::Provider {
                message,
                source: None,
            }),
            None => Ok("{}".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn answers_in_order_then_empty_object() {
        let mock = MockCompleter::with_responses(["first", "second"]);
        assert_eq!(mock.complete("a").await.unwrap(), "first");
        assert_eq!(mock.complete("b").await.unwrap(), "second");
        assert_eq!(mock.complete("c").await.unwrap(), "{}");
        assert_eq!(mock.prompts().await, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn queued_failure_is_provider_error() {
        let mock = MockCompleter::new();
        mock.add_failure("rate limited").await;
        let err = mock.complete("x").await.unwrap_err();
        assert!(matches!(err, RecallError::Provider { .. }));
        assert_eq!(mock.call_count().await, 1);
    }
}
