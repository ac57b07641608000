// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Completion adapter trait for LLM text completion.

use std::future::Future;

use async_trait::async_trait;

use crate::error::RecallError;

/// Adapter for a text-completion call.
///
/// The entity extractor sends fully formed prompts and expects a response
/// containing one JSON object, possibly wrapped in prose or markdown fences.
#[async_trait]
pub trait CompletionAdapter: Send + Sync + 'static {
    /// Completes the given prompt.
    async fn complete(&self, prompt: &str) -> Result<String, RecallError>;
}

/// Adapts an async closure into a [`CompletionAdapter`].
pub struct CompletionFn<F> {
    f: F,
}

impl<F, Fut> CompletionFn<F>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<String, RecallError>> + Send + 'static,
{
    /// Wraps `f`.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> CompletionAdapter for CompletionFn<F>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<String, RecallError>> + Send + 'static,
{
    async fn complete(&self, prompt: &str) -> Result<String, RecallError> {
        (self.f)(prompt.to_string()).await
    }
}
