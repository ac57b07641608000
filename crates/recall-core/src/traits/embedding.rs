// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding adapter trait for vector embedding generation.

use std::future::Future;

use async_trait::async_trait;

use crate::error::RecallError;

/// Adapter for generating a vector embedding from text.
///
/// The dimension is whatever the adapter returns; it must stay constant
/// across calls for cosine comparison to be meaningful.
#[async_trait]
pub trait EmbeddingAdapter: Send + Sync + 'static {
    /// Embeds a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RecallError>;
}

/// Adapts an async closure into an [`EmbeddingAdapter`].
pub struct EmbeddingFn<F> {
    f: F,
}

impl<F, Fut> EmbeddingFn<F>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<f32>, RecallError>> + Send + 'static,
{
    /// Wraps `f`.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> EmbeddingAdapter for EmbeddingFn<F>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<f32>, RecallError>> + Send + 'static,
{
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RecallError> {
        (self.f)(text.to_string()).await
    }
}
