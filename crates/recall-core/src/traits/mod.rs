// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter traits for the two external dependencies of the memory engine.
//!
//! Both use `#[async_trait]` for dynamic dispatch compatibility.

pub mod completion;
pub mod embedding;

pub use completion::{CompletionAdapter, CompletionFn};
pub use embedding::{EmbeddingAdapter, EmbeddingFn};
