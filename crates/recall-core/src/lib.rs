// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Recall memory engine.
//!
//! This crate provides the error type, the two adapter traits through which
//! the engine reaches external models, and the clock abstraction used by
//! every recency and decay formula.

pub mod clock;
pub mod error;
pub mod traits;

// Re-export key items at crate root for ergonomic imports.
pub use clock::{Clock, SystemClock};
pub use error::RecallError;
pub use traits::{CompletionAdapter, CompletionFn, EmbeddingAdapter, EmbeddingFn};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recall_error_has_all_variants() {
        let _config = RecallError::Config("test".into());
        let _storage = RecallError::Storage {
            source: Box::new(std::io::Error::other("test")),
        };
        let _provider = RecallError::Provider {
            message: "test".into(),
            source: None,
        };
        let _internal = RecallError::Internal("test".into());
        let not_found = RecallError::entity_not_found("e-1");
        assert!(not_found.is_not_found());
        assert_eq!(not_found.to_string(), "entity not found: e-1");
    }

    #[test]
    fn relationship_not_found_message() {
        let err = RecallError::relationship_not_found("r-9");
        assert_eq!(err.to_string(), "relationship not found: r-9");
    }

    #[test]
    fn from_millis_roundtrip() {
        let now = SystemClock.now();
        let ms = now.timestamp_millis();
        assert_eq!(clock::from_millis(ms).timestamp_millis(), ms);
    }

    #[tokio::test]
    async fn closure_adapters_delegate() {
        let completer = CompletionFn::new(|prompt: String| async move { Ok(format!("echo: {prompt}")) });
        assert_eq!(completer.complete("hi").await.unwrap(), "echo: hi");

        let embedder = EmbeddingFn::new(|text: String| async move { Ok(vec![text.len() as f32]) });
        assert_eq!(embedder.embed("abc").await.unwrap(), vec![3.0]);
    }

    #[test]
    fn all_traits_are_exported() {
        fn _assert_completion<T: CompletionAdapter>() {}
        fn _assert_embedding<T: EmbeddingAdapter>() {}
        fn _assert_clock<T: Clock>() {}
        _assert_clock::<SystemClock>();
    }
}
