// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Recall memory engine.

use thiserror::Error;

/// The primary error type used across all Recall crates.
#[derive(Debug, Error)]
pub enum RecallError {
    /// Configuration errors (invalid TOML, failed validation).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (cannot open the database, query failure, migration failure).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A lookup by id found nothing (update or mention on a missing record).
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Completion or embedding adapter failure.
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RecallError {
    /// Shorthand for a [`RecallError::NotFound`] on an entity id.
    pub fn entity_not_found(id: impl Into<String>) -> Self {
        RecallError::NotFound {
            kind: "entity",
            id: id.into(),
        }
    }

    /// Shorthand for a [`RecallError::NotFound`] on a relationship id.
    pub fn relationship_not_found(id: impl Into<String>) -> Self {
        RecallError::NotFound {
            kind: "relationship",
            id: id.into(),
        }
    }

    /// Wrap any error as a storage failure.
    pub fn storage<E>(e: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        RecallError::Storage {
            source: Box::new(e),
        }
    }

    /// Returns true if this is a lookup miss.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RecallError::NotFound { .. })
    }
}
