// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Temp-directory database harness.
//!
//! `TestHarness` bundles a migrated on-disk database in a temp dir with a
//! manual clock and the two mock adapters, so component tests can assemble
//! exactly the pieces they exercise.

use std::sync::Arc;

use recall_config::RecallConfig;
use recall_core::RecallError;
use recall_storage::Database;
use tempfile::TempDir;

use crate::clock::ManualClock;
use crate::mock_completer::MockCompleter;
use crate::mock_embedder::MockEmbedder;

/// Builder for [`TestHarness`].
pub struct TestHarnessBuilder {
    responses: Vec<String>,
    config: RecallConfig,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            responses: Vec::new(),
            config: RecallConfig::default(),
        }
    }

    /// Queue completion responses on the harness's mock completer.
    pub fn with_completions<I, S>(mut self, responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.responses = responses.into_iter().map(Into::into).collect();
        self
    }

    /// Start from a custom configuration. The storage path is always replaced.
    pub fn with_config(mut self, config: RecallConfig) -> Self {
        self.config = config;
        self
    }

    pub async fn build(self) -> Result<TestHarness, RecallError> {
        let dir = tempfile::tempdir().map_err(RecallError::storage)?;
        let db_path = dir.path().join("recall-test.db");
        let mut config = self.config;
        config.storage.database_path = db_path.to_string_lossy().into_owned();
        let db = Database::from_config(&config.storage).await?;

        Ok(TestHarness {
            db: Arc::new(db),
            config,
            clock: ManualClock::starting_now(),
            completer: MockCompleter::with_responses(self.responses),
            embedder: MockEmbedder::new(),
            _dir: dir,
        })
    }
}

/// A migrated database plus deterministic collaborators.
pub struct TestHarness {
    pub db: Arc<Database>,
    pub config: RecallConfig,
    pub clock: ManualClock,
    pub completer: MockCompleter,
    pub embedder: MockEmbedder,
    _dir: TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// A harness with default configuration and no queued completions.
    pub async fn new() -> Result<Self, RecallError> {
        Self::builder().build().await
    }
}
