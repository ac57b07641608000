// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Recall.
//!
//! Provides mock adapters, a manual clock, and a temp-database harness.

pub mod clock;
pub mod harness;
pub mod mock_completer;
pub mod mock_embedder;

pub use clock::ManualClock;
pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_completer::MockCompleter;
pub use mock_embedder::MockEmbedder;
