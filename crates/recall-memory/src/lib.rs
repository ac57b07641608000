// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistent semantic memory for a conversational agent.
//!
//! ## Architecture
//!
//! - **GraphStore**: entities, aliases, tags, mention timeline and weighted
//!   relationships in SQLite, with FTS5 name search and BFS traversal
//! - **RelationshipMapper**: relationship taxonomy, strengthening and decay,
//!   path finding, label-propagation clustering, transitive inference
//! - **EntityExtractor**: LLM-driven extraction of entities, relationships,
//!   sentiments and dates, with coreference resolution and deduplication
//! - **SemanticIndex**: chunked text with five-signal hybrid search
//! - **MemoryEngine**: owns the database and wires the components together

pub mod engine;
pub mod extractor;
pub mod graph;
pub mod index;
pub mod mapper;
pub mod taxonomy;
pub mod text;
pub mod types;

pub use engine::{IngestReport, MemoryEngine};
pub use extractor::{CommitSummary, EntityExtractor, ExtractionResult, KnownEntity};
pub use graph::{GraphReader, GraphStore, GraphWriter};
pub use index::{SearchOptions, SearchResult, SemanticIndex};
pub use mapper::{DecayOptions, DecayReport, RelationshipMapper};
pub use types::*;
