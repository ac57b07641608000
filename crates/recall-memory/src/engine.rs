// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The memory engine: one database, four components, and the ingest path
//! that ties extraction, graph write-back and indexing together.

use std::sync::Arc;

use recall_config::RecallConfig;
use recall_core::{Clock, CompletionAdapter, EmbeddingAdapter, RecallError, SystemClock};
use recall_storage::Database;
use serde::Serialize;
use tracing::debug;

use crate::extractor::{CommitSummary, EntityExtractor, KnownEntity};
use crate::graph::{GraphReader, GraphStore};
use crate::index::{SearchOptions, SearchResult, SemanticIndex};
use crate::mapper::{DecayOptions, DecayReport, RelationshipMapper};
use crate::types::Attributes;

/// What one [`MemoryEngine::ingest`] call did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestReport {
    /// `None` when no completion adapter is configured.
    pub extraction: Option<CommitSummary>,
    pub chunk_ids: Vec<String>,
}

/// Owns the store and every component built on it.
pub struct MemoryEngine {
    db: Arc<Database>,
    graph: Arc<GraphStore>,
    mapper: RelationshipMapper,
    extractor: Option<EntityExtractor>,
    index: SemanticIndex,
    config: RecallConfig,
}

impl MemoryEngine {
    /// Open (or create) the database named in `config.storage` and build
    /// the components. Extraction is disabled without a completion adapter;
    /// search falls back to token overlap without an embedding adapter.
    pub async fn open(
        config: RecallConfig,
        completer: Option<Arc<dyn CompletionAdapter>>,
        embedder: Option<Arc<dyn EmbeddingAdapter>>,
    ) -> Result<Self, RecallError> {
        let db = Database::from_config(&config.storage).await?;
        Ok(Self::open_with(
            Arc::new(db),
            config,
            completer,
            embedder,
            Arc::new(SystemClock),
        ))
    }

    /// Build an engine over an already-open database with an explicit clock.
    pub fn open_with(
        db: Arc<Database>,
        config: RecallConfig,
        completer: Option<Arc<dyn CompletionAdapter>>,
        embedder: Option<Arc<dyn EmbeddingAdapter>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let graph = Arc::new(GraphStore::new(
            Arc::clone(&db),
            Arc::clone(&clock),
            &config.graph,
        ));
        let mapper = RelationshipMapper::new(Arc::clone(&graph));
        let extractor = completer.map(|c| {
            EntityExtractor::new(c, config.extraction.clone(), Arc::clone(&clock))
        });
        let index = SemanticIndex::new(
            Arc::clone(&db),
            Arc::clone(&graph) as Arc<dyn GraphReader>,
            embedder,
            config.index.clone(),
            clock,
        );
        Self {
            db,
            graph,
            mapper,
            extractor,
            index,
            config,
        }
    }

    /// Extract entities from `text`, commit them to the graph, then index
    /// the text. Entities already mentioned in the text are offered to the
    /// extractor as known names.
    pub async fn ingest(&self, text: &str, source: &str) -> Result<IngestReport, RecallError> {
        self.ingest_with_metadata(text, source, Attributes::new()).await
    }

    pub async fn ingest_with_metadata(
        &self,
        text: &str,
        source: &str,
        metadata: Attributes,
    ) -> Result<IngestReport, RecallError> {
        let extraction = match &self.extractor {
            Some(extractor) => {
                let known: Vec<KnownEntity> = self
                    .graph
                    .entities_mentioned_in(text)
                    .await?
                    .iter()
                    .map(KnownEntity::from)
                    .collect();
                let result = extractor.extract(text, &known).await?;
                if result.is_empty() {
                    debug!(source = %source, "nothing extracted");
                    Some(CommitSummary::default())
                } else {
                    Some(extractor.commit(&result, source, self.graph.as_ref()).await?)
                }
            }
            None => None,
        };

        let chunks = self.index.index(text, source, metadata).await?;
        Ok(IngestReport {
            extraction,
            chunk_ids: chunks.into_iter().map(|c| c.id).collect(),
        })
    }

    /// Hybrid search, embedding the query when an embedder is configured.
    pub async fn search(
        &self,
        query: &str,
        options: SearchOptions,
    ) -> Result<Vec<SearchResult>, RecallError> {
        self.index.search_async(query, options).await
    }

    /// Run one decay pass with the configured parameters.
    pub async fn decay(&self) -> Result<DecayReport, RecallError> {
        self.mapper
            .decay_relationships(DecayOptions::from(&self.config.decay))
            .await
    }

    pub async fn wait_for_embeddings(&self) {
        self.index.wait_for_embeddings().await;
    }

    pub fn graph(&self) -> &Arc<GraphStore> {
        &self.graph
    }

    pub fn mapper(&self) -> &RelationshipMapper {
        &self.mapper
    }

    pub fn extractor(&self) -> Option<&EntityExtractor> {
        self.extractor.as_ref()
    }

    pub fn index(&self) -> &SemanticIndex {
        &self.index
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    pub fn config(&self) -> &RecallConfig {
        &self.config
    }
}
