// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chunked text index with multi-signal hybrid search.
//!
//! Documents are split into overlapping sentence-aligned chunks. Each chunk
//! is scored against a query on five signals: vector similarity (or a token
//! overlap proxy when no embedding is available), BM25, graph proximity to
//! the entities the query mentions, recency, and entity density. The fused
//! score is the configured weighted mean.

pub mod chunker;
pub mod scoring;
mod worker;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use recall_config::model::IndexConfig;
use recall_core::clock::from_millis;
use recall_core::{Clock, EmbeddingAdapter, RecallError};
use recall_storage::{blob_to_vec, map_tr_err, Database};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub use scoring::SignalScores;

use crate::extractor::content_hash;
use crate::graph::sql::{attributes_json, parse_attributes};
use crate::graph::GraphReader;
use crate::text::{contains_phrase, jaccard, term_set, tokenize};
use crate::types::{cosine_similarity, Attributes, Entity, IndexEntry};
use scoring::Bm25Corpus;
use worker::EmbeddingQueue;

const ENTRY_COLUMNS: &str =
    "id, content, source, metadata, embedding, chunk_index, total_chunks, timestamp";

/// Hops from a query entity that count toward the graph signal.
const GRAPH_SIGNAL_DEPTH: usize = 2;

/// Per-call search overrides. Unset fields take the configured defaults.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub limit: Option<usize>,
    pub threshold: Option<f64>,
    pub expand_query: Option<bool>,
    /// Restrict results to these sources. Empty means all.
    pub sources: Vec<String>,
}

impl SearchOptions {
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn with_expansion(mut self, expand: bool) -> Self {
        self.expand_query = Some(expand);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.sources.push(source.into());
        self
    }
}

/// One ranked search hit.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub entry: IndexEntry,
    pub score: f64,
    pub signals: SignalScores,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndexStats {
    pub entries: usize,
    pub sources: usize,
    pub embedded: usize,
    pub min_chunk_chars: usize,
    pub max_chunk_chars: usize,
    pub avg_chunk_chars: f64,
}

/// Raw lexical relevance, before normalization.
enum Lexical {
    /// `-bm25()` per chunk id from FTS5.
    Fts(HashMap<String, f64>),
    /// FTS5 was unusable; score by hand from tracked statistics.
    Manual { corpus: Bm25Corpus, fts_error: String },
}

/// Query-side context gathered from the graph.
#[derive(Default)]
struct QueryContext {
    terms: HashSet<String>,
    /// Lowercased names of entities the query mentions.
    mentioned: Vec<String>,
    /// Names of entities within two hops of a mentioned entity.
    neighborhood: Vec<String>,
}

/// Chunked, searchable text store.
pub struct SemanticIndex {
    db: Arc<Database>,
    graph: Arc<dyn GraphReader>,
    embedder: Option<Arc<dyn EmbeddingAdapter>>,
    queue: Option<EmbeddingQueue>,
    config: IndexConfig,
    clock: Arc<dyn Clock>,
}

impl SemanticIndex {
    /// Build the index. With an embedder, spawns the background embedding
    /// worker, so this must run inside a tokio runtime.
    pub fn new(
        db: Arc<Database>,
        graph: Arc<dyn GraphReader>,
        embedder: Option<Arc<dyn EmbeddingAdapter>>,
        config: IndexConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let queue = embedder.as_ref().map(|e| {
            EmbeddingQueue::spawn(Arc::clone(&db), Arc::clone(e), config.embedding_queue_capacity)
        });
        Self {
            db,
            graph,
            embedder,
            queue,
            config,
            clock,
        }
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Chunk `content` and store every chunk with its term statistics in
    /// one transaction. Embeddings are computed afterwards in the background.
    ///
    /// Text already indexed under the same source is not stored again; its
    /// existing chunks are returned instead.
    pub async fn index(
        &self,
        content: &str,
        source: &str,
        metadata: Attributes,
    ) -> Result<Vec<IndexEntry>, RecallError> {
        let chunk_chars = self.config.chunk_tokens * self.config.chars_per_token;
        let overlap_chars = self.config.overlap_tokens * self.config.chars_per_token;
        let chunks = chunker::chunk_text(content, chunk_chars, overlap_chars);
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let now_ms = self.clock.now_millis();
        let total = chunks.len();
        let entries: Vec<IndexEntry> = chunks
            .into_iter()
            .enumerate()
            .map(|(i, chunk)| IndexEntry {
                id: Uuid::new_v4().to_string(),
                content: chunk,
                source: source.to_string(),
                metadata: metadata.clone(),
                embedding: None,
                chunk_index: i,
                total_chunks: total,
                timestamp: from_millis(now_ms),
            })
            .collect();

        let rows = entries.clone();
        let document_hash = content_hash(content.trim());
        let document_source = source.to_string();
        let existing = self
            .db
            .connection()
            .call(move |conn| -> Result<Vec<IndexEntry>, rusqlite::Error> {
                let tx = conn.transaction()?;
                let existing = {
                    let mut stmt = tx.prepare(&format!(
                        "SELECT {ENTRY_COLUMNS} FROM index_entries WHERE source = ?1 AND document_hash = ?2 ORDER BY chunk_index"
                    ))?;
                    let found = stmt
                        .query_map(params![document_source, document_hash], row_to_entry)?
                        .collect::<Result<Vec<_>, _>>()?;
                    found
                };
                if !existing.is_empty() {
                    return Ok(existing);
                }
                for entry in &rows {
                    let tokens = tokenize(&entry.content);
                    tx.execute(
                        "INSERT INTO index_entries (id, content, source, metadata, chunk_index, total_chunks, token_count, timestamp, document_hash) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                        params![
                            entry.id,
                            entry.content,
                            entry.source,
                            attributes_json(&entry.metadata),
                            entry.chunk_index as i64,
                            entry.total_chunks as i64,
                            tokens.len() as i64,
                            now_ms,
                            document_hash,
                        ],
                    )?;
                    let distinct: HashSet<String> = tokens.into_iter().collect();
                    for term in distinct {
                        tx.execute(
                            "INSERT INTO index_terms (term, doc_freq) VALUES (?1, 1) ON CONFLICT(term) DO UPDATE SET doc_freq = doc_freq + 1",
                            params![term],
                        )?;
                    }
                }
                tx.commit()?;
                Ok(Vec::new())
            })
            .await
            .map_err(map_tr_err)?;

        if !existing.is_empty() {
            debug!(source = %source, chunks = existing.len(), "document already indexed");
            return Ok(existing);
        }

        if let Some(queue) = &self.queue {
            for entry in &entries {
                queue.enqueue(entry.id.clone(), entry.content.clone());
            }
        }
        info!(source = %source, chunks = total, "document indexed");
        Ok(entries)
    }

    /// Wait until every queued embedding has been written or has failed.
    pub async fn wait_for_embeddings(&self) {
        if let Some(queue) = &self.queue {
            queue.wait_idle().await;
        }
    }

    /// Embeddings queued or in flight.
    pub fn pending_embeddings(&self) -> usize {
        self.queue.as_ref().map_or(0, EmbeddingQueue::pending)
    }

    /// Embed the query when an embedder is configured, then [`search`](Self::search).
    ///
    /// An embedding failure falls back to the lexical proxy.
    pub async fn search_async(
        &self,
        query: &str,
        options: SearchOptions,
    ) -> Result<Vec<SearchResult>, RecallError> {
        let embedding = match &self.embedder {
            Some(embedder) => match embedder.embed(query).await {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!(error = %e, "query embedding failed, using token overlap");
                    None
                }
            },
            None => None,
        };
        self.search(query, options, embedding.as_deref()).await
    }

    /// Rank chunks against `query` by the fused score.
    pub async fn search(
        &self,
        query: &str,
        options: SearchOptions,
        query_embedding: Option<&[f32]>,
    ) -> Result<Vec<SearchResult>, RecallError> {
        let limit = options.limit.unwrap_or(self.config.search_limit);
        let threshold = options.threshold.unwrap_or(self.config.search_threshold);
        let expand = options.expand_query.unwrap_or(self.config.query_expansion);
        if limit == 0 || query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let context = self.query_context(query, expand).await?;
        let candidates = self.load_entries(options.sources).await?;
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        let bm25 = self.lexical_scores(&context.terms, &candidates).await?;

        let now_ms = self.clock.now_millis();
        let weights = self.config.weights;
        let mut results: Vec<SearchResult> = candidates
            .into_iter()
            .map(|entry| {
                let lower = entry.content.to_lowercase();
                let vector = match (query_embedding, entry.embedding.as_deref()) {
                    (Some(q), Some(e)) if q.len() == e.len() => {
                        f64::from(cosine_similarity(q, e)).clamp(0.0, 1.0)
                    }
                    _ => jaccard(&context.terms, &term_set(&entry.content)),
                };
                let signals = SignalScores {
                    vector,
                    bm25: bm25.get(&entry.id).copied().unwrap_or(0.0),
                    graph: fraction_present(&lower, &context.neighborhood),
                    recency: scoring::recency(
                        now_ms - entry.timestamp.timestamp_millis(),
                        self.config.recency_half_life_days,
                    ),
                    entity_density: fraction_present(&lower, &context.mentioned),
                };
                SearchResult {
                    score: signals.fuse(&weights),
                    signals,
                    entry,
                }
            })
            .filter(|r| r.score >= threshold)
            .collect();

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(limit);
        debug!(query = %query, hits = results.len(), "search complete");
        Ok(results)
    }

    async fn query_context(&self, query: &str, expand: bool) -> Result<QueryContext, RecallError> {
        let mut context = QueryContext {
            terms: term_set(query),
            ..Default::default()
        };
        let matched = self.graph.entities_mentioned_in(query).await?;
        if matched.is_empty() {
            return Ok(context);
        }

        let matched_ids: HashSet<&str> = matched.iter().map(|e| e.id.as_str()).collect();
        let mut neighborhood: HashMap<String, Entity> = HashMap::new();
        for entity in &matched {
            for near in self.graph.connected_entities(&entity.id, GRAPH_SIGNAL_DEPTH).await? {
                if !matched_ids.contains(near.id.as_str()) {
                    neighborhood.insert(near.id.clone(), near);
                }
            }
        }

        if expand {
            for entity in &matched {
                context.terms.extend(term_set(&entity.name));
                for near in self.graph.connected_entities(&entity.id, 1).await? {
                    context.terms.extend(term_set(&near.name));
                }
            }
        }

        context.mentioned = matched.iter().map(|e| e.name.to_lowercase()).collect();
        context.neighborhood = neighborhood.into_values().map(|e| e.name.to_lowercase()).collect();
        Ok(context)
    }

    async fn load_entries(&self, sources: Vec<String>) -> Result<Vec<IndexEntry>, RecallError> {
        self.db
            .connection()
            .call(move |conn| -> Result<Vec<IndexEntry>, rusqlite::Error> {
                let sql = if sources.is_empty() {
                    format!("SELECT {ENTRY_COLUMNS} FROM index_entries")
                } else {
                    let marks = vec!["?"; sources.len()].join(", ");
                    format!("SELECT {ENTRY_COLUMNS} FROM index_entries WHERE source IN ({marks})")
                };
                let mut stmt = conn.prepare(&sql)?;
                let entries = stmt
                    .query_map(params_from_iter(sources.iter()), row_to_entry)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(entries)
            })
            .await
            .map_err(map_tr_err)
    }

    /// BM25 per chunk id, normalized so the best chunk scores 1.
    async fn lexical_scores(
        &self,
        terms: &HashSet<String>,
        candidates: &[IndexEntry],
    ) -> Result<HashMap<String, f64>, RecallError> {
        let Some(expression) = scoring::fts_match_expression(terms) else {
            return Ok(HashMap::new());
        };
        let lookup: Vec<String> = terms.iter().cloned().collect();
        let lexical = self
            .db
            .connection()
            .call(move |conn| -> Result<Lexical, rusqlite::Error> {
                match fts_bm25(conn, &expression) {
                    Ok(scores) => Ok(Lexical::Fts(scores)),
                    Err(e) => Ok(Lexical::Manual {
                        corpus: load_corpus(conn, &lookup)?,
                        fts_error: e.to_string(),
                    }),
                }
            })
            .await
            .map_err(map_tr_err)?;

        let raw = match lexical {
            Lexical::Fts(mut scores) => {
                let ids: HashSet<&str> = candidates.iter().map(|e| e.id.as_str()).collect();
                scores.retain(|id, _| ids.contains(id.as_str()));
                scores
            }
            Lexical::Manual { corpus, fts_error } => {
                warn!(error = %fts_error, "FTS5 query failed, falling back to manual BM25");
                candidates
                    .iter()
                    .map(|entry| (entry.id.clone(), corpus.score(terms, &tokenize(&entry.content))))
                    .collect()
            }
        };
        Ok(scoring::normalize_max(raw))
    }

    /// Delete every chunk of `source`, keeping document frequencies in step.
    pub async fn remove_by_source(&self, source: &str) -> Result<usize, RecallError> {
        let source = source.to_string();
        let label = source.clone();
        let removed = self
            .db
            .connection()
            .call(move |conn| -> Result<usize, rusqlite::Error> {
                let tx = conn.transaction()?;
                let contents: Vec<String> = {
                    let mut stmt = tx.prepare("SELECT content FROM index_entries WHERE source = ?1")?;
                    let contents = stmt
                        .query_map(params![source], |row| row.get(0))?
                        .collect::<Result<Vec<_>, _>>()?;
                    contents
                };
                for content in &contents {
                    for term in term_set(content) {
                        tx.execute(
                            "UPDATE index_terms SET doc_freq = doc_freq - 1 WHERE term = ?1",
                            params![term],
                        )?;
                    }
                }
                tx.execute("DELETE FROM index_terms WHERE doc_freq <= 0", [])?;
                let removed = tx.execute("DELETE FROM index_entries WHERE source = ?1", params![source])?;
                tx.commit()?;
                Ok(removed)
            })
            .await
            .map_err(map_tr_err)?;
        info!(source = %label, removed, "source removed from index");
        Ok(removed)
    }

    pub async fn get_entry(&self, id: &str) -> Result<Option<IndexEntry>, RecallError> {
        let id = id.to_string();
        self.db
            .connection()
            .call(move |conn| -> Result<Option<IndexEntry>, rusqlite::Error> {
                conn.query_row(
                    &format!("SELECT {ENTRY_COLUMNS} FROM index_entries WHERE id = ?1"),
                    params![id],
                    row_to_entry,
                )
                .optional()
            })
            .await
            .map_err(map_tr_err)
    }

    /// Chunks of `source` in chunk order.
    pub async fn entries_for_source(&self, source: &str) -> Result<Vec<IndexEntry>, RecallError> {
        let source = source.to_string();
        self.db
            .connection()
            .call(move |conn| -> Result<Vec<IndexEntry>, rusqlite::Error> {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {ENTRY_COLUMNS} FROM index_entries WHERE source = ?1 ORDER BY timestamp, chunk_index"
                ))?;
                let entries = stmt
                    .query_map(params![source], row_to_entry)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(entries)
            })
            .await
            .map_err(map_tr_err)
    }

    pub async fn stats(&self) -> Result<IndexStats, RecallError> {
        self.db
            .connection()
            .call(move |conn| -> Result<IndexStats, rusqlite::Error> {
                conn.query_row(
                    "SELECT COUNT(*), COUNT(DISTINCT source), COUNT(embedding), MIN(LENGTH(content)), MAX(LENGTH(content)), AVG(LENGTH(content)) FROM index_entries",
                    [],
                    |row| {
                        Ok(IndexStats {
                            entries: row.get::<_, i64>(0)? as usize,
                            sources: row.get::<_, i64>(1)? as usize,
                            embedded: row.get::<_, i64>(2)? as usize,
                            min_chunk_chars: row.get::<_, Option<i64>>(3)?.unwrap_or(0) as usize,
                            max_chunk_chars: row.get::<_, Option<i64>>(4)?.unwrap_or(0) as usize,
                            avg_chunk_chars: row.get::<_, Option<f64>>(5)?.unwrap_or(0.0),
                        })
                    },
                )
            })
            .await
            .map_err(map_tr_err)
    }
}

fn row_to_entry(row: &Row) -> rusqlite::Result<IndexEntry> {
    let metadata: String = row.get(3)?;
    let embedding: Option<Vec<u8>> = row.get(4)?;
    Ok(IndexEntry {
        id: row.get(0)?,
        content: row.get(1)?,
        source: row.get(2)?,
        metadata: parse_attributes(&metadata),
        embedding: embedding.map(|blob| blob_to_vec(&blob)),
        chunk_index: row.get::<_, i64>(5)? as usize,
        total_chunks: row.get::<_, i64>(6)? as usize,
        timestamp: from_millis(row.get(7)?),
    })
}

fn fts_bm25(conn: &Connection, expression: &str) -> rusqlite::Result<HashMap<String, f64>> {
    let mut stmt = conn.prepare(
        "SELECT e.id, bm25(index_fts) FROM index_fts JOIN index_entries e ON e.rowid = index_fts.rowid WHERE index_fts MATCH ?1",
    )?;
    let scores = stmt
        .query_map(params![expression], |row| {
            let id: String = row.get(0)?;
            let score: f64 = row.get(1)?;
            // bm25() is negative, more negative is more relevant
            Ok((id, (-score).max(0.0)))
        })?
        .collect::<Result<HashMap<_, _>, _>>()?;
    Ok(scores)
}

fn load_corpus(conn: &Connection, terms: &[String]) -> rusqlite::Result<Bm25Corpus> {
    let (doc_count, avg_len): (i64, Option<f64>) = conn.query_row(
        "SELECT COUNT(*), AVG(token_count) FROM index_entries",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    let mut doc_freq = HashMap::new();
    for term in terms {
        let df: Option<i64> = conn
            .query_row(
                "SELECT doc_freq FROM index_terms WHERE term = ?1",
                params![term],
                |row| row.get(0),
            )
            .optional()?;
        doc_freq.insert(term.clone(), df.unwrap_or(0));
    }
    Ok(Bm25Corpus {
        doc_count: doc_count as usize,
        avg_len: avg_len.unwrap_or(0.0),
        doc_freq,
    })
}

/// Share of `names` appearing as phrases in `lower`; 0 when `names` is empty.
fn fraction_present(lower: &str, names: &[String]) -> f64 {
    if names.is_empty() {
        return 0.0;
    }
    let hits = names.iter().filter(|n| contains_phrase(lower, n)).count();
    hits as f64 / names.len() as f64
}

#[cfg(test)]
mod tests;
