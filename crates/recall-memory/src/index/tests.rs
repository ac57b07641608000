// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;

use recall_config::model::{GraphConfig, IndexConfig};
use recall_storage::Database;
use recall_test_utils::{ManualClock, MockEmbedder};
use serde_json::json;
use tracing_test::traced_test;

use super::*;
use crate::graph::GraphStore;
use crate::types::{EntityType, NewEntity, NewRelationship, RelationshipType};

struct Fixture {
    index: SemanticIndex,
    graph: Arc<GraphStore>,
    db: Arc<Database>,
    clock: ManualClock,
}

async fn fixture(embedder: Option<MockEmbedder>, config: IndexConfig) -> Fixture {
    let db = Arc::new(Database::open_in_memory().await.unwrap());
    let clock = ManualClock::starting_now();
    let graph = Arc::new(GraphStore::new(
        Arc::clone(&db),
        Arc::new(clock.clone()),
        &GraphConfig::default(),
    ));
    let embedder = embedder.map(|e| Arc::new(e) as Arc<dyn EmbeddingAdapter>);
    let index = SemanticIndex::new(
        Arc::clone(&db),
        Arc::clone(&graph) as Arc<dyn GraphReader>,
        embedder,
        config,
        Arc::new(clock.clone()),
    );
    Fixture {
        index,
        graph,
        db,
        clock,
    }
}

async fn plain() -> Fixture {
    fixture(None, IndexConfig::default()).await
}

#[tokio::test]
async fn short_document_is_one_chunk() {
    let f = plain().await;
    let mut metadata = Attributes::new();
    metadata.insert("channel".into(), json!("chat"));
    let entries = f.index.index("Alice likes tea.", "chat-1", metadata).await.unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].total_chunks, 1);
    let stored = f.index.get_entry(&entries[0].id).await.unwrap().unwrap();
    assert_eq!(stored.content, "Alice likes tea.");
    assert_eq!(stored.metadata["channel"], json!("chat"));
    assert!(stored.embedding.is_none());
    assert!(f.index.index("   ", "empty", Attributes::new()).await.unwrap().is_empty());
}

#[tokio::test]
async fn long_document_is_chunked_in_order() {
    let config = IndexConfig {
        chunk_tokens: 10,
        overlap_tokens: 2,
        ..IndexConfig::default()
    };
    let f = fixture(None, config).await;
    let text = "The first sentence is here. The second one follows it. A third closes the note.";
    let entries = f.index.index(text, "doc", Attributes::new()).await.unwrap();

    assert!(entries.len() > 1);
    for (i, entry) in entries.iter().enumerate() {
        assert_eq!(entry.chunk_index, i);
        assert_eq!(entry.total_chunks, entries.len());
        assert!(entry.content.chars().count() <= 40);
    }
    let stored = f.index.entries_for_source("doc").await.unwrap();
    assert_eq!(stored.len(), entries.len());
}

#[tokio::test]
async fn relevant_chunk_outranks_unrelated_one() {
    let embedder = MockEmbedder::new();
    let f = fixture(Some(embedder.clone()), IndexConfig::default()).await;
    let relevant = f
        .index
        .index("Alice works with Bob on Project X", "notes", Attributes::new())
        .await
        .unwrap();
    f.index
        .index("weather is sunny today", "notes", Attributes::new())
        .await
        .unwrap();
    f.index.wait_for_embeddings().await;
    assert_eq!(f.index.pending_embeddings(), 0);

    let stored = f.index.get_entry(&relevant[0].id).await.unwrap().unwrap();
    let query_embedding = stored.embedding.clone().unwrap();
    assert_eq!(query_embedding, embedder.vector_for("Alice works with Bob on Project X"));

    let results = f
        .index
        .search("Project X", SearchOptions::default(), Some(&query_embedding))
        .await
        .unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].entry.id, relevant[0].id);
    assert!((results[0].signals.vector - 1.0).abs() < 1e-6);
    assert_eq!(results[0].signals.bm25, 1.0);
    assert!(results[0].score > results[1].score);
}

#[tokio::test]
async fn graph_neighbors_boost_chunks() {
    let f = plain().await;
    let alice = f
        .graph
        .add_entity(NewEntity::new(EntityType::Person, "Alice"))
        .await
        .unwrap();
    let bob = f
        .graph
        .add_entity(NewEntity::new(EntityType::Person, "Bob"))
        .await
        .unwrap();
    f.graph
        .add_relationship(NewRelationship::new(&alice.id, &bob.id, RelationshipType::Knows))
        .await
        .unwrap();
    f.index.index("Bob fixed the build.", "log", Attributes::new()).await.unwrap();
    f.index.index("Carol fixed the build.", "log", Attributes::new()).await.unwrap();

    let results = f
        .index
        .search("what is Alice doing", SearchOptions::default(), None)
        .await
        .unwrap();
    assert!(results[0].entry.content.starts_with("Bob"));
    assert_eq!(results[0].signals.graph, 1.0);
    assert!(results[0].signals.bm25 > 0.0, "expansion adds the neighbor's name");
    let carol = results.iter().find(|r| r.entry.content.starts_with("Carol")).unwrap();
    assert_eq!(carol.signals.graph, 0.0);
    assert_eq!(carol.signals.bm25, 0.0);

    let unexpanded = f
        .index
        .search("what is Alice doing", SearchOptions::default().with_expansion(false), None)
        .await
        .unwrap();
    assert!(unexpanded.iter().all(|r| r.signals.bm25 == 0.0));
}

#[tokio::test]
async fn entity_density_counts_mentioned_names() {
    let f = plain().await;
    for name in ["Alice", "Atlas"] {
        f.graph
            .add_entity(NewEntity::new(EntityType::Person, name))
            .await
            .unwrap();
    }
    f.index.index("Alice reviewed Atlas.", "a", Attributes::new()).await.unwrap();
    f.index.index("Alice went home.", "b", Attributes::new()).await.unwrap();

    let results = f
        .index
        .search("Alice and Atlas", SearchOptions::default(), None)
        .await
        .unwrap();
    let both = results.iter().find(|r| r.entry.source == "a").unwrap();
    let one = results.iter().find(|r| r.entry.source == "b").unwrap();
    assert_eq!(both.signals.entity_density, 1.0);
    assert_eq!(one.signals.entity_density, 0.5);
}

#[tokio::test]
async fn options_limit_threshold_and_sources() {
    let f = plain().await;
    for (source, text) in [("a", "rust borrow checker"), ("b", "rust async runtime"), ("c", "rust macros")] {
        f.index.index(text, source, Attributes::new()).await.unwrap();
    }

    let limited = f
        .index
        .search("rust", SearchOptions::default().with_limit(2), None)
        .await
        .unwrap();
    assert_eq!(limited.len(), 2);

    let filtered = f
        .index
        .search("rust", SearchOptions::default().with_source("b"), None)
        .await
        .unwrap();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].entry.source, "b");

    let strict = f
        .index
        .search("rust", SearchOptions::default().with_threshold(1.01), None)
        .await
        .unwrap();
    assert!(strict.is_empty());
}

#[tokio::test]
async fn same_document_from_same_source_is_indexed_once() {
    let f = plain().await;
    let first = f.index.index("Alice likes tea.", "chat", Attributes::new()).await.unwrap();
    let again = f.index.index("  Alice likes tea.\n", "chat", Attributes::new()).await.unwrap();
    assert_eq!(again, first);
    assert_eq!(f.index.stats().await.unwrap().entries, 1);

    let tea: i64 = f
        .db
        .connection()
        .call(|conn| -> Result<i64, rusqlite::Error> {
            conn.query_row("SELECT doc_freq FROM index_terms WHERE term = 'tea'", [], |row| row.get(0))
        })
        .await
        .unwrap();
    assert_eq!(tea, 1);

    let elsewhere = f.index.index("Alice likes tea.", "notes", Attributes::new()).await.unwrap();
    assert_ne!(elsewhere[0].id, first[0].id);
    assert_eq!(f.index.stats().await.unwrap().entries, 2);
}

#[tokio::test]
async fn recency_decays_with_age() {
    let f = plain().await;
    f.index.index("status update one", "old", Attributes::new()).await.unwrap();
    f.clock.advance_days(7.0);
    f.index.index("status update two", "new", Attributes::new()).await.unwrap();

    let results = f
        .index
        .search("status update", SearchOptions::default(), None)
        .await
        .unwrap();
    let old = results.iter().find(|r| r.entry.source == "old").unwrap();
    let new = results.iter().find(|r| r.entry.source == "new").unwrap();
    assert!((old.signals.recency - 0.5).abs() < 1e-9);
    assert_eq!(new.signals.recency, 1.0);
    assert_eq!(results[0].entry.source, "new");
}

#[tokio::test]
#[traced_test]
async fn manual_bm25_when_fts_is_unavailable() {
    let f = plain().await;
    f.index.index("Atlas launch plan", "a", Attributes::new()).await.unwrap();
    f.index.index("Quarterly budget", "b", Attributes::new()).await.unwrap();
    f.db
        .connection()
        .call(|conn| -> Result<(), rusqlite::Error> { conn.execute_batch("DROP TABLE index_fts") })
        .await
        .unwrap();

    let results = f
        .index
        .search("atlas", SearchOptions::default(), None)
        .await
        .unwrap();
    assert_eq!(results[0].entry.source, "a");
    assert_eq!(results[0].signals.bm25, 1.0);
    assert!(logs_contain("falling back to manual BM25"));
}

#[tokio::test]
async fn remove_by_source_keeps_term_counts() {
    let f = plain().await;
    f.index.index("zebra habitat notes", "zoo", Attributes::new()).await.unwrap();
    f.index.index("habitat restoration", "park", Attributes::new()).await.unwrap();

    assert_eq!(f.index.remove_by_source("zoo").await.unwrap(), 1);
    assert_eq!(f.index.remove_by_source("zoo").await.unwrap(), 0);

    let freqs = f
        .db
        .connection()
        .call(|conn| -> Result<Vec<(String, i64)>, rusqlite::Error> {
            let mut stmt = conn.prepare("SELECT term, doc_freq FROM index_terms ORDER BY term")?;
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .unwrap();
    assert_eq!(
        freqs,
        vec![("habitat".to_string(), 1), ("restoration".to_string(), 1)]
    );
    let results = f.index.search("zebra", SearchOptions::default(), None).await.unwrap();
    assert!(results.iter().all(|r| r.entry.source == "park"));
}

#[tokio::test]
async fn stats_summarize_entries() {
    let embedder = MockEmbedder::new();
    let f = fixture(Some(embedder), IndexConfig::default()).await;
    assert_eq!(f.index.stats().await.unwrap(), IndexStats::default());

    f.index.index("abcd", "one", Attributes::new()).await.unwrap();
    f.index.index("abcdefgh", "two", Attributes::new()).await.unwrap();
    f.index.wait_for_embeddings().await;

    let stats = f.index.stats().await.unwrap();
    assert_eq!(stats.entries, 2);
    assert_eq!(stats.sources, 2);
    assert_eq!(stats.embedded, 2);
    assert_eq!(stats.min_chunk_chars, 4);
    assert_eq!(stats.max_chunk_chars, 8);
    assert_eq!(stats.avg_chunk_chars, 6.0);
}

#[tokio::test]
#[traced_test]
async fn embedding_failures_are_swallowed() {
    let embedder = MockEmbedder::new();
    embedder.set_failing(true);
    let f = fixture(Some(embedder.clone()), IndexConfig::default()).await;

    let entries = f.index.index("Alice likes tea", "chat", Attributes::new()).await.unwrap();
    f.index.wait_for_embeddings().await;
    assert_eq!(f.index.stats().await.unwrap().embedded, 0);
    assert!(logs_contain("chunk embedding failed"));

    let results = f
        .index
        .search_async("tea", SearchOptions::default())
        .await
        .unwrap();
    assert_eq!(results[0].entry.id, entries[0].id);
    assert!(results[0].signals.vector > 0.0, "token overlap proxy");
    assert!(logs_contain("query embedding failed"));
}
