// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end ingest and search through the memory engine.

use std::sync::Arc;

use recall_core::{CompletionAdapter, EmbeddingAdapter};
use recall_memory::{
    CommitSummary, EntityType, MemoryEngine, NewEntity, RelationshipType, SearchOptions,
};
use recall_test_utils::TestHarness;

const EXTRACTION: &str = r#"{
  "entities": [
    {"name": "Alice", "type": "person", "confidence": 0.95},
    {"name": "Bob", "type": "person", "confidence": 0.9},
    {"name": "Project X", "type": "project", "confidence": 0.9}
  ],
  "relationships": [
    {"source": "Alice", "target": "Project X", "type": "works_on", "confidence": 0.9},
    {"source": "Alice", "target": "Bob", "type": "knows", "confidence": 0.8}
  ]
}"#;

async fn engine(responses: &[&str]) -> (MemoryEngine, TestHarness) {
    let harness = TestHarness::builder()
        .with_completions(responses.iter().copied())
        .build()
        .await
        .unwrap();
    let engine = MemoryEngine::open_with(
        Arc::clone(&harness.db),
        harness.config.clone(),
        Some(Arc::new(harness.completer.clone()) as Arc<dyn CompletionAdapter>),
        Some(Arc::new(harness.embedder.clone()) as Arc<dyn EmbeddingAdapter>),
        Arc::new(harness.clock.clone()),
    );
    (engine, harness)
}

#[tokio::test]
async fn ingest_builds_graph_and_index() {
    let (engine, _harness) = engine(&[EXTRACTION]).await;
    let report = engine
        .ingest("Alice works with Bob on Project X", "chat-1")
        .await
        .unwrap();

    let summary = report.extraction.unwrap();
    assert_eq!(summary.entities_created, 3);
    assert_eq!(summary.relationships_created, 2);
    assert_eq!(report.chunk_ids.len(), 1);

    let graph = engine.graph();
    let alice = graph.find_entity_by_name("alice").await.unwrap().unwrap();
    let project = graph.find_entity_by_name("Project X").await.unwrap().unwrap();
    let rel = graph
        .get_relationship_between(&alice.id, &project.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(rel.rel_type, RelationshipType::WorksOn);

    engine.wait_for_embeddings().await;
    let stats = engine.index().stats().await.unwrap();
    assert_eq!(stats.entries, 1);
    assert_eq!(stats.embedded, 1);
}

#[tokio::test]
async fn repeated_text_is_not_extracted_again() {
    let (engine, harness) = engine(&[EXTRACTION, EXTRACTION]).await;
    engine.ingest("Alice works with Bob on Project X", "chat-1").await.unwrap();
    let calls = harness.completer.call_count().await;

    let again = engine.ingest("Alice works with Bob on Project X", "chat-1").await.unwrap();
    assert_eq!(again.extraction, Some(CommitSummary::default()));
    assert_eq!(harness.completer.call_count().await, calls);
    assert_eq!(again.chunk_ids.len(), 1);
}

#[tokio::test]
async fn repeated_text_is_not_indexed_again() {
    let (engine, _harness) = engine(&[EXTRACTION]).await;
    let first = engine.ingest("Alice works with Bob on Project X", "chat-1").await.unwrap();
    let again = engine.ingest("Alice works with Bob on Project X", "chat-1").await.unwrap();

    assert_eq!(again.chunk_ids, first.chunk_ids);
    assert_eq!(engine.index().stats().await.unwrap().entries, 1);
    let hits = engine.search("Project X", SearchOptions::default()).await.unwrap();
    assert_eq!(hits.len(), 1);
}

#[tokio::test]
async fn spelling_variant_merges_into_stored_entity() {
    let variant = r#"{"entities": [{"name": "Acme Corp", "type": "project", "confidence": 0.9}]}"#;
    let (engine, _harness) = engine(&[variant]).await;
    let stored = engine
        .graph()
        .add_entity(NewEntity::new(EntityType::Project, "Acme Corporation"))
        .await
        .unwrap();

    let report = engine.ingest("Acme Corp signed the deal.", "crm").await.unwrap();
    let summary = report.extraction.unwrap();
    assert_eq!(summary.entities_created, 0);
    assert_eq!(summary.entities_updated, 1);
    assert_eq!(summary.entity_ids["Acme Corp"], stored.id);

    let graph = engine.graph();
    assert_eq!(graph.stats().await.unwrap().entity_count, 1);
    let merged = graph.get_entity(&stored.id).await.unwrap().unwrap();
    assert_eq!(merged.name, "Acme Corporation");
    assert_eq!(merged.mention_count, 2);
    let found = graph.find_entity_by_name("acme corp").await.unwrap().unwrap();
    assert_eq!(found.id, stored.id);
}

#[tokio::test]
async fn dissimilar_names_stay_separate() {
    let other = r#"{"entities": [{"name": "Acme Labs", "type": "project", "confidence": 0.9}]}"#;
    let (engine, _harness) = engine(&[other]).await;
    engine
        .graph()
        .add_entity(NewEntity::new(EntityType::Project, "Acme Corporation"))
        .await
        .unwrap();

    let report = engine.ingest("Acme Labs shipped a prototype.", "crm").await.unwrap();
    assert_eq!(report.extraction.unwrap().entities_created, 1);
    assert_eq!(engine.graph().stats().await.unwrap().entity_count, 2);
}

#[tokio::test]
async fn search_ranks_relevant_chunk_first() {
    let (engine, _harness) = engine(&[EXTRACTION]).await;
    engine.ingest("Alice works with Bob on Project X", "chat-1").await.unwrap();
    engine.ingest("weather is sunny today", "chat-2").await.unwrap();
    engine.wait_for_embeddings().await;

    let results = engine.search("Project X", SearchOptions::default()).await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].entry.source, "chat-1");
    assert_eq!(results[0].signals.entity_density, 1.0);
    assert!(results[0].score > results[1].score);
}

#[tokio::test]
async fn engine_without_adapters_still_indexes() {
    let harness = TestHarness::new().await.unwrap();
    let engine = MemoryEngine::open_with(
        Arc::clone(&harness.db),
        harness.config.clone(),
        None,
        None,
        Arc::new(harness.clock.clone()),
    );
    let report = engine.ingest("plain note about gardening", "notes").await.unwrap();
    assert!(report.extraction.is_none());
    assert!(engine.extractor().is_none());

    let results = engine.search("gardening", SearchOptions::default()).await.unwrap();
    assert_eq!(results.len(), 1);
    assert!(results[0].signals.vector > 0.0);
}

#[tokio::test]
async fn open_creates_database_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = recall_config::RecallConfig::default();
    config.storage.database_path = dir.path().join("nested").join("recall.db").display().to_string();
    let engine = MemoryEngine::open(config, None, None).await.unwrap();
    assert!(dir.path().join("nested").join("recall.db").exists());

    let report = engine.decay().await.unwrap();
    assert_eq!(report.removed, 0);
}
