// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;

use recall_config::model::{ExtractionConfig, GraphConfig};
use recall_storage::Database;
use recall_test_utils::{ManualClock, MockCompleter};
use serde_json::json;
use tracing_test::traced_test;

use super::*;
use crate::graph::GraphStore;
use crate::types::RelationshipType;

const ALICE_ATLAS: &str = r#"Sure! Here is the result:
```json
{"entities": [
  {"name": "Alice", "type": "person", "confidence": 0.9, "attributes": {"role": "engineer"}},
  {"name": "Atlas", "type": "project", "confidence": 0.8},
  {"name": "maybe", "type": "concept", "confidence": 0.1},
  {"type": "person"}
 ],
 "relationships": [
  {"source": "Alice", "target": "Atlas", "type": "works on", "context": "leads the rewrite", "confidence": 0.9}
 ]}
```"#;

fn config(coreferences: bool, sentiment: bool) -> ExtractionConfig {
    ExtractionConfig {
        resolve_coreferences: coreferences,
        extract_sentiment: sentiment,
        ..ExtractionConfig::default()
    }
}

fn extractor(completer: &MockCompleter, config: ExtractionConfig, clock: &ManualClock) -> EntityExtractor {
    EntityExtractor::new(Arc::new(completer.clone()), config, Arc::new(clock.clone()))
}

async fn graph(clock: &ManualClock) -> GraphStore {
    let db = Database::open_in_memory().await.unwrap();
    GraphStore::new(Arc::new(db), Arc::new(clock.clone()), &GraphConfig::default())
}

#[tokio::test]
async fn extracts_and_filters_by_confidence() {
    let completer = MockCompleter::with_responses([ALICE_ATLAS]);
    let clock = ManualClock::starting_now();
    let result = extractor(&completer, config(false, false), &clock)
        .extract("Alice leads the Atlas rewrite.", &[])
        .await
        .unwrap();

    let names: Vec<&str> = result.entities.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["Alice", "Atlas"]);
    assert_eq!(result.entities[0].attributes["role"], json!("engineer"));
    assert_eq!(result.relationships.len(), 1);
    assert_eq!(result.relationships[0].rel_type, RelationshipType::WorksOn);
    assert_eq!(result.excerpt, "Alice leads the Atlas rewrite.");
    assert_eq!(completer.call_count().await, 1);
}

#[tokio::test]
async fn same_text_is_extracted_once() {
    let completer = MockCompleter::with_responses([ALICE_ATLAS, ALICE_ATLAS]);
    let clock = ManualClock::starting_now();
    let extractor = extractor(&completer, config(false, false), &clock);

    let first = extractor.extract("Alice leads Atlas.", &[]).await.unwrap();
    let second = extractor.extract("Alice leads Atlas.", &[]).await.unwrap();
    assert!(!first.is_empty());
    assert!(second.is_empty());
    assert_eq!(completer.call_count().await, 1);

    extractor.clear_cache();
    let third = extractor.extract("Alice leads Atlas.", &[]).await.unwrap();
    assert!(!third.is_empty());
}

#[tokio::test]
async fn first_pass_failure_is_an_error() {
    let completer = MockCompleter::new();
    completer.add_failure("rate limited").await;
    let clock = ManualClock::starting_now();
    let err = extractor(&completer, config(true, true), &clock)
        .extract("anything", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, RecallError::Provider { .. }));
}

#[tokio::test]
async fn unparsable_output_is_empty_not_error() {
    let completer = MockCompleter::with_responses(["I could not find anything, sorry."]);
    let clock = ManualClock::starting_now();
    let result = extractor(&completer, config(true, true), &clock)
        .extract("nothing here", &[])
        .await
        .unwrap();
    assert!(result.is_empty());
}

#[tokio::test]
#[traced_test]
async fn optional_pass_failure_degrades_gracefully() {
    let completer = MockCompleter::with_responses([ALICE_ATLAS]);
    completer.add_failure("timeout").await;
    let clock = ManualClock::starting_now();
    let result = extractor(&completer, config(true, false), &clock)
        .extract("Alice leads Atlas.", &[])
        .await
        .unwrap();
    assert_eq!(result.entities.len(), 2);
    assert!(result.coreferences.is_empty());
    assert!(logs_contain("coreference pass failed"));
}

#[tokio::test]
async fn coreferences_rewrite_endpoints() {
    let first = r#"{"entities": [{"name": "Bob", "type": "person", "confidence": 0.9},
                                 {"name": "Rust", "type": "technology", "confidence": 0.9}],
                    "relationships": [{"source": "he", "target": "Rust", "type": "uses", "confidence": 0.8}]}"#;
    let second = r#"{"coreferences": [{"mention": "He", "resolved": "Bob", "confidence": 0.9}]}"#;
    let completer = MockCompleter::with_responses([first, second]);
    let clock = ManualClock::starting_now();
    let result = extractor(&completer, config(true, false), &clock)
        .extract("Bob joined. He uses Rust.", &[])
        .await
        .unwrap();
    assert_eq!(result.coreferences.len(), 1);
    assert_eq!(result.relationships[0].source, "Bob");
    assert!(completer.prompts().await[1].contains("- Bob (person)"));
}

#[tokio::test]
async fn known_entities_absorb_near_duplicates() {
    let response = r#"{"entities": [{"name": "alice  johnson", "type": "person", "confidence": 0.7},
                                    {"name": "Atlas", "type": "project", "confidence": 0.7}],
                       "relationships": [{"source": "alice johnson", "target": "Atlas", "type": "works_on"},
                                         {"source": "Atlas", "target": "atlas", "type": "part_of"}]}"#;
    let completer = MockCompleter::with_responses([response]);
    let clock = ManualClock::starting_now();
    let known = [KnownEntity {
        id: Some("e-1".into()),
        name: "Alice Johnson".into(),
        entity_type: EntityType::Person,
    }];
    let result = extractor(&completer, config(false, false), &clock)
        .extract("Alice Johnson on Atlas", &known)
        .await
        .unwrap();

    assert_eq!(result.entities[0].name, "Alice Johnson");
    assert_eq!(result.entities[0].existing_id.as_deref(), Some("e-1"));
    // self-loop after remapping is dropped
    assert_eq!(result.relationships.len(), 1);
    assert_eq!(result.relationships[0].source, "Alice Johnson");
}

#[tokio::test]
async fn sentiment_pass_keeps_known_names_and_normalizes_dates() {
    let first = r#"{"entities": [{"name": "Atlas", "type": "project", "confidence": 0.9}]}"#;
    let third = r#"{"sentiments": [{"entity": "Atlas", "polarity": "positive", "score": 0.8, "confidence": 0.9},
                                   {"entity": "Nobody", "polarity": "negative", "confidence": 0.9}],
                    "temporals": [{"expression": "2026-03-20", "entity": "Atlas"}]}"#;
    let completer = MockCompleter::with_responses([first, third]);
    let clock = ManualClock::starting_now();
    let result = extractor(&completer, config(false, true), &clock)
        .extract("Atlas ships 2026-03-20 and everyone loves it.", &[])
        .await
        .unwrap();

    assert_eq!(result.sentiments.len(), 1);
    assert_eq!(result.sentiments[0].polarity, Polarity::Positive);
    assert_eq!(result.temporals[0].normalized.as_deref(), Some("2026-03-20"));
}

#[tokio::test]
async fn batch_threads_new_entities_into_later_windows() {
    let first = r#"{"entities": [{"name": "Atlas", "type": "project", "confidence": 0.9}]}"#;
    let completer = MockCompleter::with_responses([first]);
    let clock = ManualClock::starting_now();
    let config = ExtractionConfig {
        batch_size: 2,
        ..config(false, false)
    };
    let texts: Vec<String> = ["one", "two", "three"].iter().map(|s| s.to_string()).collect();
    let results = extractor(&completer, config, &clock)
        .extract_batch(&texts, &[])
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    let prompts = completer.prompts().await;
    assert_eq!(prompts.len(), 2);
    assert!(prompts[0].contains("one\n\ntwo"));
    assert!(prompts[1].contains("- Atlas (project)"));
}

#[tokio::test]
async fn commit_creates_then_strengthens() {
    let clock = ManualClock::starting_now();
    let graph = graph(&clock).await;
    let completer = MockCompleter::with_responses([ALICE_ATLAS, ALICE_ATLAS]);
    let extractor = extractor(&completer, config(false, false), &clock);

    let result = extractor.extract("Alice leads the Atlas rewrite.", &[]).await.unwrap();
    let first = extractor.commit(&result, "chat-1", &graph).await.unwrap();
    assert_eq!(first.entities_created, 2);
    assert_eq!(first.relationships_created, 1);

    let alice_id = first.entity_ids["Alice"].clone();
    let alice = graph.get_entity(&alice_id).await.unwrap().unwrap();
    assert_eq!(alice.attributes["role"], json!("engineer"));
    assert_eq!(graph.get_timeline(&alice_id, 10).await.unwrap().len(), 1);

    let again = extractor.extract("Alice is still on Atlas.", &[]).await.unwrap();
    let second = extractor.commit(&again, "chat-2", &graph).await.unwrap();
    assert_eq!(second.entities_created, 0);
    assert_eq!(second.entities_updated, 2);
    assert_eq!(second.relationships_strengthened, 1);

    let rels = graph.get_relationships(&alice_id).await.unwrap();
    assert_eq!(rels.len(), 1);
    assert!((rels[0].weight - 1.9).abs() < 1e-9);
    let alice = graph.get_entity(&alice_id).await.unwrap().unwrap();
    assert_eq!(alice.mention_count, 2);
}

#[tokio::test]
async fn commit_skips_unresolved_endpoints_and_writes_sentiment() {
    let clock = ManualClock::starting_now();
    let graph = graph(&clock).await;
    let completer = MockCompleter::new();
    let extractor = extractor(&completer, config(false, false), &clock);

    let result = ExtractionResult {
        entities: vec![EntityCandidate {
            name: "Atlas".into(),
            entity_type: EntityType::Project,
            category: None,
            attributes: Default::default(),
            confidence: 0.9,
            existing_id: None,
            aliases: vec!["Project Atlas".into()],
        }],
        relationships: vec![RelationshipCandidate {
            source: "Ghost".into(),
            target: "Atlas".into(),
            rel_type: RelationshipType::Uses,
            context: String::new(),
            confidence: 0.9,
            bidirectional: None,
        }],
        sentiments: vec![Sentiment {
            entity: "Atlas".into(),
            polarity: Polarity::Negative,
            score: -0.6,
            holder: None,
            confidence: 0.9,
        }],
        ..Default::default()
    };
    let summary = extractor.commit(&result, "doc", &graph).await.unwrap();
    assert_eq!(summary.relationships_skipped, 1);

    let atlas = graph.find_entity_by_name("project atlas").await.unwrap().unwrap();
    assert_eq!(atlas.attributes["sentiment"], json!("negative"));
    assert_eq!(atlas.attributes["sentiment_score"], json!(-0.6));
}

#[tokio::test]
async fn commit_resolves_near_duplicate_names_against_the_store() {
    let clock = ManualClock::starting_now();
    let graph = graph(&clock).await;
    let stored = graph
        .add_entity(NewEntity::new(EntityType::Project, "Acme Corporation"))
        .await
        .unwrap();
    let completer = MockCompleter::new();
    let extractor = extractor(&completer, config(false, false), &clock);

    let result = ExtractionResult {
        entities: vec![EntityCandidate {
            name: "Acme Corp".into(),
            entity_type: EntityType::Project,
            category: None,
            attributes: Default::default(),
            confidence: 0.9,
            existing_id: None,
            aliases: Vec::new(),
        }],
        ..Default::default()
    };
    let summary = extractor.commit(&result, "crm", &graph).await.unwrap();
    assert_eq!(summary.entities_created, 0);
    assert_eq!(summary.entities_updated, 1);
    assert_eq!(summary.entity_ids["Acme Corp"], stored.id);

    let aliases = graph.get_aliases(&stored.id).await.unwrap();
    assert!(aliases.iter().any(|a| a.alias == "Acme Corp"));
}

#[test]
fn content_hash_is_stable_hex() {
    let hash = content_hash("hello");
    assert_eq!(hash.len(), 64);
    assert_eq!(hash, content_hash("hello"));
    assert_ne!(hash, content_hash("hello "));
}
