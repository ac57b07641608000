// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! LLM-based entity and relationship extraction.
//!
//! Runs up to three completion passes over the input text (entities and
//! relationships, coreference resolution, sentiment and temporal
//! expressions), validates the returned JSON item by item, deduplicates
//! candidates against known entities, and commits the result to the graph.
//! Only the first pass is mandatory; a failing optional pass yields empty
//! fields instead of an error.

mod candidates;
mod dedup;
mod prompts;
pub mod temporal;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use recall_config::model::ExtractionConfig;
use recall_core::{Clock, CompletionAdapter, RecallError};
use serde::Serialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

pub use candidates::{
    first_json_object, Coreference, EntityCandidate, Polarity, RelationshipCandidate, Sentiment,
    TemporalExpression,
};
pub use dedup::name_similarity;

use crate::graph::GraphWriter;
use crate::text::normalize_name;
use crate::types::{Entity, EntityType, EntityUpdate, NewEntity, NewRelationship};

/// Longest input excerpt kept as timeline context.
const EXCERPT_CHARS: usize = 200;

/// Stored entities examined per lookup when resolving a name fuzzily.
const FUZZY_LOOKUP_LIMIT: usize = 10;

/// An entity the extractor should recognize and reuse.
#[derive(Debug, Clone, PartialEq)]
pub struct KnownEntity {
    /// `None` for entities discovered earlier in a batch but not yet stored.
    pub id: Option<String>,
    pub name: String,
    pub entity_type: EntityType,
}

impl From<&Entity> for KnownEntity {
    fn from(entity: &Entity) -> Self {
        Self {
            id: Some(entity.id.clone()),
            name: entity.name.clone(),
            entity_type: entity.entity_type,
        }
    }
}

impl From<&EntityCandidate> for KnownEntity {
    fn from(candidate: &EntityCandidate) -> Self {
        Self {
            id: candidate.existing_id.clone(),
            name: candidate.name.clone(),
            entity_type: candidate.entity_type,
        }
    }
}

/// Everything extracted from one text (or one batch window).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractionResult {
    pub entities: Vec<EntityCandidate>,
    pub relationships: Vec<RelationshipCandidate>,
    pub sentiments: Vec<Sentiment>,
    pub temporals: Vec<TemporalExpression>,
    pub coreferences: Vec<Coreference>,
    /// Leading part of the input, used as mention context on commit.
    pub excerpt: String,
}

impl ExtractionResult {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
            && self.relationships.is_empty()
            && self.sentiments.is_empty()
            && self.temporals.is_empty()
            && self.coreferences.is_empty()
    }
}

/// Outcome of writing an [`ExtractionResult`] into the graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CommitSummary {
    pub entities_created: usize,
    pub entities_updated: usize,
    pub relationships_created: usize,
    pub relationships_strengthened: usize,
    /// Relationships whose endpoints could not be resolved.
    pub relationships_skipped: usize,
    /// Candidate name -> stored entity id.
    pub entity_ids: BTreeMap<String, String>,
}

/// Extracts typed entities and relationships through a completion adapter.
pub struct EntityExtractor {
    completer: Arc<dyn CompletionAdapter>,
    config: ExtractionConfig,
    clock: Arc<dyn Clock>,
    seen: Mutex<HashSet<String>>,
}

impl EntityExtractor {
    pub fn new(
        completer: Arc<dyn CompletionAdapter>,
        config: ExtractionConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            completer,
            config,
            clock,
            seen: Mutex::new(HashSet::new()),
        }
    }

    /// Extract from one text. Text already extracted once returns an empty
    /// result without calling the model.
    ///
    /// A completion failure in the first pass is returned as an error;
    /// unparsable output is not.
    pub async fn extract(
        &self,
        text: &str,
        known: &[KnownEntity],
    ) -> Result<ExtractionResult, RecallError> {
        let hash = content_hash(text);
        if self.is_seen(&hash) {
            debug!(hash = %hash, "text already extracted, skipping");
            return Ok(ExtractionResult::default());
        }
        let result = self.run_passes(text, known).await?;
        self.mark_seen([hash]);
        Ok(result)
    }

    /// Extract from an ordered list of texts in windows of `batch_size`.
    ///
    /// Entities found in earlier windows are offered as known context to
    /// later ones. Returns one result per window.
    pub async fn extract_batch(
        &self,
        texts: &[String],
        known: &[KnownEntity],
    ) -> Result<Vec<ExtractionResult>, RecallError> {
        let mut known = known.to_vec();
        let mut results = Vec::new();
        for window in texts.chunks(self.config.batch_size.max(1)) {
            let fresh: Vec<(String, &str)> = window
                .iter()
                .map(|t| (content_hash(t), t.as_str()))
                .filter(|(hash, _)| !self.is_seen(hash))
                .collect();
            if fresh.is_empty() {
                results.push(ExtractionResult::default());
                continue;
            }

            let joined = fresh
                .iter()
                .map(|(_, t)| *t)
                .collect::<Vec<_>>()
                .join("\n\n");
            let result = self.run_passes(&joined, &known).await?;
            self.mark_seen(fresh.into_iter().map(|(hash, _)| hash));

            for candidate in &result.entities {
                let name = normalize_name(&candidate.name);
                if !known.iter().any(|k| normalize_name(&k.name) == name) {
                    known.push(KnownEntity::from(candidate));
                }
            }
            results.push(result);
        }
        Ok(results)
    }

    /// Forget which texts have been extracted.
    pub fn clear_cache(&self) {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn is_seen(&self, hash: &str) -> bool {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(hash)
    }

    fn mark_seen(&self, hashes: impl IntoIterator<Item = String>) {
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        seen.extend(hashes);
    }

    async fn run_passes(
        &self,
        text: &str,
        known: &[KnownEntity],
    ) -> Result<ExtractionResult, RecallError> {
        let min_confidence = self.config.min_confidence;

        let response = self.completer.complete(&prompts::extraction(text, known)).await?;
        let (entities, relationships) = match candidates::parse_response(&response) {
            Some(value) => (
                candidates::parse_entities(&value),
                candidates::parse_relationships(&value),
            ),
            None => {
                warn!("entity extraction response was not a JSON object, ignoring");
                (Vec::new(), Vec::new())
            }
        };
        let mut entities: Vec<EntityCandidate> = entities
            .into_iter()
            .filter(|e| e.confidence >= min_confidence)
            .collect();
        let mut relationships: Vec<RelationshipCandidate> = relationships
            .into_iter()
            .filter(|r| r.confidence >= min_confidence)
            .collect();

        let coreferences = if self.config.resolve_coreferences && !entities.is_empty() {
            self.coreference_pass(text, &entities).await
        } else {
            Vec::new()
        };
        apply_coreferences(&coreferences, &mut entities, &mut relationships);

        let (entities, renames) =
            dedup::deduplicate(entities, known, self.config.dedup_threshold);
        let relationships = remap_endpoints(relationships, &renames);

        let (sentiments, temporals) = if self.config.extract_sentiment && !entities.is_empty() {
            self.sentiment_pass(text, &entities).await
        } else {
            (Vec::new(), Vec::new())
        };

        debug!(
            entities = entities.len(),
            relationships = relationships.len(),
            sentiments = sentiments.len(),
            temporals = temporals.len(),
            "extraction passes complete"
        );
        Ok(ExtractionResult {
            entities,
            relationships,
            sentiments,
            temporals,
            coreferences,
            excerpt: text.chars().take(EXCERPT_CHARS).collect(),
        })
    }

    async fn coreference_pass(&self, text: &str, entities: &[EntityCandidate]) -> Vec<Coreference> {
        let prompt = prompts::coreference(
            text,
            entities,
            &self.config.user_name,
            &self.config.agent_name,
        );
        match self.completer.complete(&prompt).await {
            Ok(response) => candidates::parse_response(&response)
                .map(|v| candidates::parse_coreferences(&v))
                .unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "coreference pass failed, continuing without it");
                Vec::new()
            }
        }
    }

    async fn sentiment_pass(
        &self,
        text: &str,
        entities: &[EntityCandidate],
    ) -> (Vec<Sentiment>, Vec<TemporalExpression>) {
        let names: Vec<&str> = entities.iter().map(|e| e.name.as_str()).collect();
        let now = self.clock.now();
        let prompt = prompts::sentiment(text, &names, &now.format("%Y-%m-%d").to_string());
        let value = match self.completer.complete(&prompt).await {
            Ok(response) => candidates::parse_response(&response),
            Err(e) => {
                warn!(error = %e, "sentiment pass failed, continuing without it");
                None
            }
        };
        let Some(value) = value else {
            return (Vec::new(), Vec::new());
        };

        let allowed: HashSet<String> = names.iter().map(|n| normalize_name(n)).collect();
        let sentiments = candidates::parse_sentiments(&value)
            .into_iter()
            .filter(|s| s.confidence >= self.config.min_confidence)
            .filter(|s| allowed.contains(&normalize_name(&s.entity)))
            .collect();
        let temporals = candidates::parse_temporals(&value)
            .into_iter()
            .map(|mut t| {
                t.normalized = temporal::normalize(&t.expression, t.normalized.as_deref(), now);
                t
            })
            .collect();
        (sentiments, temporals)
    }

    /// Write a result into the graph.
    ///
    /// Each candidate resolves to its dedup target or a name match, else a
    /// new entity is created; every touched entity gets a timeline entry.
    /// A relationship already present with the same type is strengthened
    /// by the candidate's confidence instead of duplicated.
    pub async fn commit(
        &self,
        result: &ExtractionResult,
        source: &str,
        graph: &dyn GraphWriter,
    ) -> Result<CommitSummary, RecallError> {
        let mut summary = CommitSummary::default();
        let mut ids: HashMap<String, String> = HashMap::new();

        for candidate in &result.entities {
            let mut existing = match &candidate.existing_id {
                Some(id) => graph.get_entity(id).await?,
                None => None,
            };
            if existing.is_none() {
                existing = graph.find_entity_by_name(&candidate.name).await?;
            }
            let mut fuzzy = false;
            if existing.is_none() {
                existing = self.find_similar(graph, &candidate.name).await?;
                fuzzy = existing.is_some();
            }

            let id = match existing {
                Some(entity) => {
                    let update = EntityUpdate {
                        attributes: (!candidate.attributes.is_empty())
                            .then(|| candidate.attributes.clone()),
                        category: entity
                            .category
                            .is_none()
                            .then(|| candidate.category.clone())
                            .flatten(),
                        confidence: Some(entity.confidence.max(candidate.confidence)),
                        ..Default::default()
                    };
                    graph.update_entity(&entity.id, update).await?;
                    graph.record_mention(&entity.id, &result.excerpt, source).await?;
                    summary.entities_updated += 1;
                    entity.id
                }
                None => {
                    let mut new = NewEntity::new(candidate.entity_type, candidate.name.clone())
                        .with_confidence(candidate.confidence);
                    new.category = candidate.category.clone();
                    new.attributes = candidate.attributes.clone();
                    let entity = graph.add_entity(new).await?;
                    graph.append_timeline(&entity.id, &result.excerpt, source).await?;
                    summary.entities_created += 1;
                    entity.id
                }
            };
            if fuzzy {
                graph.add_alias(&id, &candidate.name).await?;
            }
            for alias in &candidate.aliases {
                graph.add_alias(&id, alias).await?;
                ids.insert(normalize_name(alias), id.clone());
            }
            ids.insert(normalize_name(&candidate.name), id.clone());
            summary.entity_ids.insert(candidate.name.clone(), id);
        }

        for rel in &result.relationships {
            let source_id = resolve(graph, &ids, &rel.source).await?;
            let target_id = resolve(graph, &ids, &rel.target).await?;
            let (Some(source_id), Some(target_id)) = (source_id, target_id) else {
                debug!(source = %rel.source, target = %rel.target, "relationship endpoint unresolved, skipping");
                summary.relationships_skipped += 1;
                continue;
            };
            if source_id == target_id {
                summary.relationships_skipped += 1;
                continue;
            }
            match graph
                .find_relationship(&source_id, &target_id, &rel.rel_type)
                .await?
            {
                Some(existing) => {
                    graph
                        .strengthen_relationship(&existing.id, rel.confidence)
                        .await?;
                    summary.relationships_strengthened += 1;
                }
                None => {
                    let mut new = NewRelationship::new(source_id, target_id, rel.rel_type.clone())
                        .with_context(rel.context.clone());
                    new.bidirectional = rel.bidirectional;
                    graph.add_relationship(new).await?;
                    summary.relationships_created += 1;
                }
            }
        }

        for sentiment in &result.sentiments {
            if let Some(id) = resolve(graph, &ids, &sentiment.entity).await? {
                let mut attributes = crate::types::Attributes::new();
                attributes.insert("sentiment".into(), json!(sentiment.polarity.as_str()));
                attributes.insert("sentiment_score".into(), json!(sentiment.score));
                graph
                    .update_entity(&id, EntityUpdate { attributes: Some(attributes), ..Default::default() })
                    .await?;
            }
        }
        for temporal in &result.temporals {
            let Some(entity) = &temporal.entity else {
                continue;
            };
            if let Some(id) = resolve(graph, &ids, entity).await? {
                let mut attributes = crate::types::Attributes::new();
                let when = temporal.normalized.as_deref().unwrap_or(&temporal.expression);
                attributes.insert("temporal".into(), json!(when));
                graph
                    .update_entity(&id, EntityUpdate { attributes: Some(attributes), ..Default::default() })
                    .await?;
            }
        }

        info!(
            source = %source,
            created = summary.entities_created,
            updated = summary.entities_updated,
            relationships = summary.relationships_created,
            strengthened = summary.relationships_strengthened,
            "extraction committed"
        );
        Ok(summary)
    }
}

impl EntityExtractor {
    /// Best stored entity whose name is a near-duplicate of `name`.
    ///
    /// Candidates come from a text search on the whole name and on each of
    /// its words, so spelling variants like "Acme Corp" reach "Acme Corporation".
    async fn find_similar(
        &self,
        graph: &dyn GraphWriter,
        name: &str,
    ) -> Result<Option<Entity>, RecallError> {
        let mut queries = vec![name.trim().to_string()];
        queries.extend(
            name.split_whitespace()
                .filter(|w| w.chars().count() > 2)
                .map(str::to_string),
        );
        queries.dedup();

        let mut best: Option<(f64, Entity)> = None;
        let mut seen = HashSet::new();
        for query in &queries {
            for entity in graph.find_entities(query, FUZZY_LOOKUP_LIMIT).await? {
                if !seen.insert(entity.id.clone()) {
                    continue;
                }
                let score = name_similarity(name, &entity.name);
                if score > self.config.dedup_threshold
                    && best.as_ref().is_none_or(|(top, _)| score > *top)
                {
                    best = Some((score, entity));
                }
            }
        }
        if let Some((score, entity)) = &best {
            debug!(candidate = %name, matched = %entity.name, score, "resolved near-duplicate entity");
        }
        Ok(best.map(|(_, entity)| entity))
    }
}

async fn resolve(
    graph: &dyn GraphWriter,
    ids: &HashMap<String, String>,
    name: &str,
) -> Result<Option<String>, RecallError> {
    if let Some(id) = ids.get(&normalize_name(name)) {
        return Ok(Some(id.clone()));
    }
    Ok(graph.find_entity_by_name(name).await?.map(|e| e.id))
}

/// Hex SHA-256 of the text, the extraction cache key.
pub fn content_hash(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// Substitute resolved names for pronoun mentions in entity names and
/// relationship endpoints (case-insensitive).
fn apply_coreferences(
    coreferences: &[Coreference],
    entities: &mut [EntityCandidate],
    relationships: &mut [RelationshipCandidate],
) {
    if coreferences.is_empty() {
        return;
    }
    let map: HashMap<String, &str> = coreferences
        .iter()
        .map(|c| (normalize_name(&c.mention), c.resolved.as_str()))
        .collect();
    let substitute = |name: &mut String| {
        if let Some(resolved) = map.get(&normalize_name(name)) {
            *name = (*resolved).to_string();
        }
    };
    for entity in entities.iter_mut() {
        substitute(&mut entity.name);
    }
    for rel in relationships.iter_mut() {
        substitute(&mut rel.source);
        substitute(&mut rel.target);
    }
}

fn remap_endpoints(
    relationships: Vec<RelationshipCandidate>,
    renames: &HashMap<String, String>,
) -> Vec<RelationshipCandidate> {
    relationships
        .into_iter()
        .map(|mut rel| {
            if let Some(name) = renames.get(&normalize_name(&rel.source)) {
                rel.source = name.clone();
            }
            if let Some(name) = renames.get(&normalize_name(&rel.target)) {
                rel.target = name.clone();
            }
            rel
        })
        .filter(|rel| normalize_name(&rel.source) != normalize_name(&rel.target))
        .collect()
}

#[cfg(test)]
mod tests;
