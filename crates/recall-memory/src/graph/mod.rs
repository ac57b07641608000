// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable entity graph: entities, aliases, tags, mention timeline and
//! weighted relationships, with FTS5 search and breadth-first traversal.
//!
//! All SQL runs on the single `tokio-rusqlite` background thread. Batch
//! writes run inside one transaction so a failure leaves no partial state.

pub mod importance;
pub(crate) mod sql;
pub mod traversal;
mod view;

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use recall_config::model::GraphConfig;
use recall_core::{Clock, RecallError};
use recall_storage::{map_tr_err, Database};
use rusqlite::{params, Connection};
use serde::Serialize;
use tokio_rusqlite::Connection as AsyncConnection;
use tracing::debug;
use uuid::Uuid;

pub use importance::ImportanceModel;
pub use view::{GraphReader, GraphWriter};

use crate::taxonomy;
use crate::text::contains_phrase;
use crate::types::{
    Alias, Entity, EntityType, EntityUpdate, NewEntity, NewRelationship, Relationship,
    RelationshipType, RelationshipUpdate, TimelineEntry,
};
use sql::{ENTITY_COLUMNS, RELATIONSHIP_COLUMNS};

/// Largest weight a relationship can hold.
pub const MAX_WEIGHT: f64 = 10.0;

/// Filter for [`GraphStore::list_entities`].
#[derive(Debug, Clone, Default)]
pub struct EntityFilter {
    pub entity_type: Option<EntityType>,
    /// `None` returns every match.
    pub limit: Option<usize>,
}

/// Entity set reached by BFS plus every relationship inside it.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Subgraph {
    pub entities: Vec<Entity>,
    pub relationships: Vec<Relationship>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectedEntity {
    pub id: String,
    pub name: String,
    pub connections: usize,
}

/// On-demand graph statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GraphStats {
    pub entity_count: usize,
    pub relationship_count: usize,
    pub alias_count: usize,
    pub tag_count: usize,
    pub avg_connections: f64,
    pub top_connected: Vec<ConnectedEntity>,
    pub entity_types: BTreeMap<String, usize>,
    pub relationship_types: BTreeMap<String, usize>,
}

/// Persistent knowledge graph.
pub struct GraphStore {
    db: Arc<Database>,
    clock: Arc<dyn Clock>,
    importance: ImportanceModel,
}

impl GraphStore {
    pub fn new(db: Arc<Database>, clock: Arc<dyn Clock>, config: &GraphConfig) -> Self {
        Self {
            db,
            clock,
            importance: ImportanceModel::new(config.importance_half_life_days),
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn importance_model(&self) -> ImportanceModel {
        self.importance
    }

    fn conn(&self) -> &AsyncConnection {
        self.db.connection()
    }

    // --- entities ---

    /// Create one entity. Its name is registered as its first alias.
    ///
    /// Alias collisions are dropped like any other: when the name is already
    /// an alias of another entity, the new entity starts with no aliases and
    /// is still found by [`find_entity_by_name`](Self::find_entity_by_name),
    /// which prefers exact names over aliases.
    pub async fn add_entity(&self, entity: NewEntity) -> Result<Entity, RecallError> {
        self.add_entities(vec![entity])
            .await?
            .pop()
            .ok_or_else(|| RecallError::Internal("entity insert returned no row".into()))
    }

    /// Create several entities in one transaction.
    pub async fn add_entities(&self, batch: Vec<NewEntity>) -> Result<Vec<Entity>, RecallError> {
        let now = self.clock.now();
        let mut entities = Vec::with_capacity(batch.len());
        for new in batch {
            let name = new.name.trim().to_string();
            if name.is_empty() {
                return Err(RecallError::Internal("entity name must not be empty".into()));
            }
            let confidence = new.confidence.clamp(0.0, 1.0);
            entities.push(Entity {
                id: Uuid::new_v4().to_string(),
                entity_type: new.entity_type,
                name,
                category: new.category,
                parent_id: new.parent_id,
                attributes: new.attributes,
                embedding: new.embedding,
                first_seen: now,
                last_seen: now,
                mention_count: 1,
                confidence,
                importance: self.importance.score(1, 0, 0, confidence),
            });
        }

        let now_ms = now.timestamp_millis();
        let entities = self
            .conn()
            .call(move |conn| -> Result<Vec<Entity>, rusqlite::Error> {
                let tx = conn.transaction()?;
                for entity in &entities {
                    sql::insert_entity(&tx, entity)?;
                    sql::insert_alias(&tx, &entity.id, &entity.name, now_ms)?;
                }
                tx.commit()?;
                Ok(entities)
            })
            .await
            .map_err(map_tr_err)?;
        debug!(count = entities.len(), "entities added");
        Ok(entities)
    }

    pub async fn get_entity(&self, id: &str) -> Result<Option<Entity>, RecallError> {
        let id = id.to_string();
        self.conn()
            .call(move |conn| -> Result<Option<Entity>, rusqlite::Error> {
                sql::get_entity(conn, &id)
            })
            .await
            .map_err(map_tr_err)
    }

    /// Apply a partial update. A changed name is also registered as an alias.
    pub async fn update_entity(&self, id: &str, update: EntityUpdate) -> Result<Entity, RecallError> {
        let id = id.to_string();
        let model = self.importance;
        let now_ms = self.clock.now_millis();
        let key = id.clone();
        self.conn()
            .call(move |conn| -> Result<Option<Entity>, rusqlite::Error> {
                let tx = conn.transaction()?;
                let Some(mut entity) = sql::get_entity(&tx, &key)? else {
                    return Ok(None);
                };
                let renamed = apply_entity_update(&mut entity, update);
                sql::write_entity(&tx, &entity)?;
                if renamed {
                    sql::insert_alias(&tx, &entity.id, &entity.name, now_ms)?;
                }
                sql::refresh_importance(&tx, &entity.id, &model, now_ms)?;
                let updated = sql::get_entity(&tx, &key)?;
                tx.commit()?;
                Ok(updated)
            })
            .await
            .map_err(map_tr_err)?
            .ok_or_else(|| RecallError::entity_not_found(id))
    }

    /// Delete an entity with its aliases, tags, timeline and relationships.
    ///
    /// Returns false when no such entity existed.
    pub async fn delete_entity(&self, id: &str) -> Result<bool, RecallError> {
        let id = id.to_string();
        let model = self.importance;
        let now_ms = self.clock.now_millis();
        self.conn()
            .call(move |conn| -> Result<bool, rusqlite::Error> {
                let tx = conn.transaction()?;
                let touched: Vec<String> = sql::neighbors(&tx, &id)?
                    .into_iter()
                    .map(|(n, _)| n)
                    .collect();
                let deleted = tx.execute("DELETE FROM entities WHERE id = ?1", params![id])? > 0;
                for neighbor in touched {
                    sql::refresh_importance(&tx, &neighbor, &model, now_ms)?;
                }
                tx.commit()?;
                Ok(deleted)
            })
            .await
            .map_err(map_tr_err)
    }

    /// Full-text search over names and attributes.
    ///
    /// An FTS query error or an empty FTS result falls back to a
    /// case-insensitive substring match on names and aliases.
    pub async fn find_entities(&self, query: &str, limit: usize) -> Result<Vec<Entity>, RecallError> {
        let query = query.trim().to_string();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        self.conn()
            .call(move |conn| -> Result<Vec<Entity>, rusqlite::Error> {
                match fts_entities(conn, &query, limit) {
                    Ok(found) if !found.is_empty() => return Ok(found),
                    Ok(_) => {}
                    Err(e) => debug!(error = %e, query = %query, "entity FTS query failed, using substring match"),
                }
                like_entities(conn, &query, limit)
            })
            .await
            .map_err(map_tr_err)
    }

    /// Exact case-insensitive name match, then alias lookup.
    pub async fn find_entity_by_name(&self, name: &str) -> Result<Option<Entity>, RecallError> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Ok(None);
        }
        self.conn()
            .call(move |conn| -> Result<Option<Entity>, rusqlite::Error> {
                use rusqlite::OptionalExtension;
                let by_name = conn
                    .query_row(
                        &format!(
                            "SELECT {ENTITY_COLUMNS} FROM entities e WHERE e.name = ?1 COLLATE NOCASE ORDER BY e.importance DESC LIMIT 1"
                        ),
                        params![name],
                        sql::row_to_entity,
                    )
                    .optional()?;
                if by_name.is_some() {
                    return Ok(by_name);
                }
                conn.query_row(
                    &format!(
                        "SELECT {ENTITY_COLUMNS} FROM entity_aliases a JOIN entities e ON e.id = a.entity_id WHERE a.alias = ?1"
                    ),
                    params![name],
                    sql::row_to_entity,
                )
                .optional()
            })
            .await
            .map_err(map_tr_err)
    }

    /// Entities ordered by importance, highest first.
    pub async fn list_entities(&self, filter: EntityFilter) -> Result<Vec<Entity>, RecallError> {
        self.conn()
            .call(move |conn| -> Result<Vec<Entity>, rusqlite::Error> {
                let limit = filter.limit.map_or(-1, |l| l as i64);
                let type_str = filter.entity_type.map(|t| t.as_str());
                let mut stmt = conn.prepare(&format!(
                    "SELECT {ENTITY_COLUMNS} FROM entities e WHERE (?1 IS NULL OR e.entity_type = ?1) ORDER BY e.importance DESC, e.name LIMIT ?2"
                ))?;
                let entities = stmt
                    .query_map(params![type_str, limit], sql::row_to_entity)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(entities)
            })
            .await
            .map_err(map_tr_err)
    }

    /// Count one more mention: bumps `mention_count`, sets `last_seen`, logs the mention.
    pub async fn record_mention(
        &self,
        id: &str,
        context: &str,
        source: &str,
    ) -> Result<Entity, RecallError> {
        let id = id.to_string();
        let key = id.clone();
        let context = context.to_string();
        let source = source.to_string();
        let model = self.importance;
        let now_ms = self.clock.now_millis();
        self.conn()
            .call(move |conn| -> Result<Option<Entity>, rusqlite::Error> {
                let tx = conn.transaction()?;
                let changed = tx.execute(
                    "UPDATE entities SET mention_count = mention_count + 1, last_seen = ?2 WHERE id = ?1",
                    params![key, now_ms],
                )?;
                if changed == 0 {
                    return Ok(None);
                }
                sql::insert_timeline(&tx, &key, now_ms, &context, &source)?;
                sql::refresh_importance(&tx, &key, &model, now_ms)?;
                let entity = sql::get_entity(&tx, &key)?;
                tx.commit()?;
                Ok(entity)
            })
            .await
            .map_err(map_tr_err)?
            .ok_or_else(|| RecallError::entity_not_found(id))
    }

    /// Log a mention without counting it, e.g. the first sighting of a new entity.
    pub async fn append_timeline(&self, id: &str, context: &str, source: &str) -> Result<(), RecallError> {
        let id = id.to_string();
        let key = id.clone();
        let context = context.to_string();
        let source = source.to_string();
        let now_ms = self.clock.now_millis();
        let found = self
            .conn()
            .call(move |conn| -> Result<bool, rusqlite::Error> {
                if !sql::entity_exists(conn, &key)? {
                    return Ok(false);
                }
                sql::insert_timeline(conn, &key, now_ms, &context, &source)?;
                Ok(true)
            })
            .await
            .map_err(map_tr_err)?;
        if found {
            Ok(())
        } else {
            Err(RecallError::entity_not_found(id))
        }
    }

    /// Mention history, newest first.
    pub async fn get_timeline(&self, id: &str, limit: usize) -> Result<Vec<TimelineEntry>, RecallError> {
        let id = id.to_string();
        self.conn()
            .call(move |conn| -> Result<Vec<TimelineEntry>, rusqlite::Error> {
                sql::timeline_of(conn, &id, limit)
            })
            .await
            .map_err(map_tr_err)
    }

    /// Recompute every entity's importance against the current clock.
    pub async fn refresh_all_importance(&self) -> Result<usize, RecallError> {
        let model = self.importance;
        let now_ms = self.clock.now_millis();
        self.conn()
            .call(move |conn| -> Result<usize, rusqlite::Error> {
                let tx = conn.transaction()?;
                let ids: Vec<String> = {
                    let mut stmt = tx.prepare("SELECT id FROM entities")?;
                    let ids = stmt
                        .query_map([], |row| row.get(0))?
                        .collect::<Result<Vec<_>, _>>()?;
                    ids
                };
                for id in &ids {
                    sql::refresh_importance(&tx, id, &model, now_ms)?;
                }
                tx.commit()?;
                Ok(ids.len())
            })
            .await
            .map_err(map_tr_err)
    }

    // --- aliases ---

    /// Register an alias. Returns false when it is already taken by any entity.
    pub async fn add_alias(&self, entity_id: &str, alias: &str) -> Result<bool, RecallError> {
        let id = entity_id.to_string();
        let key = id.clone();
        let alias = alias.to_string();
        let now_ms = self.clock.now_millis();
        self.conn()
            .call(move |conn| -> Result<Option<bool>, rusqlite::Error> {
                if !sql::entity_exists(conn, &key)? {
                    return Ok(None);
                }
                sql::insert_alias(conn, &key, &alias, now_ms).map(Some)
            })
            .await
            .map_err(map_tr_err)?
            .ok_or_else(|| RecallError::entity_not_found(id))
    }

    pub async fn get_aliases(&self, entity_id: &str) -> Result<Vec<Alias>, RecallError> {
        let id = entity_id.to_string();
        self.conn()
            .call(move |conn| -> Result<Vec<Alias>, rusqlite::Error> { sql::aliases_of(conn, &id) })
            .await
            .map_err(map_tr_err)
    }

    /// Remove an alias. The entity's canonical name cannot be removed.
    pub async fn remove_alias(&self, entity_id: &str, alias: &str) -> Result<bool, RecallError> {
        let id = entity_id.to_string();
        let alias = alias.trim().to_string();
        self.conn()
            .call(move |conn| -> Result<bool, rusqlite::Error> {
                let removed = conn.execute(
                    "DELETE FROM entity_aliases WHERE entity_id = ?1 AND alias = ?2 AND alias != (SELECT name FROM entities WHERE id = ?1)",
                    params![id, alias],
                )?;
                Ok(removed > 0)
            })
            .await
            .map_err(map_tr_err)
    }

    // --- tags ---

    /// Attach a tag (stored lowercased). Returns false if it was already present.
    pub async fn add_tag(&self, entity_id: &str, tag: &str) -> Result<bool, RecallError> {
        let id = entity_id.to_string();
        let key = id.clone();
        let tag = tag.trim().to_lowercase();
        if tag.is_empty() {
            return Ok(false);
        }
        self.conn()
            .call(move |conn| -> Result<Option<bool>, rusqlite::Error> {
                if !sql::entity_exists(conn, &key)? {
                    return Ok(None);
                }
                let added = conn.execute(
                    "INSERT OR IGNORE INTO entity_tags (entity_id, tag) VALUES (?1, ?2)",
                    params![key, tag],
                )?;
                Ok(Some(added == 1))
            })
            .await
            .map_err(map_tr_err)?
            .ok_or_else(|| RecallError::entity_not_found(id))
    }

    pub async fn remove_tag(&self, entity_id: &str, tag: &str) -> Result<bool, RecallError> {
        let id = entity_id.to_string();
        let tag = tag.trim().to_lowercase();
        self.conn()
            .call(move |conn| -> Result<bool, rusqlite::Error> {
                let removed = conn.execute(
                    "DELETE FROM entity_tags WHERE entity_id = ?1 AND tag = ?2",
                    params![id, tag],
                )?;
                Ok(removed > 0)
            })
            .await
            .map_err(map_tr_err)
    }

    pub async fn get_tags(&self, entity_id: &str) -> Result<Vec<String>, RecallError> {
        let id = entity_id.to_string();
        self.conn()
            .call(move |conn| -> Result<Vec<String>, rusqlite::Error> {
                let mut stmt =
                    conn.prepare("SELECT tag FROM entity_tags WHERE entity_id = ?1 ORDER BY tag")?;
                let tags = stmt
                    .query_map(params![id], |row| row.get(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(tags)
            })
            .await
            .map_err(map_tr_err)
    }

    pub async fn find_entities_by_tag(&self, tag: &str) -> Result<Vec<Entity>, RecallError> {
        let tag = tag.trim().to_lowercase();
        self.conn()
            .call(move |conn| -> Result<Vec<Entity>, rusqlite::Error> {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {ENTITY_COLUMNS} FROM entity_tags t JOIN entities e ON e.id = t.entity_id WHERE t.tag = ?1 ORDER BY e.importance DESC"
                ))?;
                let entities = stmt
                    .query_map(params![tag], sql::row_to_entity)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(entities)
            })
            .await
            .map_err(map_tr_err)
    }

    // --- relationships ---

    pub async fn add_relationship(&self, rel: NewRelationship) -> Result<Relationship, RecallError> {
        self.add_relationships(vec![rel])
            .await?
            .pop()
            .ok_or_else(|| RecallError::Internal("relationship insert returned no row".into()))
    }

    /// Create several relationships in one transaction.
    ///
    /// Fails with `NotFound` (and writes nothing) if any endpoint is missing.
    pub async fn add_relationships(
        &self,
        batch: Vec<NewRelationship>,
    ) -> Result<Vec<Relationship>, RecallError> {
        let now = self.clock.now();
        let rels: Vec<Relationship> = batch
            .into_iter()
            .map(|new| {
                let bidirectional = new
                    .bidirectional
                    .unwrap_or_else(|| taxonomy::meta(&new.rel_type).bidirectional);
                Relationship {
                    id: Uuid::new_v4().to_string(),
                    source_id: new.source_id,
                    target_id: new.target_id,
                    rel_type: new.rel_type,
                    weight: new.weight.clamp(0.0, MAX_WEIGHT),
                    context: new.context,
                    timestamp: now,
                    start_date: new.start_date,
                    end_date: new.end_date,
                    bidirectional,
                }
            })
            .collect();

        let model = self.importance;
        let now_ms = now.timestamp_millis();
        let outcome = self
            .conn()
            .call(move |conn| -> Result<Result<Vec<Relationship>, String>, rusqlite::Error> {
                let tx = conn.transaction()?;
                let mut touched = HashSet::new();
                for rel in &rels {
                    for endpoint in [&rel.source_id, &rel.target_id] {
                        if !sql::entity_exists(&tx, endpoint)? {
                            return Ok(Err(endpoint.clone()));
                        }
                    }
                    sql::insert_relationship(&tx, rel)?;
                    touched.insert(rel.source_id.clone());
                    touched.insert(rel.target_id.clone());
                }
                for id in &touched {
                    sql::refresh_importance(&tx, id, &model, now_ms)?;
                }
                tx.commit()?;
                Ok(Ok(rels))
            })
            .await
            .map_err(map_tr_err)?;
        outcome.map_err(RecallError::entity_not_found)
    }

    pub async fn get_relationship(&self, id: &str) -> Result<Option<Relationship>, RecallError> {
        let id = id.to_string();
        self.conn()
            .call(move |conn| -> Result<Option<Relationship>, rusqlite::Error> {
                sql::get_relationship(conn, &id)
            })
            .await
            .map_err(map_tr_err)
    }

    /// Relationships touching an entity in either direction, strongest first.
    pub async fn get_relationships(&self, entity_id: &str) -> Result<Vec<Relationship>, RecallError> {
        let id = entity_id.to_string();
        self.conn()
            .call(move |conn| -> Result<Vec<Relationship>, rusqlite::Error> {
                sql::relationships_of(conn, &id)
            })
            .await
            .map_err(map_tr_err)
    }

    /// The strongest direct relationship between two entities, either direction.
    pub async fn get_relationship_between(
        &self,
        a: &str,
        b: &str,
    ) -> Result<Option<Relationship>, RecallError> {
        Ok(self.get_relationships_between(a, b).await?.into_iter().next())
    }

    /// Every direct relationship between two entities, strongest first.
    pub async fn get_relationships_between(
        &self,
        a: &str,
        b: &str,
    ) -> Result<Vec<Relationship>, RecallError> {
        let (a, b) = (a.to_string(), b.to_string());
        self.conn()
            .call(move |conn| -> Result<Vec<Relationship>, rusqlite::Error> {
                sql::relationships_between(conn, &a, &b)
            })
            .await
            .map_err(map_tr_err)
    }

    /// A relationship of `rel_type` from `source` to `target`, or the reverse
    /// when that edge is bidirectional.
    pub async fn find_relationship(
        &self,
        source: &str,
        target: &str,
        rel_type: &RelationshipType,
    ) -> Result<Option<Relationship>, RecallError> {
        let found = self
            .get_relationships_between(source, target)
            .await?
            .into_iter()
            .find(|r| {
                &r.rel_type == rel_type
                    && (r.source_id == source || r.bidirectional)
            });
        Ok(found)
    }

    pub async fn update_relationship(
        &self,
        id: &str,
        update: RelationshipUpdate,
    ) -> Result<Relationship, RecallError> {
        let id = id.to_string();
        let key = id.clone();
        let model = self.importance;
        let now = self.clock.now();
        self.conn()
            .call(move |conn| -> Result<Option<Relationship>, rusqlite::Error> {
                let tx = conn.transaction()?;
                let Some(mut rel) = sql::get_relationship(&tx, &key)? else {
                    return Ok(None);
                };
                if let Some(rel_type) = update.rel_type {
                    rel.rel_type = rel_type;
                }
                if let Some(weight) = update.weight {
                    rel.weight = weight.clamp(0.0, MAX_WEIGHT);
                }
                if let Some(context) = update.context {
                    rel.context = context;
                }
                if update.start_date.is_some() {
                    rel.start_date = update.start_date;
                }
                if update.end_date.is_some() {
                    rel.end_date = update.end_date;
                }
                if let Some(bidirectional) = update.bidirectional {
                    rel.bidirectional = bidirectional;
                }
                if update.touch {
                    rel.timestamp = now;
                }
                sql::write_relationship(&tx, &rel)?;
                let now_ms = now.timestamp_millis();
                sql::refresh_importance(&tx, &rel.source_id, &model, now_ms)?;
                sql::refresh_importance(&tx, &rel.target_id, &model, now_ms)?;
                tx.commit()?;
                Ok(Some(rel))
            })
            .await
            .map_err(map_tr_err)?
            .ok_or_else(|| RecallError::relationship_not_found(id))
    }

    /// Add `delta` to a relationship's weight, clamped to `[0, MAX_WEIGHT]`,
    /// and refresh its timestamp.
    pub async fn adjust_weight(&self, id: &str, delta: f64) -> Result<Relationship, RecallError> {
        let current = self
            .get_relationship(id)
            .await?
            .ok_or_else(|| RecallError::relationship_not_found(id))?;
        self.update_relationship(
            id,
            RelationshipUpdate {
                weight: Some(current.weight + delta),
                touch: true,
                ..Default::default()
            },
        )
        .await
    }

    pub async fn delete_relationship(&self, id: &str) -> Result<bool, RecallError> {
        let id = id.to_string();
        let model = self.importance;
        let now_ms = self.clock.now_millis();
        self.conn()
            .call(move |conn| -> Result<bool, rusqlite::Error> {
                let tx = conn.transaction()?;
                let Some(rel) = sql::get_relationship(&tx, &id)? else {
                    return Ok(false);
                };
                tx.execute("DELETE FROM relationships WHERE id = ?1", params![id])?;
                sql::refresh_importance(&tx, &rel.source_id, &model, now_ms)?;
                sql::refresh_importance(&tx, &rel.target_id, &model, now_ms)?;
                tx.commit()?;
                Ok(true)
            })
            .await
            .map_err(map_tr_err)
    }

    /// Set new weights and delete relationships in one transaction.
    ///
    /// Reweighted relationships get a fresh timestamp so the next pass decays
    /// from now.
    pub async fn apply_weight_changes(
        &self,
        reweighted: Vec<(String, f64)>,
        removed: Vec<String>,
    ) -> Result<(), RecallError> {
        let model = self.importance;
        let now_ms = self.clock.now_millis();
        self.conn()
            .call(move |conn| -> Result<(), rusqlite::Error> {
                let tx = conn.transaction()?;
                let mut touched = HashSet::new();
                for (id, weight) in &reweighted {
                    tx.execute(
                        "UPDATE relationships SET weight = ?2, timestamp = ?3 WHERE id = ?1",
                        params![id, weight.clamp(0.0, MAX_WEIGHT), now_ms],
                    )?;
                }
                for id in &removed {
                    if let Some(rel) = sql::get_relationship(&tx, id)? {
                        tx.execute("DELETE FROM relationships WHERE id = ?1", params![id])?;
                        touched.insert(rel.source_id);
                        touched.insert(rel.target_id);
                    }
                }
                for id in &touched {
                    sql::refresh_importance(&tx, id, &model, now_ms)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    /// Every relationship, each exactly once.
    pub async fn all_relationships(&self) -> Result<Vec<Relationship>, RecallError> {
        self.conn()
            .call(move |conn| -> Result<Vec<Relationship>, rusqlite::Error> {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {RELATIONSHIP_COLUMNS} FROM relationships r ORDER BY r.timestamp"
                ))?;
                let rels = stmt
                    .query_map([], sql::row_to_relationship)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rels)
            })
            .await
            .map_err(map_tr_err)
    }

    // --- traversal ---

    /// Entities within `depth` hops in the undirected view, excluding the seed,
    /// nearest first.
    pub async fn get_connected_entities(&self, id: &str, depth: usize) -> Result<Vec<Entity>, RecallError> {
        let id = id.to_string();
        self.conn()
            .call(move |conn| -> Result<Vec<Entity>, rusqlite::Error> {
                let conn: &Connection = conn;
                let ids = traversal::reachable(&id, depth, |n| sql::neighbors(conn, n))?;
                sql::entities_by_ids(conn, &ids)
            })
            .await
            .map_err(map_tr_err)
    }

    /// Fewest-hop id path between two entities, or `None` beyond `max_depth`.
    pub async fn shortest_path(
        &self,
        from: &str,
        to: &str,
        max_depth: usize,
    ) -> Result<Option<Vec<String>>, RecallError> {
        let (from, to) = (from.to_string(), to.to_string());
        self.conn()
            .call(move |conn| -> Result<Option<Vec<String>>, rusqlite::Error> {
                let conn: &Connection = conn;
                traversal::shortest_path(&from, &to, max_depth, |n| sql::neighbors(conn, n))
            })
            .await
            .map_err(map_tr_err)
    }

    /// The seed, everything within `depth` hops, and the relationships among them.
    pub async fn get_subgraph(&self, id: &str, depth: usize) -> Result<Subgraph, RecallError> {
        let id = id.to_string();
        self.conn()
            .call(move |conn| -> Result<Subgraph, rusqlite::Error> {
                let conn: &Connection = conn;
                if !sql::entity_exists(conn, &id)? {
                    return Ok(Subgraph::default());
                }
                let mut ids = vec![id.clone()];
                ids.extend(traversal::reachable(&id, depth, |n| sql::neighbors(conn, n))?);
                let inside: HashSet<&String> = ids.iter().collect();

                let mut seen = HashSet::new();
                let mut relationships = Vec::new();
                for member in &ids {
                    for rel in sql::relationships_of(conn, member)? {
                        if inside.contains(&rel.source_id)
                            && inside.contains(&rel.target_id)
                            && seen.insert(rel.id.clone())
                        {
                            relationships.push(rel);
                        }
                    }
                }
                Ok(Subgraph {
                    entities: sql::entities_by_ids(conn, &ids)?,
                    relationships,
                })
            })
            .await
            .map_err(map_tr_err)
    }

    /// Greedy weighted cluster grown from `id` (seed first). Empty for an unknown seed.
    pub async fn get_cluster(&self, id: &str, max_size: usize) -> Result<Vec<Entity>, RecallError> {
        let id = id.to_string();
        self.conn()
            .call(move |conn| -> Result<Vec<Entity>, rusqlite::Error> {
                let conn: &Connection = conn;
                if !sql::entity_exists(conn, &id)? {
                    return Ok(Vec::new());
                }
                let ids = traversal::greedy_cluster(&id, max_size, |n| sql::neighbors(conn, n))?;
                sql::entities_by_ids(conn, &ids)
            })
            .await
            .map_err(map_tr_err)
    }

    /// Entities whose name or an alias appears as a phrase in `text`.
    pub async fn entities_mentioned_in(&self, text: &str) -> Result<Vec<Entity>, RecallError> {
        let text = text.to_lowercase();
        self.conn()
            .call(move |conn| -> Result<Vec<Entity>, rusqlite::Error> {
                let names: Vec<(String, String)> = {
                    let mut stmt = conn.prepare(
                        "SELECT id, name FROM entities UNION SELECT entity_id, alias FROM entity_aliases",
                    )?;
                    let names = stmt
                        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                        .collect::<Result<Vec<_>, _>>()?;
                    names
                };
                let mut seen = HashSet::new();
                let ids: Vec<String> = names
                    .into_iter()
                    .filter(|(_, name)| name.chars().count() > 1 && contains_phrase(&text, name))
                    .filter_map(|(id, _)| seen.insert(id.clone()).then_some(id))
                    .collect();
                let mut entities = sql::entities_by_ids(conn, &ids)?;
                entities.sort_by(|a, b| {
                    b.importance
                        .partial_cmp(&a.importance)
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
                Ok(entities)
            })
            .await
            .map_err(map_tr_err)
    }

    // --- statistics ---

    pub async fn stats(&self) -> Result<GraphStats, RecallError> {
        self.conn()
            .call(move |conn| -> Result<GraphStats, rusqlite::Error> {
                let entity_count = sql::count(conn, "SELECT COUNT(*) FROM entities")?;
                let relationship_count = sql::count(conn, "SELECT COUNT(*) FROM relationships")?;
                let alias_count = sql::count(conn, "SELECT COUNT(*) FROM entity_aliases")?;
                let tag_count = sql::count(conn, "SELECT COUNT(*) FROM entity_tags")?;
                let avg_connections = if entity_count == 0 {
                    0.0
                } else {
                    2.0 * relationship_count as f64 / entity_count as f64
                };

                let top_connected = {
                    let mut stmt = conn.prepare(
                        "SELECT e.id, e.name, COUNT(r.id) AS c FROM entities e JOIN relationships r ON r.source_id = e.id OR r.target_id = e.id GROUP BY e.id ORDER BY c DESC, e.name LIMIT 10",
                    )?;
                    let top = stmt
                        .query_map([], |row| {
                            Ok(ConnectedEntity {
                                id: row.get(0)?,
                                name: row.get(1)?,
                                connections: row.get::<_, i64>(2)? as usize,
                            })
                        })?
                        .collect::<Result<Vec<_>, _>>()?;
                    top
                };

                Ok(GraphStats {
                    entity_count,
                    relationship_count,
                    alias_count,
                    tag_count,
                    avg_connections,
                    top_connected,
                    entity_types: distribution(
                        conn,
                        "SELECT entity_type, COUNT(*) FROM entities GROUP BY entity_type",
                    )?,
                    relationship_types: distribution(
                        conn,
                        "SELECT rel_type, COUNT(*) FROM relationships GROUP BY rel_type",
                    )?,
                })
            })
            .await
            .map_err(map_tr_err)
    }
}

/// Apply `update` in place. Returns true when the name changed.
fn apply_entity_update(entity: &mut Entity, update: EntityUpdate) -> bool {
    let mut renamed = false;
    if let Some(name) = update.name {
        let name = name.trim();
        if !name.is_empty() && name != entity.name {
            entity.name = name.to_string();
            renamed = true;
        }
    }
    if let Some(entity_type) = update.entity_type {
        entity.entity_type = entity_type;
    }
    if update.category.is_some() {
        entity.category = update.category;
    }
    if update.parent_id.is_some() {
        entity.parent_id = update.parent_id;
    }
    if let Some(attributes) = update.attributes {
        for (key, value) in attributes {
            if value.is_null() {
                entity.attributes.remove(&key);
            } else {
                entity.attributes.insert(key, value);
            }
        }
    }
    if update.embedding.is_some() {
        entity.embedding = update.embedding;
    }
    if let Some(confidence) = update.confidence {
        entity.confidence = confidence.clamp(0.0, 1.0);
    }
    renamed
}

fn fts_entities(conn: &Connection, query: &str, limit: usize) -> rusqlite::Result<Vec<Entity>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ENTITY_COLUMNS} FROM entities_fts JOIN entities e ON e.rowid = entities_fts.rowid WHERE entities_fts MATCH ?1 ORDER BY bm25(entities_fts) LIMIT ?2"
    ))?;
    let found = stmt
        .query_map(params![query, limit as i64], sql::row_to_entity)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(found)
}

fn like_entities(conn: &Connection, query: &str, limit: usize) -> rusqlite::Result<Vec<Entity>> {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    let pattern = format!("%{escaped}%");
    let mut stmt = conn.prepare(&format!(
        "SELECT {ENTITY_COLUMNS} FROM entities e WHERE e.name LIKE ?1 ESCAPE '\\' OR e.id IN (SELECT entity_id FROM entity_aliases WHERE alias LIKE ?1 ESCAPE '\\') ORDER BY e.importance DESC, e.name LIMIT ?2"
    ))?;
    let found = stmt
        .query_map(params![pattern, limit as i64], sql::row_to_entity)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(found)
}

fn distribution(conn: &Connection, query: &str) -> rusqlite::Result<BTreeMap<String, usize>> {
    let mut stmt = conn.prepare(query)?;
    let rows = stmt
        .query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize))
        })?
        .collect::<Result<BTreeMap<_, _>, _>>()?;
    Ok(rows)
}
