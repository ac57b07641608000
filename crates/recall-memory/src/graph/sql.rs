// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Synchronous SQL helpers run inside `tokio-rusqlite` closures.
//!
//! Every function takes a plain `&rusqlite::Connection` so it works equally
//! on a connection and on an open transaction.

use recall_core::clock::from_millis;
use recall_storage::{blob_to_vec, vec_to_blob};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::importance::ImportanceModel;
use crate::types::{
    Alias, Attributes, Entity, EntityType, Relationship, RelationshipType, TimelineEntry,
};

pub(crate) const ENTITY_COLUMNS: &str = "e.id, e.entity_type, e.name, e.category, e.parent_id, e.attributes, e.embedding, e.first_seen, e.last_seen, e.mention_count, e.confidence, e.importance";

pub(crate) const RELATIONSHIP_COLUMNS: &str = "r.id, r.source_id, r.target_id, r.rel_type, r.weight, r.context, r.timestamp, r.start_date, r.end_date, r.bidirectional";

pub(crate) fn parse_attributes(raw: &str) -> Attributes {
    serde_json::from_str(raw).unwrap_or_default()
}

pub(crate) fn attributes_json(attributes: &Attributes) -> String {
    serde_json::Value::Object(attributes.clone()).to_string()
}

pub(crate) fn row_to_entity(row: &Row) -> rusqlite::Result<Entity> {
    let entity_type: String = row.get(1)?;
    let attributes: String = row.get(5)?;
    let embedding: Option<Vec<u8>> = row.get(6)?;
    Ok(Entity {
        id: row.get(0)?,
        entity_type: EntityType::from_str_value(&entity_type),
        name: row.get(2)?,
        category: row.get(3)?,
        parent_id: row.get(4)?,
        attributes: parse_attributes(&attributes),
        embedding: embedding.map(|blob| blob_to_vec(&blob)),
        first_seen: from_millis(row.get(7)?),
        last_seen: from_millis(row.get(8)?),
        mention_count: row.get(9)?,
        confidence: row.get(10)?,
        importance: row.get(11)?,
    })
}

pub(crate) fn row_to_relationship(row: &Row) -> rusqlite::Result<Relationship> {
    let rel_type: String = row.get(3)?;
    Ok(Relationship {
        id: row.get(0)?,
        source_id: row.get(1)?,
        target_id: row.get(2)?,
        rel_type: RelationshipType::from_str_value(&rel_type),
        weight: row.get(4)?,
        context: row.get(5)?,
        timestamp: from_millis(row.get(6)?),
        start_date: row.get(7)?,
        end_date: row.get(8)?,
        bidirectional: row.get(9)?,
    })
}

pub(crate) fn insert_entity(conn: &Connection, e: &Entity) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO entities (id, entity_type, name, category, parent_id, attributes, embedding, first_seen, last_seen, mention_count, confidence, importance) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            e.id,
            e.entity_type.as_str(),
            e.name,
            e.category,
            e.parent_id,
            attributes_json(&e.attributes),
            e.embedding.as_deref().map(vec_to_blob),
            e.first_seen.timestamp_millis(),
            e.last_seen.timestamp_millis(),
            e.mention_count,
            e.confidence,
            e.importance,
        ],
    )?;
    Ok(())
}

/// Overwrite every mutable column of an existing entity row.
pub(crate) fn write_entity(conn: &Connection, e: &Entity) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE entities SET entity_type = ?2, name = ?3, category = ?4, parent_id = ?5, attributes = ?6, embedding = ?7, last_seen = ?8, mention_count = ?9, confidence = ?10 WHERE id = ?1",
        params![
            e.id,
            e.entity_type.as_str(),
            e.name,
            e.category,
            e.parent_id,
            attributes_json(&e.attributes),
            e.embedding.as_deref().map(vec_to_blob),
            e.last_seen.timestamp_millis(),
            e.mention_count,
            e.confidence,
        ],
    )?;
    Ok(())
}

pub(crate) fn get_entity(conn: &Connection, id: &str) -> rusqlite::Result<Option<Entity>> {
    conn.query_row(
        &format!("SELECT {ENTITY_COLUMNS} FROM entities e WHERE e.id = ?1"),
        params![id],
        row_to_entity,
    )
    .optional()
}

pub(crate) fn entity_exists(conn: &Connection, id: &str) -> rusqlite::Result<bool> {
    conn.query_row("SELECT 1 FROM entities WHERE id = ?1", params![id], |_| Ok(()))
        .optional()
        .map(|found| found.is_some())
}

/// Fetch entities by id, preserving the order of `ids` and skipping misses.
pub(crate) fn entities_by_ids(conn: &Connection, ids: &[String]) -> rusqlite::Result<Vec<Entity>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {ENTITY_COLUMNS} FROM entities e WHERE e.id = ?1"
    ))?;
    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(entity) = stmt.query_row(params![id], row_to_entity).optional()? {
            out.push(entity);
        }
    }
    Ok(out)
}

/// Register an alias. Returns false when the alias is blank or already taken.
pub(crate) fn insert_alias(
    conn: &Connection,
    entity_id: &str,
    alias: &str,
    now_ms: i64,
) -> rusqlite::Result<bool> {
    let alias = alias.trim();
    if alias.is_empty() {
        return Ok(false);
    }
    let changed = conn.execute(
        "INSERT OR IGNORE INTO entity_aliases (id, entity_id, alias, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![Uuid::new_v4().to_string(), entity_id, alias, now_ms],
    )?;
    Ok(changed == 1)
}

pub(crate) fn aliases_of(conn: &Connection, entity_id: &str) -> rusqlite::Result<Vec<Alias>> {
    let mut stmt = conn.prepare(
        "SELECT id, entity_id, alias, created_at FROM entity_aliases WHERE entity_id = ?1 ORDER BY created_at, alias",
    )?;
    let aliases = stmt
        .query_map(params![entity_id], |row| {
            Ok(Alias {
                id: row.get(0)?,
                entity_id: row.get(1)?,
                alias: row.get(2)?,
                created_at: from_millis(row.get(3)?),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(aliases)
}

pub(crate) fn insert_timeline(
    conn: &Connection,
    entity_id: &str,
    timestamp_ms: i64,
    context: &str,
    source: &str,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO entity_timeline (entity_id, timestamp, context, source) VALUES (?1, ?2, ?3, ?4)",
        params![entity_id, timestamp_ms, context, source],
    )?;
    Ok(())
}

pub(crate) fn timeline_of(
    conn: &Connection,
    entity_id: &str,
    limit: usize,
) -> rusqlite::Result<Vec<TimelineEntry>> {
    let mut stmt = conn.prepare(
        "SELECT entity_id, timestamp, context, source FROM entity_timeline WHERE entity_id = ?1 ORDER BY timestamp DESC, id DESC LIMIT ?2",
    )?;
    let entries = stmt
        .query_map(params![entity_id, limit as i64], |row| {
            Ok(TimelineEntry {
                entity_id: row.get(0)?,
                timestamp: from_millis(row.get(1)?),
                context: row.get(2)?,
                source: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entries)
}

pub(crate) fn insert_relationship(conn: &Connection, r: &Relationship) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO relationships (id, source_id, target_id, rel_type, weight, context, timestamp, start_date, end_date, bidirectional) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            r.id,
            r.source_id,
            r.target_id,
            r.rel_type.as_str(),
            r.weight,
            r.context,
            r.timestamp.timestamp_millis(),
            r.start_date,
            r.end_date,
            r.bidirectional,
        ],
    )?;
    Ok(())
}

pub(crate) fn write_relationship(conn: &Connection, r: &Relationship) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE relationships SET rel_type = ?2, weight = ?3, context = ?4, timestamp = ?5, start_date = ?6, end_date = ?7, bidirectional = ?8 WHERE id = ?1",
        params![
            r.id,
            r.rel_type.as_str(),
            r.weight,
            r.context,
            r.timestamp.timestamp_millis(),
            r.start_date,
            r.end_date,
            r.bidirectional,
        ],
    )?;
    Ok(())
}

pub(crate) fn get_relationship(conn: &Connection, id: &str) -> rusqlite::Result<Option<Relationship>> {
    conn.query_row(
        &format!("SELECT {RELATIONSHIP_COLUMNS} FROM relationships r WHERE r.id = ?1"),
        params![id],
        row_to_relationship,
    )
    .optional()
}

/// Relationships touching `entity_id` in either direction, strongest first.
pub(crate) fn relationships_of(conn: &Connection, entity_id: &str) -> rusqlite::Result<Vec<Relationship>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {RELATIONSHIP_COLUMNS} FROM relationships r WHERE r.source_id = ?1 OR r.target_id = ?1 ORDER BY r.weight DESC, r.timestamp DESC"
    ))?;
    let rels = stmt
        .query_map(params![entity_id], row_to_relationship)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rels)
}

/// Relationships directly linking `a` and `b`, strongest first.
pub(crate) fn relationships_between(
    conn: &Connection,
    a: &str,
    b: &str,
) -> rusqlite::Result<Vec<Relationship>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RELATIONSHIP_COLUMNS} FROM relationships r WHERE (r.source_id = ?1 AND r.target_id = ?2) OR (r.source_id = ?2 AND r.target_id = ?1) ORDER BY r.weight DESC"
    ))?;
    let rels = stmt
        .query_map(params![a, b], row_to_relationship)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rels)
}

/// Undirected neighbors of `entity_id` with the weight of each connecting edge.
pub(crate) fn neighbors(conn: &Connection, entity_id: &str) -> rusqlite::Result<Vec<(String, f64)>> {
    let mut stmt = conn.prepare_cached(
        "SELECT CASE WHEN source_id = ?1 THEN target_id ELSE source_id END, weight FROM relationships WHERE (source_id = ?1 OR target_id = ?1) AND source_id != target_id",
    )?;
    let rows = stmt
        .query_map(params![entity_id], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub(crate) fn relationship_count(conn: &Connection, entity_id: &str) -> rusqlite::Result<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM relationships WHERE source_id = ?1 OR target_id = ?1",
        params![entity_id],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

/// Recompute and persist one entity's importance. A missing entity is a no-op.
pub(crate) fn refresh_importance(
    conn: &Connection,
    entity_id: &str,
    model: &ImportanceModel,
    now_ms: i64,
) -> rusqlite::Result<Option<f64>> {
    let row: Option<(u32, i64, f64)> = conn
        .query_row(
            "SELECT mention_count, last_seen, confidence FROM entities WHERE id = ?1",
            params![entity_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?;
    let Some((mentions, last_seen, confidence)) = row else {
        return Ok(None);
    };
    let connections = relationship_count(conn, entity_id)?;
    let importance = model.score(mentions, now_ms - last_seen, connections, confidence);
    conn.execute(
        "UPDATE entities SET importance = ?2 WHERE id = ?1",
        params![entity_id, importance],
    )?;
    Ok(Some(importance))
}

pub(crate) fn count(conn: &Connection, sql: &str) -> rusqlite::Result<usize> {
    let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
    Ok(n as usize)
}
