// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Narrow views of the graph handed to the index and the extractor.

use async_trait::async_trait;
use recall_core::RecallError;

use super::GraphStore;
use crate::types::{
    Entity, EntityUpdate, NewEntity, NewRelationship, Relationship, RelationshipType,
};

/// Read-only traversal view consulted by the semantic index.
#[async_trait]
pub trait GraphReader: Send + Sync {
    /// Entities whose name or alias appears in `text`.
    async fn entities_mentioned_in(&self, text: &str) -> Result<Vec<Entity>, RecallError>;

    /// Entities within `depth` hops of `id`, excluding `id`.
    async fn connected_entities(&self, id: &str, depth: usize) -> Result<Vec<Entity>, RecallError>;
}

/// Mutation view used when committing extraction results.
#[async_trait]
pub trait GraphWriter: Send + Sync {
    async fn get_entity(&self, id: &str) -> Result<Option<Entity>, RecallError>;
    async fn find_entity_by_name(&self, name: &str) -> Result<Option<Entity>, RecallError>;
    /// Text search over names and aliases, for fuzzy resolution.
    async fn find_entities(&self, query: &str, limit: usize) -> Result<Vec<Entity>, RecallError>;
    async fn add_entity(&self, entity: NewEntity) -> Result<Entity, RecallError>;
    async fn update_entity(&self, id: &str, update: EntityUpdate) -> Result<Entity, RecallError>;
    async fn add_alias(&self, id: &str, alias: &str) -> Result<bool, RecallError>;
    async fn record_mention(&self, id: &str, context: &str, source: &str) -> Result<Entity, RecallError>;
    async fn append_timeline(&self, id: &str, context: &str, source: &str) -> Result<(), RecallError>;
    async fn find_relationship(
        &self,
        source: &str,
        target: &str,
        rel_type: &RelationshipType,
    ) -> Result<Option<Relationship>, RecallError>;
    async fn add_relationship(&self, rel: NewRelationship) -> Result<Relationship, RecallError>;
    async fn strengthen_relationship(&self, id: &str, amount: f64) -> Result<Relationship, RecallError>;
}

#[async_trait]
impl GraphReader for GraphStore {
    async fn entities_mentioned_in(&self, text: &str) -> Result<Vec<Entity>, RecallError> {
        GraphStore::entities_mentioned_in(self, text).await
    }

    async fn connected_entities(&self, id: &str, depth: usize) -> Result<Vec<Entity>, RecallError> {
        self.get_connected_entities(id, depth).await
    }
}

#[async_trait]
impl GraphWriter for GraphStore {
    async fn get_entity(&self, id: &str) -> Result<Option<Entity>, RecallError> {
        GraphStore::get_entity(self, id).await
    }

    async fn find_entity_by_name(&self, name: &str) -> Result<Option<Entity>, RecallError> {
        GraphStore::find_entity_by_name(self, name).await
    }

    async fn find_entities(&self, query: &str, limit: usize) -> Result<Vec<Entity>, RecallError> {
        GraphStore::find_entities(self, query, limit).await
    }

    async fn add_entity(&self, entity: NewEntity) -> Result<Entity, RecallError> {
        GraphStore::add_entity(self, entity).await
    }

    async fn update_entity(&self, id: &str, update: EntityUpdate) -> Result<Entity, RecallError> {
        GraphStore::update_entity(self, id, update).await
    }

    async fn add_alias(&self, id: &str, alias: &str) -> Result<bool, RecallError> {
        GraphStore::add_alias(self, id, alias).await
    }

    async fn record_mention(&self, id: &str, context: &str, source: &str) -> Result<Entity, RecallError> {
        GraphStore::record_mention(self, id, context, source).await
    }

    async fn append_timeline(&self, id: &str, context: &str, source: &str) -> Result<(), RecallError> {
        GraphStore::append_timeline(self, id, context, source).await
    }

    async fn find_relationship(
        &self,
        source: &str,
        target: &str,
        rel_type: &RelationshipType,
    ) -> Result<Option<Relationship>, RecallError> {
        GraphStore::find_relationship(self, source, target, rel_type).await
    }

    async fn add_relationship(&self, rel: NewRelationship) -> Result<Relationship, RecallError> {
        GraphStore::add_relationship(self, rel).await
    }

    async fn strengthen_relationship(&self, id: &str, amount: f64) -> Result<Relationship, RecallError> {
        self.adjust_weight(id, amount).await
    }
}
