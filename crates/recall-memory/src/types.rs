// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types for the entity graph and the chunked semantic index.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Free-form JSON attributes attached to an entity or index entry.
pub type Attributes = serde_json::Map<String, serde_json::Value>;

/// Kind of thing an entity represents.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum EntityType {
    Person,
    Project,
    Concept,
    Place,
    File,
    Event,
    Custom,
}

impl EntityType {
    /// Convert to string for SQLite storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Person => "person",
            EntityType::Project => "project",
            EntityType::Concept => "concept",
            EntityType::Place => "place",
            EntityType::File => "file",
            EntityType::Event => "event",
            EntityType::Custom => "custom",
        }
    }

    /// Parse from a stored or model-produced string. Unknown kinds become `Custom`.
    pub fn from_str_value(s: &str) -> Self {
        s.trim().parse().unwrap_or(EntityType::Custom)
    }
}

/// A node of the knowledge graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub entity_type: EntityType,
    pub name: String,
    pub category: Option<String>,
    pub parent_id: Option<String>,
    pub attributes: Attributes,
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub mention_count: u32,
    /// Confidence in [0, 1].
    pub confidence: f64,
    /// Derived score in [0, 1]; recomputed by the store on every mutation.
    pub importance: f64,
}

/// Input for creating an entity.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntity {
    pub entity_type: EntityType,
    pub name: String,
    pub category: Option<String>,
    pub parent_id: Option<String>,
    pub attributes: Attributes,
    pub embedding: Option<Vec<f32>>,
    pub confidence: f64,
}

impl NewEntity {
    pub fn new(entity_type: EntityType, name: impl Into<String>) -> Self {
        Self {
            entity_type,
            name: name.into(),
            category: None,
            parent_id: None,
            attributes: Attributes::new(),
            embedding: None,
            confidence: 1.0,
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }
}

/// Partial update of an entity. `None` fields are left unchanged.
///
/// `attributes` are merged key by key into the stored map; a JSON `null`
/// value removes the key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityUpdate {
    pub name: Option<String>,
    pub entity_type: Option<EntityType>,
    pub category: Option<String>,
    pub parent_id: Option<String>,
    pub attributes: Option<Attributes>,
    pub embedding: Option<Vec<f32>>,
    pub confidence: Option<f64>,
}

/// An alternate name that resolves to an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alias {
    pub id: String,
    pub entity_id: String,
    pub alias: String,
    pub created_at: DateTime<Utc>,
}

/// One mention of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub entity_id: String,
    pub timestamp: DateTime<Utc>,
    pub context: String,
    pub source: String,
}

/// Relationship label. Unknown labels are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RelationshipType {
    WorksOn,
    Knows,
    Uses,
    PartOf,
    Created,
    Manages,
    DependsOn,
    LocatedIn,
    Opposes,
    Supports,
    Prefers,
    ScheduledFor,
    HappenedAt,
    RelatedTo,
    Other(String),
}

impl RelationshipType {
    /// Every predefined type, in taxonomy order.
    pub const KNOWN: [RelationshipType; 14] = [
        RelationshipType::WorksOn,
        RelationshipType::Knows,
        RelationshipType::Uses,
        RelationshipType::PartOf,
        RelationshipType::Created,
        RelationshipType::Manages,
        RelationshipType::DependsOn,
        RelationshipType::LocatedIn,
        RelationshipType::Opposes,
        RelationshipType::Supports,
        RelationshipType::Prefers,
        RelationshipType::ScheduledFor,
        RelationshipType::HappenedAt,
        RelationshipType::RelatedTo,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            RelationshipType::WorksOn => "works_on",
            RelationshipType::Knows => "knows",
            RelationshipType::Uses => "uses",
            RelationshipType::PartOf => "part_of",
            RelationshipType::Created => "created",
            RelationshipType::Manages => "manages",
            RelationshipType::DependsOn => "depends_on",
            RelationshipType::LocatedIn => "located_in",
            RelationshipType::Opposes => "opposes",
            RelationshipType::Supports => "supports",
            RelationshipType::Prefers => "prefers",
            RelationshipType::ScheduledFor => "scheduled_for",
            RelationshipType::HappenedAt => "happened_at",
            RelationshipType::RelatedTo => "related_to",
            RelationshipType::Other(s) => s,
        }
    }

    /// Parse a label, normalizing case and separators (`"Works On"` is `works_on`).
    pub fn from_str_value(s: &str) -> Self {
        let normalized = s
            .trim()
            .to_lowercase()
            .split(|c: char| c.is_whitespace() || c == '-')
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("_");
        Self::KNOWN
            .iter()
            .find(|t| t.as_str() == normalized)
            .cloned()
            .unwrap_or(RelationshipType::Other(normalized))
    }
}

impl std::fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for RelationshipType {
    fn from(s: String) -> Self {
        RelationshipType::from_str_value(&s)
    }
}

impl From<RelationshipType> for String {
    fn from(t: RelationshipType) -> Self {
        t.as_str().to_string()
    }
}

/// A typed, weighted edge between two entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: String,
    pub source_id: String,
    pub target_id: String,
    pub rel_type: RelationshipType,
    /// Non-negative strength; clamped to [0, 10] when strengthened.
    pub weight: f64,
    pub context: String,
    pub timestamp: DateTime<Utc>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub bidirectional: bool,
}

impl Relationship {
    /// The endpoint opposite `entity_id` in the undirected view.
    pub fn other_end(&self, entity_id: &str) -> &str {
        if self.source_id == entity_id {
            &self.target_id
        } else {
            &self.source_id
        }
    }

    /// Whether this edge touches `entity_id`.
    pub fn touches(&self, entity_id: &str) -> bool {
        self.source_id == entity_id || self.target_id == entity_id
    }
}

/// Input for creating a relationship.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRelationship {
    pub source_id: String,
    pub target_id: String,
    pub rel_type: RelationshipType,
    pub weight: f64,
    pub context: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    /// `None` takes the taxonomy default for `rel_type`.
    pub bidirectional: Option<bool>,
}

impl NewRelationship {
    pub fn new(
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        rel_type: RelationshipType,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            rel_type,
            weight: 1.0,
            context: String::new(),
            start_date: None,
            end_date: None,
            bidirectional: None,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }
}

/// Partial update of a relationship.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelationshipUpdate {
    pub rel_type: Option<RelationshipType>,
    pub weight: Option<f64>,
    pub context: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub bidirectional: Option<bool>,
    /// Reset `timestamp` to now.
    pub touch: bool,
}

/// A searchable chunk of an indexed document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: String,
    pub content: String,
    pub source: String,
    pub metadata: Attributes,
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub timestamp: DateTime<Utc>,
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 for mismatched lengths or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_type_roundtrip() {
        use strum::IntoEnumIterator;
        for t in EntityType::iter() {
            assert_eq!(EntityType::from_str_value(t.as_str()), t);
            assert_eq!(t.to_string(), t.as_str());
        }
        assert_eq!(EntityType::from_str_value("PERSON"), EntityType::Person);
        assert_eq!(EntityType::from_str_value("organization"), EntityType::Custom);
    }

    #[test]
    fn relationship_type_normalizes_labels() {
        assert_eq!(RelationshipType::from_str_value("Works On"), RelationshipType::WorksOn);
        assert_eq!(RelationshipType::from_str_value("depends-on"), RelationshipType::DependsOn);
        assert_eq!(
            RelationshipType::from_str_value("Mentored By"),
            RelationshipType::Other("mentored_by".into())
        );
        assert_eq!(RelationshipType::Other("mentored_by".into()).as_str(), "mentored_by");
    }

    #[test]
    fn relationship_type_serializes_as_string() {
        let json = serde_json::to_string(&RelationshipType::PartOf).unwrap();
        assert_eq!(json, "\"part_of\"");
        let back: RelationshipType = serde_json::from_str("\"sponsors\"").unwrap();
        assert_eq!(back, RelationshipType::Other("sponsors".into()));
    }

    #[test]
    fn other_end_in_undirected_view() {
        let now = Utc::now();
        let rel = Relationship {
            id: "r".into(),
            source_id: "a".into(),
            target_id: "b".into(),
            rel_type: RelationshipType::Knows,
            weight: 1.0,
            context: String::new(),
            timestamp: now,
            start_date: None,
            end_date: None,
            bidirectional: true,
        };
        assert_eq!(rel.other_end("a"), "b");
        assert_eq!(rel.other_end("b"), "a");
        assert!(rel.touches("b"));
        assert!(!rel.touches("c"));
    }

    #[test]
    fn cosine_identical_orthogonal_and_degenerate() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
    }
}
