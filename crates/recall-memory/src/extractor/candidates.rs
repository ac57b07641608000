// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed extraction candidates and strict parsing of model JSON.
//!
//! An item becomes a candidate only when its required fields are present
//! with the right JSON type. Optional fields of the wrong type are treated
//! as absent. A missing confidence defaults to 0.5.

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::types::{Attributes, EntityType, RelationshipType};

const DEFAULT_CONFIDENCE: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityCandidate {
    pub name: String,
    pub entity_type: EntityType,
    pub category: Option<String>,
    pub attributes: Attributes,
    pub confidence: f64,
    /// Id of the known entity this candidate was merged into.
    pub existing_id: Option<String>,
    /// Other surface forms folded into this candidate during dedup.
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelationshipCandidate {
    /// Source entity name.
    pub source: String,
    /// Target entity name.
    pub target: String,
    pub rel_type: RelationshipType,
    pub context: String,
    pub confidence: f64,
    pub bidirectional: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    Positive,
    Negative,
    Neutral,
    Mixed,
}

impl Polarity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Polarity::Positive => "positive",
            Polarity::Negative => "negative",
            Polarity::Neutral => "neutral",
            Polarity::Mixed => "mixed",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "positive" => Some(Polarity::Positive),
            "negative" => Some(Polarity::Negative),
            "neutral" => Some(Polarity::Neutral),
            "mixed" => Some(Polarity::Mixed),
            _ => None,
        }
    }

    fn default_score(&self) -> f64 {
        match self {
            Polarity::Positive => 1.0,
            Polarity::Negative => -1.0,
            Polarity::Neutral | Polarity::Mixed => 0.0,
        }
    }
}

/// An opinion about an entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sentiment {
    pub entity: String,
    pub polarity: Polarity,
    /// Signed strength in [-1, 1].
    pub score: f64,
    pub holder: Option<String>,
    pub confidence: f64,
}

/// A date or time reference found in the text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemporalExpression {
    pub expression: String,
    /// ISO-8601 date or date-time, when one could be determined.
    pub normalized: Option<String>,
    pub entity: Option<String>,
    pub confidence: f64,
}

/// A pronoun or indirect mention resolved to an entity name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Coreference {
    pub mention: String,
    pub resolved: String,
    pub confidence: f64,
}

/// The first balanced top-level `{...}` object in `text`, ignoring braces inside strings.
pub fn first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse the first JSON object of a model response. `None` on any failure.
pub fn parse_response(response: &str) -> Option<Value> {
    let raw = first_json_object(response)?;
    match serde_json::from_str::<Value>(raw) {
        Ok(value) if value.is_object() => Some(value),
        Ok(_) => None,
        Err(e) => {
            debug!(error = %e, "model response is not valid JSON");
            None
        }
    }
}

fn items<'a>(value: &'a Value, key: &str) -> impl Iterator<Item = &'a Value> {
    value
        .get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

fn required_str(item: &Value, key: &str) -> Option<String> {
    item.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn optional_str(item: &Value, key: &str) -> Option<String> {
    required_str(item, key)
}

fn confidence(item: &Value) -> f64 {
    item.get("confidence")
        .and_then(Value::as_f64)
        .unwrap_or(DEFAULT_CONFIDENCE)
        .clamp(0.0, 1.0)
}

pub fn parse_entities(value: &Value) -> Vec<EntityCandidate> {
    items(value, "entities")
        .filter_map(|item| {
            let name = required_str(item, "name")?;
            let entity_type = required_str(item, "type")?;
            Some(EntityCandidate {
                name,
                entity_type: EntityType::from_str_value(&entity_type),
                category: optional_str(item, "category"),
                attributes: item
                    .get("attributes")
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default(),
                confidence: confidence(item),
                existing_id: None,
                aliases: Vec::new(),
            })
        })
        .collect()
}

pub fn parse_relationships(value: &Value) -> Vec<RelationshipCandidate> {
    items(value, "relationships")
        .filter_map(|item| {
            let source = required_str(item, "source")?;
            let target = required_str(item, "target")?;
            let rel_type = required_str(item, "type")?;
            Some(RelationshipCandidate {
                source,
                target,
                rel_type: RelationshipType::from_str_value(&rel_type),
                context: optional_str(item, "context").unwrap_or_default(),
                confidence: confidence(item),
                bidirectional: item.get("bidirectional").and_then(Value::as_bool),
            })
        })
        .collect()
}

pub fn parse_coreferences(value: &Value) -> Vec<Coreference> {
    items(value, "coreferences")
        .filter_map(|item| {
            Some(Coreference {
                mention: required_str(item, "mention")?,
                resolved: required_str(item, "resolved")?,
                confidence: confidence(item),
            })
        })
        .collect()
}

pub fn parse_sentiments(value: &Value) -> Vec<Sentiment> {
    items(value, "sentiments")
        .filter_map(|item| {
            let entity = required_str(item, "entity")?;
            let polarity = Polarity::parse(&required_str(item, "polarity")?)?;
            let score = item
                .get("score")
                .and_then(Value::as_f64)
                .unwrap_or_else(|| polarity.default_score())
                .clamp(-1.0, 1.0);
            Some(Sentiment {
                entity,
                polarity,
                score,
                holder: optional_str(item, "holder"),
                confidence: confidence(item),
            })
        })
        .collect()
}

pub fn parse_temporals(value: &Value) -> Vec<TemporalExpression> {
    items(value, "temporals")
        .filter_map(|item| {
            Some(TemporalExpression {
                expression: required_str(item, "expression")?,
                normalized: optional_str(item, "normalized"),
                entity: optional_str(item, "entity"),
                confidence: confidence(item),
            })
        })
        .collect()
}
