// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixed prompts for the three extraction passes.

use super::{EntityCandidate, KnownEntity};
use crate::types::RelationshipType;

/// Most known entities listed in a prompt.
const MAX_KNOWN_IN_PROMPT: usize = 50;

const EXTRACTION_PROMPT: &str = r#"Extract the entities and relationships mentioned in the text below. Output a single JSON object.

Entity types: person, project, concept, place, file, event, custom.
Relationship types: {vocabulary}. Use a short snake_case verb for anything else.

Known entities (reuse these exact names when the text refers to them):
{known}

Output format:
{"entities": [{"name": "...", "type": "person", "category": "...", "attributes": {}, "confidence": 0.9}],
 "relationships": [{"source": "...", "target": "...", "type": "works_on", "context": "...", "confidence": 0.8}]}

Confidence is between 0 and 1. If nothing is found, output {"entities": [], "relationships": []}.

Text:
{text}

JSON object only, no explanation:"#;

const COREFERENCE_PROMPT: &str = r#"Resolve pronouns and indirect references in the text below to the entities listed. The speaker "I/me/my" is {user}; "you/your" is {agent}.

Entities:
{entities}

Output a single JSON object:
{"coreferences": [{"mention": "she", "resolved": "Alice", "confidence": 0.9}]}

If there is nothing to resolve, output {"coreferences": []}.

Text:
{text}

JSON object only, no explanation:"#;

const SENTIMENT_PROMPT: &str = r#"For the text below, list opinions held about these entities only: {entities}.
Also list temporal expressions (dates, deadlines, times) and the entity each refers to, with an ISO-8601 date when you can determine one.

Output a single JSON object:
{"sentiments": [{"entity": "...", "polarity": "positive|negative|neutral|mixed", "score": 0.7, "holder": "...", "confidence": 0.8}],
 "temporals": [{"expression": "next Friday", "normalized": "2026-01-09", "entity": "...", "confidence": 0.7}]}

Today is {today}.

Text:
{text}

JSON object only, no explanation:"#;

pub(crate) fn extraction(text: &str, known: &[KnownEntity]) -> String {
    let vocabulary = RelationshipType::KNOWN
        .iter()
        .filter(|t| **t != RelationshipType::RelatedTo)
        .map(RelationshipType::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    let known_list = if known.is_empty() {
        "(none)".to_string()
    } else {
        known
            .iter()
            .take(MAX_KNOWN_IN_PROMPT)
            .map(|k| format!("- {} ({})", k.name, k.entity_type))
            .collect::<Vec<_>>()
            .join("\n")
    };
    EXTRACTION_PROMPT
        .replace("{vocabulary}", &vocabulary)
        .replace("{known}", &known_list)
        .replace("{text}", text)
}

pub(crate) fn coreference(
    text: &str,
    entities: &[EntityCandidate],
    user_name: &str,
    agent_name: &str,
) -> String {
    let list = entities
        .iter()
        .map(|e| format!("- {} ({})", e.name, e.entity_type))
        .collect::<Vec<_>>()
        .join("\n");
    COREFERENCE_PROMPT
        .replace("{user}", user_name)
        .replace("{agent}", agent_name)
        .replace("{entities}", &list)
        .replace("{text}", text)
}

pub(crate) fn sentiment(text: &str, entity_names: &[&str], today: &str) -> String {
    SENTIMENT_PROMPT
        .replace("{entities}", &entity_names.join(", "))
        .replace("{today}", today)
        .replace("{text}", text)
}
