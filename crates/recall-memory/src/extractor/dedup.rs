// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fuzzy entity deduplication by name similarity.

use std::collections::HashMap;

use super::{EntityCandidate, KnownEntity};
use crate::text::{jaccard, normalize_name, term_set};

/// Names at least this long compare by token Jaccard instead of edit distance.
const LEVENSHTEIN_MAX_CHARS: usize = 20;

/// Similarity of two entity names in [0, 1].
///
/// 1.0 for an exact match ignoring case and whitespace, 0.9 when one
/// contains the other, normalized Levenshtein for short names, and token
/// Jaccard otherwise.
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let (na, nb) = (normalize_name(a), normalize_name(b));
    if na.is_empty() || nb.is_empty() {
        return 0.0;
    }
    if na == nb {
        return 1.0;
    }
    if na.contains(&nb) || nb.contains(&na) {
        return 0.9;
    }
    if na.chars().count().max(nb.chars().count()) < LEVENSHTEIN_MAX_CHARS {
        strsim::normalized_levenshtein(&na, &nb)
    } else {
        jaccard(&term_set(&na), &term_set(&nb))
    }
}

/// Merge candidates into known entities and into each other.
///
/// Returns the surviving candidates and a map from every original
/// (normalized) name to the canonical name it was folded into.
pub fn deduplicate(
    candidates: Vec<EntityCandidate>,
    known: &[KnownEntity],
    threshold: f64,
) -> (Vec<EntityCandidate>, HashMap<String, String>) {
    let mut accepted: Vec<EntityCandidate> = Vec::new();
    let mut renames = HashMap::new();

    for mut candidate in candidates {
        let surface = candidate.name.clone();
        let original = normalize_name(&surface);

        let best_known = known
            .iter()
            .map(|k| (name_similarity(&candidate.name, &k.name), k))
            .filter(|(score, _)| *score > threshold)
            .max_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        if let Some((_, k)) = best_known {
            candidate.name = k.name.clone();
            candidate.entity_type = k.entity_type;
            candidate.existing_id = k.id.clone();
            if normalize_name(&k.name) != original {
                candidate.aliases.push(surface.clone());
            }
        }

        let twin = accepted
            .iter_mut()
            .find(|a| name_similarity(&a.name, &candidate.name) > threshold);
        match twin {
            Some(twin) => {
                for (key, value) in candidate.attributes {
                    twin.attributes.insert(key, value);
                }
                twin.confidence = twin.confidence.max(candidate.confidence);
                if twin.existing_id.is_none() {
                    twin.existing_id = candidate.existing_id;
                }
                if twin.category.is_none() {
                    twin.category = candidate.category;
                }
                if normalize_name(&twin.name) != original {
                    twin.aliases.push(surface);
                }
                for alias in candidate.aliases {
                    if !twin.aliases.contains(&alias) {
                        twin.aliases.push(alias);
                    }
                }
                renames.insert(original, twin.name.clone());
            }
            None => {
                renames.insert(original, candidate.name.clone());
                accepted.push(candidate);
            }
        }
    }
    (accepted, renames)
}
