// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Static relationship-type taxonomy.

use crate::types::RelationshipType;

/// Fixed properties of a relationship type.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipTypeMeta {
    pub rel_type: RelationshipType,
    /// Verb phrase used when describing the edge, e.g. "works on".
    pub label: String,
    pub bidirectional: bool,
    pub inverse: Option<RelationshipType>,
    /// Second-hop types through which this type carries over transitively.
    pub transitive_through: Vec<RelationshipType>,
    /// Multiplier on the decay exponent; 0 disables decay.
    pub decay_rate: f64,
}

/// Taxonomy entry for `rel_type`. Free-form types get a generic entry.
pub fn meta(rel_type: &RelationshipType) -> RelationshipTypeMeta {
    use RelationshipType::*;

    let (label, bidirectional, inverse, transitive_through, decay_rate): (
        &str,
        bool,
        Option<RelationshipType>,
        Vec<RelationshipType>,
        f64,
    ) = match rel_type {
        WorksOn => ("works on", false, Some(other("worked_on_by")), vec![PartOf], 0.5),
        Knows => ("knows", true, Some(Knows), vec![], 0.3),
        Uses => ("uses", false, Some(other("used_by")), vec![PartOf], 0.6),
        PartOf => ("is part of", false, Some(other("contains")), vec![PartOf], 0.0),
        Created => ("created", false, Some(other("created_by")), vec![], 0.0),
        Manages => ("manages", false, Some(other("managed_by")), vec![], 0.4),
        DependsOn => ("depends on", false, Some(other("dependency_of")), vec![DependsOn], 0.2),
        LocatedIn => ("is located in", false, Some(other("location_of")), vec![LocatedIn, PartOf], 0.0),
        Opposes => ("opposes", false, None, vec![], 0.7),
        Supports => ("supports", false, None, vec![], 0.5),
        Prefers => ("prefers", false, None, vec![], 0.6),
        ScheduledFor => ("is scheduled for", false, None, vec![], 1.0),
        HappenedAt => ("happened at", false, None, vec![], 0.0),
        RelatedTo => ("is related to", true, Some(RelatedTo), vec![], 1.0),
        Other(name) => {
            return RelationshipTypeMeta {
                rel_type: rel_type.clone(),
                label: name.replace('_', " "),
                bidirectional: false,
                inverse: None,
                transitive_through: Vec::new(),
                decay_rate: 0.5,
            };
        }
    };

    RelationshipTypeMeta {
        rel_type: rel_type.clone(),
        label: label.to_string(),
        bidirectional,
        inverse,
        transitive_through,
        decay_rate,
    }
}

fn other(name: &str) -> RelationshipType {
    RelationshipType::Other(name.to_string())
}

/// Every predefined type's entry.
pub fn all() -> Vec<RelationshipTypeMeta> {
    RelationshipType::KNOWN.iter().map(meta).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symmetric_types_are_their_own_inverse() {
        for meta in all().into_iter().filter(|m| m.bidirectional) {
            assert_eq!(meta.inverse.as_ref(), Some(&meta.rel_type));
        }
    }

    #[test]
    fn decay_rates_in_unit_interval() {
        for meta in all() {
            assert!((0.0..=1.0).contains(&meta.decay_rate), "{}", meta.rel_type);
        }
    }

    #[test]
    fn structural_types_do_not_decay() {
        assert_eq!(meta(&RelationshipType::PartOf).decay_rate, 0.0);
        assert_eq!(meta(&RelationshipType::Created).decay_rate, 0.0);
    }

    #[test]
    fn free_form_label_uses_spaces() {
        let m = meta(&RelationshipType::Other("mentored_by".into()));
        assert_eq!(m.label, "mentored by");
        assert!(!m.bidirectional);
    }
}
