// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Relationship mapping on top of the graph store: strength management,
//! decay, path enumeration, community detection and transitive inference.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use recall_config::model::DecayConfig;
use recall_core::RecallError;
use serde::Serialize;
use tracing::{debug, info};

use crate::graph::GraphStore;
use crate::taxonomy::{self, RelationshipTypeMeta};
use crate::types::{Entity, Relationship, RelationshipType};

const MS_PER_DAY: f64 = 86_400_000.0;

/// Label propagation stops after this many rounds even without convergence.
const MAX_PROPAGATION_ROUNDS: usize = 20;

/// Hop limit for the indirect fallback in [`RelationshipMapper::describe_relationship`].
const DESCRIBE_MAX_HOPS: usize = 6;

/// Inferences below this confidence are discarded.
const MIN_INFERENCE_CONFIDENCE: f64 = 0.1;

/// Parameters for one decay pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecayOptions {
    /// Minimum weight change worth writing back.
    pub threshold: f64,
    pub half_life_days: f64,
    /// Relationships decayed below this weight are deleted.
    pub remove_below: f64,
}

impl Default for DecayOptions {
    fn default() -> Self {
        Self::from(&DecayConfig::default())
    }
}

impl From<&DecayConfig> for DecayOptions {
    fn from(config: &DecayConfig) -> Self {
        Self {
            threshold: config.threshold,
            half_life_days: config.half_life_days,
            remove_below: config.remove_below,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DecayReport {
    pub decayed: usize,
    pub removed: usize,
}

/// A simple path between two entities.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredPath {
    /// Entity ids from start to end.
    pub entity_ids: Vec<String>,
    /// Ids of the traversed relationships, one per hop.
    pub relationship_ids: Vec<String>,
    /// Mean weight of the traversed relationships.
    pub score: f64,
}

/// A community found by label propagation.
#[derive(Debug, Clone, Serialize)]
pub struct Cluster {
    pub members: Vec<Entity>,
    /// Member with the most internal connections.
    pub central: Entity,
    /// Internal edges over C(n, 2).
    pub density: f64,
}

/// An advisory A -> C relationship derived from A -> B -> C.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InferredRelationship {
    pub source_id: String,
    pub target_id: String,
    pub rel_type: RelationshipType,
    pub confidence: f64,
    pub via_id: String,
    pub reasoning: String,
}

/// Relationship-level operations over a [`GraphStore`].
pub struct RelationshipMapper {
    graph: Arc<GraphStore>,
}

impl RelationshipMapper {
    pub fn new(graph: Arc<GraphStore>) -> Self {
        Self { graph }
    }

    pub fn type_meta(&self, rel_type: &RelationshipType) -> RelationshipTypeMeta {
        taxonomy::meta(rel_type)
    }

    pub fn inverse_type(&self, rel_type: &RelationshipType) -> Option<RelationshipType> {
        taxonomy::meta(rel_type).inverse
    }

    /// Add `amount` to the weight (clamped to [0, 10]) and refresh the timestamp.
    pub async fn strengthen_relationship(&self, id: &str, amount: f64) -> Result<Relationship, RecallError> {
        self.graph.adjust_weight(id, amount).await
    }

    /// Decay every relationship once by its type's decay rate.
    pub async fn decay_relationships(&self, options: DecayOptions) -> Result<DecayReport, RecallError> {
        let now_ms = self.graph.clock().now_millis();
        let half_life_ms = options.half_life_days * MS_PER_DAY;
        if half_life_ms <= 0.0 {
            return Err(RecallError::Config("decay half-life must be positive".into()));
        }

        let mut visited = HashSet::new();
        let mut reweighted = Vec::new();
        let mut removed = Vec::new();
        for rel in self.graph.all_relationships().await? {
            if !visited.insert(rel.id.clone()) {
                continue;
            }
            let rate = taxonomy::meta(&rel.rel_type).decay_rate;
            if rate == 0.0 {
                continue;
            }
            let age_ms = (now_ms - rel.timestamp.timestamp_millis()).max(0) as f64;
            let factor = (-age_ms * std::f64::consts::LN_2 * rate / half_life_ms).exp();
            let new_weight = rel.weight * factor;
            if new_weight < options.remove_below {
                removed.push(rel.id);
            } else if (rel.weight - new_weight).abs() > options.threshold {
                reweighted.push((rel.id, new_weight));
            }
        }

        let report = DecayReport {
            decayed: reweighted.len(),
            removed: removed.len(),
        };
        if report.decayed > 0 || report.removed > 0 {
            self.graph.apply_weight_changes(reweighted, removed).await?;
        }
        info!(decayed = report.decayed, removed = report.removed, "relationship decay applied");
        Ok(report)
    }

    /// Every simple path of at most `max_length` hops, best mean weight first.
    pub async fn find_paths(
        &self,
        from: &str,
        to: &str,
        max_length: usize,
    ) -> Result<Vec<ScoredPath>, RecallError> {
        if from == to || max_length == 0 {
            return Ok(Vec::new());
        }
        let adjacency = edge_adjacency(&self.graph.all_relationships().await?);
        let mut paths = Vec::new();
        let mut nodes = vec![from.to_string()];
        let mut edges: Vec<(String, f64)> = Vec::new();
        dfs_paths(&adjacency, to, max_length, &mut nodes, &mut edges, &mut paths);
        paths.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        Ok(paths)
    }

    /// Communities of at least `min_cluster_size` members via label propagation.
    pub async fn detect_clusters(&self, min_cluster_size: usize) -> Result<Vec<Cluster>, RecallError> {
        self.detect_clusters_with_rng(min_cluster_size, &mut StdRng::from_entropy())
            .await
    }

    /// [`Self::detect_clusters`] with a caller-supplied RNG for reproducible visit order.
    pub async fn detect_clusters_with_rng<R: Rng + Send>(
        &self,
        min_cluster_size: usize,
        rng: &mut R,
    ) -> Result<Vec<Cluster>, RecallError> {
        let entities = self.graph.list_entities(Default::default()).await?;
        let relationships = self.graph.all_relationships().await?;

        let ids: Vec<String> = entities.iter().map(|e| e.id.clone()).collect();
        let adjacency = weighted_adjacency(&relationships);
        let labels = propagate_labels(&ids, &adjacency, rng);

        let mut groups: HashMap<&str, Vec<&Entity>> = HashMap::new();
        for entity in &entities {
            if let Some(label) = labels.get(&entity.id) {
                groups.entry(label.as_str()).or_default().push(entity);
            }
        }

        let mut clusters: Vec<Cluster> = groups
            .into_values()
            .filter(|members| members.len() >= min_cluster_size.max(1))
            .filter_map(|members| build_cluster(&members, &relationships))
            .collect();
        clusters.sort_by(|a, b| {
            b.members
                .len()
                .cmp(&a.members.len())
                .then_with(|| b.density.partial_cmp(&a.density).unwrap_or(std::cmp::Ordering::Equal))
        });
        debug!(clusters = clusters.len(), "label propagation finished");
        Ok(clusters)
    }

    /// Advisory one-hop transitive inferences from `entity_id`, most confident first.
    pub async fn infer_relationships(
        &self,
        entity_id: &str,
        max_inferences: usize,
    ) -> Result<Vec<InferredRelationship>, RecallError> {
        let first_hop = self.graph.get_relationships(entity_id).await?;
        let mut direct: HashSet<String> = first_hop
            .iter()
            .map(|r| r.other_end(entity_id).to_string())
            .collect();
        direct.insert(entity_id.to_string());

        let mut best: HashMap<String, InferredRelationship> = HashMap::new();
        let mut second_hops: HashMap<String, Vec<Relationship>> = HashMap::new();
        for ab in &first_hop {
            let b = ab.other_end(entity_id).to_string();
            if b == entity_id {
                continue;
            }
            if !second_hops.contains_key(&b) {
                let rels = self.graph.get_relationships(&b).await?;
                second_hops.insert(b.clone(), rels);
            }
            for bc in second_hops.get(&b).into_iter().flatten() {
                let c = bc.other_end(&b);
                if direct.contains(c) {
                    continue;
                }
                let (rel_type, confidence) = infer_pair(ab, bc);
                if confidence < MIN_INFERENCE_CONFIDENCE {
                    continue;
                }
                let candidate = InferredRelationship {
                    source_id: entity_id.to_string(),
                    target_id: c.to_string(),
                    reasoning: format!("{} then {} via {}", ab.rel_type, bc.rel_type, b),
                    rel_type,
                    confidence,
                    via_id: b.clone(),
                };
                match best.get(c) {
                    Some(existing) if existing.confidence >= candidate.confidence => {}
                    _ => {
                        best.insert(c.to_string(), candidate);
                    }
                }
            }
        }

        let mut inferred: Vec<InferredRelationship> = best.into_values().collect();
        inferred.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.target_id.cmp(&b.target_id))
        });
        inferred.truncate(max_inferences);
        Ok(inferred)
    }

    /// One-line natural-language summary of how `a` and `b` relate.
    pub async fn describe_relationship(&self, a: &str, b: &str) -> Result<String, RecallError> {
        let first = self
            .graph
            .get_entity(a)
            .await?
            .ok_or_else(|| RecallError::entity_not_found(a))?;
        let second = self
            .graph
            .get_entity(b)
            .await?
            .ok_or_else(|| RecallError::entity_not_found(b))?;

        let direct = self.graph.get_relationships_between(a, b).await?;
        if !direct.is_empty() {
            let phrases: Vec<String> = direct
                .iter()
                .map(|rel| {
                    let (subject, object) = if rel.source_id == first.id {
                        (&first.name, &second.name)
                    } else {
                        (&second.name, &first.name)
                    };
                    format!(
                        "{subject} {} {} {object}",
                        strength_word(rel.weight),
                        taxonomy::meta(&rel.rel_type).label
                    )
                })
                .collect();
            return Ok(phrases.join("; "));
        }

        match self.graph.shortest_path(a, b, DESCRIBE_MAX_HOPS).await? {
            Some(path) => {
                let hops = path.len().saturating_sub(1);
                Ok(format!(
                    "{} is indirectly connected to {} ({hops} hops)",
                    first.name, second.name
                ))
            }
            None => Ok(format!(
                "No known connection between {} and {}",
                first.name, second.name
            )),
        }
    }

    /// Neighbors joined by the heaviest relationships, strongest first.
    pub async fn strongest_connections(
        &self,
        entity_id: &str,
        limit: usize,
    ) -> Result<Vec<(Entity, Relationship)>, RecallError> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        for rel in self.graph.get_relationships(entity_id).await? {
            if out.len() == limit {
                break;
            }
            let other = rel.other_end(entity_id).to_string();
            if !seen.insert(other.clone()) {
                continue;
            }
            if let Some(entity) = self.graph.get_entity(&other).await? {
                out.push((entity, rel));
            }
        }
        Ok(out)
    }
}

fn strength_word(weight: f64) -> &'static str {
    if weight >= 5.0 {
        "strongly"
    } else if weight >= 2.0 {
        "moderately"
    } else {
        "weakly"
    }
}

/// Inferred type and confidence for the hop pair A -(ab)- B -(bc)- C.
fn infer_pair(ab: &Relationship, bc: &Relationship) -> (RelationshipType, f64) {
    use RelationshipType::*;

    let meta = taxonomy::meta(&ab.rel_type);
    if meta.transitive_through.contains(&bc.rel_type) {
        return (ab.rel_type.clone(), (ab.weight.min(bc.weight) * 0.6).min(1.0));
    }
    match (&ab.rel_type, &bc.rel_type) {
        (Uses, DependsOn) => (DependsOn, 0.4),
        (WorksOn, WorksOn) => (Knows, 0.3),
        _ => (RelatedTo, 0.15),
    }
}

type EdgeList = HashMap<String, Vec<(String, String, f64)>>;

/// Undirected adjacency keeping every edge: node -> (neighbor, relationship id, weight).
fn edge_adjacency(relationships: &[Relationship]) -> EdgeList {
    let mut adjacency: EdgeList = HashMap::new();
    for rel in relationships.iter().filter(|r| r.source_id != r.target_id) {
        adjacency
            .entry(rel.source_id.clone())
            .or_default()
            .push((rel.target_id.clone(), rel.id.clone(), rel.weight));
        adjacency
            .entry(rel.target_id.clone())
            .or_default()
            .push((rel.source_id.clone(), rel.id.clone(), rel.weight));
    }
    adjacency
}

fn dfs_paths(
    adjacency: &EdgeList,
    target: &str,
    max_length: usize,
    nodes: &mut Vec<String>,
    edges: &mut Vec<(String, f64)>,
    out: &mut Vec<ScoredPath>,
) {
    let Some(current) = nodes.last().cloned() else {
        return;
    };
    if current == target {
        let score = edges.iter().map(|(_, w)| w).sum::<f64>() / edges.len() as f64;
        out.push(ScoredPath {
            entity_ids: nodes.clone(),
            relationship_ids: edges.iter().map(|(id, _)| id.clone()).collect(),
            score,
        });
        return;
    }
    if edges.len() == max_length {
        return;
    }
    for (neighbor, rel_id, weight) in adjacency.get(&current).into_iter().flatten() {
        if nodes.contains(neighbor) {
            continue;
        }
        nodes.push(neighbor.clone());
        edges.push((rel_id.clone(), *weight));
        dfs_paths(adjacency, target, max_length, nodes, edges, out);
        nodes.pop();
        edges.pop();
    }
}

/// Undirected adjacency with parallel edges summed: node -> neighbor -> weight.
fn weighted_adjacency(relationships: &[Relationship]) -> HashMap<String, HashMap<String, f64>> {
    let mut adjacency: HashMap<String, HashMap<String, f64>> = HashMap::new();
    for rel in relationships.iter().filter(|r| r.source_id != r.target_id) {
        *adjacency
            .entry(rel.source_id.clone())
            .or_default()
            .entry(rel.target_id.clone())
            .or_default() += rel.weight;
        *adjacency
            .entry(rel.target_id.clone())
            .or_default()
            .entry(rel.source_id.clone())
            .or_default() += rel.weight;
    }
    adjacency
}

/// Weighted label propagation. Returns node -> label.
///
/// Each node starts with its own id as label; each round visits nodes in a
/// fresh random order and adopts the label with the highest summed neighbor
/// weight (ties keep the current label if tied, else the smallest label).
pub(crate) fn propagate_labels<R: Rng + ?Sized>(
    nodes: &[String],
    adjacency: &HashMap<String, HashMap<String, f64>>,
    rng: &mut R,
) -> HashMap<String, String> {
    let mut labels: HashMap<String, String> =
        nodes.iter().map(|n| (n.clone(), n.clone())).collect();
    let mut order: Vec<&String> = nodes.iter().collect();

    for round in 0..MAX_PROPAGATION_ROUNDS {
        order.shuffle(rng);
        let mut changed = false;
        for node in &order {
            let Some(neighbors) = adjacency.get(*node) else {
                continue;
            };
            let mut scores: HashMap<&str, f64> = HashMap::new();
            for (neighbor, weight) in neighbors {
                if let Some(label) = labels.get(neighbor) {
                    *scores.entry(label.as_str()).or_default() += weight;
                }
            }
            let Some(top) = scores.values().copied().reduce(f64::max) else {
                continue;
            };
            let current = labels.get(*node).cloned().unwrap_or_default();
            let keep_current = scores
                .get(current.as_str())
                .is_some_and(|w| (top - w).abs() < f64::EPSILON);
            if keep_current {
                continue;
            }
            let best = scores
                .iter()
                .filter(|(_, w)| (top - **w).abs() < f64::EPSILON)
                .map(|(label, _)| *label)
                .min()
                .map(str::to_string);
            if let Some(best) = best {
                labels.insert((*node).clone(), best);
                changed = true;
            }
        }
        if !changed {
            debug!(rounds = round + 1, "label propagation converged");
            break;
        }
    }
    labels
}

fn build_cluster(members: &[&Entity], relationships: &[Relationship]) -> Option<Cluster> {
    let ids: HashSet<&str> = members.iter().map(|e| e.id.as_str()).collect();
    let mut internal_degree: HashMap<&str, usize> = HashMap::new();
    let mut pairs: HashSet<(&str, &str)> = HashSet::new();
    for rel in relationships {
        let (s, t) = (rel.source_id.as_str(), rel.target_id.as_str());
        if s == t || !ids.contains(s) || !ids.contains(t) {
            continue;
        }
        let key = if s < t { (s, t) } else { (t, s) };
        pairs.insert(key);
        *internal_degree.entry(s).or_default() += 1;
        *internal_degree.entry(t).or_default() += 1;
    }

    let n = members.len();
    let possible = n * n.saturating_sub(1) / 2;
    let density = if possible == 0 {
        0.0
    } else {
        (pairs.len() as f64 / possible as f64).min(1.0)
    };
    let central = members
        .iter()
        .max_by(|a, b| {
            let da = internal_degree.get(a.id.as_str()).copied().unwrap_or(0);
            let db = internal_degree.get(b.id.as_str()).copied().unwrap_or(0);
            da.cmp(&db).then_with(|| b.id.cmp(&a.id))
        })
        .map(|e| (*e).clone())?;

    Some(Cluster {
        members: members.iter().map(|e| (*e).clone()).collect(),
        central,
        density,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;

    fn adjacency(edges: &[(&str, &str, f64)]) -> HashMap<String, HashMap<String, f64>> {
        let mut adj: HashMap<String, HashMap<String, f64>> = HashMap::new();
        for (a, b, w) in edges {
            *adj.entry(a.to_string()).or_default().entry(b.to_string()).or_default() += w;
            *adj.entry(b.to_string()).or_default().entry(a.to_string()).or_default() += w;
        }
        adj
    }

    #[test]
    fn two_dense_groups_separate_for_any_seed() {
        let edges = [
            ("a1", "a2", 3.0),
            ("a2", "a3", 3.0),
            ("a1", "a3", 3.0),
            ("b1", "b2", 3.0),
            ("b2", "b3", 3.0),
            ("b1", "b3", 3.0),
            ("a3", "b1", 0.1),
        ];
        let nodes: Vec<String> = ["a1", "a2", "a3", "b1", "b2", "b3"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let adj = adjacency(&edges);
        for seed in 0..20 {
            let labels = propagate_labels(&nodes, &adj, &mut StdRng::seed_from_u64(seed));
            assert_eq!(labels["a1"], labels["a2"]);
            assert_eq!(labels["a2"], labels["a3"]);
            assert_eq!(labels["b1"], labels["b2"]);
            assert_eq!(labels["b2"], labels["b3"]);
            assert_ne!(labels["a1"], labels["b1"], "seed {seed}");
        }
    }

    #[test]
    fn isolated_nodes_keep_their_own_label() {
        let nodes = vec!["solo".to_string()];
        let labels = propagate_labels(&nodes, &HashMap::new(), &mut StdRng::seed_from_u64(1));
        assert_eq!(labels["solo"], "solo");
    }

    #[test]
    fn strength_buckets() {
        assert_eq!(strength_word(5.0), "strongly");
        assert_eq!(strength_word(2.0), "moderately");
        assert_eq!(strength_word(1.99), "weakly");
    }
}
