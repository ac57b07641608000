// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Breadth-first traversal and greedy cluster growth.
//!
//! The algorithms are written against a neighbor lookup so they run the
//! same over SQLite rows and over in-memory adjacency in tests.

use std::collections::{HashMap, HashSet, VecDeque};

/// Minimum summed edge weight a candidate needs to join a greedy cluster.
pub const CLUSTER_ADMIT_THRESHOLD: f64 = 0.5;

/// Entities reachable from `seed` within `depth` hops, in discovery order, excluding the seed.
pub fn reachable<F, E>(seed: &str, depth: usize, mut neighbors: F) -> Result<Vec<String>, E>
where
    F: FnMut(&str) -> Result<Vec<(String, f64)>, E>,
{
    let mut seen: HashSet<String> = HashSet::from([seed.to_string()]);
    let mut order = Vec::new();
    let mut frontier = vec![seed.to_string()];

    for _ in 0..depth {
        let mut next = Vec::new();
        for node in &frontier {
            for (neighbor, _) in neighbors(node)? {
                if seen.insert(neighbor.clone()) {
                    order.push(neighbor.clone());
                    next.push(neighbor);
                }
            }
        }
        if next.is_empty() {
            break;
        }
        frontier = next;
    }
    Ok(order)
}

/// Shortest hop path from `from` to `to`, inclusive of both ends.
///
/// `from == to` yields `[from]`; `None` when `to` is further than `max_depth` hops.
pub fn shortest_path<F, E>(
    from: &str,
    to: &str,
    max_depth: usize,
    mut neighbors: F,
) -> Result<Option<Vec<String>>, E>
where
    F: FnMut(&str) -> Result<Vec<(String, f64)>, E>,
{
    if from == to {
        return Ok(Some(vec![from.to_string()]));
    }

    let mut parent: HashMap<String, String> = HashMap::new();
    let mut queue = VecDeque::from([(from.to_string(), 0usize)]);
    let mut seen: HashSet<String> = HashSet::from([from.to_string()]);

    while let Some((node, depth)) = queue.pop_front() {
        if depth == max_depth {
            continue;
        }
        for (neighbor, _) in neighbors(&node)? {
            if !seen.insert(neighbor.clone()) {
                continue;
            }
            parent.insert(neighbor.clone(), node.clone());
            if neighbor == to {
                return Ok(Some(unwind(&parent, from, to)));
            }
            queue.push_back((neighbor, depth + 1));
        }
    }
    Ok(None)
}

fn unwind(parent: &HashMap<String, String>, from: &str, to: &str) -> Vec<String> {
    let mut path = vec![to.to_string()];
    let mut current = to;
    while current != from {
        match parent.get(current) {
            Some(p) => {
                path.push(p.clone());
                current = p;
            }
            None => break,
        }
    }
    path.reverse();
    path
}

/// Grow a cluster from `seed` by repeatedly admitting the frontier entity with
/// the highest summed edge weight into the cluster.
///
/// Stops at `max_size` members or when no candidate scores above
/// [`CLUSTER_ADMIT_THRESHOLD`]. Ties go to the lexicographically smaller id.
pub fn greedy_cluster<F, E>(seed: &str, max_size: usize, mut neighbors: F) -> Result<Vec<String>, E>
where
    F: FnMut(&str) -> Result<Vec<(String, f64)>, E>,
{
    if max_size == 0 {
        return Ok(Vec::new());
    }

    let mut adjacency: HashMap<String, Vec<(String, f64)>> = HashMap::new();
    let mut cluster = vec![seed.to_string()];
    let mut members: HashSet<String> = HashSet::from([seed.to_string()]);

    while cluster.len() < max_size {
        let mut scores: HashMap<String, f64> = HashMap::new();
        for member in &cluster {
            if !adjacency.contains_key(member) {
                adjacency.insert(member.clone(), neighbors(member)?);
            }
            for (neighbor, weight) in adjacency.get(member).into_iter().flatten() {
                if !members.contains(neighbor) {
                    *scores.entry(neighbor.clone()).or_default() += weight;
                }
            }
        }

        let best = scores.into_iter().max_by(|(a_id, a), (b_id, b)| {
            a.partial_cmp(b)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b_id.cmp(a_id))
        });
        match best {
            Some((id, score)) if score > CLUSTER_ADMIT_THRESHOLD => {
                members.insert(id.clone());
                cluster.push(id);
            }
            _ => break,
        }
    }
    Ok(cluster)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    fn graph(edges: &[(&str, &str, f64)]) -> HashMap<String, Vec<(String, f64)>> {
        let mut adj: HashMap<String, Vec<(String, f64)>> = HashMap::new();
        for (a, b, w) in edges {
            adj.entry(a.to_string()).or_default().push((b.to_string(), *w));
            adj.entry(b.to_string()).or_default().push((a.to_string(), *w));
        }
        adj
    }

    fn lookup(
        adj: &HashMap<String, Vec<(String, f64)>>,
    ) -> impl FnMut(&str) -> Result<Vec<(String, f64)>, Infallible> + '_ {
        move |id| Ok(adj.get(id).cloned().unwrap_or_default())
    }

    #[test]
    fn reachable_respects_depth_and_excludes_seed() {
        let adj = graph(&[("a", "b", 1.0), ("b", "c", 1.0), ("c", "d", 1.0), ("d", "a", 1.0)]);
        let one = reachable("a", 1, lookup(&adj)).unwrap();
        assert_eq!(one.len(), 2);
        assert!(one.contains(&"b".to_string()) && one.contains(&"d".to_string()));
        let two = reachable("a", 2, lookup(&adj)).unwrap();
        assert_eq!(two.len(), 3);
        assert!(!two.contains(&"a".to_string()));
        assert!(reachable("a", 0, lookup(&adj)).unwrap().is_empty());
    }

    #[test]
    fn chain_shortest_path() {
        let adj = graph(&[("a", "b", 1.0), ("b", "c", 1.0), ("c", "d", 1.0)]);
        assert_eq!(
            shortest_path("a", "d", 5, lookup(&adj)).unwrap(),
            Some(vec!["a".into(), "b".into(), "c".into(), "d".into()])
        );
        assert_eq!(shortest_path("a", "d", 1, lookup(&adj)).unwrap(), None);
        assert_eq!(
            shortest_path("a", "d", 3, lookup(&adj)).unwrap().map(|p| p.len()),
            Some(4)
        );
        assert_eq!(shortest_path("b", "b", 0, lookup(&adj)).unwrap(), Some(vec!["b".into()]));
    }

    #[test]
    fn shortest_path_prefers_fewer_hops() {
        let adj = graph(&[("a", "b", 1.0), ("b", "c", 1.0), ("c", "d", 1.0), ("a", "d", 0.1)]);
        assert_eq!(
            shortest_path("a", "d", 5, lookup(&adj)).unwrap(),
            Some(vec!["a".into(), "d".into()])
        );
    }

    #[test]
    fn unreachable_is_none() {
        let adj = graph(&[("a", "b", 1.0), ("x", "y", 1.0)]);
        assert_eq!(shortest_path("a", "y", 10, lookup(&adj)).unwrap(), None);
    }

    #[test]
    fn greedy_cluster_stops_at_weak_edges() {
        let adj = graph(&[
            ("a", "b", 2.0),
            ("b", "c", 1.5),
            ("a", "c", 1.0),
            ("c", "x", 0.3),
        ]);
        let cluster = greedy_cluster("a", 10, lookup(&adj)).unwrap();
        assert_eq!(cluster, vec!["a", "b", "c"]);
    }

    #[test]
    fn greedy_cluster_honors_max_size() {
        let adj = graph(&[("a", "b", 2.0), ("a", "c", 3.0), ("a", "d", 1.0)]);
        assert_eq!(greedy_cluster("a", 2, lookup(&adj)).unwrap(), vec!["a", "c"]);
        assert!(greedy_cluster("a", 0, lookup(&adj)).unwrap().is_empty());
    }
}
