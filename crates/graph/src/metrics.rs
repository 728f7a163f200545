//! Structural metrics over the frozen dependency graph.
//!
//! Both algorithms iterate nodes in id order so that results (including
//! floating-point rounding and merge tie-breaks) depend only on the graph,
//! never on the order facts were ingested in.

use crate::types::DependencyGraph;
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{BTreeMap, BTreeSet, HashMap};

pub const DAMPING: f64 = 0.85;
pub const MAX_ITERATIONS: usize = 100;
pub const TOLERANCE: f64 = 1e-6;

impl DependencyGraph {
    /// PageRank-style importance per node.
    ///
    /// Each round a node receives the damped share of every inbound
    /// neighbour's score (split across that neighbour's out-edges) plus a
    /// uniform teleport term. Mass held by nodes without out-edges is spread
    /// uniformly, so scores always sum to 1 and isolated nodes keep at least
    /// the teleport floor. Stops when no score moves by more than
    /// [`TOLERANCE`] or after [`MAX_ITERATIONS`] rounds.
    pub fn criticality(&self) -> BTreeMap<String, f64> {
        let nodes = self.sorted_indices();
        let n = nodes.len();
        if n == 0 {
            return BTreeMap::new();
        }

        let position: HashMap<NodeIndex, usize> = nodes
            .iter()
            .enumerate()
            .map(|(pos, (_, idx))| (*idx, pos))
            .collect();

        let out_degree: Vec<usize> = nodes
            .iter()
            .map(|(_, idx)| self.graph.neighbors_directed(*idx, Direction::Outgoing).count())
            .collect();

        let inbound: Vec<Vec<usize>> = nodes
            .iter()
            .map(|(_, idx)| {
                let mut preds: Vec<usize> = self
                    .graph
                    .neighbors_directed(*idx, Direction::Incoming)
                    .map(|p| position[&p])
                    .collect();
                preds.sort_unstable();
                preds
            })
            .collect();

        let size = n as f64;
        let mut rank = vec![1.0 / size; n];
        let mut next = vec![0.0; n];

        for iteration in 0..MAX_ITERATIONS {
            let dangling: f64 = rank
                .iter()
                .zip(&out_degree)
                .filter(|(_, &deg)| deg == 0)
                .map(|(score, _)| score)
                .sum();
            let base = (1.0 - DAMPING) / size + DAMPING * dangling / size;

            let mut delta: f64 = 0.0;
            for v in 0..n {
                let inflow: f64 = inbound[v]
                    .iter()
                    .map(|&u| rank[u] / out_degree[u] as f64)
                    .sum();
                next[v] = base + DAMPING * inflow;
                delta = delta.max((next[v] - rank[v]).abs());
            }

            std::mem::swap(&mut rank, &mut next);

            if delta < TOLERANCE {
                log::debug!("Criticality converged after {} iterations", iteration + 1);
                break;
            }
        }

        // Strip accumulated rounding drift
        let total: f64 = rank.iter().sum();
        if total > 0.0 {
            for score in &mut rank {
                *score /= total;
            }
        }

        nodes
            .into_iter()
            .zip(rank)
            .map(|((id, _), score)| (id, score))
            .collect()
    }

    /// Partition nodes into communities by greedy modularity maximisation
    /// (Clauset-Newman-Moore) over the undirected projection of the graph.
    ///
    /// Starts from singletons and repeatedly merges the pair of connected
    /// communities with the largest modularity gain until no merge improves
    /// modularity. Ties go to the pair whose smallest member ids sort first.
    /// Self-loops and edge direction are ignored; isolated nodes stay alone.
    pub fn subsystems(&self) -> Vec<BTreeSet<String>> {
        let nodes = self.sorted_indices();
        let n = nodes.len();
        if n == 0 {
            return Vec::new();
        }

        let position: HashMap<NodeIndex, usize> = nodes
            .iter()
            .enumerate()
            .map(|(pos, (_, idx))| (*idx, pos))
            .collect();

        // A->B and B->A collapse into one undirected link
        let mut links: BTreeSet<(usize, usize)> = BTreeSet::new();
        for edge in self.graph.edge_references() {
            let a = position[&edge.source()];
            let b = position[&edge.target()];
            if a != b {
                links.insert((a.min(b), a.max(b)));
            }
        }

        let mut members: Vec<Option<Vec<usize>>> = (0..n).map(|i| Some(vec![i])).collect();

        if !links.is_empty() {
            let two_m = 2.0 * links.len() as f64;

            // a[i]: fraction of edge ends attached to community i
            let mut a = vec![0.0; n];
            // e[(i, j)]: fraction of edge ends running between i and j, i < j
            let mut e: BTreeMap<(usize, usize), f64> = BTreeMap::new();
            for &(x, y) in &links {
                a[x] += 1.0 / two_m;
                a[y] += 1.0 / two_m;
                *e.entry((x, y)).or_default() += 1.0 / two_m;
            }

            loop {
                let mut best: Option<((usize, usize), f64)> = None;
                for (&(i, j), &e_ij) in &e {
                    let gain = 2.0 * (e_ij - a[i] * a[j]);
                    if best.map_or(true, |(_, best_gain)| gain > best_gain) {
                        best = Some(((i, j), gain));
                    }
                }

                let Some(((keep, absorb), gain)) = best else {
                    break;
                };
                if gain <= 0.0 {
                    break;
                }

                let absorbed = members[absorb].take().unwrap_or_default();
                if let Some(kept) = members[keep].as_mut() {
                    kept.extend(absorbed);
                }
                a[keep] += a[absorb];
                a[absorb] = 0.0;

                let mut merged: BTreeMap<(usize, usize), f64> = BTreeMap::new();
                for ((x, y), weight) in e {
                    let x = if x == absorb { keep } else { x };
                    let y = if y == absorb { keep } else { y };
                    if x == y {
                        continue;
                    }
                    *merged.entry((x.min(y), x.max(y))).or_default() += weight;
                }
                e = merged;
            }
        }

        // Slots are indexed by each community's smallest member, so this
        // order is already sorted by first id
        members
            .into_iter()
            .flatten()
            .map(|community| {
                community
                    .into_iter()
                    .map(|pos| nodes[pos].0.clone())
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::{ComponentFact, DependencyGraph, GraphBuilder, RelationshipFact};
    use std::collections::BTreeSet;

    fn graph(nodes: &[&str], edges: &[(&str, &str)]) -> DependencyGraph {
        let mut builder = GraphBuilder::new();
        for name in nodes {
            builder.upsert_node(ComponentFact::new(*name, "service"));
        }
        for (from, to) in edges {
            builder.upsert_edge(RelationshipFact::new(*from, *to, "calls"));
        }
        builder.finish().graph
    }

    fn assert_sums_to_one(scores: &std::collections::BTreeMap<String, f64>) {
        let total: f64 = scores.values().sum();
        assert!((total - 1.0).abs() < 1e-9, "scores sum to {total}");
        assert!(scores.values().all(|s| *s >= 0.0));
    }

    #[test]
    fn test_empty_graph_metrics() {
        let graph = DependencyGraph::new();
        assert!(graph.criticality().is_empty());
        assert!(graph.subsystems().is_empty());
        assert!(graph.entry_points().is_empty());
    }

    #[test]
    fn test_criticality_favours_sinks_of_many_edges() {
        let g = graph(&["a", "b", "c", "hub"], &[("a", "hub"), ("b", "hub"), ("c", "hub")]);
        let scores = g.criticality();

        assert_sums_to_one(&scores);
        let hub = scores["service_hub"];
        assert!(scores
            .iter()
            .filter(|(id, _)| id.as_str() != "service_hub")
            .all(|(_, s)| *s < hub));
    }

    #[test]
    fn test_criticality_tolerates_cycles_and_isolated_nodes() {
        let g = graph(&["a", "b", "c", "lonely"], &[("a", "b"), ("b", "c"), ("c", "a")]);
        let scores = g.criticality();

        assert_sums_to_one(&scores);
        let floor = (1.0 - super::DAMPING) / 4.0;
        assert!(scores["service_lonely"] >= floor);
        // symmetric cycle
        assert!((scores["service_a"] - scores["service_b"]).abs() < 1e-6);
    }

    #[test]
    fn test_subsystems_split_two_cliques() {
        let g = graph(
            &["a1", "a2", "a3", "b1", "b2", "b3"],
            &[
                ("a1", "a2"),
                ("a2", "a3"),
                ("a3", "a1"),
                ("b1", "b2"),
                ("b2", "b3"),
                ("b3", "b1"),
                ("a1", "b1"),
            ],
        );

        let communities = g.subsystems();
        assert_eq!(communities.len(), 2);

        let first: BTreeSet<String> = ["service_a1", "service_a2", "service_a3"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert!(communities.contains(&first));
    }

    #[test]
    fn test_subsystems_keep_isolated_nodes_alone() {
        let g = graph(&["a", "b", "solo"], &[("a", "b")]);
        let communities = g.subsystems();

        assert_eq!(communities.len(), 2);
        assert!(communities
            .iter()
            .any(|c| c.len() == 1 && c.contains("service_solo")));
    }
}
