use archmap_graph::{ComponentFact, DependencyGraph, FactSet, GraphBuilder, RelationshipFact};
use proptest::prelude::*;
use std::collections::BTreeSet;

const KINDS: &[&str] = &["service", "database", "cache", "queue", "function"];

fn fact_set() -> impl Strategy<Value = FactSet> {
    (1usize..12).prop_flat_map(|n| {
        (
            prop::collection::vec(0usize..KINDS.len(), n),
            prop::collection::vec((0..n, 0..n), 0..(n * 3)),
        )
            .prop_map(move |(kinds, edges)| FactSet {
                components: kinds
                    .iter()
                    .enumerate()
                    .map(|(i, &k)| ComponentFact::new(format!("node-{i}"), KINDS[k]))
                    .collect(),
                relationships: edges
                    .iter()
                    .map(|(a, b)| {
                        RelationshipFact::new(format!("node-{a}"), format!("node-{b}"), "calls")
                    })
                    .collect(),
                systems: Vec::new(),
            })
    })
}

fn build(facts: FactSet) -> DependencyGraph {
    let mut builder = GraphBuilder::new();
    builder.ingest(facts);
    builder.finish().graph
}

fn reversed(facts: &FactSet) -> FactSet {
    let mut facts = facts.clone();
    facts.components.reverse();
    facts.relationships.reverse();
    facts
}

proptest! {
    #[test]
    fn criticality_is_a_distribution(facts in fact_set()) {
        let graph = build(facts);
        let scores = graph.criticality();

        prop_assert_eq!(scores.len(), graph.node_count());
        prop_assert!(scores.values().all(|s| *s >= 0.0));
        let total: f64 = scores.values().sum();
        prop_assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn subsystems_partition_every_node(facts in fact_set()) {
        let graph = build(facts);
        let communities = graph.subsystems();

        let mut seen = BTreeSet::new();
        for community in &communities {
            prop_assert!(!community.is_empty());
            for id in community {
                prop_assert!(seen.insert(id.clone()), "{} appears twice", id);
            }
        }
        let all: BTreeSet<String> = graph.nodes().iter().map(|n| n.id.clone()).collect();
        prop_assert_eq!(seen, all);
    }

    #[test]
    fn ingestion_order_does_not_matter(facts in fact_set()) {
        let forward = build(facts.clone());
        let backward = build(reversed(&facts));

        let ids = |g: &DependencyGraph| -> Vec<String> { g.nodes().iter().map(|n| n.id.clone()).collect() };
        let edges = |g: &DependencyGraph| -> Vec<(String, String)> {
            g.edges().iter().map(|(s, t, _)| (s.to_string(), t.to_string())).collect()
        };

        prop_assert_eq!(ids(&forward), ids(&backward));
        prop_assert_eq!(edges(&forward), edges(&backward));
        prop_assert_eq!(forward.criticality(), backward.criticality());
        prop_assert_eq!(forward.subsystems(), backward.subsystems());
    }

    #[test]
    fn ingesting_twice_changes_nothing(facts in fact_set()) {
        let once = build(facts.clone());

        let mut doubled = facts.clone();
        doubled.extend(facts);
        let twice = build(doubled);

        prop_assert_eq!(once.node_count(), twice.node_count());
        prop_assert_eq!(once.edge_count(), twice.edge_count());
    }
}
