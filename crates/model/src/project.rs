//! Projection of graph edges onto C4 tiers.
//!
//! An edge whose endpoints sit on different tiers is promoted on the finer
//! side (component -> owning container -> owning system) until both sides
//! meet. Edges that cannot be promoted are dropped, as are edges that
//! collapse onto a single element.
//!
//! A component edge that crosses containers is kept at component tier and
//! also contributes to the relationship between the two containers. Internal
//! elements whose image or resource matched an external category get a
//! system-level `uses` relationship to that category's system.

use crate::classify::{Classification, Tier};
use archmap_graph::{DependencyGraph, GraphEdge};
use std::collections::{BTreeMap, BTreeSet};

const USES: &str = "uses";

/// One relationship after promotion and merging
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectedEdge {
    pub source_id: String,
    pub target_id: String,
    pub tier: Tier,
    /// Kind of the first contributing graph edge
    pub kind: String,
    pub protocols: BTreeSet<String>,
    pub description: Option<String>,
    /// Contributing graph edges as (source node id, target node id)
    pub derived_from: BTreeSet<(String, String)>,
}

#[derive(Debug, Clone, Default)]
pub struct Projection {
    /// Sorted by (source_id, target_id)
    pub edges: Vec<ProjectedEdge>,
    /// Edges with a side that could not be promoted
    pub dropped: usize,
    /// Edges whose endpoints collapsed onto one element
    pub self_edges: usize,
}

impl Projection {
    pub fn at(&self, tier: Tier) -> impl Iterator<Item = &ProjectedEdge> {
        self.edges.iter().filter(move |e| e.tier == tier)
    }
}

pub struct RelationshipProjector<'a> {
    classification: &'a Classification,
}

impl<'a> RelationshipProjector<'a> {
    pub fn new(classification: &'a Classification) -> Self {
        Self { classification }
    }

    pub fn project(&self, graph: &DependencyGraph) -> Projection {
        let mut merged: BTreeMap<(String, String), ProjectedEdge> = BTreeMap::new();
        let mut dropped = 0;
        let mut self_edges = 0;

        for (source, target, edge) in graph.edges() {
            let Some((from, to, tier)) = self.promote_pair(source, target) else {
                log::debug!("Dropping {source} -> {target}: endpoint has no enclosing element");
                dropped += 1;
                continue;
            };

            if from == to {
                self_edges += 1;
                continue;
            }

            if tier == Tier::Component {
                if let Some((from_container, to_container)) = self.crossing_containers(&from, &to) {
                    merge_into(
                        &mut merged,
                        from_container,
                        to_container,
                        Tier::Container,
                        source,
                        target,
                        edge,
                    );
                }
            }
            merge_into(&mut merged, from, to, tier, source, target, edge);
        }

        for (user, category_system) in self.classification.category_users() {
            let Some(system) = self.classification.owning_system(user) else {
                continue;
            };
            if system != category_system {
                merged
                    .entry((system.to_string(), category_system.to_string()))
                    .or_insert_with(|| ProjectedEdge {
                        source_id: system.to_string(),
                        target_id: category_system.to_string(),
                        tier: Tier::System,
                        kind: USES.to_string(),
                        protocols: BTreeSet::new(),
                        description: None,
                        derived_from: BTreeSet::new(),
                    });
            }
        }

        log::info!(
            "Projected {} graph edges onto {} relationships ({} dropped, {} collapsed)",
            graph.edge_count(),
            merged.len(),
            dropped,
            self_edges
        );

        Projection {
            edges: merged.into_values().collect(),
            dropped,
            self_edges,
        }
    }

    /// Element a graph node stands for, before any promotion
    fn element(&self, node_id: &str) -> Option<(String, Tier)> {
        match self.classification.tier(node_id)? {
            Tier::System => self
                .classification
                .system_for_node(node_id)
                .map(|id| (id.to_string(), Tier::System)),
            tier => Some((node_id.to_string(), tier)),
        }
    }

    fn promote(&self, id: &str, tier: Tier) -> Option<(String, Tier)> {
        let parent = self.classification.parent(id, tier)?.to_string();
        let tier = match tier {
            Tier::Component => Tier::Container,
            Tier::Container | Tier::System => Tier::System,
        };
        Some((parent, tier))
    }

    /// Owning containers of two components when they differ
    fn crossing_containers(&self, from: &str, to: &str) -> Option<(String, String)> {
        let from = self.classification.container_of(from)?;
        let to = self.classification.container_of(to)?;
        (from != to).then(|| (from.to_string(), to.to_string()))
    }

    /// Both endpoints on one tier, or None when promotion gets stuck
    fn promote_pair(&self, source: &str, target: &str) -> Option<(String, String, Tier)> {
        let (mut from, mut from_tier) = self.element(source)?;
        let (mut to, mut to_tier) = self.element(target)?;

        while from_tier != to_tier {
            if from_tier.depth() > to_tier.depth() {
                (from, from_tier) = self.promote(&from, from_tier)?;
            } else {
                (to, to_tier) = self.promote(&to, to_tier)?;
            }
        }

        // A component edge is only meaningful inside resolved containers
        if from_tier == Tier::Component
            && (self.classification.container_of(&from).is_none()
                || self.classification.container_of(&to).is_none())
        {
            return None;
        }

        Some((from, to, from_tier))
    }
}

fn merge_into(
    merged: &mut BTreeMap<(String, String), ProjectedEdge>,
    from: String,
    to: String,
    tier: Tier,
    source: &str,
    target: &str,
    edge: &GraphEdge,
) {
    let entry = merged
        .entry((from.clone(), to.clone()))
        .or_insert_with(|| ProjectedEdge {
            source_id: from,
            target_id: to,
            tier,
            kind: edge.kind.clone(),
            protocols: BTreeSet::new(),
            description: None,
            derived_from: BTreeSet::new(),
        });

    entry.protocols.extend(edge.protocols.iter().cloned());
    if entry.description.is_none() {
        entry.description = edge.description.clone();
    }
    entry
        .derived_from
        .insert((source.to_string(), target.to_string()));
}
