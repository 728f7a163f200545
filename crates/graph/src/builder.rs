use crate::facts::{ComponentFact, FactSet, NodeKind, RelationshipFact, SystemBoundaryFact};
use crate::identity::{identity_key, node_id};
use crate::properties::NodeProperties;
use crate::types::*;
use petgraph::graph::NodeIndex;
use std::collections::BTreeSet;
use std::fmt;

/// Recoverable problem met during ingestion. None of these abort the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestWarning {
    /// Component fact without a name; kept under a synthetic id
    MalformedFact { id: String },

    /// Edge endpoint never declared; replaced by a placeholder node
    UnresolvedReference { reference: String, placeholder: String },

    /// Edge with a blank endpoint
    DroppedEdge { source: String, target: String },

    /// System boundary member that matches no node
    UnknownBoundaryMember { system: String, member: String },
}

impl fmt::Display for IngestWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedFact { id } => {
                write!(f, "component fact without a name stored as {id}")
            }
            Self::UnresolvedReference {
                reference,
                placeholder,
            } => write!(
                f,
                "relationship endpoint '{reference}' was never declared, using placeholder {placeholder}"
            ),
            Self::DroppedEdge { source, target } => {
                write!(f, "dropped relationship with blank endpoint ('{source}' -> '{target}')")
            }
            Self::UnknownBoundaryMember { system, member } => {
                write!(f, "system '{system}' lists unknown member '{member}'")
            }
        }
    }
}

/// Ingestion counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub component_facts: usize,
    pub relationship_facts: usize,
    pub merged_nodes: usize,
    pub merged_edges: usize,
    pub placeholders: usize,
}

/// Single writer of the dependency graph.
///
/// Facts may arrive from many collector calls, but they are merged one at a
/// time through `&mut self`. Relationship facts whose endpoints are not yet
/// known are parked and resolved in [`GraphBuilder::finish`], so the final
/// graph does not depend on the order facts arrived in.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    graph: DependencyGraph,
    pending: Vec<RelationshipFact>,
    boundaries: Vec<SystemBoundaryFact>,
    warnings: Vec<IngestWarning>,
    stats: IngestStats,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingest everything one collector produced
    pub fn ingest(&mut self, facts: FactSet) {
        for fact in facts.components {
            self.upsert_node(fact);
        }
        for fact in facts.relationships {
            self.upsert_edge(fact);
        }
        for fact in facts.systems {
            self.add_system_boundary(fact);
        }
    }

    /// Merge a component fact into the graph, returning its node id
    pub fn upsert_node(&mut self, fact: ComponentFact) -> String {
        self.stats.component_facts += 1;

        let id = node_id(&fact);
        if fact.name.trim().is_empty() {
            log::warn!("Component fact of kind '{}' has no name, using {}", fact.kind, id);
            self.warnings
                .push(IngestWarning::MalformedFact { id: id.clone() });
        }

        let properties = NodeProperties::from_fact(&fact);

        if let Some(idx) = self.graph.find_node(&id) {
            if let Some(node) = self.graph.node_mut(idx) {
                node.properties.merge(properties);
            }
            let name = fact.name.trim();
            if !name.is_empty() {
                self.graph.add_name_alias(name, &id);
            }
            self.stats.merged_nodes += 1;
            log::debug!("Merged fact into existing node {id}");
            return id;
        }

        let name = if fact.name.trim().is_empty() {
            id.clone()
        } else {
            fact.name.trim().to_string()
        };

        self.graph.add_node(GraphNode {
            id: id.clone(),
            name,
            kind: fact.kind,
            properties,
            semantic: None,
            placeholder: false,
        });
        id
    }

    /// Merge a relationship fact. Endpoints that are not (yet) known by id are
    /// resolved when ingestion finishes.
    pub fn upsert_edge(&mut self, fact: RelationshipFact) {
        self.stats.relationship_facts += 1;

        let source = fact.source_id.trim();
        let target = fact.target_id.trim();
        if source.is_empty() || target.is_empty() {
            log::warn!(
                "Dropping relationship with blank endpoint ('{}' -> '{}')",
                fact.source_id,
                fact.target_id
            );
            self.warnings.push(IngestWarning::DroppedEdge {
                source: fact.source_id,
                target: fact.target_id,
            });
            return;
        }

        match (self.graph.find_node(source), self.graph.find_node(target)) {
            (Some(from), Some(to)) => self.merge_edge(from, to, &fact),
            _ => self.pending.push(fact),
        }
    }

    /// Register an explicit system grouping; members are resolved at finish
    pub fn add_system_boundary(&mut self, fact: SystemBoundaryFact) {
        self.boundaries.push(fact);
    }

    pub fn warnings(&self) -> &[IngestWarning] {
        &self.warnings
    }

    pub fn stats(&self) -> IngestStats {
        self.stats
    }

    /// Number of relationship facts still waiting for their endpoints
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// End the write phase: resolve parked edges and boundaries, then hand the
    /// graph over read-only.
    pub fn finish(mut self) -> BuildOutput {
        let pending = std::mem::take(&mut self.pending);
        for fact in pending {
            let from = self.resolve_or_placeholder(fact.source_id.trim());
            let to = self.resolve_or_placeholder(fact.target_id.trim());
            self.merge_edge(from, to, &fact);
        }

        let boundaries = std::mem::take(&mut self.boundaries);
        for fact in boundaries {
            let boundary = self.resolve_boundary(fact);
            self.graph.boundaries.push(boundary);
        }

        log::info!(
            "Built dependency graph: {} nodes, {} edges ({} placeholders, {} warnings)",
            self.graph.node_count(),
            self.graph.edge_count(),
            self.stats.placeholders,
            self.warnings.len()
        );

        BuildOutput {
            graph: self.graph,
            warnings: self.warnings,
            stats: self.stats,
        }
    }

    fn merge_edge(&mut self, from: NodeIndex, to: NodeIndex, fact: &RelationshipFact) {
        let kind = fact.kind.trim();
        let edge = GraphEdge {
            kind: if kind.is_empty() {
                "uses".to_string()
            } else {
                kind.to_string()
            },
            protocols: fact
                .protocol
                .iter()
                .map(|p| p.trim().to_ascii_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
            description: fact
                .description
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
        };

        if self.graph.merge_edge(from, to, edge) {
            self.stats.merged_edges += 1;
        }
    }

    fn resolve(&self, reference: &str) -> Option<NodeIndex> {
        self.graph.find_node(reference).or_else(|| {
            self.graph
                .find_by_name(reference)
                .and_then(|id| self.graph.find_node(id))
        })
    }

    fn resolve_or_placeholder(&mut self, reference: &str) -> NodeIndex {
        if let Some(idx) = self.resolve(reference) {
            return idx;
        }

        let id = identity_key(&NodeKind::Unknown, reference, None);
        if let Some(idx) = self.graph.find_node(&id) {
            return idx;
        }

        log::warn!("Relationship endpoint '{reference}' was never declared, creating {id}");
        self.stats.placeholders += 1;
        self.warnings.push(IngestWarning::UnresolvedReference {
            reference: reference.to_string(),
            placeholder: id.clone(),
        });

        self.graph.add_node(GraphNode {
            id,
            name: reference.to_string(),
            kind: NodeKind::Unknown,
            properties: NodeProperties::default(),
            semantic: None,
            placeholder: true,
        })
    }

    fn resolve_boundary(&mut self, fact: SystemBoundaryFact) -> SystemBoundary {
        let mut members = BTreeSet::new();
        for member in &fact.members {
            match self.resolve(member.trim()) {
                Some(idx) => {
                    members.insert(self.graph.id_of(idx).to_string());
                }
                None => {
                    log::warn!("System '{}' lists unknown member '{member}'", fact.name);
                    self.warnings.push(IngestWarning::UnknownBoundaryMember {
                        system: fact.name.clone(),
                        member: member.clone(),
                    });
                }
            }
        }

        SystemBoundary {
            name: fact.name,
            description: fact
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            members,
        }
    }
}

/// Frozen graph plus what ingestion had to recover from
#[derive(Debug)]
pub struct BuildOutput {
    pub graph: DependencyGraph,
    pub warnings: Vec<IngestWarning>,
    pub stats: IngestStats,
}
