use crate::facts::NodeKind;
use crate::properties::NodeProperties;
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Oracle-provided annotation of a node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemanticContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_capability: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Canonical node: one or more merged component facts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Stable id derived from (kind, name, source_path)
    pub id: String,

    pub name: String,

    pub kind: NodeKind,

    pub properties: NodeProperties,

    /// Absent until enriched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic: Option<SemanticContext>,

    /// Created for an edge endpoint that no collector declared
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub placeholder: bool,
}

/// Merged edge between one ordered pair of nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub kind: String,

    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub protocols: BTreeSet<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Explicit system grouping with members resolved to node ids
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemBoundary {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub members: BTreeSet<String>,
}

/// Deduplicated dependency graph.
///
/// Mutated only by [`crate::GraphBuilder`] during ingestion; once handed out
/// by `GraphBuilder::finish` it is read-only apart from additive semantic
/// annotations.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    pub(crate) graph: DiGraph<GraphNode, GraphEdge>,

    /// Node id -> index
    pub(crate) id_index: HashMap<String, NodeIndex>,

    /// Node name -> ids carrying that name
    pub(crate) name_index: HashMap<String, BTreeSet<String>>,

    /// Ordered pair -> edge
    pub(crate) edge_index: HashMap<(NodeIndex, NodeIndex), EdgeIndex>,

    pub(crate) boundaries: Vec<SystemBoundary>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_node(&mut self, node: GraphNode) -> NodeIndex {
        let id = node.id.clone();
        let name = node.name.clone();

        let idx = self.graph.add_node(node);

        self.id_index.insert(id.clone(), idx);
        self.name_index.entry(name).or_default().insert(id);

        idx
    }

    /// Another spelling that slugged onto an existing node
    pub(crate) fn add_name_alias(&mut self, name: &str, id: &str) {
        self.name_index
            .entry(name.to_string())
            .or_default()
            .insert(id.to_string());
    }

    pub(crate) fn node_mut(&mut self, idx: NodeIndex) -> Option<&mut GraphNode> {
        self.graph.node_weight_mut(idx)
    }

    /// Returns true when the pair already had an edge
    pub(crate) fn merge_edge(&mut self, from: NodeIndex, to: NodeIndex, edge: GraphEdge) -> bool {
        if let Some(&existing) = self.edge_index.get(&(from, to)) {
            if let Some(current) = self.graph.edge_weight_mut(existing) {
                current.protocols.extend(edge.protocols);
                if current.description.is_none() {
                    current.description = edge.description;
                }
            }
            return true;
        }

        let idx = self.graph.add_edge(from, to, edge);
        self.edge_index.insert((from, to), idx);
        false
    }

    /// Find node by id
    pub fn find_node(&self, id: &str) -> Option<NodeIndex> {
        self.id_index.get(id).copied()
    }

    /// Smallest id among nodes carrying this name
    pub fn find_by_name(&self, name: &str) -> Option<&str> {
        self.name_index
            .get(name)
            .and_then(|ids| ids.iter().next())
            .map(String::as_str)
    }

    pub fn get_node(&self, idx: NodeIndex) -> Option<&GraphNode> {
        self.graph.node_weight(idx)
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.find_node(id).and_then(|idx| self.get_node(idx))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.id_index.contains_key(id)
    }

    pub fn edge(&self, source: &str, target: &str) -> Option<&GraphEdge> {
        let from = self.find_node(source)?;
        let to = self.find_node(target)?;
        self.edge_index
            .get(&(from, to))
            .and_then(|&idx| self.graph.edge_weight(idx))
    }

    /// All nodes, sorted by id
    pub fn nodes(&self) -> Vec<&GraphNode> {
        let mut nodes: Vec<&GraphNode> = self.graph.node_weights().collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        nodes
    }

    /// All edges as (source id, target id, edge), sorted by endpoint ids
    pub fn edges(&self) -> Vec<(&str, &str, &GraphEdge)> {
        let mut edges: Vec<(&str, &str, &GraphEdge)> = self
            .graph
            .edge_references()
            .map(|e| {
                (
                    self.graph[e.source()].id.as_str(),
                    self.graph[e.target()].id.as_str(),
                    e.weight(),
                )
            })
            .collect();
        edges.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        edges
    }

    pub fn boundaries(&self) -> &[SystemBoundary] {
        &self.boundaries
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Attach an oracle annotation. Only fills fields that are still empty.
    pub fn set_semantic(&mut self, id: &str, semantic: SemanticContext) -> crate::Result<()> {
        let idx = self
            .find_node(id)
            .ok_or_else(|| crate::GraphError::NodeNotFound(id.to_string()))?;
        let node = self
            .node_mut(idx)
            .ok_or_else(|| crate::GraphError::NodeNotFound(id.to_string()))?;

        let current = node.semantic.get_or_insert_with(SemanticContext::default);
        if current.purpose.is_none() {
            current.purpose = semantic.purpose;
        }
        if current.business_capability.is_none() {
            current.business_capability = semantic.business_capability;
        }
        if current.description.is_none() {
            current.description = semantic.description;
        }
        Ok(())
    }

    /// Node ids sorted, paired with their petgraph index
    pub(crate) fn sorted_indices(&self) -> Vec<(String, NodeIndex)> {
        let mut ids: Vec<(String, NodeIndex)> = self
            .id_index
            .iter()
            .map(|(id, &idx)| (id.clone(), idx))
            .collect();
        ids.sort();
        ids
    }

    pub(crate) fn id_of(&self, idx: NodeIndex) -> &str {
        &self.graph[idx].id
    }

    pub(crate) fn ids_by_kind(&self, predicate: impl Fn(&NodeKind) -> bool) -> BTreeSet<String> {
        self.graph
            .node_weights()
            .filter(|n| predicate(&n.kind))
            .map(|n| n.id.clone())
            .collect()
    }
}
