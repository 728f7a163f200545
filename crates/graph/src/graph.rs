use crate::types::DependencyGraph;
use petgraph::graph::NodeIndex;
use petgraph::Direction;
use std::collections::{BTreeSet, HashSet, VecDeque};

impl DependencyGraph {
    /// Nodes nothing points at
    pub fn entry_points(&self) -> BTreeSet<String> {
        self.graph
            .node_indices()
            .filter(|&idx| {
                self.graph
                    .neighbors_directed(idx, Direction::Incoming)
                    .next()
                    .is_none()
            })
            .map(|idx| self.id_of(idx).to_string())
            .collect()
    }

    /// Databases, caches and storage
    pub fn data_stores(&self) -> BTreeSet<String> {
        self.ids_by_kind(|kind| kind.is_data_store())
    }

    /// Everything transitively reachable from `id` along forward edges.
    /// The start node itself is excluded even when it sits on a cycle.
    pub fn descendants(&self, id: &str) -> BTreeSet<String> {
        let Some(start) = self.find_node(id) else {
            return BTreeSet::new();
        };

        let mut visited: HashSet<NodeIndex> = HashSet::new();
        let mut queue = VecDeque::from([start]);
        visited.insert(start);

        while let Some(current) = queue.pop_front() {
            for next in self.graph.neighbors_directed(current, Direction::Outgoing) {
                if visited.insert(next) {
                    queue.push_back(next);
                }
            }
        }

        visited.remove(&start);
        visited
            .into_iter()
            .map(|idx| self.id_of(idx).to_string())
            .collect()
    }

    /// Direct successors of `id`
    pub fn dependencies_of(&self, id: &str) -> BTreeSet<String> {
        self.find_node(id)
            .map(|idx| {
                self.graph
                    .neighbors_directed(idx, Direction::Outgoing)
                    .map(|next| self.id_of(next).to_string())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Direct predecessors of `id`
    pub fn dependents_of(&self, id: &str) -> BTreeSet<String> {
        self.find_node(id)
            .map(|idx| {
                self.graph
                    .neighbors_directed(idx, Direction::Incoming)
                    .map(|prev| self.id_of(prev).to_string())
                    .collect()
            })
            .unwrap_or_default()
    }
}
