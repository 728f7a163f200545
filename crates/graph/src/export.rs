use crate::error::Result;
use crate::types::{DependencyGraph, GraphEdge, GraphNode, SystemBoundary};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Structural metrics document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub component_criticality: BTreeMap<String, f64>,
    pub subsystems: Vec<Vec<String>>,
    pub entry_points: Vec<String>,
    pub data_stores: Vec<String>,
}

#[derive(Serialize)]
struct GraphExport<'a> {
    nodes: Vec<&'a GraphNode>,
    edges: Vec<EdgeExport<'a>>,
    systems: &'a [SystemBoundary],
}

#[derive(Serialize)]
struct EdgeExport<'a> {
    source: &'a str,
    target: &'a str,
    #[serde(flatten)]
    edge: &'a GraphEdge,
}

impl DependencyGraph {
    pub fn metrics_report(&self) -> MetricsReport {
        MetricsReport {
            component_criticality: self.criticality(),
            subsystems: self
                .subsystems()
                .into_iter()
                .map(|community| community.into_iter().collect())
                .collect(),
            entry_points: self.entry_points().into_iter().collect(),
            data_stores: self.data_stores().into_iter().collect(),
        }
    }

    /// Pretty JSON dump of nodes, edges and system boundaries
    pub fn to_json(&self) -> Result<String> {
        let export = GraphExport {
            nodes: self.nodes(),
            edges: self
                .edges()
                .into_iter()
                .map(|(source, target, edge)| EdgeExport {
                    source,
                    target,
                    edge,
                })
                .collect(),
            systems: self.boundaries(),
        };
        Ok(serde_json::to_string_pretty(&export)?)
    }
}

#[cfg(test)]
mod tests {
    use crate::{ComponentFact, GraphBuilder, RelationshipFact};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_metrics_report_shape() {
        let mut builder = GraphBuilder::new();
        builder.upsert_node(ComponentFact::new("api", "service"));
        builder.upsert_node(ComponentFact::new("pg", "database"));
        builder.upsert_edge(RelationshipFact::new("api", "pg", "queries"));
        let graph = builder.finish().graph;

        let report = graph.metrics_report();
        assert_eq!(report.entry_points, vec!["service_api"]);
        assert_eq!(report.data_stores, vec!["database_pg"]);
        assert_eq!(report.subsystems, vec![vec!["database_pg", "service_api"]]);
        assert_eq!(report.component_criticality.len(), 2);

        let json = serde_json::to_value(&report).unwrap();
        assert!(json["component_criticality"]["service_api"].is_number());
    }

    #[test]
    fn test_graph_json_lists_edges_with_endpoints() {
        let mut builder = GraphBuilder::new();
        builder.upsert_node(ComponentFact::new("api", "service"));
        builder.upsert_edge(RelationshipFact::new("api", "ghost", "calls").with_protocol("grpc"));
        let graph = builder.finish().graph;

        let value: serde_json::Value = serde_json::from_str(&graph.to_json().unwrap()).unwrap();
        assert_eq!(value["nodes"].as_array().unwrap().len(), 2);
        assert_eq!(value["edges"][0]["source"], "service_api");
        assert_eq!(value["edges"][0]["target"], "unknown_ghost");
        assert_eq!(value["edges"][0]["protocols"][0], "grpc");
    }
}
