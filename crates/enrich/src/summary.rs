//! Oracle request construction from the frozen graph.

use crate::oracle::{OracleRequest, Subject};
use archmap_graph::{DependencyGraph, GraphEdge, GraphNode, NodeKind, NodeProperties};
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Serialize)]
struct NodeSummary<'a> {
    name: &'a str,
    kind: &'a NodeKind,
    properties: &'a NodeProperties,
}

#[derive(Serialize)]
struct EdgeSummary<'a> {
    source: &'a str,
    target: &'a str,
    kind: &'a str,
    protocols: &'a BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
}

pub fn node_request(node: &GraphNode, max_chars: usize) -> OracleRequest {
    let summary = serde_json::to_string(&NodeSummary {
        name: &node.name,
        kind: &node.kind,
        properties: &node.properties,
    })
    .unwrap_or_default();

    OracleRequest {
        subject: Subject::node(&node.id),
        summary: truncate_chars(summary, max_chars),
    }
}

pub fn edge_request(source: &str, target: &str, edge: &GraphEdge, max_chars: usize) -> OracleRequest {
    let summary = serde_json::to_string(&EdgeSummary {
        source,
        target,
        kind: &edge.kind,
        protocols: &edge.protocols,
        description: edge.description.as_deref(),
    })
    .unwrap_or_default();

    OracleRequest {
        subject: Subject::edge(source, target),
        summary: truncate_chars(summary, max_chars),
    }
}

/// One request per node not yet annotated, then one per edge, in id order
pub fn requests_for(graph: &DependencyGraph, max_chars: usize) -> Vec<OracleRequest> {
    let nodes = graph
        .nodes()
        .into_iter()
        .filter(|n| n.semantic.is_none())
        .map(|n| node_request(n, max_chars));
    let edges = graph
        .edges()
        .into_iter()
        .map(|(s, t, e)| edge_request(s, t, e, max_chars));
    nodes.chain(edges).collect()
}

fn truncate_chars(text: String, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text,
    }
}
