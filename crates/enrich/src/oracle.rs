use crate::error::{OracleError, Result};
use archmap_graph::SemanticContext;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// What an oracle request is about
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Subject {
    Node { id: String },
    Edge { source: String, target: String },
}

impl Subject {
    pub fn node(id: impl Into<String>) -> Self {
        Self::Node { id: id.into() }
    }

    pub fn edge(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self::Edge {
            source: source.into(),
            target: target.into(),
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node { id } => write!(f, "node {id}"),
            Self::Edge { source, target } => write!(f, "edge {source} -> {target}"),
        }
    }
}

/// Bounded-size description of one node or edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleRequest {
    pub subject: Subject,
    /// Serialized properties, truncated to the configured size
    pub summary: String,
}

/// Oracle answer; every field optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_capability: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Annotation {
    pub fn is_empty(&self) -> bool {
        self.purpose.is_none()
            && self.business_capability.is_none()
            && self.protocol.is_none()
            && self.description.is_none()
    }

    /// Text to show as an element description: description, else purpose
    pub fn display_text(&self) -> Option<&str> {
        self.description
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .or_else(|| self.purpose.as_deref().filter(|p| !p.trim().is_empty()))
    }

    pub fn to_semantic(&self) -> SemanticContext {
        SemanticContext {
            purpose: self.purpose.clone(),
            business_capability: self.business_capability.clone(),
            description: self.description.clone(),
        }
    }
}

/// External service that annotates nodes and edges with meaning.
///
/// Implementations must be cheap to share across tasks; the coordinator
/// calls `annotate` concurrently and wraps every call in a timeout.
#[async_trait]
pub trait SemanticOracle: Send + Sync {
    async fn annotate(&self, request: OracleRequest) -> Result<Annotation>;
}

/// Oracle backed by a fixed table of answers
#[derive(Debug, Clone, Default)]
pub struct StaticOracle {
    nodes: HashMap<String, Annotation>,
    edges: HashMap<(String, String), Annotation>,
}

#[derive(Deserialize)]
struct AnnotationDocument {
    #[serde(default)]
    nodes: HashMap<String, Annotation>,
    #[serde(default)]
    edges: Vec<EdgeAnnotation>,
}

#[derive(Deserialize)]
struct EdgeAnnotation {
    source: String,
    target: String,
    #[serde(flatten)]
    annotation: Annotation,
}

impl StaticOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `{ "nodes": { id: annotation }, "edges": [ { source, target, ...annotation } ] }`
    pub fn from_json(raw: &str) -> Result<Self> {
        let doc: AnnotationDocument = serde_json::from_str(raw)?;
        let mut oracle = Self::new();
        oracle.nodes = doc.nodes;
        for edge in doc.edges {
            oracle
                .edges
                .insert((edge.source, edge.target), edge.annotation);
        }
        Ok(oracle)
    }

    pub fn with_node(mut self, id: impl Into<String>, annotation: Annotation) -> Self {
        self.nodes.insert(id.into(), annotation);
        self
    }

    pub fn with_edge(
        mut self,
        source: impl Into<String>,
        target: impl Into<String>,
        annotation: Annotation,
    ) -> Self {
        self.edges.insert((source.into(), target.into()), annotation);
        self
    }

    pub fn len(&self) -> usize {
        self.nodes.len() + self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SemanticOracle for StaticOracle {
    async fn annotate(&self, request: OracleRequest) -> Result<Annotation> {
        let found = match &request.subject {
            Subject::Node { id } => self.nodes.get(id),
            Subject::Edge { source, target } => {
                self.edges.get(&(source.clone(), target.clone()))
            }
        };
        found
            .cloned()
            .ok_or_else(|| OracleError::NoAnswer(request.subject.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn request(subject: Subject) -> OracleRequest {
        OracleRequest {
            subject,
            summary: String::new(),
        }
    }

    #[tokio::test]
    async fn test_static_oracle_answers_from_table() {
        let oracle = StaticOracle::from_json(
            r#"{
                "nodes": { "service_api": { "purpose": "Serves the storefront" } },
                "edges": [ { "source": "service_api", "target": "database_pg", "protocol": "postgresql" } ]
            }"#,
        )
        .unwrap();
        assert_eq!(oracle.len(), 2);

        let node = oracle.annotate(request(Subject::node("service_api"))).await.unwrap();
        assert_eq!(node.display_text(), Some("Serves the storefront"));

        let edge = oracle
            .annotate(request(Subject::edge("service_api", "database_pg")))
            .await
            .unwrap();
        assert_eq!(edge.protocol.as_deref(), Some("postgresql"));

        let missing = oracle.annotate(request(Subject::node("nope"))).await;
        assert_eq!(missing, Err(OracleError::NoAnswer("node nope".into())));
    }

    #[test]
    fn test_invalid_document() {
        let err = StaticOracle::from_json("{ not json").unwrap_err();
        assert!(matches!(err, OracleError::InvalidResponse(_)));
    }

    #[test]
    fn test_display_text_prefers_description() {
        let annotation = Annotation {
            purpose: Some("purpose".into()),
            description: Some("description".into()),
            ..Default::default()
        };
        assert_eq!(annotation.display_text(), Some("description"));
        assert!(Annotation::default().is_empty());
        assert_eq!(Annotation::default().display_text(), None);
    }
}
