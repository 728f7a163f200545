//! Collector-facing fact schema.
//!
//! Facts are immutable observations emitted by independent collectors
//! (Dockerfile/Compose/Kubernetes/Terraform parsers, source AST walkers).
//! The graph consumes them; nothing here knows how they were produced.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Kind of a deployable or code-level unit
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeKind {
    Service,
    Database,
    Cache,
    Queue,
    Frontend,
    Ingress,
    Storage,
    External,
    /// Function, class, method or module extracted from source code
    CodeUnit,
    /// Managed cloud resource declared in infrastructure-as-code
    Infrastructure,
    /// Placeholder for an endpoint that was referenced but never declared
    #[default]
    Unknown,
    Other(String),
}

impl NodeKind {
    pub fn parse(raw: &str) -> Self {
        let normalized = raw.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "service" | "app" | "application" | "worker" => Self::Service,
            "database" | "db" => Self::Database,
            "cache" => Self::Cache,
            "queue" | "broker" | "topic" => Self::Queue,
            "frontend" | "web" | "ui" => Self::Frontend,
            "ingress" | "api-gateway" | "gateway" | "load-balancer" => Self::Ingress,
            "storage" | "bucket" => Self::Storage,
            "external" => Self::External,
            "code-unit" | "function" | "class" | "method" | "module" | "component" => {
                Self::CodeUnit
            }
            "infrastructure" | "resource" | "terraform" => Self::Infrastructure,
            "" | "unknown" => Self::Unknown,
            _ => Self::Other(raw.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Service => "service",
            Self::Database => "database",
            Self::Cache => "cache",
            Self::Queue => "queue",
            Self::Frontend => "frontend",
            Self::Ingress => "ingress",
            Self::Storage => "storage",
            Self::External => "external",
            Self::CodeUnit => "code-unit",
            Self::Infrastructure => "infrastructure",
            Self::Unknown => "unknown",
            Self::Other(raw) => raw,
        }
    }

    /// Deployable units that become C4 containers
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            Self::Service
                | Self::Database
                | Self::Cache
                | Self::Queue
                | Self::Frontend
                | Self::Ingress
        )
    }

    pub fn is_data_store(&self) -> bool {
        matches!(self, Self::Database | Self::Cache | Self::Storage)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for NodeKind {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<&str> for NodeKind {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl From<NodeKind> for String {
    fn from(kind: NodeKind) -> Self {
        kind.as_str().to_string()
    }
}

/// Observation about one component
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentFact {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub kind: NodeKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technology: Option<String>,

    /// Repository-relative path the fact was extracted from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,

    #[serde(default, deserialize_with = "string_or_number_list")]
    pub exposed_ports: Vec<String>,

    #[serde(default)]
    pub environment: BTreeMap<String, String>,

    #[serde(default)]
    pub declared_dependencies: Vec<String>,

    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl ComponentFact {
    pub fn new(name: impl Into<String>, kind: impl Into<NodeKind>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            ..Default::default()
        }
    }

    pub fn with_technology(mut self, technology: impl Into<String>) -> Self {
        self.technology = Some(technology.into());
        self
    }

    pub fn with_source_path(mut self, path: impl Into<String>) -> Self {
        self.source_path = Some(path.into());
        self
    }

    pub fn with_port(mut self, port: impl Into<String>) -> Self {
        self.exposed_ports.push(port.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    pub fn with_dependency(mut self, dependency: impl Into<String>) -> Self {
        self.declared_dependencies.push(dependency.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Observation about a directed interaction between two components
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipFact {
    /// Node id or node name of the caller
    #[serde(default)]
    pub source_id: String,

    /// Node id or node name of the callee
    #[serde(default)]
    pub target_id: String,

    #[serde(default = "default_relationship_kind")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn default_relationship_kind() -> String {
    "uses".to_string()
}

impl RelationshipFact {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source.into(),
            target_id: target.into(),
            kind: kind.into(),
            protocol: None,
            description: None,
        }
    }

    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = Some(protocol.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Explicit grouping of nodes into one software system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemBoundaryFact {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Node ids or node names
    #[serde(default)]
    pub members: Vec<String>,
}

/// Everything the collectors produced for one repository
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FactSet {
    #[serde(default)]
    pub components: Vec<ComponentFact>,

    #[serde(default)]
    pub relationships: Vec<RelationshipFact>,

    #[serde(default)]
    pub systems: Vec<SystemBoundaryFact>,
}

impl FactSet {
    pub fn is_empty(&self) -> bool {
        self.components.is_empty() && self.relationships.is_empty() && self.systems.is_empty()
    }

    /// Concatenate the output of another collector
    pub fn extend(&mut self, other: FactSet) {
        self.components.extend(other.components);
        self.relationships.extend(other.relationships);
        self.systems.extend(other.systems);
    }
}

// Compose files write ports as numbers or "8080:80" strings.
fn string_or_number_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|value| match value {
            serde_json::Value::String(s) => Some(s),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .collect())
}
