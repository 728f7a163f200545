use crate::classify::{Classification, SystemElement, SystemOrigin, Tier};
use crate::model::{
    C4Model, Component, Container, DescriptionSource, Person, Relationship, SoftwareSystem,
};
use crate::project::{ProjectedEdge, Projection};
use archmap_graph::{DependencyGraph, GraphNode, NodeKind};
use std::collections::BTreeSet;

pub const USER_ID: &str = "user";

/// Deterministic description used until (or unless) the oracle answers
pub fn fallback_description(name: &str, kind: &NodeKind) -> String {
    format!("{name} - {kind} in the system")
}

pub fn fallback_relationship_description(kind: &str) -> String {
    format!("{kind} relationship")
}

/// Builds the C4 model from classified nodes and projected edges
pub struct ModelAssembler {
    repository_name: String,
}

impl ModelAssembler {
    pub fn new(repository_name: impl Into<String>) -> Self {
        Self {
            repository_name: repository_name.into(),
        }
    }

    pub fn assemble(
        &self,
        graph: &DependencyGraph,
        classification: &Classification,
        projection: &Projection,
    ) -> C4Model {
        let containers: Vec<Container> = classification
            .ids_in(Tier::Container)
            .filter_map(|id| graph.node(id))
            .map(|node| self.container(node, classification))
            .collect();

        let components: Vec<Component> = classification
            .ids_in(Tier::Component)
            .filter_map(|id| graph.node(id))
            .map(|node| self.component(node, classification))
            .collect();

        let systems: Vec<SoftwareSystem> = classification
            .systems()
            .map(|element| {
                let node = match element.origin {
                    SystemOrigin::Node => graph.node(&element.id),
                    _ => None,
                };
                self.system(element, node)
            })
            .collect();

        let mut relationships: Vec<Relationship> =
            projection.edges.iter().map(relationship).collect();

        let entered = user_facing_systems(graph, classification);
        let people = if entered.is_empty() {
            Vec::new()
        } else {
            vec![Person {
                id: USER_ID.to_string(),
                name: "User".to_string(),
                description: "System user".to_string(),
            }]
        };
        relationships.extend(entered.into_iter().map(|system| Relationship {
            source_id: USER_ID.to_string(),
            target_id: system,
            description: "Uses".to_string(),
            description_source: DescriptionSource::Synthesized,
            technology: None,
            protocol: None,
            tier: Tier::System,
            derived_from: BTreeSet::new(),
        }));

        let model = C4Model {
            name: self.repository_name.clone(),
            description: format!("Architecture model for {}", self.repository_name),
            people,
            systems,
            containers,
            components,
            relationships,
        };

        log::info!(
            "Assembled model: {} systems, {} containers, {} components, {} relationships",
            model.systems.len(),
            model.containers.len(),
            model.components.len(),
            model.relationships.len()
        );

        model
    }

    fn system(
        &self,
        element: &SystemElement,
        node: Option<&GraphNode>,
    ) -> SoftwareSystem {
        let (description, description_source) = match (node, &element.origin) {
            (Some(node), _) => describe(node),
            (None, SystemOrigin::Default) => {
                ("The main system".to_string(), DescriptionSource::Synthesized)
            }
            (None, SystemOrigin::Boundary) => match &element.description {
                Some(text) => (text.clone(), DescriptionSource::Fact),
                None => (
                    format!("The {} system", element.name),
                    DescriptionSource::Synthesized,
                ),
            },
            (None, _) => (
                element
                    .description
                    .clone()
                    .unwrap_or_else(|| format!("The {} system", element.name)),
                DescriptionSource::Synthesized,
            ),
        };

        let mut tags: BTreeSet<String> = node
            .map(|n| n.properties.tags.clone())
            .unwrap_or_default();
        if element.external {
            tags.insert("external".to_string());
        }

        SoftwareSystem {
            id: element.id.clone(),
            name: element.name.clone(),
            description,
            description_source,
            technology: node.map(technology_list).unwrap_or_default(),
            tags,
            external: element.external,
            container_ids: element.containers.iter().cloned().collect(),
        }
    }

    fn container(&self, node: &GraphNode, classification: &Classification) -> Container {
        let (description, description_source) = describe(node);
        let props = &node.properties;

        let mut tags = props.tags.clone();
        tags.insert(node.kind.to_string());

        Container {
            id: node.id.clone(),
            name: node.name.clone(),
            description,
            description_source,
            technology: technology_list(node),
            tags,
            runtime_environment: props.image.clone().or_else(|| props.technology.clone()),
            exposed_ports: parse_ports(&props.exposed_ports),
            environment_vars: props.environment.clone(),
            dependencies: props.dependencies.clone(),
            system_id: classification.system_of(&node.id).map(str::to_string),
        }
    }

    fn component(&self, node: &GraphNode, classification: &Classification) -> Component {
        let (description, description_source) = describe(node);
        let props = &node.properties;

        let source_files = if props.source_files.is_empty() {
            props.source_path.iter().cloned().collect()
        } else {
            props.source_files.clone()
        };

        Component {
            id: node.id.clone(),
            name: node.name.clone(),
            description,
            description_source,
            technology: technology_list(node),
            tags: props.tags.clone(),
            container_id: classification.container_of(&node.id).map(str::to_string),
            interfaces: props.interfaces.clone(),
            source_files,
        }
    }
}

/// Systems reached through a frontend or ingress nobody else calls
fn user_facing_systems(
    graph: &DependencyGraph,
    classification: &Classification,
) -> BTreeSet<String> {
    graph
        .entry_points()
        .iter()
        .filter_map(|id| graph.node(id))
        .filter(|node| matches!(node.kind, NodeKind::Frontend | NodeKind::Ingress))
        .filter_map(|node| classification.owning_system(&node.id))
        .map(str::to_string)
        .collect()
}

fn relationship(edge: &ProjectedEdge) -> Relationship {
    let (description, description_source) = match &edge.description {
        Some(text) => (text.clone(), DescriptionSource::Fact),
        None => (
            fallback_relationship_description(&edge.kind),
            DescriptionSource::Fallback,
        ),
    };

    let technology = if edge.protocols.is_empty() {
        None
    } else {
        Some(edge.protocols.iter().cloned().collect::<Vec<_>>().join(", "))
    };
    let protocol = match edge.protocols.len() {
        1 => edge.protocols.iter().next().cloned(),
        _ => None,
    };

    Relationship {
        source_id: edge.source_id.clone(),
        target_id: edge.target_id.clone(),
        description,
        description_source,
        technology,
        protocol,
        tier: edge.tier,
        derived_from: edge.derived_from.clone(),
    }
}

/// Collector description first, then enrichment, then the fallback
fn describe(node: &GraphNode) -> (String, DescriptionSource) {
    if let Some(text) = node
        .properties
        .description
        .as_deref()
        .filter(|d| !d.trim().is_empty())
    {
        return (text.to_string(), DescriptionSource::Fact);
    }

    let enriched = node.semantic.as_ref().and_then(|s| {
        s.description
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .or_else(|| s.purpose.as_deref().filter(|p| !p.trim().is_empty()))
    });
    match enriched {
        Some(text) => (text.to_string(), DescriptionSource::Oracle),
        None => (
            fallback_description(&node.name, &node.kind),
            DescriptionSource::Fallback,
        ),
    }
}

/// Comma-separated technology, never synthesized
fn technology_list(node: &GraphNode) -> Vec<String> {
    node.properties
        .technology
        .as_deref()
        .map(|tech| {
            tech.split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// `8080`, `8080/tcp` and `80:8080` all yield the container-side port
fn parse_ports(raw: &[String]) -> Vec<u16> {
    let mut ports = Vec::new();
    for entry in raw {
        let container_side = entry.rsplit(':').next().unwrap_or(entry);
        let number = container_side.split('/').next().unwrap_or(container_side);
        match number.trim().parse::<u16>() {
            Ok(port) if !ports.contains(&port) => ports.push(port),
            Ok(_) => {}
            Err(_) => log::debug!("Ignoring unparseable port '{entry}'"),
        }
    }
    ports
}
