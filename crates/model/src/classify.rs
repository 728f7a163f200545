//! Tier classification and containment over a frozen dependency graph.
//!
//! Every node receives exactly one [`Tier`]. Containers come from deployable
//! kinds, components from code units (or anything tagged `component`), and
//! everything else is a system-level node outside the recovered system.
//! Systems themselves are synthesized: one per explicit boundary, a default
//! one for ungrouped containers, and one per external-service category
//! detected from infrastructure resources and container images.

use crate::config::{ClassifierConfig, ExternalCategory};
use archmap_graph::{normalize_path, slugify, DependencyGraph, GraphNode, NodeKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// C4 abstraction level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    System,
    Container,
    Component,
}

impl Tier {
    /// 0 for the coarsest level
    pub fn depth(self) -> u8 {
        match self {
            Self::System => 0,
            Self::Container => 1,
            Self::Component => 2,
        }
    }
}

/// Where a synthesized system came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum SystemOrigin {
    /// Holds containers no boundary claimed
    Default,
    /// Explicit boundary fact
    Boundary,
    /// One per detected external-service category
    Category(ExternalCategory),
    /// A system-tier graph node standing for itself
    Node,
}

/// A system element before assembly
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemElement {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub external: bool,
    pub origin: SystemOrigin,
    /// Container ids owned by this system
    pub containers: BTreeSet<String>,
}

/// Result of classifying one graph. Immutable once produced.
#[derive(Debug, Clone, Default)]
pub struct Classification {
    tiers: BTreeMap<String, Tier>,
    /// Component id -> owning container id (None = unresolved)
    containment: BTreeMap<String, Option<String>>,
    /// Container id -> owning system id
    container_system: BTreeMap<String, String>,
    /// System-tier node id -> system element id
    aliases: BTreeMap<String, String>,
    /// Keyed by system id
    systems: BTreeMap<String, SystemElement>,
    categories: BTreeSet<ExternalCategory>,
    /// Category -> id of its synthesized system
    category_systems: BTreeMap<ExternalCategory, String>,
    /// Container or component id -> category system its image/resource matched
    category_users: BTreeMap<String, String>,
}

impl Classification {
    pub fn tier(&self, node_id: &str) -> Option<Tier> {
        self.tiers.get(node_id).copied()
    }

    pub fn tiers(&self) -> &BTreeMap<String, Tier> {
        &self.tiers
    }

    /// Node ids in one tier, sorted
    pub fn ids_in(&self, tier: Tier) -> impl Iterator<Item = &str> {
        self.tiers
            .iter()
            .filter(move |(_, t)| **t == tier)
            .map(|(id, _)| id.as_str())
    }

    /// Owning container of a component; None when unresolved or not a component
    pub fn container_of(&self, component_id: &str) -> Option<&str> {
        self.containment
            .get(component_id)
            .and_then(|c| c.as_deref())
    }

    pub fn system_of(&self, container_id: &str) -> Option<&str> {
        self.container_system.get(container_id).map(String::as_str)
    }

    /// System element a system-tier node maps to
    pub fn system_for_node(&self, node_id: &str) -> Option<&str> {
        self.aliases.get(node_id).map(String::as_str)
    }

    pub fn system(&self, system_id: &str) -> Option<&SystemElement> {
        self.systems.get(system_id)
    }

    /// Synthesized systems, sorted by id
    pub fn systems(&self) -> impl Iterator<Item = &SystemElement> {
        self.systems.values()
    }

    pub fn categories(&self) -> &BTreeSet<ExternalCategory> {
        &self.categories
    }

    /// System id synthesized for a detected category
    pub fn category_system(&self, category: ExternalCategory) -> Option<&str> {
        self.category_systems.get(&category).map(String::as_str)
    }

    /// Internal elements whose image or resource type matched a category,
    /// paired with that category's system id
    pub fn category_users(&self) -> impl Iterator<Item = (&str, &str)> {
        self.category_users
            .iter()
            .map(|(node, system)| (node.as_str(), system.as_str()))
    }

    /// Owning system of a container or (resolved) component
    pub fn owning_system(&self, element_id: &str) -> Option<&str> {
        match self.tier(element_id)? {
            Tier::Container => self.system_of(element_id),
            Tier::Component => self
                .container_of(element_id)
                .and_then(|container| self.system_of(container)),
            Tier::System => self.system_for_node(element_id),
        }
    }

    /// Next coarser element for a classified element id
    pub fn parent(&self, element_id: &str, tier: Tier) -> Option<&str> {
        match tier {
            Tier::Component => self.container_of(element_id),
            Tier::Container => self.system_of(element_id),
            Tier::System => None,
        }
    }
}

/// Assigns tiers, containment and systems
pub struct TierClassifier {
    config: ClassifierConfig,
    repository_name: String,
}

impl TierClassifier {
    pub fn new(config: ClassifierConfig, repository_name: impl Into<String>) -> Self {
        Self {
            config,
            repository_name: repository_name.into(),
        }
    }

    pub fn repository_name(&self) -> &str {
        &self.repository_name
    }

    /// Id of the system holding ungrouped containers
    pub fn default_system_id(&self) -> String {
        system_id(&self.repository_name)
    }

    pub fn classify(&self, graph: &DependencyGraph) -> Classification {
        let nodes = graph.nodes();
        let mut result = Classification::default();

        for node in &nodes {
            result.tiers.insert(node.id.clone(), tier_of(node));
        }

        self.resolve_containment(&nodes, &mut result);
        self.group_containers(graph, &nodes, &mut result);
        self.synthesize_externals(&nodes, &mut result);

        log::info!(
            "Classified {} nodes: {} containers, {} components, {} systems ({} external categories)",
            nodes.len(),
            result.ids_in(Tier::Container).count(),
            result.ids_in(Tier::Component).count(),
            result.systems.len(),
            result.categories.len()
        );

        result
    }

    fn resolve_containment(&self, nodes: &[&GraphNode], result: &mut Classification) {
        // Longest path first, then smallest id
        let mut containers: Vec<(String, &str)> = nodes
            .iter()
            .filter(|n| result.tiers.get(&n.id) == Some(&Tier::Container))
            .filter_map(|n| {
                n.properties
                    .source_path
                    .as_deref()
                    .map(|p| (normalize_path(p), n.id.as_str()))
            })
            .collect();
        containers.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.1.cmp(b.1)));

        for node in nodes {
            if result.tiers.get(&node.id) != Some(&Tier::Component) {
                continue;
            }

            let owner = node.properties.source_path.as_deref().and_then(|path| {
                let path = normalize_path(path);
                containers
                    .iter()
                    .find(|(prefix, _)| is_path_prefix(prefix, &path))
                    .map(|(_, id)| id.to_string())
            });

            if owner.is_none() {
                log::debug!("Component {} has no owning container", node.id);
            }
            result.containment.insert(node.id.clone(), owner);
        }
    }

    fn group_containers(
        &self,
        graph: &DependencyGraph,
        nodes: &[&GraphNode],
        result: &mut Classification,
    ) {
        let mut boundaries: Vec<_> = graph.boundaries().iter().collect();
        boundaries.sort_by(|a, b| system_id(&a.name).cmp(&system_id(&b.name)));

        for boundary in boundaries {
            let id = free_system_id(system_id(&boundary.name), result);
            let system = result
                .systems
                .entry(id.clone())
                .or_insert_with(|| SystemElement {
                    id: id.clone(),
                    name: boundary.name.clone(),
                    description: boundary.description.clone(),
                    external: false,
                    origin: SystemOrigin::Boundary,
                    containers: BTreeSet::new(),
                });

            for member in &boundary.members {
                let container = match result.tiers.get(member) {
                    Some(Tier::Container) => Some(member.clone()),
                    Some(Tier::Component) => result
                        .containment
                        .get(member)
                        .and_then(|c| c.clone()),
                    _ => None,
                };
                let Some(container) = container else {
                    continue;
                };

                if let Some(owner) = result.container_system.get(&container) {
                    if owner != &id {
                        log::warn!(
                            "Container {} listed in systems {} and {}; keeping {}",
                            container,
                            owner,
                            id,
                            owner
                        );
                    }
                    continue;
                }
                system.containers.insert(container.clone());
                result.container_system.insert(container, id.clone());
            }
        }

        let ungrouped: BTreeSet<String> = nodes
            .iter()
            .filter(|n| result.tiers.get(&n.id) == Some(&Tier::Container))
            .filter(|n| !result.container_system.contains_key(&n.id))
            .map(|n| n.id.clone())
            .collect();

        let has_internal = result.systems.values().any(|s| !s.external);
        if !ungrouped.is_empty() || !has_internal {
            let id = free_system_id(self.default_system_id(), result);
            let system = result
                .systems
                .entry(id.clone())
                .or_insert_with(|| SystemElement {
                    id: id.clone(),
                    name: self.repository_name.clone(),
                    description: None,
                    external: false,
                    origin: SystemOrigin::Default,
                    containers: BTreeSet::new(),
                });
            for container in ungrouped {
                system.containers.insert(container.clone());
                result.container_system.insert(container, id.clone());
            }
        }
    }

    fn synthesize_externals(&self, nodes: &[&GraphNode], result: &mut Classification) {
        let mut matches: Vec<(&GraphNode, ExternalCategory)> = Vec::new();
        for node in nodes {
            let by_resource = node
                .properties
                .resource_type
                .as_deref()
                .and_then(|rt| self.config.match_resource(rt));
            let by_image = node
                .properties
                .image
                .as_deref()
                .and_then(|image| self.config.match_image(image));

            if let Some(category) = by_resource.or(by_image) {
                if result.categories.insert(category) {
                    log::debug!("External {} detected via {}", category, node.id);
                }
                matches.push((node, category));
            }
        }

        for category in result.categories.clone() {
            let id = free_system_id(category.system_id().to_string(), result);
            result.category_systems.insert(category, id.clone());
            result
                .systems
                .entry(id.clone())
                .or_insert_with(|| SystemElement {
                    id,
                    name: category.display_name().to_string(),
                    description: Some(category.description().to_string()),
                    external: true,
                    origin: SystemOrigin::Category(category),
                    containers: BTreeSet::new(),
                });
        }

        for (node, category) in matches {
            let Some(system) = result.category_systems.get(&category).cloned() else {
                continue;
            };
            match result.tiers.get(&node.id) {
                // Matching system-tier resources fold into their category
                Some(Tier::System) => {
                    result.aliases.insert(node.id.clone(), system);
                }
                Some(_) => {
                    result.category_users.insert(node.id.clone(), system);
                }
                None => {}
            }
        }

        for node in nodes {
            if result.tiers.get(&node.id) != Some(&Tier::System)
                || result.aliases.contains_key(&node.id)
            {
                continue;
            }
            result.aliases.insert(node.id.clone(), node.id.clone());
            result
                .systems
                .entry(node.id.clone())
                .or_insert_with(|| SystemElement {
                    id: node.id.clone(),
                    name: node.name.clone(),
                    description: node.properties.description.clone(),
                    external: true,
                    origin: SystemOrigin::Node,
                    containers: BTreeSet::new(),
                });
        }
    }
}

/// A synthesized system id that no container or component already uses
fn free_system_id(base: String, result: &Classification) -> String {
    let taken = |id: &str| {
        result
            .tiers
            .get(id)
            .is_some_and(|tier| *tier != Tier::System)
    };
    if !taken(&base) {
        return base;
    }

    let mut candidate = format!("{base}_system");
    let mut n = 2;
    while taken(&candidate) {
        candidate = format!("{base}_system_{n}");
        n += 1;
    }
    log::warn!("System id {base} is already used by a graph element; using {candidate}");
    candidate
}

/// `system_<slug>` id for a system name
pub fn system_id(name: &str) -> String {
    format!("system_{}", slugify(name))
}

fn tier_of(node: &GraphNode) -> Tier {
    let tags = &node.properties.tags;
    if tags.contains("component") {
        Tier::Component
    } else if tags.contains("container") {
        Tier::Container
    } else if tags.contains("external") {
        Tier::System
    } else if node.kind.is_container() {
        Tier::Container
    } else if node.kind == NodeKind::CodeUnit {
        Tier::Component
    } else {
        Tier::System
    }
}

/// Segment-aware prefix test; the empty prefix (repository root) matches all
fn is_path_prefix(prefix: &str, path: &str) -> bool {
    if prefix.is_empty() || prefix == path {
        return true;
    }
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.starts_with('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use archmap_graph::{ComponentFact, FactSet, GraphBuilder, SystemBoundaryFact};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn classify(facts: FactSet) -> (DependencyGraph, Classification) {
        let mut builder = GraphBuilder::new();
        builder.ingest(facts);
        let graph = builder.finish().graph;
        let classification = TierClassifier::new(ClassifierConfig::default(), "shop").classify(&graph);
        (graph, classification)
    }

    fn facts(components: Vec<ComponentFact>) -> FactSet {
        FactSet {
            components,
            ..Default::default()
        }
    }

    #[test]
    fn test_path_prefix_is_segment_aware() {
        assert!(is_path_prefix("svc-a", "svc-a/handler.py"));
        assert!(is_path_prefix("svc-a", "svc-a"));
        assert!(is_path_prefix("", "anything/at/all"));
        assert!(!is_path_prefix("svc-a", "svc-ab/handler.py"));
        assert!(!is_path_prefix("svc-a/sub", "svc-a/handler.py"));
    }

    #[test]
    fn test_tiers_by_kind_and_tag() {
        let (_, c) = classify(facts(vec![
            ComponentFact::new("api", "service"),
            ComponentFact::new("handler", "function"),
            ComponentFact::new("stripe", "external"),
            ComponentFact::new("odd", "service").with_metadata("tags", json!(["component"])),
        ]));

        assert_eq!(c.tier("service_api"), Some(Tier::Container));
        assert_eq!(c.tier("code_unit_handler"), Some(Tier::Component));
        assert_eq!(c.tier("external_stripe"), Some(Tier::System));
        assert_eq!(c.tier("service_odd"), Some(Tier::Component));
    }

    #[test]
    fn test_containment_longest_prefix() {
        let (_, c) = classify(facts(vec![
            ComponentFact::new("a", "service").with_source_path("svc-a"),
            ComponentFact::new("sub", "service").with_source_path("svc-a/sub"),
            ComponentFact::new("handler", "function").with_source_path("svc-a/handler.py"),
            ComponentFact::new("deep", "function").with_source_path("./svc-a/sub/deep.py"),
            ComponentFact::new("stray", "function").with_source_path("other/x.py"),
            ComponentFact::new("nopath", "function"),
        ]));

        let a = archmap_graph::identity_key(&NodeKind::Service, "a", Some("svc-a"));
        let sub = archmap_graph::identity_key(&NodeKind::Service, "sub", Some("svc-a/sub"));
        let handler = archmap_graph::identity_key(&NodeKind::CodeUnit, "handler", Some("svc-a/handler.py"));
        let deep = archmap_graph::identity_key(&NodeKind::CodeUnit, "deep", Some("svc-a/sub/deep.py"));
        let stray = archmap_graph::identity_key(&NodeKind::CodeUnit, "stray", Some("other/x.py"));

        assert_eq!(c.container_of(&handler), Some(a.as_str()));
        assert_eq!(c.container_of(&deep), Some(sub.as_str()));
        assert_eq!(c.container_of(&stray), None);
        assert_eq!(c.container_of("code_unit_nopath"), None);
        assert_eq!(c.tier("code_unit_nopath"), Some(Tier::Component));
    }

    #[test]
    fn test_default_system_holds_all_containers() {
        let (_, c) = classify(facts(vec![
            ComponentFact::new("a", "service"),
            ComponentFact::new("b", "service"),
            ComponentFact::new("c", "database"),
        ]));

        let systems: Vec<_> = c.systems().collect();
        assert_eq!(systems.len(), 1);
        assert_eq!(systems[0].id, "system_shop");
        assert_eq!(systems[0].name, "shop");
        assert_eq!(systems[0].origin, SystemOrigin::Default);
        assert_eq!(systems[0].containers.len(), 3);
        assert_eq!(c.system_of("database_c"), Some("system_shop"));
    }

    #[test]
    fn test_empty_graph_still_has_default_system() {
        let (_, c) = classify(FactSet::default());
        let systems: Vec<_> = c.systems().collect();
        assert_eq!(systems.len(), 1);
        assert!(systems[0].containers.is_empty());
    }

    #[test]
    fn test_boundaries_group_containers() {
        let mut input = facts(vec![
            ComponentFact::new("orders", "service"),
            ComponentFact::new("billing", "service"),
            ComponentFact::new("loner", "service"),
        ]);
        input.systems.push(SystemBoundaryFact {
            name: "Commerce".into(),
            description: Some("Order handling".into()),
            members: vec!["orders".into(), "service_billing".into()],
        });
        let (_, c) = classify(input);

        assert_eq!(c.system_of("service_orders"), Some("system_commerce"));
        assert_eq!(c.system_of("service_billing"), Some("system_commerce"));
        // Unclaimed container falls back to the default system
        assert_eq!(c.system_of("service_loner"), Some("system_shop"));
        assert_eq!(
            c.system("system_commerce").and_then(|s| s.description.as_deref()),
            Some("Order handling")
        );
    }

    #[test]
    fn test_boundaries_only_no_default_system() {
        let mut input = facts(vec![ComponentFact::new("orders", "service")]);
        input.systems.push(SystemBoundaryFact {
            name: "Commerce".into(),
            description: None,
            members: vec!["orders".into()],
        });
        let (_, c) = classify(input);
        assert!(c.system("system_shop").is_none());
    }

    #[test]
    fn test_redis_images_synthesize_one_cache() {
        let (_, c) = classify(facts(vec![
            ComponentFact::new("sessions", "cache").with_metadata("image", json!("redis:7")),
            ComponentFact::new("ratelimit", "service").with_metadata("image", json!("bitnami/redis")),
        ]));

        let externals: Vec<_> = c.systems().filter(|s| s.external).collect();
        assert_eq!(externals.len(), 1);
        assert_eq!(externals[0].id, "external_cache");
        assert_eq!(externals[0].name, "Cache");
        assert_eq!(externals[0].origin, SystemOrigin::Category(ExternalCategory::Cache));
        // The containers themselves stay containers
        assert_eq!(c.tier("cache_sessions"), Some(Tier::Container));
    }

    #[test]
    fn test_infrastructure_absorbed_into_category() {
        let (_, c) = classify(facts(vec![
            ComponentFact::new("orders-queue", "infrastructure")
                .with_metadata("resource_type", json!("aws_sqs_queue")),
            ComponentFact::new("events", "infrastructure")
                .with_metadata("resource_type", json!("aws_sns_topic")),
            ComponentFact::new("bucket", "infrastructure")
                .with_metadata("resource_type", json!("aws_s3_bucket")),
        ]));

        assert_eq!(
            c.system_for_node("infrastructure_orders_queue"),
            Some("external_message_queue")
        );
        assert_eq!(c.system_for_node("infrastructure_events"), Some("external_message_queue"));
        // Unrecognised resource stands for itself
        assert_eq!(
            c.system_for_node("infrastructure_bucket"),
            Some("infrastructure_bucket")
        );
        assert_eq!(c.systems().filter(|s| s.external).count(), 2);
    }

    #[test]
    fn test_category_id_taken_by_container_is_renamed() {
        let (_, c) = classify(facts(vec![
            ComponentFact::new("cache", "external").with_metadata("tags", json!(["container"])),
            ComponentFact::new("sessions", "cache").with_metadata("image", json!("redis:7")),
        ]));

        assert_eq!(c.tier("external_cache"), Some(Tier::Container));
        assert_eq!(
            c.category_system(ExternalCategory::Cache),
            Some("external_cache_system")
        );
        let cache = c.system("external_cache_system").unwrap();
        assert!(cache.external);
        assert!(c.system("external_cache").is_none());
    }

    #[test]
    fn test_image_matches_record_category_users() {
        let (_, c) = classify(facts(vec![
            ComponentFact::new("api", "service").with_source_path("api"),
            ComponentFact::new("sessions", "cache").with_metadata("image", json!("redis:7")),
            ComponentFact::new("queue", "infrastructure")
                .with_metadata("resource_type", json!("aws_sqs_queue")),
        ]));

        let users: Vec<(&str, &str)> = c.category_users().collect();
        assert_eq!(users, vec![("cache_sessions", "external_cache")]);
        assert_eq!(c.owning_system("cache_sessions"), Some("system_shop"));
        // System-tier resources are aliased, not users
        assert_eq!(
            c.system_for_node("infrastructure_queue"),
            Some("external_message_queue")
        );
    }
}
