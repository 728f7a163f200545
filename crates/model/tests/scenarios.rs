use archmap_graph::{
    identity_key, ComponentFact, DependencyGraph, FactSet, GraphBuilder, NodeKind,
    RelationshipFact,
};
use archmap_model::{
    C4Model, ClassifierConfig, ExternalCategory, ModelAssembler, RelationshipProjector, Tier,
    TierClassifier,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::collections::BTreeSet;

fn build(facts: FactSet) -> DependencyGraph {
    let mut builder = GraphBuilder::new();
    builder.ingest(facts);
    builder.finish().graph
}

fn recover(graph: &DependencyGraph) -> C4Model {
    let classification = TierClassifier::new(ClassifierConfig::default(), "demo").classify(graph);
    let projection = RelationshipProjector::new(&classification).project(graph);
    ModelAssembler::new("demo").assemble(graph, &classification, &projection)
}

#[test]
fn three_services_in_one_default_system() {
    let graph = build(FactSet {
        components: vec![
            ComponentFact::new("A", "service"),
            ComponentFact::new("B", "service"),
            ComponentFact::new("C", "database"),
        ],
        relationships: vec![
            RelationshipFact::new("A", "B", "calls"),
            RelationshipFact::new("B", "C", "queries"),
        ],
        ..Default::default()
    });

    let entry: Vec<String> = graph.entry_points().into_iter().collect();
    assert_eq!(entry, vec!["service_a"]);

    let model = recover(&graph);
    assert_eq!(model.systems.len(), 1);
    assert_eq!(model.systems[0].name, "demo");
    assert_eq!(
        model.systems[0].container_ids,
        vec!["database_c", "service_a", "service_b"]
    );

    assert_eq!(model.relationships.len(), 2);
    assert!(model.relationships.iter().all(|r| r.tier == Tier::Container));
    assert_eq!(model.relationships[0].description, "calls relationship");
    assert_eq!(model.relationships[1].description, "queries relationship");
    assert!(model.validate().is_ok());
}

#[test]
fn many_redis_images_make_one_cache_system() {
    let components = (0..5)
        .map(|i| {
            ComponentFact::new(format!("svc-{i}"), "service")
                .with_metadata("image", json!(format!("redis:{i}")))
        })
        .collect();
    let model = recover(&build(FactSet {
        components,
        ..Default::default()
    }));

    let externals: Vec<_> = model.systems.iter().filter(|s| s.external).collect();
    assert_eq!(externals.len(), 1);
    assert_eq!(externals[0].id, ExternalCategory::Cache.system_id());
    assert_eq!(externals[0].name, "Cache");
    assert!(externals[0].tags.contains("external"));
}

#[test]
fn longest_prefix_picks_the_enclosing_container() {
    let graph = build(FactSet {
        components: vec![
            ComponentFact::new("a", "service").with_source_path("svc-a"),
            ComponentFact::new("a-sub", "service").with_source_path("svc-a/sub"),
            ComponentFact::new("handler", "function").with_source_path("svc-a/handler.py"),
        ],
        ..Default::default()
    });
    let model = recover(&graph);

    let handler_id = identity_key(&NodeKind::CodeUnit, "handler", Some("svc-a/handler.py"));
    let outer = identity_key(&NodeKind::Service, "a", Some("svc-a"));
    assert_eq!(
        model.component(&handler_id).and_then(|c| c.container_id.clone()),
        Some(outer)
    );
}

#[test]
fn unresolved_component_edges_never_reach_the_model() {
    let graph = build(FactSet {
        components: vec![
            ComponentFact::new("api", "service").with_source_path("api"),
            ComponentFact::new("orphan1", "function").with_source_path("scripts/one.py"),
            ComponentFact::new("orphan2", "function").with_source_path("scripts/two.py"),
        ],
        relationships: vec![
            RelationshipFact::new("orphan1", "orphan2", "calls"),
            RelationshipFact::new("orphan2", "api", "calls"),
        ],
        ..Default::default()
    });
    let model = recover(&graph);

    // Orphans stay in the model, unassigned
    assert_eq!(model.components.len(), 2);
    assert!(model.components.iter().all(|c| c.container_id.is_none()));

    let touched: BTreeSet<&str> = model
        .relationships
        .iter()
        .flat_map(|r| [r.source_id.as_str(), r.target_id.as_str()])
        .collect();
    assert!(model.relationships.is_empty(), "unexpected {touched:?}");
}

#[test]
fn placeholder_endpoints_surface_as_external_systems() {
    let graph = build(FactSet {
        components: vec![ComponentFact::new("api", "service")],
        relationships: vec![RelationshipFact::new("api", "payments-gateway", "calls")],
        ..Default::default()
    });
    let model = recover(&graph);

    let placeholder = model.system("unknown_payments_gateway").unwrap();
    assert!(placeholder.external);
    assert_eq!(placeholder.description, "payments-gateway - unknown in the system");
    assert_eq!(model.relationships.len(), 1);
    assert_eq!(model.relationships[0].source_id, "system_demo");
    assert_eq!(model.relationships[0].target_id, "unknown_payments_gateway");
}

#[test]
fn repeated_runs_are_identical() {
    let facts = FactSet {
        components: vec![
            ComponentFact::new("web", "frontend"),
            ComponentFact::new("api", "service"),
            ComponentFact::new("queue", "infrastructure")
                .with_metadata("resource_type", json!("aws_sqs_queue")),
        ],
        relationships: vec![
            RelationshipFact::new("web", "api", "calls").with_protocol("https"),
            RelationshipFact::new("api", "queue", "publishes"),
        ],
        ..Default::default()
    };

    let mut reversed = facts.clone();
    reversed.components.reverse();
    reversed.relationships.reverse();

    let first = recover(&build(facts));
    let second = recover(&build(reversed));
    assert_eq!(first, second);
}
