//! C4-PlantUML markup for the three diagram levels.
//!
//! One element or relationship per line, in the fixed call forms the
//! C4-PlantUML macros expect. The optional trailing technology argument of
//! `Rel` is emitted only when non-empty.

use crate::classify::Tier;
use crate::model::{C4Model, Component, Container, Person, Relationship, SoftwareSystem};
use std::collections::BTreeSet;

const INCLUDE_BASE: &str = "https://raw.githubusercontent.com/plantuml-stdlib/C4-PlantUML/master";

/// A rendered diagram and the file name it is written under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagram {
    pub file_name: String,
    pub content: String,
}

/// System context: people, every system, system-tier relationships
pub fn render_context(model: &C4Model) -> String {
    let mut out = header("C4_Context", &format!("System Context diagram for {}", model.name));

    for person in &model.people {
        push_person(&mut out, person);
    }
    for system in &model.systems {
        push_system(&mut out, system, "");
    }
    out.push('\n');

    for rel in model.relationships_at(Tier::System) {
        push_rel(&mut out, rel);
    }

    footer(out)
}

/// Containers grouped by their system, external systems alongside
pub fn render_containers(model: &C4Model) -> String {
    let mut out = header("C4_Container", &format!("Container diagram for {}", model.name));

    for system in model.systems.iter().filter(|s| !s.external) {
        out.push_str(&format!(
            "System_Boundary({}, \"{}\") {{\n",
            system.id,
            quote(&system.name)
        ));
        for container in model
            .containers
            .iter()
            .filter(|c| c.system_id.as_deref() == Some(system.id.as_str()))
        {
            push_container(&mut out, container, "    ");
        }
        out.push_str("}\n");
    }

    for container in model.containers.iter().filter(|c| {
        c.system_id
            .as_deref()
            .map_or(true, |id| model.system(id).is_none())
    }) {
        push_container(&mut out, container, "");
    }

    for system in model.systems.iter().filter(|s| s.external) {
        push_system(&mut out, system, "");
    }
    out.push('\n');

    // Container-level edges plus the system-level edges involving externals
    for rel in model.relationships_at(Tier::Container) {
        push_rel(&mut out, rel);
    }
    for rel in model.relationships_at(Tier::System).filter(|r| {
        model.system(&r.source_id).is_some_and(|s| s.external)
            || model.system(&r.target_id).is_some_and(|s| s.external)
    }) {
        push_rel(&mut out, rel);
    }

    footer(out)
}

/// Components of one container and their edges to components elsewhere;
/// None when the container is unknown or empty
pub fn render_components(model: &C4Model, container_id: &str) -> Option<String> {
    let container = model.container(container_id)?;
    let components: Vec<&Component> = model.components_of(container_id).collect();
    if components.is_empty() {
        return None;
    }

    let mut out = header(
        "C4_Component",
        &format!("Component diagram for {}", container.name),
    );

    out.push_str(&format!(
        "Container_Boundary({}, \"{}\") {{\n",
        container.id,
        quote(&container.name)
    ));
    for component in &components {
        push_component(&mut out, component, "    ");
    }
    out.push_str("}\n");

    let members: BTreeSet<&str> = components.iter().map(|c| c.id.as_str()).collect();
    let rels: Vec<&Relationship> = model
        .relationships_at(Tier::Component)
        .filter(|r| members.contains(r.source_id.as_str()) || members.contains(r.target_id.as_str()))
        .collect();

    // Components in other containers, declared beside the boundary
    let neighbours: BTreeSet<&str> = rels
        .iter()
        .flat_map(|r| [r.source_id.as_str(), r.target_id.as_str()])
        .filter(|id| !members.contains(id))
        .collect();
    for id in neighbours {
        if let Some(component) = model.component(id) {
            push_component(&mut out, component, "");
        }
    }
    out.push('\n');

    for rel in rels {
        push_rel(&mut out, rel);
    }

    Some(footer(out))
}

/// Every diagram the model supports, in a stable order
pub fn render_all(model: &C4Model) -> Vec<Diagram> {
    let mut diagrams = vec![
        Diagram {
            file_name: "01-system-context.puml".to_string(),
            content: render_context(model),
        },
        Diagram {
            file_name: "02-container.puml".to_string(),
            content: render_containers(model),
        },
    ];

    for container in &model.containers {
        if let Some(content) = render_components(model, &container.id) {
            diagrams.push(Diagram {
                file_name: format!("03-component-{}.puml", container.id),
                content,
            });
        }
    }

    diagrams
}

fn header(library: &str, title: &str) -> String {
    let mut out = String::new();
    out.push_str("@startuml\n");
    out.push_str(&format!("!include {INCLUDE_BASE}/{library}.puml\n"));
    out.push('\n');
    out.push_str(&format!("title {}\n", quote(title)));
    out.push('\n');
    out
}

fn footer(mut out: String) -> String {
    out.push_str("@enduml\n");
    out
}

fn push_person(out: &mut String, person: &Person) {
    out.push_str(&format!(
        "Person({}, \"{}\", \"{}\")\n",
        person.id,
        quote(&person.name),
        quote(&person.description)
    ));
}

fn push_system(out: &mut String, system: &SoftwareSystem, indent: &str) {
    let macro_name = if system.external { "System_Ext" } else { "System" };
    out.push_str(&format!(
        "{indent}{macro_name}({}, \"{}\", \"{}\")\n",
        system.id,
        quote(&system.name),
        quote(&system.description)
    ));
}

fn push_container(out: &mut String, container: &Container, indent: &str) {
    out.push_str(&format!(
        "{indent}Container({}, \"{}\", \"{}\", \"{}\")\n",
        container.id,
        quote(&container.name),
        quote(&container.technology.join(", ")),
        quote(&container.description)
    ));
}

fn push_component(out: &mut String, component: &Component, indent: &str) {
    out.push_str(&format!(
        "{indent}Component({}, \"{}\", \"{}\", \"{}\")\n",
        component.id,
        quote(&component.name),
        quote(&component.technology.join(", ")),
        quote(&component.description)
    ));
}

fn push_rel(out: &mut String, rel: &Relationship) {
    let description = quote(&rel.description);
    match rel.technology.as_deref().filter(|t| !t.is_empty()) {
        Some(tech) => out.push_str(&format!(
            "Rel({}, {}, \"{}\", \"{}\")\n",
            rel.source_id,
            rel.target_id,
            description,
            quote(tech)
        )),
        None => out.push_str(&format!(
            "Rel({}, {}, \"{}\")\n",
            rel.source_id, rel.target_id, description
        )),
    }
}

/// Markup strings cannot hold double quotes or line breaks
fn quote(text: &str) -> String {
    text.replace('"', "'")
        .replace("\r\n", " ")
        .replace(['\n', '\r'], " ")
}
