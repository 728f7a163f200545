use crate::classify::Tier;
use crate::error::{ModelError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Where an element's description came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DescriptionSource {
    /// Declared by a collector
    Fact,
    /// Provided by the semantic oracle
    Oracle,
    /// Built by the model itself (synthesized systems)
    Synthesized,
    /// Deterministic placeholder, replaceable by enrichment
    #[default]
    Fallback,
}

/// An actor using the system from outside
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: String,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoftwareSystem {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub description_source: DescriptionSource,
    #[serde(default)]
    pub technology: Vec<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub external: bool,
    #[serde(default)]
    pub container_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Container {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub description_source: DescriptionSource,
    #[serde(default)]
    pub technology: Vec<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_environment: Option<String>,
    #[serde(default)]
    pub exposed_ports: Vec<u16>,
    #[serde(default)]
    pub environment_vars: BTreeMap<String, String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub description_source: DescriptionSource,
    #[serde(default)]
    pub technology: Vec<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// None when no container path is a prefix of the component's path
    pub container_id: Option<String>,
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub source_files: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub source_id: String,
    pub target_id: String,
    pub description: String,
    #[serde(default)]
    pub description_source: DescriptionSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technology: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    pub tier: Tier,
    /// Graph edges (source node id, target node id) projected onto this relationship
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub derived_from: BTreeSet<(String, String)>,
}

/// Assembled C4 model. Every list is sorted and unique by id; every
/// relationship endpoint names an element in one of the lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct C4Model {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub people: Vec<Person>,
    pub systems: Vec<SoftwareSystem>,
    pub containers: Vec<Container>,
    pub components: Vec<Component>,
    pub relationships: Vec<Relationship>,
}

impl C4Model {
    pub fn person(&self, id: &str) -> Option<&Person> {
        self.people.iter().find(|p| p.id == id)
    }

    pub fn system(&self, id: &str) -> Option<&SoftwareSystem> {
        self.systems.iter().find(|s| s.id == id)
    }

    pub fn container(&self, id: &str) -> Option<&Container> {
        self.containers.iter().find(|c| c.id == id)
    }

    pub fn component(&self, id: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.id == id)
    }

    pub fn components_of<'a>(&'a self, container_id: &'a str) -> impl Iterator<Item = &'a Component> {
        self.components
            .iter()
            .filter(move |c| c.container_id.as_deref() == Some(container_id))
    }

    /// Relationships touching an element on either side
    pub fn relationships_of<'a>(
        &'a self,
        element_id: &'a str,
    ) -> impl Iterator<Item = &'a Relationship> {
        self.relationships
            .iter()
            .filter(move |r| r.source_id == element_id || r.target_id == element_id)
    }

    pub fn relationships_at(&self, tier: Tier) -> impl Iterator<Item = &Relationship> {
        self.relationships.iter().filter(move |r| r.tier == tier)
    }

    /// Replace a fallback description with an oracle one.
    ///
    /// Returns true when an element was updated. Fact-provided descriptions
    /// are never overridden.
    pub fn apply_node_annotation(&mut self, id: &str, description: &str) -> bool {
        let description = description.trim();
        if description.is_empty() {
            return false;
        }

        let slot = if let Some(c) = self.containers.iter_mut().find(|c| c.id == id) {
            Some((&mut c.description, &mut c.description_source))
        } else if let Some(c) = self.components.iter_mut().find(|c| c.id == id) {
            Some((&mut c.description, &mut c.description_source))
        } else {
            self.systems
                .iter_mut()
                .find(|s| s.id == id)
                .map(|s| (&mut s.description, &mut s.description_source))
        };

        match slot {
            Some((current, source)) if *source == DescriptionSource::Fallback => {
                *current = description.to_string();
                *source = DescriptionSource::Oracle;
                true
            }
            _ => false,
        }
    }

    /// Apply an oracle edge annotation to every relationship the graph
    /// edge was projected onto. Returns the number of relationships touched.
    pub fn apply_edge_annotation(
        &mut self,
        source: &str,
        target: &str,
        description: Option<&str>,
        protocol: Option<&str>,
    ) -> usize {
        let key = (source.to_string(), target.to_string());
        let description = description.map(str::trim).filter(|d| !d.is_empty());
        let protocol = protocol.map(str::trim).filter(|p| !p.is_empty());

        let mut touched = 0;
        for rel in self
            .relationships
            .iter_mut()
            .filter(|r| r.derived_from.contains(&key))
        {
            let mut changed = false;
            if let Some(text) = description {
                if rel.description_source == DescriptionSource::Fallback {
                    rel.description = text.to_string();
                    rel.description_source = DescriptionSource::Oracle;
                    changed = true;
                }
            }
            // Merged fact protocols win over a guess
            if let (None, Some(guess)) = (&rel.technology, protocol) {
                let guess = guess.to_ascii_lowercase();
                rel.technology = Some(guess.clone());
                rel.protocol = Some(guess);
                changed = true;
            }
            if changed {
                touched += 1;
            }
        }
        touched
    }

    /// Check id uniqueness and relationship endpoints
    pub fn validate(&self) -> Result<()> {
        let mut ids: HashSet<&str> = HashSet::new();
        let all = self
            .people
            .iter()
            .map(|p| p.id.as_str())
            .chain(self.systems.iter().map(|s| s.id.as_str()))
            .chain(self.containers.iter().map(|c| c.id.as_str()))
            .chain(self.components.iter().map(|c| c.id.as_str()));
        for id in all {
            if !ids.insert(id) {
                return Err(ModelError::DuplicateId(id.to_string()));
            }
        }

        for rel in &self.relationships {
            if !ids.contains(rel.source_id.as_str()) || !ids.contains(rel.target_id.as_str()) {
                return Err(ModelError::DanglingRelationship {
                    source_id: rel.source_id.clone(),
                    target_id: rel.target_id.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn element_count(&self) -> usize {
        self.people.len() + self.systems.len() + self.containers.len() + self.components.len()
    }
}
