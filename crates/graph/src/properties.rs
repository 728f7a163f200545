use crate::facts::ComponentFact;
use crate::identity::normalize_path;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Merged, typed property bag of a graph node.
///
/// Hot fields are lifted out of the collector's free-form metadata; anything
/// unrecognized is kept verbatim in `extensions`.
///
/// Merging follows one policy everywhere: the first non-empty value wins and
/// later facts only backfill what is still empty. Tags are the exception and
/// accumulate, since each collector may contribute its own classification hint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technology: Option<String>,

    /// Normalized repository-relative path; `Some("")` is the repository root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,

    /// Container image reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Infrastructure-as-code resource type (e.g. `aws_rds_instance`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    /// Collector-provided description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Explicit system-boundary hint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exposed_ports: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_files: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extensions: BTreeMap<String, serde_json::Value>,
}

impl NodeProperties {
    pub fn from_fact(fact: &ComponentFact) -> Self {
        let mut props = Self {
            technology: non_blank(fact.technology.as_deref()),
            source_path: fact.source_path.as_deref().map(normalize_path),
            exposed_ports: fact
                .exposed_ports
                .iter()
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect(),
            environment: fact.environment.clone(),
            dependencies: fact.declared_dependencies.clone(),
            ..Default::default()
        };

        for (key, value) in &fact.metadata {
            props.absorb_metadata(key, value);
        }

        props
    }

    fn absorb_metadata(&mut self, key: &str, value: &serde_json::Value) {
        let lifted = match key {
            "image" => lift_string(&mut self.image, value),
            "resource_type" => lift_string(&mut self.resource_type, value),
            "language" => lift_string(&mut self.language, value),
            "description" => lift_string(&mut self.description, value),
            "system" => lift_string(&mut self.system, value),
            "tags" => match string_list(value) {
                Some(tags) => {
                    self.tags
                        .extend(tags.into_iter().map(|t| t.to_ascii_lowercase()));
                    true
                }
                None => false,
            },
            "interfaces" => lift_list(&mut self.interfaces, value),
            "source_files" => lift_list(&mut self.source_files, value),
            _ => false,
        };

        if !lifted {
            self.extensions
                .entry(key.to_string())
                .or_insert_with(|| value.clone());
        }
    }

    /// Backfill empty fields from a later fact about the same node
    pub fn merge(&mut self, later: NodeProperties) {
        backfill(&mut self.technology, later.technology);
        backfill(&mut self.source_path, later.source_path);
        backfill(&mut self.image, later.image);
        backfill(&mut self.resource_type, later.resource_type);
        backfill(&mut self.language, later.language);
        backfill(&mut self.description, later.description);
        backfill(&mut self.system, later.system);

        backfill_list(&mut self.exposed_ports, later.exposed_ports);
        backfill_list(&mut self.dependencies, later.dependencies);
        backfill_list(&mut self.interfaces, later.interfaces);
        backfill_list(&mut self.source_files, later.source_files);

        for (key, value) in later.environment {
            let slot = self.environment.entry(key).or_default();
            if slot.is_empty() {
                *slot = value;
            }
        }
        for (key, value) in later.extensions {
            let slot = self
                .extensions
                .entry(key)
                .or_insert(serde_json::Value::Null);
            if slot.is_null() {
                *slot = value;
            }
        }

        self.tags.extend(later.tags);
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn backfill(slot: &mut Option<String>, later: Option<String>) {
    if slot.as_deref().map_or(true, str::is_empty) {
        if let Some(value) = later.filter(|v| !v.is_empty()) {
            *slot = Some(value);
        }
    }
}

fn backfill_list(slot: &mut Vec<String>, later: Vec<String>) {
    if slot.is_empty() {
        *slot = later;
    }
}

fn lift_string(slot: &mut Option<String>, value: &serde_json::Value) -> bool {
    match value.as_str() {
        Some(s) => {
            backfill(slot, non_blank(Some(s)));
            true
        }
        None => false,
    }
}

fn lift_list(slot: &mut Vec<String>, value: &serde_json::Value) -> bool {
    match string_list(value) {
        Some(list) => {
            backfill_list(slot, list);
            true
        }
        None => false,
    }
}

/// Accepts `["a", "b"]` or `"a,b"`
fn string_list(value: &serde_json::Value) -> Option<Vec<String>> {
    match value {
        serde_json::Value::Array(items) => Some(
            items
                .iter()
                .filter_map(|item| non_blank(item.as_str()))
                .collect(),
        ),
        serde_json::Value::String(s) => Some(
            s.split(',')
                .filter_map(|part| non_blank(Some(part)))
                .collect(),
        ),
        _ => None,
    }
}
