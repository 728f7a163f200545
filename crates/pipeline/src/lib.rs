//! # Archmap Pipeline
//!
//! Wires the stages together:
//!
//! ```text
//! FactSet ─> GraphBuilder ─> DependencyGraph ─┬─> TierClassifier ─> RelationshipProjector ─> ModelAssembler ─┐
//!                                             └─> EnrichmentCoordinator (background, deadline) ──────────────┴─> PipelineOutput
//! ```
//!
//! Ownership moves forward: the builder owns the graph during ingestion,
//! classification onward only borrows it, and the graph and model are
//! mutated again only after enrichment has been collected.

mod config;
mod error;
mod pipeline;

pub use config::{PipelineConfig, DEFAULT_REPOSITORY_NAME};
pub use error::{PipelineError, Result};
pub use pipeline::{Pipeline, PipelineOutput, PipelineWarning};

use archmap_graph::FactSet;
use std::path::Path;

/// Parse a collector fact document
pub fn load_facts(path: &Path) -> Result<FactSet> {
    let raw = std::fs::read_to_string(path).map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&raw)?)
}
