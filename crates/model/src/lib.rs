//! # Archmap Model
//!
//! Projects a frozen dependency graph onto the three C4 abstraction levels.
//!
//! ## Pipeline
//!
//! ```text
//! DependencyGraph (read-only)
//!     │
//!     ├──> TierClassifier      tier per node, containment, synthesized systems
//!     ├──> RelationshipProjector  promote cross-tier edges, drop the unresolvable
//!     ├──> ModelAssembler      C4Model with deterministic fallback descriptions
//!     └──> render_*            C4-PlantUML markup per level
//! ```
//!
//! Every stage is a pure function of its inputs; lists are materialized in
//! id order so repeated runs over the same graph produce identical output.

mod assemble;
mod classify;
mod config;
mod error;
mod model;
mod project;
mod render;

pub use assemble::{fallback_description, fallback_relationship_description, ModelAssembler};
pub use classify::{system_id, Classification, SystemElement, SystemOrigin, Tier, TierClassifier};
pub use config::{ClassifierConfig, ExternalCategory, SignatureRule};
pub use error::{ModelError, Result};
pub use model::{
    C4Model, Component, Container, DescriptionSource, Person, Relationship, SoftwareSystem,
};
pub use project::{ProjectedEdge, Projection, RelationshipProjector};
pub use render::{render_all, render_components, render_context, render_containers, Diagram};
