//! # Archmap Graph
//!
//! Consolidates facts from independent collectors into one deduplicated
//! dependency graph and computes structural metrics on it.
//!
//! ## Architecture
//!
//! ```text
//! ComponentFact[] / RelationshipFact[] / SystemBoundaryFact[]
//!     │
//!     ├──> GraphBuilder (single writer)
//!     │      ├─ Derive stable ids from (kind, name, source_path)
//!     │      ├─ Merge duplicate facts (first writer wins, backfill empties)
//!     │      ├─ Merge edges per ordered pair (protocol union)
//!     │      └─ Park unresolved edges, resolve or placeholder at finish
//!     │
//!     └──> DependencyGraph (read-only after finish)
//!            ├─ criticality()   PageRank-style importance
//!            ├─ subsystems()    greedy modularity communities
//!            ├─ entry_points()  in-degree 0
//!            └─ descendants()   cycle-safe reachability
//! ```

mod builder;
mod error;
mod export;
mod facts;
mod graph;
mod identity;
mod metrics;
mod properties;
mod types;

pub use builder::{BuildOutput, GraphBuilder, IngestStats, IngestWarning};
pub use error::{GraphError, Result};
pub use export::MetricsReport;
pub use facts::{ComponentFact, FactSet, NodeKind, RelationshipFact, SystemBoundaryFact};
pub use identity::{identity_key, node_id, normalize_path, slugify};
pub use metrics::{DAMPING, MAX_ITERATIONS, TOLERANCE};
pub use properties::NodeProperties;
pub use types::{DependencyGraph, GraphEdge, GraphNode, SemanticContext, SystemBoundary};
