//! # Archmap Enrich
//!
//! Best-effort semantic annotation of graph nodes and edges.
//!
//! A [`SemanticOracle`] answers one request at a time; the
//! [`EnrichmentCoordinator`] fans requests out through a bounded worker
//! pool with a per-call timeout, and the returned [`EnrichmentHandle`]
//! collects answers until everything settled, a deadline passed, or the
//! run was cancelled. Failures never propagate: a failed subject simply
//! keeps its fallback description downstream.

mod config;
mod coordinator;
mod error;
mod oracle;
mod summary;

pub use config::{EnrichmentConfig, MAX_WORKERS};
pub use coordinator::{
    EnrichmentCoordinator, EnrichmentHandle, EnrichmentReport, EnrichmentState,
    EnrichmentSummary,
};
pub use error::{OracleError, Result};
pub use oracle::{Annotation, OracleRequest, SemanticOracle, StaticOracle, Subject};
pub use summary::{edge_request, node_request, requests_for};
