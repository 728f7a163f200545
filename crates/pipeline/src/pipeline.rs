use crate::config::PipelineConfig;
use crate::error::Result;
use archmap_enrich::{
    requests_for, EnrichmentCoordinator, EnrichmentReport, SemanticOracle, Subject,
};
use archmap_graph::{
    DependencyGraph, FactSet, GraphBuilder, IngestStats, IngestWarning, MetricsReport,
};
use archmap_model::{
    render_all, C4Model, Diagram, ModelAssembler, RelationshipProjector, TierClassifier,
};
use std::fmt;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Recovered problems surfaced to the caller; none of them abort a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineWarning {
    /// No collector produced any fact
    EmptyInput,
    Ingest(IngestWarning),
    /// Subjects still on their fallback description after enrichment
    EnrichmentIncomplete { failed: usize, total: usize },
    Cancelled,
    /// Model failed its consistency check; it is still returned
    InvalidModel(String),
}

impl fmt::Display for PipelineWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyInput => write!(f, "no facts were provided; emitting an empty model"),
            Self::Ingest(warning) => write!(f, "{warning}"),
            Self::EnrichmentIncomplete { failed, total } => {
                write!(f, "{failed} of {total} enrichment requests failed")
            }
            Self::Cancelled => write!(f, "run cancelled; enrichment was cut short"),
            Self::InvalidModel(reason) => write!(f, "model failed validation: {reason}"),
        }
    }
}

#[derive(Debug)]
pub struct PipelineOutput {
    pub model: C4Model,
    pub metrics: MetricsReport,
    /// Graph with oracle annotations written back
    pub graph: DependencyGraph,
    pub enrichment: EnrichmentReport,
    pub stats: IngestStats,
    pub warnings: Vec<PipelineWarning>,
}

impl PipelineOutput {
    pub fn diagrams(&self) -> Vec<Diagram> {
        render_all(&self.model)
    }
}

/// Facts in, C4 model out
pub struct Pipeline {
    config: PipelineConfig,
    oracle: Option<Arc<dyn SemanticOracle>>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            oracle: None,
        }
    }

    pub fn with_oracle(mut self, oracle: Arc<dyn SemanticOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage once.
    ///
    /// Enrichment runs on background tasks while the graph is classified
    /// and assembled; its answers are folded in afterwards, up to the
    /// configured deadline. Cancelling `cancel` cuts enrichment short but
    /// still yields a complete model with fallback descriptions.
    pub async fn run(&self, facts: FactSet, cancel: CancellationToken) -> Result<PipelineOutput> {
        let mut warnings = Vec::new();
        if facts.is_empty() {
            log::warn!("No facts to ingest; the model will hold one empty system");
            warnings.push(PipelineWarning::EmptyInput);
        }

        // Stage 1: single-writer ingestion
        let mut builder = GraphBuilder::new();
        builder.ingest(facts);
        let built = builder.finish();
        let mut graph = built.graph;
        warnings.extend(built.warnings.into_iter().map(PipelineWarning::Ingest));

        // Stage 5 starts early and runs beside 2-4
        let enrichment = self.start_enrichment(&graph, &cancel);

        // Stages 2-4: pure transforms over the frozen graph
        let repository = self.config.repository_name.as_str();
        let classification =
            TierClassifier::new(self.config.classifier.clone(), repository).classify(&graph);
        let projection = RelationshipProjector::new(&classification).project(&graph);
        let mut model = ModelAssembler::new(repository).assemble(&graph, &classification, &projection);

        let report = match enrichment {
            Some((handle, deadline)) => handle.collect_until(deadline).await,
            None => EnrichmentReport::default(),
        };

        if cancel.is_cancelled() {
            warnings.push(PipelineWarning::Cancelled);
        }
        let summary = report.summary();
        if summary.failed > 0 {
            warnings.push(PipelineWarning::EnrichmentIncomplete {
                failed: summary.failed,
                total: summary.total,
            });
        }

        apply_annotations(&report, &mut graph, &mut model);
        if let Err(err) = model.validate() {
            log::error!("Assembled model is inconsistent: {err}");
            warnings.push(PipelineWarning::InvalidModel(err.to_string()));
        }

        let metrics = graph.metrics_report();

        Ok(PipelineOutput {
            model,
            metrics,
            graph,
            enrichment: report,
            stats: built.stats,
            warnings,
        })
    }

    fn start_enrichment(
        &self,
        graph: &DependencyGraph,
        cancel: &CancellationToken,
    ) -> Option<(archmap_enrich::EnrichmentHandle, Instant)> {
        let config = &self.config.enrichment;
        if !config.enabled {
            log::debug!("Enrichment disabled");
            return None;
        }
        let oracle = self.oracle.as_ref()?;
        if cancel.is_cancelled() || graph.is_empty() {
            return None;
        }

        let requests = requests_for(graph, config.max_summary_chars);
        let deadline = Instant::now() + config.deadline();
        let coordinator = EnrichmentCoordinator::new(Arc::clone(oracle), config.clone());
        Some((coordinator.start(requests, cancel.clone()), deadline))
    }
}

/// Write finished annotations back into the graph and over fallback text in the model
fn apply_annotations(report: &EnrichmentReport, graph: &mut DependencyGraph, model: &mut C4Model) {
    let mut applied = 0;
    for (subject, annotation) in report.annotations() {
        match subject {
            Subject::Node { id } => {
                if let Err(err) = graph.set_semantic(id, annotation.to_semantic()) {
                    log::warn!("Cannot annotate {id}: {err}");
                    continue;
                }
                if let Some(text) = annotation.display_text() {
                    if model.apply_node_annotation(id, text) {
                        applied += 1;
                    }
                }
            }
            Subject::Edge { source, target } => {
                applied += model.apply_edge_annotation(
                    source,
                    target,
                    annotation.description.as_deref(),
                    annotation.protocol.as_deref(),
                );
            }
        }
    }
    log::debug!("Applied {applied} oracle annotations to the model");
}
