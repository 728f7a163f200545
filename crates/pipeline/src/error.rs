use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Config(String),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Fact file parse error: {0}")]
    Facts(#[from] serde_json::Error),

    #[error("Graph error: {0}")]
    Graph(#[from] archmap_graph::GraphError),

    #[error("Model error: {0}")]
    Model(#[from] archmap_model::ModelError),
}
