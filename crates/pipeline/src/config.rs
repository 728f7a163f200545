use crate::error::{PipelineError, Result};
use archmap_enrich::EnrichmentConfig;
use archmap_model::ClassifierConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_REPOSITORY_NAME: &str = "system";

/// Top-level run configuration, loadable from TOML
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Names the default system and the model
    pub repository_name: String,

    pub enrichment: EnrichmentConfig,

    pub classifier: ClassifierConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            repository_name: DEFAULT_REPOSITORY_NAME.to_string(),
            enrichment: EnrichmentConfig::default(),
            classifier: ClassifierConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn for_repository(name: impl Into<String>) -> Self {
        Self {
            repository_name: name.into(),
            ..Default::default()
        }
    }

    /// Deterministic run: no oracle calls
    pub fn offline() -> Self {
        Self {
            enrichment: EnrichmentConfig::disabled(),
            ..Default::default()
        }
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate().map_err(PipelineError::Config)?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.repository_name.trim().is_empty() {
            return Err("repository_name must not be empty".to_string());
        }
        self.enrichment.validate()?;
        self.classifier.validate()?;
        Ok(())
    }
}
