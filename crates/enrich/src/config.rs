use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const MAX_WORKERS: usize = 32;

/// Enrichment worker pool settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnrichmentConfig {
    /// Skip the oracle entirely when false
    pub enabled: bool,

    /// Concurrent oracle calls (clamped to 1..=32)
    pub max_workers: usize,

    /// Per-call timeout
    pub call_timeout_ms: u64,

    /// How long the pipeline waits for enrichment overall
    pub deadline_ms: u64,

    /// Upper bound on the serialized summary sent per request
    pub max_summary_chars: usize,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_workers: 4,
            call_timeout_ms: 30_000,
            deadline_ms: 120_000,
            max_summary_chars: 2_000,
        }
    }
}

impl EnrichmentConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    pub fn workers(&self) -> usize {
        self.max_workers.clamp(1, MAX_WORKERS)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.call_timeout_ms == 0 {
            return Err("enrichment.call_timeout_ms must be > 0".to_string());
        }
        if self.deadline_ms == 0 {
            return Err("enrichment.deadline_ms must be > 0".to_string());
        }
        if self.max_summary_chars == 0 {
            return Err("enrichment.max_summary_chars must be > 0".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workers_clamped() {
        let mut config = EnrichmentConfig::default();
        assert_eq!(config.workers(), 4);

        config.max_workers = 0;
        assert_eq!(config.workers(), 1);

        config.max_workers = 500;
        assert_eq!(config.workers(), MAX_WORKERS);
    }

    #[test]
    fn test_validate_names_key() {
        let config = EnrichmentConfig {
            call_timeout_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().contains("call_timeout_ms"));
        assert!(EnrichmentConfig::default().validate().is_ok());
    }
}
