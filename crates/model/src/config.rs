use serde::{Deserialize, Serialize};
use std::fmt;

/// Well-known external service families synthesized as one system each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExternalCategory {
    Database,
    Cache,
    MessageQueue,
}

impl ExternalCategory {
    /// Element id of the synthesized system
    pub fn system_id(self) -> &'static str {
        match self {
            Self::Database => "external_database",
            Self::Cache => "external_cache",
            Self::MessageQueue => "external_message_queue",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Database => "Database",
            Self::Cache => "Cache",
            Self::MessageQueue => "Message Queue",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Database => "External database system",
            Self::Cache => "Caching system",
            Self::MessageQueue => "External messaging system",
        }
    }
}

impl fmt::Display for ExternalCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// One external-service signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignatureRule {
    pub category: ExternalCategory,

    /// Infrastructure resource types, matched exactly (case-insensitive)
    #[serde(default)]
    pub resource_types: Vec<String>,

    /// Substrings looked for in container image names
    #[serde(default)]
    pub image_patterns: Vec<String>,
}

impl SignatureRule {
    pub fn new(category: ExternalCategory, resource_types: &[&str], image_patterns: &[&str]) -> Self {
        Self {
            category,
            resource_types: resource_types.iter().map(|s| s.to_string()).collect(),
            image_patterns: image_patterns.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn matches_resource(&self, resource_type: &str) -> bool {
        self.resource_types
            .iter()
            .any(|known| known.eq_ignore_ascii_case(resource_type.trim()))
    }

    pub fn matches_image(&self, image: &str) -> bool {
        let image = image.to_lowercase();
        self.image_patterns
            .iter()
            .any(|pattern| image.contains(&pattern.to_lowercase()))
    }
}

/// Tier classification settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClassifierConfig {
    /// Checked in order, first match wins
    pub external_signatures: Vec<SignatureRule>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            external_signatures: vec![
                SignatureRule::new(
                    ExternalCategory::Database,
                    &[
                        "aws_rds_instance",
                        "aws_rds_cluster",
                        "aws_db_instance",
                        "google_sql_database_instance",
                        "azurerm_postgresql_server",
                    ],
                    &["postgres", "mysql", "mariadb", "mongo"],
                ),
                SignatureRule::new(
                    ExternalCategory::Cache,
                    &[
                        "aws_elasticache_cluster",
                        "aws_elasticache_replication_group",
                        "google_redis_instance",
                    ],
                    &["redis", "memcached"],
                ),
                SignatureRule::new(
                    ExternalCategory::MessageQueue,
                    &[
                        "aws_sqs_queue",
                        "aws_sns_topic",
                        "google_pubsub_topic",
                        "aws_msk_cluster",
                    ],
                    &["kafka", "rabbitmq", "nats"],
                ),
            ],
        }
    }
}

impl ClassifierConfig {
    /// No external synthesis at all
    pub fn without_signatures() -> Self {
        Self {
            external_signatures: Vec::new(),
        }
    }

    pub fn match_resource(&self, resource_type: &str) -> Option<ExternalCategory> {
        self.external_signatures
            .iter()
            .find(|rule| rule.matches_resource(resource_type))
            .map(|rule| rule.category)
    }

    pub fn match_image(&self, image: &str) -> Option<ExternalCategory> {
        self.external_signatures
            .iter()
            .find(|rule| rule.matches_image(image))
            .map(|rule| rule.category)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        for (i, rule) in self.external_signatures.iter().enumerate() {
            if rule.resource_types.is_empty() && rule.image_patterns.is_empty() {
                return Err(format!(
                    "classifier.external_signatures[{i}] ({}) has neither resource_types nor image_patterns",
                    rule.category
                ));
            }
            if rule.image_patterns.iter().any(|p| p.trim().is_empty()) {
                return Err(format!(
                    "classifier.external_signatures[{i}].image_patterns contains an empty pattern"
                ));
            }
        }
        Ok(())
    }
}
