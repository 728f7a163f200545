use thiserror::Error;

pub type Result<T> = std::result::Result<T, ModelError>;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Duplicate element id: {0}")]
    DuplicateId(String),

    #[error("Relationship {source_id} -> {target_id} references an unknown element")]
    DanglingRelationship { source_id: String, target_id: String },

    #[error("Invalid classifier config: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
