use thiserror::Error;

pub type RecResult<T> = Result<T, RecError>;

#[derive(Error, Debug)]
pub enum RecError {
    /// Malformed vectors, weights or request parameters. Always a caller bug.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Catalog or behavior store failure.
    #[error("Upstream store error: {0}")]
    Upstream(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl RecError {
    pub fn product_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "Product",
            id: id.into(),
        }
    }

    /// Upstream failures are degraded to the fallback path, everything else
    /// is reported as-is.
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::Upstream(_))
    }
}

impl From<config::ConfigError> for RecError {
    fn from(e: config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}
