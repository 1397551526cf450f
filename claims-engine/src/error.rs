use thiserror::Error;

/// Errors raised by claim collaborators. Components catch these at their
/// boundary and fall back; none of them reach the caller of the orchestrator.
#[derive(Debug, Error)]
pub enum ClaimsError {
    #[error("Repository unavailable: {0}")]
    RepositoryUnavailable(String),

    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    #[error("Timed out after {0} seconds")]
    Timeout(u64),

    #[error("Remote service error: {0}")]
    Remote(String),

    #[error("Failed to load table {path}: {reason}")]
    TableLoad { path: String, reason: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Graph(#[from] claim_graph::GraphError),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ClaimsError {
    /// Connectivity problems and timeouts count as a lookup miss rather than
    /// an error worth surfacing.
    pub fn is_unavailable(&self) -> bool {
        match self {
            ClaimsError::RepositoryUnavailable(_) | ClaimsError::Timeout(_) => true,
            ClaimsError::Http(e) => e.is_connect() || e.is_timeout(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClaimsError>;
