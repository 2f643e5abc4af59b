use thiserror::Error;

/// Failure kinds a persistence call can report. None of them is fatal to the
/// process; at most one logical operation is abandoned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("Network Error: {0}")]
    Network(String),
    #[error("Validation Error: {0}")]
    Validation(String),
    #[error("Not Found: {0}")]
    NotFound(String),
    #[error("Internal Error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Network(_) => "network",
            GatewayError::Validation(_) => "validation",
            GatewayError::NotFound(_) => "not_found",
            GatewayError::Internal(_) => "internal",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            GatewayError::Network(m)
            | GatewayError::Validation(m)
            | GatewayError::NotFound(m)
            | GatewayError::Internal(m) => m,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, GatewayError::NotFound(_))
    }
}

impl From<duckdb::Error> for GatewayError {
    fn from(e: duckdb::Error) -> Self {
        GatewayError::Internal(format!("storage: {}", e))
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            GatewayError::Internal(format!("malformed response: {}", e))
        } else {
            GatewayError::Network(e.to_string())
        }
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;
