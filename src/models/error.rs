use thiserror::Error;

#[derive(Error, Debug)]
pub enum BundlerError {
    #[error("{message}")]
    Precondition {
        message: String,
        code: Option<i64>,
        data: Option<serde_json::Value>,
    },

    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("RPC error {code}: {message}")]
    RpcError { code: i64, message: String },

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Gas oracle error: {0}")]
    OracleError(String),

    #[error("Telemetry error: {0}")]
    TelemetryError(String),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl BundlerError {
    /// Numeric JSON-RPC code carried by the error, if any.
    pub fn code(&self) -> Option<i64> {
        match self {
            BundlerError::Precondition { code, .. } => *code,
            BundlerError::RpcError { code, .. } => Some(*code),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, BundlerError>;
