use std::fmt;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GenError>;

/// Why the inference server could not serve a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionKind {
    Unreachable,
    TimedOut,
    Server,
    Payload,
}

impl ConnectionKind {
    pub fn hint(&self) -> &'static str {
        match self {
            ConnectionKind::Unreachable => {
                "Make sure Ollama is running locally (start it with: ollama serve)"
            }
            ConnectionKind::TimedOut => {
                "The model may be too large for this machine or need more time; raise timeout_secs or pick a smaller model"
            }
            ConnectionKind::Server => "Check the Ollama server log for details",
            ConnectionKind::Payload => {
                "Ollama reported an error mid-stream; retry, or pull the model again with: ollama pull <model>"
            }
        }
    }
}

impl fmt::Display for ConnectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionKind::Unreachable => "cannot reach the inference server",
            ConnectionKind::TimedOut => "timed out waiting for the inference server",
            ConnectionKind::Server => "inference server returned an error",
            ConnectionKind::Payload => "inference server sent an error payload",
        };
        f.write_str(s)
    }
}

/// Coarse classification used by the request/response surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    ServiceUnavailable,
    BadRequest,
    Internal,
}

#[derive(Error, Debug, Clone)]
pub enum GenError {
    #[error("{kind} at {base_url}: {detail}. {}", .kind.hint())]
    Connection { kind: ConnectionKind, base_url: String, detail: String },
    #[error("{message}")]
    ModelUnavailable { message: String, models: Vec<String> },
    #[error("inference client is not initialized; the health check must pass before generating")]
    NotInitialized,
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("generation cancelled")]
    Cancelled,
    #[error("internal error: {0}")]
    Internal(String),
}

impl GenError {
    pub fn connection(kind: ConnectionKind, base_url: &str, detail: impl Into<String>) -> Self {
        GenError::Connection { kind, base_url: base_url.to_string(), detail: detail.into() }
    }

    /// Classify a transport failure from reqwest.
    pub fn from_reqwest(err: &reqwest::Error, base_url: &str) -> Self {
        let kind = if err.is_timeout() {
            ConnectionKind::TimedOut
        } else if err.is_connect() || err.is_request() {
            ConnectionKind::Unreachable
        } else {
            ConnectionKind::Server
        };
        Self::connection(kind, base_url, err.to_string())
    }

    /// A requested model is not on the allow-list.
    pub fn model_not_allowed(model: &str, allowed: &[String]) -> Self {
        GenError::ModelUnavailable {
            message: format!(
                "model '{}' is not allowed; allowed models: {}",
                model,
                allowed.join(", ")
            ),
            models: allowed.to_vec(),
        }
    }

    /// Required models that the server does not host.
    pub fn models_missing(missing: &[String], base_url: &str) -> Self {
        let pulls: Vec<String> = missing.iter().map(|m| format!("ollama pull {m}")).collect();
        GenError::ModelUnavailable {
            message: format!(
                "required models missing from Ollama at {}: {}. Install them with: {}",
                base_url,
                missing.join(", "),
                pulls.join("; ")
            ),
            models: missing.to_vec(),
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            GenError::Connection { .. } | GenError::ModelUnavailable { .. } | GenError::NotInitialized => {
                ErrorClass::ServiceUnavailable
            }
            GenError::Protocol(_) | GenError::InvalidRequest(_) => ErrorClass::BadRequest,
            GenError::Config(_) | GenError::Cancelled | GenError::Internal(_) => ErrorClass::Internal,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, GenError::Connection { kind: ConnectionKind::TimedOut, .. })
    }
}
