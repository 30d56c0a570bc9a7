use thiserror::Error;

/// Configuration could not be resolved into something a request can use.
///
/// Always raised before any network call is attempted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("no API key configured: set a key directly, in settings, in a .env block, or via OPENAI_API_KEY")]
    MissingApiKey,

    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

/// A single call to the completion API failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RequestError {
    #[error("authentication failed ({status}): {message}")]
    Authentication { status: u16, message: String },

    #[error("rate limited by the API: {message}")]
    RateLimited { message: String },

    #[error("API quota exceeded: {message}")]
    QuotaExceeded { message: String },

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },
}

impl RequestError {
    /// Short machine-readable kind, used in logs and API payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            RequestError::Authentication { .. } => "authentication",
            RequestError::RateLimited { .. } => "rate_limited",
            RequestError::QuotaExceeded { .. } => "quota_exceeded",
            RequestError::Timeout(_) => "timeout",
            RequestError::Network(_) => "network",
            RequestError::MalformedResponse(_) => "malformed_response",
            RequestError::Api { .. } => "api",
        }
    }
}

impl From<reqwest::Error> for RequestError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RequestError::Timeout(err.to_string())
        } else if err.is_decode() {
            RequestError::MalformedResponse(err.to_string())
        } else if let Some(status) = err.status() {
            RequestError::Api {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            RequestError::Network(err.to_string())
        }
    }
}

/// Batch input that does not carry a usable company name.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MalformedInputError {
    #[error("batch input is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("batch input must be a JSON array of companies, got {0}")]
    NotAnArray(&'static str),

    #[error("entry {index} is neither a string nor an object with a string \"name\": {raw}")]
    UnusableEntry { index: usize, raw: String },
}

/// Anything that can stop a single analysis from producing text.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    MalformedInput(#[from] MalformedInputError),
}

pub(crate) fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
