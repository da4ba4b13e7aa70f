use thiserror::Error;

use crate::model::ProviderKind;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("{provider} API error after {attempts} attempt(s): {source}")]
    Provider {
        provider: ProviderKind,
        attempts: u32,
        #[source]
        source: ProviderError,
    },

    #[error("Invalid response format from {provider}: {reason}")]
    Validation {
        provider: ProviderKind,
        reason: String,
    },

    #[error("Adapter has been torn down")]
    Closed,

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl LlmError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Attempts made before a provider failure was surfaced.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            Self::Provider { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Request timed out")]
    Timeout,

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("Malformed response body: {0}")]
    Parse(String),
}

impl ProviderError {
    /// Whether another attempt could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) | Self::Timeout | Self::RateLimited { .. } => true,
            Self::Api { status, .. } => *status == 408 || *status == 429 || *status >= 500,
            Self::Parse(_) => false,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Missing credentials for {provider}: {hint}")]
    MissingCredentials { provider: ProviderKind, hint: String },

    #[error("Invalid model: {model}. Choose from {supported:?}")]
    UnsupportedModel {
        provider: ProviderKind,
        model: String,
        supported: Vec<String>,
    },

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Unknown environment: {0}")]
    UnknownEnvironment(String),

    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Config file error: {0}")]
    File(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Export I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}
