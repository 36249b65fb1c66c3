use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration-specific errors
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("TOML parse error: {0}")]
    TomlParse(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for field {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

#[derive(Error, Diagnostic, Debug)]
pub enum CoreError {
    #[error("Inference backend unavailable at {endpoint}")]
    #[diagnostic(
        code(parlor_core::backend_unavailable),
        help(
            "Neither the chat-completions nor the kobold protocol answered the startup probe. Restart once the endpoint is reachable."
        )
    )]
    BackendUnavailable { endpoint: String },

    #[error("Inference backend not ready")]
    #[diagnostic(
        code(parlor_core::backend_not_ready),
        help("The endpoint probe has to finish before conversations can be created")
    )]
    BackendNotReady,

    #[error("Generation failed on {backend}: {cause}")]
    #[diagnostic(
        code(parlor_core::generation_failed),
        help("The request reached the backend but did not produce a completion")
    )]
    GenerationFailed { backend: String, cause: String },

    #[error("Unexpected response format from {backend}: missing {expected}")]
    #[diagnostic(
        code(parlor_core::unexpected_response_format),
        help("The backend answered with JSON that lacks the completion text")
    )]
    UnexpectedResponseFormat {
        backend: String,
        expected: String,
        body: String,
    },

    #[error("Invalid prompt template: {reason}")]
    #[diagnostic(
        code(parlor_core::invalid_template),
        help("Templates need exactly one {{history}} slot and exactly one {{input}} slot")
    )]
    InvalidTemplate { reason: String },

    #[error("Configuration error for field '{field}'")]
    #[diagnostic(
        code(parlor_core::configuration_error),
        help("Check configuration file at {config_path}\nExpected: {expected}")
    )]
    ConfigurationError {
        config_path: String,
        field: String,
        expected: String,
        #[source]
        cause: ConfigError,
    },
}

impl CoreError {
    /// Wrap a transport or decoding failure from a specific backend.
    pub fn generation(backend: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::GenerationFailed {
            backend: backend.into(),
            cause: cause.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
