//! Error types for parlor_cards.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Result type for card operations.
pub type CardResult<T> = Result<T, CardError>;

/// Errors that can occur while importing one card.
#[derive(Debug, Error, Diagnostic)]
pub enum CardError {
    /// IO error.
    #[error("IO error on {path}: {source}")]
    #[diagnostic(code(parlor_cards::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not a readable PNG.
    #[error("Invalid PNG: {0}")]
    #[diagnostic(code(parlor_cards::png))]
    Png(#[from] png::DecodingError),

    /// The PNG has no character metadata chunk.
    #[error("No '{keyword}' metadata found in image")]
    #[diagnostic(
        code(parlor_cards::missing_metadata),
        help("Character cards carry base64 JSON in a PNG text chunk named '{keyword}'")
    )]
    MissingMetadata { keyword: String },

    /// The metadata chunk is not valid base64.
    #[error("Character metadata is not valid base64: {0}")]
    #[diagnostic(code(parlor_cards::base64))]
    Base64(#[from] base64::DecodeError),

    /// The decoded metadata is not the expected JSON.
    #[error("Character JSON error: {0}")]
    #[diagnostic(
        code(parlor_cards::json),
        help("Cards need name, description, first_mes, mes_example and scenario")
    )]
    Json(#[from] serde_json::Error),
}

impl CardError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
