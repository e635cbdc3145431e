//! Error types for cadenza.

use thiserror::Error;

/// Main error type for all cadenza operations.
///
/// Component boundaries (the info plugin, the playlist updater) log these and
/// fall back to empty results; the typed error only surfaces to direct users
/// of the lower-level clients.
#[derive(Debug, Error)]
pub enum CadenzaError {
    /// The Echo Nest answered with a non-zero status code.
    #[error("Echo Nest error {code}: {message}")]
    EchoNestStatus { code: i64, message: String },

    /// No data returned from API.
    #[error("No data from API: {0}")]
    NoDataApi(String),

    /// A revision was committed against a revision that is no longer current.
    #[error("Revision conflict: expected {expected}, current is {current}")]
    RevisionConflict { expected: String, current: String },

    /// HTTP request failed.
    #[error("Request error: {0}")]
    RequestError(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("Parse error: {0}")]
    ParseError(#[from] serde_json::Error),

    /// XSPF document could not be parsed.
    #[error("XML error: {0}")]
    XmlError(#[from] roxmltree::Error),

    /// The document parsed but is not a playlist we understand.
    #[error("Invalid playlist: {0}")]
    InvalidPlaylist(String),

    /// Image encoding failed.
    #[error("Image error: {0}")]
    ImageError(#[from] image::ImageError),

    /// I/O operation failed.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type alias for cadenza operations.
pub type Result<T> = std::result::Result<T, CadenzaError>;
