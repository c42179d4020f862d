//! Error types for the compositing and export pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while rendering, compositing, or exporting
#[derive(Error, Debug)]
pub enum Error {
    /// The symbol provider rejected the content or options
    #[error("QR encoding failed: {0}")]
    EncodeError(String),

    /// A logo image failed to decode
    #[error("Logo failed to load: {0}")]
    LogoLoadError(String),

    /// A previously produced data URL or SVG could not be re-decoded
    #[error("Artifact could not be decoded: {0}")]
    ArtifactDecodeError(String),

    /// The requested export format's encoder is unavailable
    #[error("Export format unavailable: {0}")]
    UnsupportedFormatError(String),

    /// Export requested before any successful composite exists
    #[error("no composited artifact available for export")]
    NoArtifactError,

    /// The platform denied clipboard access
    #[error("Clipboard access denied: {0}")]
    ClipboardPermissionError(String),

    /// Invalid render request or logo configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Other(err.to_string())
    }
}
