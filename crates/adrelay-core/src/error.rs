//! Error types for adrelay

use thiserror::Error;

/// Result type alias for playback operations
pub type Result<T> = std::result::Result<T, Error>;

/// Playback shim error types
#[derive(Error, Debug)]
pub enum Error {
    // Load errors
    #[error("There are no playable media sources")]
    NoPlayableSource,

    #[error("Creative protocol version {version} is not supported")]
    UnsupportedVersion { version: String },

    #[error("Failed to load creative resource: {0}")]
    BackendLoad(String),

    // Control errors
    #[error("The media backend has not been loaded")]
    NotLoaded,

    #[error("The ad has already been started")]
    AlreadyStarted,

    #[error("The ad has not been started yet")]
    NotStarted,

    #[error("Invalid playback state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    // Runtime errors
    #[error("Media backend error: {0}")]
    BackendRuntime(String),

    // Network errors
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    // Descriptor errors
    #[error("Invalid ad descriptor: {0}")]
    Descriptor(#[from] serde_json::Error),
}

impl Error {
    /// Returns the short static code for this error, for reporting
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::NoPlayableSource => "NO_PLAYABLE_SOURCE",
            Error::UnsupportedVersion { .. } => "UNSUPPORTED_VERSION",
            Error::BackendLoad(_) => "BACKEND_LOAD",
            Error::NotLoaded => "NOT_LOADED",
            Error::AlreadyStarted => "ALREADY_STARTED",
            Error::NotStarted => "NOT_STARTED",
            Error::InvalidStateTransition { .. } => "INVALID_STATE",
            Error::BackendRuntime(_) => "BACKEND_RUNTIME",
            Error::Network(_) => "NETWORK",
            Error::Descriptor(_) => "DESCRIPTOR",
        }
    }

    /// Returns true if retrying `load()` may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::BackendLoad(_) | Error::BackendRuntime(_) | Error::Network(_)
        )
    }
}
