//! Bootstrap error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BootstrapError {
    /// Hard gate: the named prerequisite condition does not hold
    #[error("prerequisite check failed on {host}: {message}")]
    PrerequisiteFailed { host: String, message: String },

    #[error("could not gather host facts from {host}: {message}")]
    FactsFailed { host: String, message: String },

    #[error("artifact download failed: {0}")]
    DownloadFailed(String),

    #[error("artifact extraction failed: {0}")]
    ExtractFailed(String),

    #[error("binary '{0}' not found in artifact")]
    MissingBinary(String),

    #[error("binary installation failed on {host}: {message}")]
    InstallFailed { host: String, message: String },

    /// Post-install self-check failure; prior steps are not rolled back
    #[error("self-check failed: {0}")]
    VerificationFailed(String),

    #[error(transparent)]
    Channel(#[from] convoy_core::ConvoyError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BootstrapError>;
