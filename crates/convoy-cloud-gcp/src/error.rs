//! gcloud CLI error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GcloudError {
    #[error("gcloud CLI is not installed or not in PATH")]
    GcloudNotFound,

    #[error("gcloud command failed: {0}")]
    CommandFailed(String),

    #[error("gcloud command timed out after {0} seconds")]
    Timeout(u64),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GcloudError>;
