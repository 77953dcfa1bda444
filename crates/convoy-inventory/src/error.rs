//! Inventory error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum InventoryError {
    /// A group referenced by the role graph resolved to zero hosts
    #[error("host group '{0}' resolved to zero hosts")]
    UnresolvedTarget(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, InventoryError>;
