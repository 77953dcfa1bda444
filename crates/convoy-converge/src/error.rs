//! Convergence error taxonomy
//!
//! Errors scoped below run level (task, role/group) are collected into
//! the run report; gate and auth errors interrupt the run immediately.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConvergeError {
    /// A group referenced by a role binding is empty or undeclared
    #[error("host group '{group}' has no hosts for role '{role}'")]
    UnresolvedTarget { group: String, role: String },

    /// A role references a secret that cannot be resolved; detected
    /// before any mutating task runs
    #[error("role '{role}' references unresolved secret '{key}'")]
    MissingSecret { role: String, key: String },

    /// A hard-gate task failed; fatal per the configured gate policy
    #[error("prerequisite gate '{task}' failed on {host}: {detail}")]
    GateFailed {
        task: String,
        host: String,
        detail: String,
    },

    #[error("role '{0}' is not defined")]
    RoleNotFound(String),

    #[error(transparent)]
    Core(#[from] convoy_core::ConvoyError),
}

pub type Result<T> = std::result::Result<T, ConvergeError>;
