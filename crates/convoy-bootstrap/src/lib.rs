//! Convoy bootstrap state machines
//!
//! Multi-step, idempotent, prerequisite-gated install procedures for
//! software components on provisioned hosts (the shipped instance is a
//! rootless image-builder install). A failed instance is re-run from
//! the beginning; every step is safe to repeat.

pub mod arch;
pub mod auth;
pub mod error;
pub mod installer;
pub mod state;

pub use arch::map_arch;
pub use auth::{AuthEntry, RegistryAuthConfig, render_auth_config};
pub use error::{BootstrapError, Result};
pub use installer::Installer;
pub use state::{BootstrapReport, BootstrapState, StepRecord};
