//! Convoy cloud infrastructure
//!
//! This crate provides the compute-provider abstraction for Convoy:
//! a declared machine set is reconciled against a cloud backend, and
//! the resolved connectivity facts are handed to the inventory phase.
//!
//! ```text
//! ResourceSet ──▶ Provisioner ──▶ plan ──▶ apply ──▶ ResolvedHost list
//!                     │                                    │
//!                     ▼                                    ▼
//!              ComputeProvider                     .convoy/state.json
//!              (gcp, fake, ...)
//! ```

pub mod action;
pub mod error;
pub mod provider;
pub mod provisioner;
pub mod state;

// Re-exports
pub use action::{Action, ActionType, ApplyResult, Plan, PlanSummary};
pub use error::{CloudError, Result};
pub use provider::{AuthStatus, ComputeProvider, PollConfig, ResolvedHost, ResourceSet};
pub use provisioner::{ApplyOutcome, Provisioner};
pub use state::{
    GlobalState, MachineState, MachineStatus, ProviderState, StateLock, StateManager,
};
