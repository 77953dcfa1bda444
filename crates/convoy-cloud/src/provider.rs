//! Compute provider trait definition

use crate::error::Result;
use crate::state::{MachineState, ProviderState};
use async_trait::async_trait;
use convoy_core::MachineSpec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Compute provider abstraction trait
///
/// Cloud backends implement this trait to give the provisioner a
/// uniform create/describe/update/destroy surface. Providers are
/// expected to be eventually consistent: `resolve_addresses` polls
/// until the backend reports an allocated network interface.
#[async_trait]
pub trait ComputeProvider: Send + Sync {
    /// Returns the provider name (e.g., "gcp")
    fn name(&self) -> &str;

    /// Returns the provider display name for output
    fn display_name(&self) -> &str;

    /// Check if the provider is properly configured and authenticated
    async fn check_auth(&self) -> Result<AuthStatus>;

    /// Get the current state of all machines in the provisioning namespace
    async fn describe(&self) -> Result<ProviderState>;

    /// Create a machine matching the spec
    async fn create_machine(&self, name: &str, spec: &MachineSpec) -> Result<MachineState>;

    /// Update mutable fields of an existing machine in place.
    ///
    /// Materially incompatible drift (tier, image, subnet, sizing) must
    /// be rejected with a reconcile error; nothing is destructively
    /// recreated.
    async fn update_machine(
        &self,
        name: &str,
        spec: &MachineSpec,
        current: &MachineState,
    ) -> Result<MachineState>;

    /// Destroy a machine by name
    async fn destroy_machine(&self, name: &str) -> Result<()>;

    /// Poll the machine until its network interface is allocated and
    /// return the resolved connectivity facts.
    async fn resolve_addresses(&self, name: &str, poll: &PollConfig) -> Result<ResolvedHost>;
}

/// Authentication status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthStatus {
    /// Whether authentication is valid
    pub authenticated: bool,

    /// Account/user information if available
    pub account_info: Option<String>,

    /// Error message if not authenticated
    pub error: Option<String>,
}

impl AuthStatus {
    pub fn ok(account_info: impl Into<String>) -> Self {
        Self {
            authenticated: true,
            account_info: Some(account_info.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            authenticated: false,
            account_info: None,
            error: Some(error.into()),
        }
    }
}

/// Desired set of machines for one provisioning run
///
/// Keyed by machine name: two specs with the same name collapse into
/// one entry, which is what makes re-runs duplicate-free.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceSet {
    pub machines: BTreeMap<String, MachineSpec>,
}

impl ResourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_machines(machines: BTreeMap<String, MachineSpec>) -> Self {
        Self { machines }
    }

    pub fn add(&mut self, name: impl Into<String>, spec: MachineSpec) {
        self.machines.insert(name.into(), spec);
    }

    pub fn get(&self, name: &str) -> Option<&MachineSpec> {
        self.machines.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &MachineSpec)> {
        self.machines.iter()
    }

    pub fn len(&self) -> usize {
        self.machines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.machines.is_empty()
    }
}

/// A provisioned machine with known network addresses
///
/// Written once by the provisioner after the backend confirms network
/// interface allocation; read-only for all downstream components.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedHost {
    pub name: String,
    pub internal_address: String,
    pub external_address: String,
    pub ready: bool,
}

/// Polling configuration for eventually-consistent describe calls
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Maximum number of attempts
    pub max_retries: u32,

    /// Initial delay between attempts
    pub initial_delay_ms: u64,

    /// Maximum delay between attempts
    pub max_delay_ms: u64,

    /// Backoff multiplier
    pub multiplier: f64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_retries: 20,
            initial_delay_ms: 1000,
            max_delay_ms: 15000,
            multiplier: 2.0,
        }
    }
}

impl PollConfig {
    /// Delay before the given attempt (exponential backoff, capped)
    pub fn delay_for_attempt(&self, attempt: u32) -> u64 {
        let delay = self.initial_delay_ms as f64 * self.multiplier.powi(attempt as i32);
        (delay as u64).min(self.max_delay_ms)
    }
}
