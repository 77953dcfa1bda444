//! Machine reconciliation
//!
//! The provisioner drives a [`ComputeProvider`] until the backend
//! matches the desired [`ResourceSet`]: missing machines are created,
//! in-place-updatable drift is applied, incompatible drift is reported
//! for manual intervention. Reconciliation is partial-failure tolerant
//! at machine granularity — one failing machine never blocks the rest —
//! and re-run-safe: machines are identified by name, so an unchanged
//! desired set never creates duplicates.

use crate::action::{Action, ActionType, ApplyResult, Plan};
use crate::error::{CloudError, Result};
use crate::provider::{ComputeProvider, PollConfig, ResolvedHost, ResourceSet};
use crate::state::MachineState;
use convoy_core::MachineSpec;
use futures_util::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

/// Outcome of one reconcile run
#[derive(Debug, Default)]
pub struct ApplyOutcome {
    /// Per-action results (partial failures included)
    pub result: ApplyResult,

    /// Connectivity facts for every machine that resolved, sorted by name
    pub hosts: Vec<ResolvedHost>,

    /// Fresh machine state for every desired machine that exists
    pub states: BTreeMap<String, MachineState>,
}

/// Reconciles a desired machine set against one cloud backend
pub struct Provisioner {
    provider: Arc<dyn ComputeProvider>,
    poll: PollConfig,
}

impl Provisioner {
    pub fn new(provider: Arc<dyn ComputeProvider>) -> Self {
        Self {
            provider,
            poll: PollConfig::default(),
        }
    }

    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Verify backend credentials. Auth failure aborts the whole run.
    pub async fn check_auth(&self) -> Result<String> {
        let auth = self.provider.check_auth().await?;
        if !auth.authenticated {
            return Err(CloudError::AuthenticationFailed(
                auth.error.unwrap_or_else(|| "unknown".to_string()),
            ));
        }
        Ok(auth.account_info.unwrap_or_else(|| "unknown".to_string()))
    }

    /// Compute the diff between the desired set and the backend state
    pub async fn plan(&self, desired: &ResourceSet) -> Result<Plan> {
        let current = self.provider.describe().await?;
        let mut actions = Vec::new();

        for (name, spec) in desired.iter() {
            match current.get(name) {
                None => {
                    actions.push(Action {
                        id: format!("create-{}", name),
                        action_type: ActionType::Create,
                        machine: name.clone(),
                        description: format!(
                            "create machine {} ({}, {} cores, {} GB)",
                            name, spec.tier, spec.cores, spec.memory_gb
                        ),
                        details: [(
                            "provider".to_string(),
                            serde_json::json!(self.provider.name()),
                        )]
                        .into_iter()
                        .collect(),
                    });
                }
                Some(state) => {
                    let drift = drift_fields(spec, state);
                    if drift.is_empty() {
                        actions.push(Action {
                            id: format!("noop-{}", name),
                            action_type: ActionType::NoOp,
                            machine: name.clone(),
                            description: format!("machine {} already matches", name),
                            details: Default::default(),
                        });
                    } else {
                        actions.push(Action {
                            id: format!("update-{}", name),
                            action_type: ActionType::Update,
                            machine: name.clone(),
                            description: format!(
                                "update machine {} (drift: {})",
                                name,
                                drift.join(", ")
                            ),
                            details: [("drift".to_string(), serde_json::json!(drift))]
                                .into_iter()
                                .collect(),
                        });
                    }
                }
            }
        }

        // Machines that exist but are not desired are never auto-deleted;
        // removal requires an explicit destroy.
        for (name, _) in current.iter() {
            if desired.get(name).is_none() {
                tracing::debug!(
                    machine = %name,
                    "Machine exists but is not in the desired set (will not auto-delete)"
                );
            }
        }

        Ok(Plan::new(actions))
    }

    /// Apply a plan. Independent machines reconcile in parallel.
    pub async fn apply(&self, desired: &ResourceSet, plan: &Plan) -> Result<ApplyOutcome> {
        // Auth failure is fatal before any resource is touched
        self.check_auth().await?;

        let start = Instant::now();
        let current = self.provider.describe().await?;

        let futures = plan.actions.iter().map(|action| {
            let provider = Arc::clone(&self.provider);
            let poll = self.poll.clone();
            let spec = desired.get(&action.machine).cloned();
            let existing = current.get(&action.machine).cloned();

            async move {
                let outcome =
                    reconcile_one(provider, &poll, action, spec.as_ref(), existing.as_ref()).await;
                (action.id.clone(), outcome)
            }
        });

        let mut result = ApplyResult::new();
        let mut hosts = Vec::new();

        for (action_id, outcome) in join_all(futures).await {
            match outcome {
                Ok((message, host)) => {
                    result.add_success(action_id, message);
                    if let Some(host) = host {
                        hosts.push(host);
                    }
                }
                Err(e) => {
                    tracing::warn!(action = %action_id, error = %e, "Reconcile action failed");
                    result.add_failure(action_id, e.to_string());
                }
            }
        }

        hosts.sort_by(|a, b| a.name.cmp(&b.name));
        result.duration_ms = start.elapsed().as_millis() as u64;

        // Re-describe so callers persist fresh attributes
        let after = self.provider.describe().await?;
        let states = desired
            .iter()
            .filter_map(|(name, _)| after.get(name).map(|s| (name.clone(), s.clone())))
            .collect();

        Ok(ApplyOutcome {
            result,
            hosts,
            states,
        })
    }

    /// Destroy every machine in the desired set that still exists
    pub async fn destroy(&self, desired: &ResourceSet) -> Result<ApplyResult> {
        self.check_auth().await?;

        let start = Instant::now();
        let current = self.provider.describe().await?;

        let futures = desired.iter().filter_map(|(name, _)| {
            current.get(name)?;
            let provider = Arc::clone(&self.provider);
            let name = name.clone();
            Some(async move {
                let outcome = provider.destroy_machine(&name).await;
                (name, outcome)
            })
        });

        let mut result = ApplyResult::new();
        for (name, outcome) in join_all(futures).await {
            match outcome {
                Ok(()) => result.add_success(
                    format!("delete-{}", name),
                    format!("machine {} destroyed", name),
                ),
                Err(e) => result.add_failure(format!("delete-{}", name), e.to_string()),
            }
        }

        result.duration_ms = start.elapsed().as_millis() as u64;
        Ok(result)
    }
}

async fn reconcile_one(
    provider: Arc<dyn ComputeProvider>,
    poll: &PollConfig,
    action: &Action,
    spec: Option<&MachineSpec>,
    existing: Option<&MachineState>,
) -> Result<(String, Option<ResolvedHost>)> {
    let name = action.machine.as_str();

    match action.action_type {
        ActionType::Create => {
            let spec = spec.ok_or_else(|| CloudError::MachineNotFound(name.to_string()))?;
            tracing::info!(machine = %name, "Creating machine");
            let state = provider.create_machine(name, spec).await?;
            let host = provider.resolve_addresses(name, poll).await?;
            Ok((
                format!("machine {} created (ID: {})", name, state.id),
                Some(host),
            ))
        }
        ActionType::Update => {
            let spec = spec.ok_or_else(|| CloudError::MachineNotFound(name.to_string()))?;
            let current = existing.ok_or_else(|| CloudError::MachineNotFound(name.to_string()))?;
            tracing::info!(machine = %name, "Updating machine");
            provider.update_machine(name, spec, current).await?;
            let host = provider.resolve_addresses(name, poll).await?;
            Ok((format!("machine {} updated", name), Some(host)))
        }
        ActionType::Delete => {
            tracing::info!(machine = %name, "Deleting machine");
            provider.destroy_machine(name).await?;
            Ok((format!("machine {} destroyed", name), None))
        }
        ActionType::NoOp => {
            // Still refresh connectivity facts for downstream phases
            let host = provider.resolve_addresses(name, poll).await?;
            Ok((format!("machine {} already matches", name), Some(host)))
        }
    }
}

/// Fields that differ between the declared spec and the backend state.
/// Only attributes the provider reported are compared.
fn drift_fields(spec: &MachineSpec, state: &MachineState) -> Vec<&'static str> {
    let mut drift = Vec::new();

    if let Some(tier) = state.get_attribute::<String>("tier")
        && tier != spec.tier
    {
        drift.push("tier");
    }
    if let Some(cores) = state.get_attribute::<u32>("cores")
        && cores != spec.cores
    {
        drift.push("cores");
    }
    if let Some(memory) = state.get_attribute::<u32>("memory_gb")
        && memory != spec.memory_gb
    {
        drift.push("memory_gb");
    }
    if let Some(image) = state.get_attribute::<String>("image")
        && image != spec.image
    {
        drift.push("image");
    }
    if let Some(subnet) = state.get_attribute::<String>("subnet")
        && subnet != spec.subnet
    {
        drift.push("subnet");
    }

    drift
}
