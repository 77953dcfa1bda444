//! Convergence engine
//!
//! Executes the role graph against the materialized host groups.
//! Bindings run in declared order — that order encodes the real
//! dependencies (runtime before orchestrator join). Within one binding
//! hosts are independent and converge concurrently; within one host
//! tasks run in declared order with fail-fast semantics.

use crate::error::ConvergeError;
use crate::report::{HostRoleReport, RunReport};
use crate::task::{TaskOutcome, TaskRunner, TaskStatus, predicate_holds};
use convoy_core::{
    ChannelFactory, Deployment, GatePolicy, Role, RunContext, SecretStore, Settings, VarValue,
    Variables,
};
use convoy_inventory::{Inventory, InventoryHost};
use futures_util::future::join_all;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Cooperative cancellation: stops issuing new role/task executions
/// without undoing anything already applied. Re-running the pipeline is
/// the recovery path.
#[derive(Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub gate_policy: GatePolicy,
    pub task_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            gate_policy: GatePolicy::AbortRun,
            task_timeout: Duration::from_secs(300),
        }
    }
}

impl EngineConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            gate_policy: settings.gate_policy,
            task_timeout: Duration::from_secs(settings.task_timeout_secs),
        }
    }
}

/// Drives a deployment's role graph to convergence
pub struct Engine {
    config: EngineConfig,
    cancel: CancelFlag,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            cancel: CancelFlag::new(),
        }
    }

    /// Handle for aborting the run from another task
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Execute the role graph. Sub-run failures are collected in the
    /// report; gate failures interrupt according to the gate policy.
    pub async fn run(
        &self,
        deployment: &Deployment,
        inventory: &Inventory,
        secrets: &SecretStore,
        channels: &dyn ChannelFactory,
        ctx: &RunContext,
    ) -> RunReport {
        let mut report = RunReport::new(&deployment.name);
        let base_vars = ctx.template_vars();

        'bindings: for binding in &deployment.graph.bindings {
            for role_name in &binding.roles {
                if self.cancel.is_cancelled() {
                    report.aborted = true;
                    break 'bindings;
                }

                let Some(role) = deployment.roles.get(role_name) else {
                    report.record_error(ConvergeError::RoleNotFound(role_name.clone()));
                    continue;
                };

                // Empty group is an unresolved target, caught before
                // any task runs for this role/group pairing.
                let hosts = inventory.group(&binding.group).unwrap_or(&[]);
                if hosts.is_empty() {
                    report.record_error(ConvergeError::UnresolvedTarget {
                        group: binding.group.clone(),
                        role: role_name.clone(),
                    });
                    continue;
                }

                if !predicate_holds(&role.when, secrets) {
                    tracing::info!(role = %role_name, "Role predicate does not hold, skipping");
                    continue;
                }

                // All referenced secrets must resolve before the first
                // mutating task, so no host is left with partial
                // credential-dependent state.
                let secret_values = match secrets.resolve_all(&role.secret_keys()) {
                    Ok(values) => values,
                    Err(convoy_core::ConvoyError::MissingSecret(key)) => {
                        report.record_error(ConvergeError::MissingSecret {
                            role: role_name.clone(),
                            key,
                        });
                        continue;
                    }
                    Err(e) => {
                        report.record_error(ConvergeError::Core(e));
                        continue;
                    }
                };

                let mut role_vars = base_vars.clone();
                for (key, value) in &role.vars {
                    let rendered = match value {
                        VarValue::Literal(v) => v.clone(),
                        VarValue::Secret(k) => secret_values[k].clone(),
                    };
                    role_vars.insert(key.clone(), serde_json::Value::String(rendered));
                }

                tracing::info!(
                    role = %role_name,
                    group = %binding.group,
                    hosts = hosts.len(),
                    "Applying role"
                );

                // Hosts are independent: converge them concurrently
                let futures = hosts.iter().map(|host| {
                    self.run_role_on_host(
                        deployment,
                        role,
                        &binding.group,
                        host,
                        &role_vars,
                        secrets,
                        channels,
                    )
                });

                let mut gate_failure: Option<(String, String, String)> = None;
                for host_report in join_all(futures).await {
                    if host_report.gate_failed
                        && gate_failure.is_none()
                        && let Some(outcome) = host_report
                            .outcomes
                            .iter()
                            .find(|o| o.gate && o.status == TaskStatus::Failed)
                    {
                        gate_failure = Some((
                            outcome.task.clone(),
                            host_report.host.clone(),
                            outcome.detail.clone(),
                        ));
                    }
                    report.host_reports.push(host_report);
                }

                if let Some((task, host, detail)) = gate_failure {
                    report.record_error(ConvergeError::GateFailed { task, host, detail });
                    match self.config.gate_policy {
                        GatePolicy::AbortRun => {
                            tracing::error!("Hard gate failed, aborting run");
                            report.aborted = true;
                            break 'bindings;
                        }
                        GatePolicy::AbortHost => {
                            // The failing host already halted; the rest
                            // of the graph proceeds.
                        }
                    }
                }
            }
        }

        report
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_role_on_host(
        &self,
        deployment: &Deployment,
        role: &Role,
        group: &str,
        host: &InventoryHost,
        role_vars: &Variables,
        secrets: &SecretStore,
        channels: &dyn ChannelFactory,
    ) -> HostRoleReport {
        let mut vars = role_vars.clone();
        vars.insert("host_name".to_string(), serde_json::json!(host.name));
        vars.insert(
            "host_address".to_string(),
            serde_json::json!(host.connect_address()),
        );
        vars.insert(
            "host_internal_address".to_string(),
            serde_json::json!(host.internal_address),
        );
        vars.insert(
            "host_external_address".to_string(),
            serde_json::json!(host.external_address),
        );
        vars.insert("group".to_string(), serde_json::json!(group));

        let channel = channels.connect(host.connect_address());
        let runner = TaskRunner {
            channel: channel.as_ref(),
            vars: &vars,
            bootstraps: &deployment.bootstraps,
            secrets,
            timeout: self.config.task_timeout,
        };

        let mut outcomes = Vec::new();
        let mut gate_failed = false;

        for task in &role.tasks {
            if self.cancel.is_cancelled() {
                break;
            }

            if !predicate_holds(&task.when, secrets) {
                outcomes.push(TaskOutcome {
                    task: task.name.clone(),
                    status: TaskStatus::Skipped,
                    detail: "predicate not satisfied".to_string(),
                    gate: false,
                });
                continue;
            }

            let outcome = runner.execute(task).await;
            tracing::debug!(
                host = %host.name,
                task = %task.name,
                status = %outcome.status,
                "Task finished"
            );

            let failed = outcome.status == TaskStatus::Failed;
            if failed && outcome.gate {
                gate_failed = true;
            }
            outcomes.push(outcome);

            // Fail-fast: remaining tasks in this role halt for this
            // host only
            if failed {
                break;
            }
        }

        HostRoleReport {
            host: host.name.clone(),
            group: group.to_string(),
            role: role.name.clone(),
            outcomes,
            gate_failed,
        }
    }
}
