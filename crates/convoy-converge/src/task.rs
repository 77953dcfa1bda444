//! Task execution
//!
//! Every task carries a side-effect-free check and a separate apply;
//! the runner always checks before applying, which is what makes a
//! re-run against a converged host report `unchanged` across the
//! board. A skipped applicability predicate is never a failure.

use convoy_bootstrap::{BootstrapError, Installer};
use convoy_core::{
    BootstrapSpec, Predicate, RemoteChannel, SecretStore, ServiceState, Task, TaskSpec, Variables,
    render_str,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Classification of one task execution on one host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Host already in the target state; nothing was done
    Unchanged,
    /// The apply step ran and succeeded
    Changed,
    Failed,
    /// Applicability predicate did not hold
    Skipped,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Unchanged => write!(f, "unchanged"),
            TaskStatus::Changed => write!(f, "changed"),
            TaskStatus::Failed => write!(f, "failed"),
            TaskStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// Outcome of one task on one host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub task: String,
    pub status: TaskStatus,
    pub detail: String,
    /// Failure counts as a hard gate
    pub gate: bool,
}

/// Evaluate an applicability predicate without side effects
pub fn predicate_holds(when: &Predicate, secrets: &SecretStore) -> bool {
    match when {
        Predicate::Always => true,
        Predicate::EnvDefined(key) => std::env::var(key).is_ok(),
        Predicate::SecretPresent(key) => secrets.lookup(key).is_some(),
    }
}

struct TaskFailure {
    detail: String,
    gate: bool,
}

impl From<convoy_core::ConvoyError> for TaskFailure {
    fn from(e: convoy_core::ConvoyError) -> Self {
        Self {
            detail: e.to_string(),
            gate: false,
        }
    }
}

/// Executes tasks for one host over its remote channel
pub struct TaskRunner<'a> {
    pub channel: &'a dyn RemoteChannel,
    pub vars: &'a Variables,
    pub bootstraps: &'a HashMap<String, BootstrapSpec>,
    pub secrets: &'a SecretStore,
    pub timeout: Duration,
}

impl TaskRunner<'_> {
    /// Check, then apply. Transport errors and non-zero applies both
    /// classify as `failed`; the gate flag marks failures that must be
    /// escalated per the engine's gate policy.
    pub async fn execute(&self, task: &Task) -> TaskOutcome {
        match self.run(task).await {
            Ok((status, detail)) => TaskOutcome {
                task: task.name.clone(),
                status,
                detail,
                gate: false,
            },
            Err(failure) => TaskOutcome {
                task: task.name.clone(),
                status: TaskStatus::Failed,
                detail: failure.detail,
                gate: task.gate || failure.gate,
            },
        }
    }

    async fn run(&self, task: &Task) -> Result<(TaskStatus, String), TaskFailure> {
        match &task.spec {
            TaskSpec::File { path, content, mode } => {
                self.run_file(&task.name, path, content, mode).await
            }
            TaskSpec::Service {
                unit,
                state,
                enabled,
            } => self.run_service(unit, *state, *enabled).await,
            TaskSpec::Command {
                command,
                creates,
                unless,
            } => {
                self.run_command(command, creates.as_deref(), unless.as_deref())
                    .await
            }
            TaskSpec::Download {
                url,
                dest,
                sha256,
                mode,
            } => {
                self.run_download(url, dest, sha256.as_deref(), mode.as_deref())
                    .await
            }
            TaskSpec::Bootstrap { uses } => self.run_bootstrap(uses).await,
        }
    }

    fn render(&self, input: &str) -> Result<String, TaskFailure> {
        Ok(render_str(input, self.vars)?)
    }

    async fn run_file(
        &self,
        task_name: &str,
        path: &str,
        content: &str,
        mode: &str,
    ) -> Result<(TaskStatus, String), TaskFailure> {
        let path = self.render(path)?;
        let content = self.render(content)?;

        let check = self
            .channel
            .exec(&format!("cat {}", path), self.timeout)
            .await?;
        if check.success() && check.stdout == content {
            return Ok((TaskStatus::Unchanged, "content matches".to_string()));
        }

        let staging = format!("/tmp/convoy-task-{}", sanitize(task_name));
        self.channel
            .upload(content.as_bytes(), &staging, self.timeout)
            .await?;

        let out = self
            .channel
            .exec(
                &format!(
                    "mkdir -p {} && install -m {} {} {}",
                    parent_dir(&path),
                    mode,
                    staging,
                    path
                ),
                self.timeout,
            )
            .await?;
        if !out.success() {
            return Err(TaskFailure {
                detail: format!("install exited with {}: {}", out.status, out.stderr.trim()),
                gate: false,
            });
        }

        Ok((TaskStatus::Changed, format!("wrote {}", path)))
    }

    async fn run_service(
        &self,
        unit: &str,
        state: ServiceState,
        enabled: bool,
    ) -> Result<(TaskStatus, String), TaskFailure> {
        let active = self
            .channel
            .exec(&format!("systemctl is-active --quiet {}", unit), self.timeout)
            .await?
            .success();

        match state {
            ServiceState::Started => {
                let enabled_ok = !enabled
                    || self
                        .channel
                        .exec(
                            &format!("systemctl is-enabled --quiet {}", unit),
                            self.timeout,
                        )
                        .await?
                        .success();

                if active && enabled_ok {
                    return Ok((TaskStatus::Unchanged, format!("{} active", unit)));
                }

                if !active {
                    let out = self
                        .channel
                        .exec(&format!("systemctl start {}", unit), self.timeout)
                        .await?;
                    if !out.success() {
                        return Err(TaskFailure {
                            detail: format!("systemctl start {} exited with {}", unit, out.status),
                            gate: false,
                        });
                    }
                }
                if enabled && !enabled_ok {
                    let out = self
                        .channel
                        .exec(&format!("systemctl enable {}", unit), self.timeout)
                        .await?;
                    if !out.success() {
                        return Err(TaskFailure {
                            detail: format!("systemctl enable {} exited with {}", unit, out.status),
                            gate: false,
                        });
                    }
                }

                Ok((TaskStatus::Changed, format!("{} started", unit)))
            }
            ServiceState::Stopped => {
                if !active {
                    return Ok((TaskStatus::Unchanged, format!("{} inactive", unit)));
                }
                let out = self
                    .channel
                    .exec(&format!("systemctl stop {}", unit), self.timeout)
                    .await?;
                if !out.success() {
                    return Err(TaskFailure {
                        detail: format!("systemctl stop {} exited with {}", unit, out.status),
                        gate: false,
                    });
                }
                Ok((TaskStatus::Changed, format!("{} stopped", unit)))
            }
        }
    }

    async fn run_command(
        &self,
        command: &str,
        creates: Option<&str>,
        unless: Option<&str>,
    ) -> Result<(TaskStatus, String), TaskFailure> {
        let command = self.render(command)?;

        // Declared success predicates make the command idempotent
        if let Some(creates) = creates {
            let creates = self.render(creates)?;
            let check = self
                .channel
                .exec(&format!("test -e {}", creates), self.timeout)
                .await?;
            if check.success() {
                return Ok((TaskStatus::Unchanged, format!("{} exists", creates)));
            }
        } else if let Some(unless) = unless {
            let unless = self.render(unless)?;
            let check = self.channel.exec(&unless, self.timeout).await?;
            if check.success() {
                return Ok((TaskStatus::Unchanged, "unless condition holds".to_string()));
            }
        }

        let out = self.channel.exec(&command, self.timeout).await?;
        if !out.success() {
            return Err(TaskFailure {
                detail: format!("exit {}: {}", out.status, out.stderr.trim()),
                gate: false,
            });
        }

        Ok((TaskStatus::Changed, "command ran".to_string()))
    }

    async fn run_download(
        &self,
        url: &str,
        dest: &str,
        sha256: Option<&str>,
        mode: Option<&str>,
    ) -> Result<(TaskStatus, String), TaskFailure> {
        let url = self.render(url)?;
        let dest = self.render(dest)?;

        let verify = sha256.map(|sha| format!("echo \"{}  {}\" | sha256sum --check --quiet", sha, dest));

        let already = match &verify {
            Some(check) => self.channel.exec(check, self.timeout).await?.success(),
            None => {
                self.channel
                    .exec(&format!("test -f {}", dest), self.timeout)
                    .await?
                    .success()
            }
        };
        if already {
            return Ok((TaskStatus::Unchanged, format!("{} present", dest)));
        }

        let out = self
            .channel
            .exec(
                &format!(
                    "mkdir -p {} && curl -fsSL --max-time {} -o {} {}",
                    parent_dir(&dest),
                    self.timeout.as_secs(),
                    dest,
                    url
                ),
                self.timeout,
            )
            .await?;
        if !out.success() {
            return Err(TaskFailure {
                detail: format!("download exited with {}: {}", out.status, out.stderr.trim()),
                gate: false,
            });
        }

        if let Some(check) = &verify {
            let out = self.channel.exec(check, self.timeout).await?;
            if !out.success() {
                return Err(TaskFailure {
                    detail: format!("checksum mismatch for {}", dest),
                    gate: false,
                });
            }
        }
        if let Some(mode) = mode {
            self.channel
                .exec(&format!("chmod {} {}", mode, dest), self.timeout)
                .await?;
        }

        Ok((TaskStatus::Changed, format!("downloaded {}", dest)))
    }

    async fn run_bootstrap(&self, uses: &str) -> Result<(TaskStatus, String), TaskFailure> {
        let spec = self.bootstraps.get(uses).ok_or_else(|| TaskFailure {
            detail: format!("bootstrap '{}' is not defined", uses),
            gate: false,
        })?;

        let installer = Installer::new().with_exec_timeout(self.timeout);

        let installed = installer
            .is_installed(spec, self.channel)
            .await
            .map_err(|e| TaskFailure {
                detail: e.to_string(),
                gate: false,
            })?;
        if installed {
            return Ok((
                TaskStatus::Unchanged,
                format!("{} {} already verified", uses, spec.version),
            ));
        }

        match installer.run(uses, spec, self.channel, self.secrets).await {
            Ok(report) => Ok((TaskStatus::Changed, format!("reached {}", report.state))),
            // A failed prerequisite is always a hard gate for this host
            Err(BootstrapError::PrerequisiteFailed { message, .. }) => Err(TaskFailure {
                detail: message,
                gate: true,
            }),
            Err(e) => Err(TaskFailure {
                detail: e.to_string(),
                gate: false,
            }),
        }
    }
}

fn parent_dir(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some((dir, _)) if !dir.is_empty() => dir,
        _ => ".",
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}
