//! Run reporting
//!
//! Sub-run failures are collected here and reported together at the
//! end of a run; the overall exit decision comes from `is_success`.

use crate::task::{TaskOutcome, TaskStatus};
use serde::{Deserialize, Serialize};

/// Task outcomes for one (host, role) execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostRoleReport {
    pub host: String,
    pub group: String,
    pub role: String,
    pub outcomes: Vec<TaskOutcome>,
    /// A hard gate failed on this host
    pub gate_failed: bool,
}

impl HostRoleReport {
    pub fn has_failures(&self) -> bool {
        self.outcomes
            .iter()
            .any(|o| o.status == TaskStatus::Failed)
    }
}

/// Full report of one convergence run
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RunReport {
    pub project: String,

    pub host_reports: Vec<HostRoleReport>,

    /// Collected role/group level errors (unresolved targets, missing
    /// secrets, gate failures)
    pub errors: Vec<String>,

    /// The run stopped issuing new work (gate failure or cancellation)
    pub aborted: bool,
}

impl RunReport {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            ..Default::default()
        }
    }

    pub fn record_error(&mut self, error: impl std::fmt::Display) {
        self.errors.push(error.to_string());
    }

    /// Counts of (unchanged, changed, failed, skipped) task outcomes
    pub fn counts(&self) -> (usize, usize, usize, usize) {
        let mut counts = (0, 0, 0, 0);
        for outcome in self.host_reports.iter().flat_map(|r| &r.outcomes) {
            match outcome.status {
                TaskStatus::Unchanged => counts.0 += 1,
                TaskStatus::Changed => counts.1 += 1,
                TaskStatus::Failed => counts.2 += 1,
                TaskStatus::Skipped => counts.3 += 1,
            }
        }
        counts
    }

    pub fn changed(&self) -> usize {
        self.counts().1
    }

    /// True when every required operation succeeded
    pub fn is_success(&self) -> bool {
        self.errors.is_empty() && self.host_reports.iter().all(|r| !r.has_failures())
    }
}

impl std::fmt::Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for report in &self.host_reports {
            writeln!(f, "{} ({} / {})", report.host, report.group, report.role)?;
            for outcome in &report.outcomes {
                writeln!(f, "  [{}] {}", outcome.status, outcome.task)?;
            }
        }
        for error in &self.errors {
            writeln!(f, "error: {}", error)?;
        }

        let (unchanged, changed, failed, skipped) = self.counts();
        write!(
            f,
            "{} unchanged, {} changed, {} failed, {} skipped",
            unchanged, changed, failed, skipped
        )?;
        if self.aborted {
            write!(f, " (aborted)")?;
        }
        Ok(())
    }
}
