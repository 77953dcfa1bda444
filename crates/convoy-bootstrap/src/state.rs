//! ブートストラップ状態遷移
//!
//! 各ステップの到達状態と結果を記録する。終端状態は `Verified` か
//! `Failed` のみ。暗黙のリトライは無く、失敗したインスタンスは
//! 最初から再実行する（全ステップ冪等）。

use serde::{Deserialize, Serialize};

/// ブートストラップの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BootstrapState {
    Start,
    PrerequisitesChecked,
    ArtifactFetched,
    ArtifactExtracted,
    BinariesInstalled,
    CredentialsConfigured,
    Verified,
    Failed,
}

impl std::fmt::Display for BootstrapState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BootstrapState::Start => "start",
            BootstrapState::PrerequisitesChecked => "prerequisites_checked",
            BootstrapState::ArtifactFetched => "artifact_fetched",
            BootstrapState::ArtifactExtracted => "artifact_extracted",
            BootstrapState::BinariesInstalled => "binaries_installed",
            BootstrapState::CredentialsConfigured => "credentials_configured",
            BootstrapState::Verified => "verified",
            BootstrapState::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// 到達したステップの記録
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub state: BootstrapState,
    pub message: String,
}

/// 1ホスト・1ブートストラップ種別ごとの実行記録
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapReport {
    pub host: String,
    pub bootstrap: String,
    pub state: BootstrapState,
    pub steps: Vec<StepRecord>,
}

impl BootstrapReport {
    pub fn new(host: impl Into<String>, bootstrap: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            bootstrap: bootstrap.into(),
            state: BootstrapState::Start,
            steps: Vec::new(),
        }
    }

    /// ステップ到達を記録し、現在状態を進める
    pub fn reach(&mut self, state: BootstrapState, message: impl Into<String>) {
        self.state = state;
        self.steps.push(StepRecord {
            state,
            message: message.into(),
        });
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.state = BootstrapState::Failed;
        self.steps.push(StepRecord {
            state: BootstrapState::Failed,
            message: message.into(),
        });
    }

    pub fn is_verified(&self) -> bool {
        self.state == BootstrapState::Verified
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_transitions() {
        let mut report = BootstrapReport::new("10.0.0.2", "buildkit");
        assert_eq!(report.state, BootstrapState::Start);

        report.reach(BootstrapState::PrerequisitesChecked, "socket present");
        report.reach(BootstrapState::Verified, "all binaries verified");

        assert!(report.is_verified());
        assert_eq!(report.steps.len(), 2);
    }

    #[test]
    fn test_failed_is_terminal_from_any_state() {
        let mut report = BootstrapReport::new("10.0.0.2", "buildkit");
        report.reach(BootstrapState::ArtifactFetched, "12MB");
        report.fail("extraction error");

        assert!(!report.is_verified());
        assert_eq!(report.state, BootstrapState::Failed);
    }
}
