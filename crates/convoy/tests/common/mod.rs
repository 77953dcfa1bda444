//! CLIテスト用のテンポラリプロジェクト

#![allow(dead_code)]

use std::path::Path;
use tempfile::TempDir;

pub struct TestProject {
    dir: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write_config(&self, content: &str) {
        std::fs::write(self.path().join("convoy.kdl"), content).unwrap();
    }

    /// .convoy/state.json を直接用意する（プロビジョン済み相当）
    pub fn write_state(&self, content: &str) {
        let state_dir = self.path().join(".convoy");
        std::fs::create_dir_all(&state_dir).unwrap();
        std::fs::write(state_dir.join("state.json"), content).unwrap();
    }

    pub fn read_file(&self, name: &str) -> String {
        std::fs::read_to_string(self.path().join(name)).unwrap()
    }

    pub fn has_file(&self, name: &str) -> bool {
        self.path().join(name).exists()
    }
}
