//! 実行コンテキスト
//!
//! プロビジョニングから収束まで引き回される実行全体の共有値。
//! プロセス全体の可変状態は持たず、生成後は読み取り専用。

use crate::template::Variables;
use serde::{Deserialize, Serialize};

/// 1回の実行に共通する不変コンテキスト
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunContext {
    /// プロジェクト名
    pub project: String,

    /// 実行全体で共有される変数（ホスト名、ポートなど）
    pub variables: Variables,
}

impl RunContext {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            variables: Variables::new(),
        }
    }

    pub fn with_variable(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.variables.insert(key.into(), value);
        self
    }

    /// テンプレート展開用の変数マップを作る（project を含む）
    pub fn template_vars(&self) -> Variables {
        let mut vars = self.variables.clone();
        vars.insert(
            "project".to_string(),
            serde_json::Value::String(self.project.clone()),
        );
        vars
    }
}
