//! ロール・タスクモデル
//!
//! 収束フェーズで各ホストグループに適用される構成単位の定義。
//! ロールは順序付きのタスク列を持ち、グラフ上の宣言順が依存順になる。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// タスク/ロールの適用条件
///
/// 副作用を起こす前に評価され、不成立はスキップ（失敗ではない）。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Predicate {
    /// 常に適用
    #[default]
    Always,
    /// 環境変数が定義されている場合のみ
    EnvDefined(String),
    /// シークレットが解決できる場合のみ
    SecretPresent(String),
}

/// 変数バインディング値
///
/// シークレットは宣言には値を持たず、キー参照のみを保持する。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VarValue {
    /// リテラル値
    Literal(String),
    /// シークレットキー参照（収束時に解決）
    Secret(String),
}

/// systemdユニットの目標状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    Started,
    Stopped,
}

/// タスク種別ごとのパラメータ
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskSpec {
    /// ファイル内容とモードを保証する
    File {
        path: String,
        content: String,
        mode: String,
    },
    /// systemdユニットの状態を保証する
    Service {
        unit: String,
        state: ServiceState,
        enabled: bool,
    },
    /// 成功条件付きコマンド実行
    Command {
        command: String,
        /// このパスが存在すれば適用済みとみなす
        creates: Option<String>,
        /// このコマンドが成功すれば適用済みとみなす
        unless: Option<String>,
    },
    /// ホスト上でのダウンロード（任意でsha256検証）
    Download {
        url: String,
        dest: String,
        sha256: Option<String>,
        mode: Option<String>,
    },
    /// 名前付きブートストラップ手順の実行
    Bootstrap { uses: String },
}

/// 原子的・冪等なタスク
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub name: String,
    pub spec: TaskSpec,
    /// ハードゲート: 失敗をゲートポリシーに従って致命扱いにする
    pub gate: bool,
    pub when: Predicate,
}

/// ロール定義
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    /// 適用対象として許可されるホストグループ
    pub targets: Vec<String>,
    /// 変数バインディング（シークレット参照を含む）
    pub vars: HashMap<String, VarValue>,
    pub when: Predicate,
    /// 宣言順に実行されるタスク列
    pub tasks: Vec<Task>,
}

impl Role {
    /// ロールが参照するシークレットキーの一覧
    pub fn secret_keys(&self) -> Vec<&str> {
        self.vars
            .values()
            .filter_map(|v| match v {
                VarValue::Secret(key) => Some(key.as_str()),
                VarValue::Literal(_) => None,
            })
            .collect()
    }
}

/// (ホストグループ, ロール列) の束縛
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Binding {
    pub group: String,
    pub roles: Vec<String>,
}

/// ロールグラフ
///
/// 宣言順がデプロイの依存順。束縛は直列に、束縛内のホストは並行に実行される。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleGraph {
    pub bindings: Vec<Binding>,
}

impl RoleGraph {
    /// グラフが参照する（空であってはならない）グループ名の一覧
    pub fn required_groups(&self) -> Vec<&str> {
        let mut groups: Vec<&str> = self.bindings.iter().map(|b| b.group.as_str()).collect();
        groups.sort_unstable();
        groups.dedup();
        groups
    }
}

/// ゲート失敗時のポリシー
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GatePolicy {
    /// 実行全体を中断する
    #[default]
    AbortRun,
    /// 当該ホストのみ中断する
    AbortHost,
}

/// 実行設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub gate_policy: GatePolicy,
    /// リモート操作1回あたりのタイムアウト（秒）
    pub task_timeout_secs: u64,
    pub ssh_user: String,
    pub ssh_key_file: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            gate_policy: GatePolicy::AbortRun,
            task_timeout_secs: 300,
            ssh_user: "root".to_string(),
            ssh_key_file: None,
        }
    }
}
