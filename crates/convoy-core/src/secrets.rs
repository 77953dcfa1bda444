//! シークレット解決モジュール
//!
//! 宣言ファイルにはシークレットのキーだけを書き、値は収束実行時に
//! 遅延解決します。解決順序は決定的です:
//!
//! 1. 明示的オーバーライド（CLI の `--secret KEY=VALUE` など）
//! 2. プロセス環境変数
//! 3. どちらにも無ければ `MissingSecret` エラー
//!
//! ## セキュリティ
//!
//! - 解決された値はログに出力されません
//! - エラーメッセージにも値は含まれません
//! - 解決結果は1回の実行スコープを超えてキャッシュされません

use crate::error::{ConvoyError, Result};
use std::collections::HashMap;
use tracing::debug;

/// シークレットストア
///
/// 1回の収束実行ごとに生成し、実行終了とともに破棄する。
#[derive(Default)]
pub struct SecretStore {
    overrides: HashMap<String, String>,
}

impl SecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// オーバーライド付きで生成
    pub fn with_overrides(overrides: HashMap<String, String>) -> Self {
        Self { overrides }
    }

    /// 明示的オーバーライドを追加（環境変数より優先）
    pub fn set_override(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.overrides.insert(key.into(), value.into());
    }

    /// キーを解決。見つからなければ `MissingSecret`
    pub fn resolve(&self, key: &str) -> Result<String> {
        self.lookup(key)
            .ok_or_else(|| ConvoyError::MissingSecret(key.to_string()))
    }

    /// キーを解決。見つからなければ `None`（適用条件の評価に使う）
    pub fn lookup(&self, key: &str) -> Option<String> {
        if let Some(value) = self.overrides.get(key) {
            debug!(key = %key, source = "override", "Resolved secret");
            return Some(value.clone());
        }
        if let Ok(value) = std::env::var(key) {
            debug!(key = %key, source = "environment", "Resolved secret");
            return Some(value);
        }
        None
    }

    /// 複数キーをまとめて解決
    ///
    /// 1つでも欠けていれば最初の欠落キーで `MissingSecret` を返す。
    /// 変異的タスクの実行前にロールの参照を全て検証する用途。
    pub fn resolve_all(&self, keys: &[&str]) -> Result<HashMap<String, String>> {
        let mut resolved = HashMap::new();
        for key in keys {
            resolved.insert((*key).to_string(), self.resolve(key)?);
        }
        Ok(resolved)
    }
}

// 値を含めない Debug 表現
impl std::fmt::Debug for SecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretStore")
            .field("overrides", &self.overrides.len())
            .finish()
    }
}
