//! マシンリソースモデル
//!
//! Convoyがプロビジョニングするクラウドマシン（計算リソース）の定義

use crate::error::{ConvoyError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// クラウドプロバイダー設定
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// プロバイダー名（gcp など）
    pub name: String,

    /// プロジェクトID
    pub project: Option<String>,

    /// ゾーン（europe-west1-b など）
    pub zone: Option<String>,

    /// ネットワーク名
    pub network: Option<String>,

    /// 追加設定（プロバイダー固有）
    pub config: HashMap<String, String>,
}

/// マシンリソース定義
///
/// 1つのノードが1台の望ましいマシン状態を表す。名前はプロビジョニング
/// 実行内で一意（ResourceSetが名前でキーするため重複は1台に収束する）。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MachineSpec {
    /// プラットフォームティア（e2, n2 など）
    pub tier: String,

    /// vCPU数
    pub cores: u32,

    /// メモリ (GB)
    pub memory_gb: u32,

    /// ブートディスクサイズ (GB)
    pub disk_gb: Option<u32>,

    /// ブートイメージ（debian-12 など）
    pub image: String,

    /// サブネット参照（必ず1つに解決されること）
    pub subnet: String,

    /// プリエンプティブルインスタンスか
    pub preemptible: bool,

    /// SSH公開鍵
    pub ssh_public_key: Option<String>,

    /// 所属するホストグループ（静的宣言、複数可）
    pub groups: Vec<String>,
}

impl MachineSpec {
    /// 宣言の静的検証
    pub fn validate(&self, name: &str) -> Result<()> {
        if self.tier.is_empty() {
            return Err(ConvoyError::InvalidConfig(format!(
                "machine '{}' に tier が指定されていません",
                name
            )));
        }
        if self.cores == 0 || self.memory_gb == 0 {
            return Err(ConvoyError::InvalidConfig(format!(
                "machine '{}' の cores / memory は 1 以上が必要です",
                name
            )));
        }
        if self.image.is_empty() {
            return Err(ConvoyError::InvalidConfig(format!(
                "machine '{}' に image が指定されていません",
                name
            )));
        }
        // サブネットは必ず1つ。空文字は未解決として扱う
        if self.subnet.is_empty() {
            return Err(ConvoyError::InvalidConfig(format!(
                "machine '{}' に subnet が指定されていません",
                name
            )));
        }
        Ok(())
    }
}
