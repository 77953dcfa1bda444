//! コマンド共通のヘルパー

use anyhow::{Context, bail};
use convoy_cloud::{ComputeProvider, ResourceSet};
use convoy_cloud_gcp::GcpProvider;
use convoy_core::{Deployment, SecretStore};
use std::sync::Arc;

/// 宣言からプロバイダーを構築
pub fn provider_for(deployment: &Deployment) -> anyhow::Result<Arc<dyn ComputeProvider>> {
    match deployment.provider.name.as_str() {
        "gcp" => {
            let project = deployment
                .provider
                .project
                .clone()
                .context("provider に project が指定されていません")?;
            let zone = deployment
                .provider
                .zone
                .clone()
                .context("provider に zone が指定されていません")?;
            Ok(Arc::new(GcpProvider::new(project, zone, &deployment.name)))
        }
        "" => bail!("provider が宣言されていません"),
        other => bail!("未対応のプロバイダー: {}", other),
    }
}

/// 宣言されたマシン群を望ましい状態セットに変換
pub fn resource_set(deployment: &Deployment) -> ResourceSet {
    ResourceSet::from_machines(deployment.machines.clone())
}

/// KEY=VALUE 形式のオーバーライドからシークレットストアを構築
pub fn secret_store(overrides: &[String]) -> anyhow::Result<SecretStore> {
    let mut store = SecretStore::new();
    for pair in overrides {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("--secret は KEY=VALUE 形式で指定してください: {}", pair);
        };
        store.set_override(key, value);
    }
    Ok(store)
}
