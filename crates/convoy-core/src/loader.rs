//! 宣言ファイルの読み込み
//!
//! 発見 → パース → 静的検証 をまとめた入口。

use crate::discovery::find_deploy_file;
use crate::error::{ConvoyError, Result};
use crate::model::Deployment;
use crate::parser::parse_deployment;
use std::path::Path;
use tracing::info;

/// プロジェクトルートからデプロイメント宣言を読み込む
pub fn load_deployment(project_root: &Path) -> Result<Deployment> {
    let path = find_deploy_file(project_root)
        .ok_or_else(|| ConvoyError::ProjectRootNotFound(project_root.to_path_buf()))?;

    load_deployment_file(&path)
}

/// 指定した宣言ファイルを読み込む
pub fn load_deployment_file(path: &Path) -> Result<Deployment> {
    let content = std::fs::read_to_string(path)?;
    let deployment = parse_deployment(&content)?;
    deployment.validate()?;

    info!(
        path = %path.display(),
        machines = deployment.machines.len(),
        roles = deployment.roles.len(),
        "Loaded deployment"
    );

    Ok(deployment)
}
