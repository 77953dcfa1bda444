//! プロジェクトルート発見機能
//!
//! カレントディレクトリから上に向かって convoy.kdl を探索します。

use crate::error::{ConvoyError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// 宣言ファイルの候補名（先勝ち）
const CANDIDATES: &[&str] = &["convoy.local.kdl", "convoy.kdl", ".convoy.kdl"];

/// プロジェクトルートを検出
///
/// 以下の優先順位で検索:
/// 1. 環境変数 CONVOY_PROJECT_ROOT
/// 2. カレントディレクトリから上に向かって convoy.kdl を探す
#[tracing::instrument]
pub fn find_project_root() -> Result<PathBuf> {
    // 1. 環境変数
    if let Ok(root) = std::env::var("CONVOY_PROJECT_ROOT") {
        let path = PathBuf::from(&root);
        debug!(env_root = %root, "Checking CONVOY_PROJECT_ROOT");
        if find_deploy_file(&path).is_some() {
            info!(project_root = %path.display(), "Found project root from environment variable");
            return Ok(path);
        }
    }

    // 2. カレントディレクトリから上に向かって探す
    let start_dir = std::env::current_dir()?;
    let mut current = start_dir.clone();

    loop {
        if find_deploy_file(&current).is_some() {
            info!(project_root = %current.display(), "Found project root");
            return Ok(current);
        }

        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => return Err(ConvoyError::ProjectRootNotFound(start_dir)),
        }
    }
}

/// ディレクトリ内の宣言ファイルを探す
pub fn find_deploy_file(dir: &Path) -> Option<PathBuf> {
    for candidate in CANDIDATES {
        let path = dir.join(candidate);
        if path.exists() {
            return Some(path);
        }
    }
    None
}
