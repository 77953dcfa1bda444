//! デプロイメント宣言（KDL）のパース
//!
//! トップレベルノードごとにサブモジュールへ分離しています。

mod bootstrap;
mod machine;
mod role;

pub use bootstrap::parse_bootstrap;
pub use machine::{parse_machine, parse_provider};
pub use role::{parse_graph, parse_role, parse_settings};

use crate::error::{ConvoyError, Result};
use crate::model::Deployment;
use kdl::{KdlDocument, KdlNode};

/// KDLドキュメント全体をデプロイメント宣言としてパース
pub fn parse_deployment(input: &str) -> Result<Deployment> {
    let doc: KdlDocument = input.parse()?;
    let mut deployment = Deployment::default();

    for node in doc.nodes() {
        match node.name().value() {
            "project" => {
                deployment.name = first_string(node).ok_or_else(|| {
                    ConvoyError::InvalidConfig("project には名前が必要です".to_string())
                })?;
            }
            "provider" => {
                deployment.provider = parse_provider(node)?;
            }
            "machine" => {
                let (name, spec) = parse_machine(node)?;
                deployment.machines.insert(name, spec);
            }
            "role" => {
                let role = parse_role(node)?;
                deployment.roles.insert(role.name.clone(), role);
            }
            "bootstrap" => {
                let (name, spec) = parse_bootstrap(node)?;
                deployment.bootstraps.insert(name, spec);
            }
            "graph" => {
                deployment.graph = parse_graph(node)?;
            }
            "settings" => {
                deployment.settings = parse_settings(node)?;
            }
            other => {
                tracing::warn!(node = %other, "Unknown top-level node, ignoring");
            }
        }
    }

    if deployment.name.is_empty() {
        return Err(ConvoyError::InvalidConfig(
            "project ノードが見つかりません".to_string(),
        ));
    }

    Ok(deployment)
}

/// 最初の位置引数を文字列として取得
pub(crate) fn first_string(node: &KdlNode) -> Option<String> {
    node.entries()
        .first()
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

/// 最初の位置引数を整数として取得
pub(crate) fn first_integer(node: &KdlNode) -> Option<i128> {
    node.entries()
        .first()
        .and_then(|e| e.value().as_integer())
}

/// 名前付きプロパティを文字列として取得
pub(crate) fn prop_string(node: &KdlNode, key: &str) -> Option<String> {
    node.get(key).and_then(|v| v.as_string()).map(|s| s.to_string())
}

/// 名前付きプロパティを真偽値として取得
pub(crate) fn prop_bool(node: &KdlNode, key: &str) -> Option<bool> {
    node.get(key).and_then(|v| v.as_bool())
}

/// 位置引数すべてを文字列リストとして取得
pub(crate) fn string_entries(node: &KdlNode) -> Vec<String> {
    node.entries()
        .iter()
        .filter_map(|e| e.value().as_string().map(|s| s.to_string()))
        .collect()
}
