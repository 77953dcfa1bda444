//! デプロイメント定義（ルート集約）

use crate::error::{ConvoyError, Result};
use crate::model::{BootstrapSpec, MachineSpec, ProviderConfig, Role, RoleGraph, Settings, TaskSpec};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// 1プロジェクト分のデプロイメント宣言
///
/// プロビジョニング対象のマシン群、収束フェーズのロール群、
/// 両者を結ぶロールグラフを1つの不変な構造体として保持する。
/// 実行中は読み取り専用。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Deployment {
    /// プロジェクト名（リソースの命名空間になる）
    pub name: String,

    pub provider: ProviderConfig,

    /// マシン宣言（名前でキー、反復順は決定的）
    pub machines: BTreeMap<String, MachineSpec>,

    pub roles: HashMap<String, Role>,

    pub bootstraps: HashMap<String, BootstrapSpec>,

    pub graph: RoleGraph,

    pub settings: Settings,
}

impl Deployment {
    /// 全マシン宣言に含まれるグループ名の和集合
    pub fn declared_groups(&self) -> BTreeSet<&str> {
        self.machines
            .values()
            .flat_map(|m| m.groups.iter().map(|g| g.as_str()))
            .collect()
    }

    /// 宣言全体の静的検証
    ///
    /// パース直後に呼ばれる。ここで弾けば収束時の未解決参照は
    /// グループの空チェックだけになる。
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(ConvoyError::InvalidConfig(
                "project 名が指定されていません".to_string(),
            ));
        }

        for (name, machine) in &self.machines {
            machine.validate(name)?;
        }

        let declared = self.declared_groups();

        for binding in &self.graph.bindings {
            if !declared.contains(binding.group.as_str()) {
                return Err(ConvoyError::GroupNotFound(binding.group.clone()));
            }
            for role_name in &binding.roles {
                let role = self
                    .roles
                    .get(role_name)
                    .ok_or_else(|| ConvoyError::RoleNotFound(role_name.clone()))?;
                // ロールが許可していないグループへの束縛は宣言ミス
                if !role.targets.iter().any(|t| t == &binding.group) {
                    return Err(ConvoyError::InvalidConfig(format!(
                        "ロール '{}' はグループ '{}' を対象にしていません",
                        role_name, binding.group
                    )));
                }
            }
        }

        for role in self.roles.values() {
            for task in &role.tasks {
                if let TaskSpec::Bootstrap { uses } = &task.spec
                    && !self.bootstraps.contains_key(uses)
                {
                    return Err(ConvoyError::BootstrapNotFound(uses.clone()));
                }
            }
            for target in &role.targets {
                if !declared.contains(target.as_str()) {
                    return Err(ConvoyError::GroupNotFound(target.clone()));
                }
            }
        }

        Ok(())
    }
}
