//! マシン・プロバイダーノードのパース

use super::{first_integer, first_string, string_entries};
use crate::error::{ConvoyError, Result};
use crate::model::{MachineSpec, ProviderConfig};
use kdl::KdlNode;

/// provider ノードをパース
pub fn parse_provider(node: &KdlNode) -> Result<ProviderConfig> {
    let name = first_string(node)
        .ok_or_else(|| ConvoyError::InvalidConfig("provider requires a name".to_string()))?;

    let mut provider = ProviderConfig {
        name,
        ..Default::default()
    };

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "project" => provider.project = first_string(child),
                "zone" => provider.zone = first_string(child),
                "network" => provider.network = first_string(child),
                // 追加設定はconfigに保存
                other => {
                    if let Some(value) = first_string(child) {
                        provider.config.insert(other.to_string(), value);
                    }
                }
            }
        }
    }

    Ok(provider)
}

/// machine ノードをパース
pub fn parse_machine(node: &KdlNode) -> Result<(String, MachineSpec)> {
    let name = first_string(node)
        .ok_or_else(|| ConvoyError::InvalidConfig("machine requires a name".to_string()))?;

    let mut machine = MachineSpec::default();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "tier" => {
                    machine.tier = first_string(child).unwrap_or_default();
                }
                "cores" => {
                    machine.cores = first_integer(child).unwrap_or(0) as u32;
                }
                "memory" | "memory_gb" | "memory-gb" => {
                    machine.memory_gb = first_integer(child).unwrap_or(0) as u32;
                }
                "disk_size" | "disk-size" => {
                    machine.disk_gb = first_integer(child).map(|v| v as u32);
                }
                "image" => {
                    machine.image = first_string(child).unwrap_or_default();
                }
                "subnet" => {
                    machine.subnet = first_string(child).unwrap_or_default();
                }
                "preemptible" => {
                    // 値なしのノードは true と同義
                    machine.preemptible = child
                        .entries()
                        .first()
                        .and_then(|e| e.value().as_bool())
                        .unwrap_or(true);
                }
                "ssh_key" | "ssh-key" => {
                    machine.ssh_public_key = first_string(child);
                }
                "groups" | "group" => {
                    machine.groups = string_entries(child);
                }
                other => {
                    tracing::warn!(machine = %name, node = %other, "Unknown machine field, ignoring");
                }
            }
        }
    }

    Ok((name, machine))
}
