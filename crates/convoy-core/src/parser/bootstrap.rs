//! ブートストラップノードのパース

use super::{first_string, prop_string, string_entries};
use crate::error::{ConvoyError, Result};
use crate::model::BootstrapSpec;
use kdl::KdlNode;

/// bootstrap ノードをパース
pub fn parse_bootstrap(node: &KdlNode) -> Result<(String, BootstrapSpec)> {
    let name = first_string(node)
        .ok_or_else(|| ConvoyError::InvalidConfig("bootstrap requires a name".to_string()))?;

    let mut spec = BootstrapSpec::default();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "version" => {
                    spec.version = first_string(child).unwrap_or_default();
                }
                "artifact" => {
                    spec.artifact = first_string(child).unwrap_or_default();
                }
                "install_dir" | "install-dir" => {
                    spec.install_dir = first_string(child).unwrap_or_default();
                }
                "binaries" => {
                    spec.binaries = string_entries(child);
                }
                "prerequisite_socket" | "prerequisite-socket" => {
                    spec.prerequisite_socket = first_string(child);
                }
                "auth_file" | "auth-file" => {
                    spec.auth_file = first_string(child);
                }
                "registry" => {
                    spec.registry = first_string(child);
                    spec.username_secret = prop_string(child, "user-secret");
                    spec.password_secret = prop_string(child, "password-secret");
                }
                other => {
                    tracing::warn!(bootstrap = %name, node = %other, "Unknown bootstrap field, ignoring");
                }
            }
        }
    }

    if spec.version.is_empty() || spec.artifact.is_empty() {
        return Err(ConvoyError::InvalidConfig(format!(
            "bootstrap '{}' には version と artifact が必要です",
            name
        )));
    }
    if spec.install_dir.is_empty() {
        return Err(ConvoyError::InvalidConfig(format!(
            "bootstrap '{}' に install-dir が指定されていません",
            name
        )));
    }

    Ok((name, spec))
}
