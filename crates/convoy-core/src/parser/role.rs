//! ロール・タスク・グラフノードのパース

use super::{first_integer, first_string, prop_bool, prop_string, string_entries};
use crate::error::{ConvoyError, Result};
use crate::model::{
    Binding, GatePolicy, Predicate, Role, RoleGraph, ServiceState, Settings, Task, TaskSpec,
    VarValue,
};
use kdl::KdlNode;

/// role ノードをパース
pub fn parse_role(node: &KdlNode) -> Result<Role> {
    let name = first_string(node)
        .ok_or_else(|| ConvoyError::InvalidConfig("role requires a name".to_string()))?;

    let mut role = Role {
        name: name.clone(),
        ..Default::default()
    };

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "targets" | "target" => {
                    role.targets = string_entries(child);
                }
                "when" => {
                    role.when = parse_when(child)?;
                }
                "vars" => {
                    if let Some(var_children) = child.children() {
                        for var in var_children.nodes() {
                            let key = var.name().value().to_string();
                            let value = if let Some(secret) = prop_string(var, "secret") {
                                VarValue::Secret(secret)
                            } else if let Some(literal) = first_string(var) {
                                VarValue::Literal(literal)
                            } else {
                                return Err(ConvoyError::InvalidConfig(format!(
                                    "ロール '{}' の変数 '{}' に値がありません",
                                    name, key
                                )));
                            };
                            role.vars.insert(key, value);
                        }
                    }
                }
                "task" => {
                    role.tasks.push(parse_task(&name, child)?);
                }
                other => {
                    tracing::warn!(role = %name, node = %other, "Unknown role field, ignoring");
                }
            }
        }
    }

    if role.targets.is_empty() {
        return Err(ConvoyError::InvalidConfig(format!(
            "ロール '{}' に targets が指定されていません",
            name
        )));
    }

    Ok(role)
}

/// task ノードをパース
fn parse_task(role: &str, node: &KdlNode) -> Result<Task> {
    let name = first_string(node).ok_or_else(|| {
        ConvoyError::InvalidConfig(format!("ロール '{}' の task には名前が必要です", role))
    })?;
    let kind = prop_string(node, "kind").ok_or_else(|| {
        ConvoyError::InvalidConfig(format!(
            "タスク '{}' に kind が指定されていません (file/service/command/download/bootstrap)",
            name
        ))
    })?;

    let mut when = Predicate::Always;
    let field = |key: &str| -> Option<String> {
        node.children()
            .and_then(|c| c.nodes().iter().find(|n| n.name().value() == key))
            .and_then(first_string)
    };

    let spec = match kind.as_str() {
        "file" => TaskSpec::File {
            path: field("path").ok_or_else(|| missing(&name, "path"))?,
            content: field("content").unwrap_or_default(),
            mode: field("mode").unwrap_or_else(|| "0644".to_string()),
        },
        "service" => {
            let state = match field("state").as_deref() {
                Some("stopped") => ServiceState::Stopped,
                // 省略時は起動を保証する
                _ => ServiceState::Started,
            };
            TaskSpec::Service {
                unit: field("unit").ok_or_else(|| missing(&name, "unit"))?,
                state,
                enabled: node
                    .children()
                    .and_then(|c| c.nodes().iter().find(|n| n.name().value() == "enabled"))
                    .and_then(|n| n.entries().first())
                    .and_then(|e| e.value().as_bool())
                    .unwrap_or(true),
            }
        }
        "command" => TaskSpec::Command {
            command: field("command").ok_or_else(|| missing(&name, "command"))?,
            creates: field("creates"),
            unless: field("unless"),
        },
        "download" => TaskSpec::Download {
            url: field("url").ok_or_else(|| missing(&name, "url"))?,
            dest: field("dest").ok_or_else(|| missing(&name, "dest"))?,
            sha256: field("sha256"),
            mode: field("mode"),
        },
        "bootstrap" => TaskSpec::Bootstrap {
            uses: field("uses").ok_or_else(|| missing(&name, "uses"))?,
        },
        other => {
            return Err(ConvoyError::InvalidConfig(format!(
                "タスク '{}' の kind '{}' は未対応です",
                name, other
            )));
        }
    };

    if let Some(when_node) = node
        .children()
        .and_then(|c| c.nodes().iter().find(|n| n.name().value() == "when"))
    {
        when = parse_when(when_node)?;
    }

    Ok(Task {
        name,
        spec,
        gate: prop_bool(node, "gate").unwrap_or(false),
        when,
    })
}

fn missing(task: &str, key: &str) -> ConvoyError {
    ConvoyError::InvalidConfig(format!("タスク '{}' に {} が指定されていません", task, key))
}

/// when ノードをパース（env= / secret= のどちらか一方）
fn parse_when(node: &KdlNode) -> Result<Predicate> {
    if let Some(env) = prop_string(node, "env") {
        return Ok(Predicate::EnvDefined(env));
    }
    if let Some(secret) = prop_string(node, "secret") {
        return Ok(Predicate::SecretPresent(secret));
    }
    Err(ConvoyError::InvalidConfig(
        "when には env= か secret= のいずれかが必要です".to_string(),
    ))
}

/// graph ノードをパース
pub fn parse_graph(node: &KdlNode) -> Result<RoleGraph> {
    let mut graph = RoleGraph::default();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            if child.name().value() != "apply" {
                tracing::warn!(node = %child.name().value(), "Unknown graph node, ignoring");
                continue;
            }
            let group = first_string(child)
                .ok_or_else(|| ConvoyError::InvalidConfig("apply requires a group".to_string()))?;
            let roles = child
                .children()
                .and_then(|c| c.nodes().iter().find(|n| n.name().value() == "roles"))
                .map(string_entries)
                .unwrap_or_default();
            if roles.is_empty() {
                return Err(ConvoyError::InvalidConfig(format!(
                    "apply \"{}\" に roles が指定されていません",
                    group
                )));
            }
            graph.bindings.push(Binding { group, roles });
        }
    }

    Ok(graph)
}

/// settings ノードをパース
pub fn parse_settings(node: &KdlNode) -> Result<Settings> {
    let mut settings = Settings::default();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "gate_policy" | "gate-policy" => {
                    settings.gate_policy = match first_string(child).as_deref() {
                        Some("abort-run") | None => GatePolicy::AbortRun,
                        Some("abort-host") => GatePolicy::AbortHost,
                        Some(other) => {
                            return Err(ConvoyError::InvalidConfig(format!(
                                "gate-policy '{}' は未対応です (abort-run / abort-host)",
                                other
                            )));
                        }
                    };
                }
                "task_timeout" | "task-timeout" => {
                    settings.task_timeout_secs = first_integer(child).unwrap_or(300) as u64;
                }
                "ssh_user" | "ssh-user" => {
                    if let Some(user) = first_string(child) {
                        settings.ssh_user = user;
                    }
                }
                "ssh_key_file" | "ssh-key-file" => {
                    settings.ssh_key_file = first_string(child);
                }
                other => {
                    tracing::warn!(node = %other, "Unknown settings field, ignoring");
                }
            }
        }
    }

    Ok(settings)
}
