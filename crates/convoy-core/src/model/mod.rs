//! モデル定義
//!
//! Convoyで使用されるデータモデルを定義します。
//! 各モデルは機能ごとにモジュールに分離されています。

mod bootstrap;
mod deployment;
mod machine;
mod role;

// Re-exports
pub use bootstrap::*;
pub use deployment::*;
pub use machine::*;
pub use role::*;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, HashMap};

    fn machine(groups: &[&str]) -> MachineSpec {
        MachineSpec {
            tier: "e2".to_string(),
            cores: 2,
            memory_gb: 4,
            disk_gb: Some(40),
            image: "debian-12".to_string(),
            subnet: "pipeline-subnet".to_string(),
            preemptible: false,
            ssh_public_key: None,
            groups: groups.iter().map(|g| g.to_string()).collect(),
        }
    }

    fn deployment_with_one_role() -> Deployment {
        let mut machines = BTreeMap::new();
        machines.insert("stage-build".to_string(), machine(&["stage-build", "workers"]));

        let mut roles = HashMap::new();
        roles.insert(
            "base".to_string(),
            Role {
                name: "base".to_string(),
                targets: vec!["workers".to_string()],
                ..Default::default()
            },
        );

        Deployment {
            name: "pipeline".to_string(),
            machines,
            roles,
            graph: RoleGraph {
                bindings: vec![Binding {
                    group: "workers".to_string(),
                    roles: vec!["base".to_string()],
                }],
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_ok() {
        let deployment = deployment_with_one_role();
        assert!(deployment.validate().is_ok());
    }

    #[test]
    fn test_validate_unknown_role() {
        let mut deployment = deployment_with_one_role();
        deployment.graph.bindings[0].roles.push("missing".to_string());

        match deployment.validate() {
            Err(crate::ConvoyError::RoleNotFound(name)) => assert_eq!(name, "missing"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_validate_unknown_group() {
        let mut deployment = deployment_with_one_role();
        deployment.graph.bindings[0].group = "nonexistent".to_string();

        assert!(matches!(
            deployment.validate(),
            Err(crate::ConvoyError::GroupNotFound(_))
        ));
    }

    #[test]
    fn test_validate_binding_outside_role_targets() {
        let mut deployment = deployment_with_one_role();
        // stage-build グループは base ロールの targets に含まれない
        deployment.graph.bindings[0].group = "stage-build".to_string();

        assert!(matches!(
            deployment.validate(),
            Err(crate::ConvoyError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_validate_bootstrap_reference() {
        let mut deployment = deployment_with_one_role();
        deployment
            .roles
            .get_mut("base")
            .unwrap()
            .tasks
            .push(Task {
                name: "builder".to_string(),
                spec: TaskSpec::Bootstrap {
                    uses: "buildkit".to_string(),
                },
                gate: false,
                when: Predicate::Always,
            });

        assert!(matches!(
            deployment.validate(),
            Err(crate::ConvoyError::BootstrapNotFound(_))
        ));

        deployment
            .bootstraps
            .insert("buildkit".to_string(), BootstrapSpec::default());
        assert!(deployment.validate().is_ok());
    }

    #[test]
    fn test_machine_requires_subnet() {
        let mut spec = machine(&["workers"]);
        spec.subnet = String::new();
        assert!(spec.validate("stage-build").is_err());
    }

    #[test]
    fn test_required_groups_deduped() {
        let graph = RoleGraph {
            bindings: vec![
                Binding {
                    group: "workers".to_string(),
                    roles: vec![],
                },
                Binding {
                    group: "stage-a".to_string(),
                    roles: vec![],
                },
                Binding {
                    group: "workers".to_string(),
                    roles: vec![],
                },
            ],
        };

        assert_eq!(graph.required_groups(), vec!["stage-a", "workers"]);
    }

    #[test]
    fn test_role_secret_keys() {
        let mut vars = HashMap::new();
        vars.insert(
            "REGISTRY_USER".to_string(),
            VarValue::Secret("REGISTRY_USER".to_string()),
        );
        vars.insert(
            "REGISTRY_URL".to_string(),
            VarValue::Literal("ghcr.io".to_string()),
        );

        let role = Role {
            name: "base".to_string(),
            vars,
            ..Default::default()
        };

        assert_eq!(role.secret_keys(), vec!["REGISTRY_USER"]);
    }
}
