//! End-to-end pipeline: declarations → provisioner → inventory →
//! convergence, against in-memory backends.

mod common;

use common::{FakeChannelFactory, FakeProvider, make_artifact};
use convoy_cloud::{Provisioner, ResourceSet};
use convoy_converge::{Engine, EngineConfig};
use convoy_core::{RunContext, SecretStore, parse_deployment};
use convoy_inventory::materialize;
use std::collections::HashSet;
use std::sync::Arc;

/// Six machines across two platform tiers, each in its own stage group
/// plus the shared worker group; a four-role graph where the builder
/// role hard-gates on the runtime role's control socket.
fn deployment_kdl(artifact_dir: &str, runtime_exposes_socket: bool) -> String {
    let runtime_command = if runtime_exposes_socket {
        "mkdir -p /run && touch /run/runtime.sock"
    } else {
        // Broken runtime: installed, but the control socket never appears
        "mkdir -p /opt/runtime && touch /opt/runtime/installed"
    };

    format!(
        r#"
project "sentinel"

machine "stage-ingest" {{
    tier "e2"
    cores 2
    memory 4
    image "debian-12"
    subnet "pipeline-subnet"
    groups "stage-ingest" "workers"
}}

machine "stage-build" {{
    tier "n2"
    cores 4
    memory 8
    image "debian-12"
    subnet "pipeline-subnet"
    groups "stage-build" "workers"
}}

machine "stage-scan" {{
    tier "n2"
    cores 4
    memory 8
    image "debian-12"
    subnet "pipeline-subnet"
    groups "stage-scan" "workers"
}}

machine "stage-report" {{
    tier "e2"
    cores 2
    memory 4
    image "debian-12"
    subnet "pipeline-subnet"
    groups "stage-report" "workers"
}}

machine "worker-01" {{
    tier "e2"
    cores 2
    memory 4
    image "debian-12"
    subnet "pipeline-subnet"
    preemptible
    groups "worker-01" "workers"
}}

machine "worker-02" {{
    tier "n2"
    cores 4
    memory 8
    image "debian-12"
    subnet "pipeline-subnet"
    preemptible
    groups "worker-02" "workers"
}}

role "base" {{
    targets "workers"
    task "motd" kind="file" {{
        path "/etc/motd"
        content "{{{{ project }}}} worker {{{{ host_name }}}}\n"
    }}
}}

role "runtime" {{
    targets "workers"
    task "install-runtime" kind="command" {{
        command "{runtime_command}"
        creates "/opt/runtime/.done"
    }}
    task "runtime-done" kind="command" {{
        command "mkdir -p /opt/runtime && touch /opt/runtime/.done"
        creates "/opt/runtime/.done"
    }}
}}

role "builder" {{
    targets "stage-build"
    task "buildkit" kind="bootstrap" {{
        uses "buildkit"
    }}
}}

role "reporter" {{
    targets "stage-report"
    task "wire-report" kind="command" {{
        command "touch /var/log/report-wired"
        creates "/var/log/report-wired"
    }}
}}

bootstrap "buildkit" {{
    version "0.13.2"
    artifact "{artifact_dir}/buildkit-v{{version}}.linux-{{arch}}.tar.gz"
    install-dir "/usr/local/bin"
    binaries "buildkitd" "buildctl"
    prerequisite-socket "/run/runtime.sock"
    auth-file "/home/build/.docker/config.json"
    registry "ghcr.io" user-secret="REGISTRY_USER" password-secret="REGISTRY_PASS"
}}

graph {{
    apply "workers" {{
        roles "base" "runtime"
    }}
    apply "stage-build" {{
        roles "builder"
    }}
    apply "stage-report" {{
        roles "reporter"
    }}
}}
"#
    )
}

struct Pipeline {
    deployment: convoy_core::Deployment,
    inventory: convoy_inventory::Inventory,
}

/// Provision the declared machines against the fake backend and
/// materialize the inventory.
async fn provision(kdl: &str) -> Pipeline {
    let deployment = parse_deployment(kdl).unwrap();
    deployment.validate().unwrap();

    let provisioner = Provisioner::new(Arc::new(FakeProvider::new()));
    let desired = ResourceSet::from_machines(deployment.machines.clone());

    let plan = provisioner.plan(&desired).await.unwrap();
    assert_eq!(plan.summary().create, 6);

    let outcome = provisioner.apply(&desired, &plan).await.unwrap();
    assert!(outcome.result.is_success());
    assert_eq!(outcome.hosts.len(), 6);

    // Every resolved host has a distinct address
    let addresses: HashSet<&str> = outcome
        .hosts
        .iter()
        .map(|h| h.internal_address.as_str())
        .collect();
    assert_eq!(addresses.len(), 6);

    let required = deployment.graph.required_groups();
    let inventory = materialize(
        &deployment.name,
        &deployment.machines,
        &outcome.hosts,
        &required,
    )
    .unwrap();

    // Stage groups are singletons, the shared worker group has all six
    assert_eq!(inventory.group("stage-build").unwrap().len(), 1);
    assert_eq!(inventory.group("stage-report").unwrap().len(), 1);
    assert_eq!(inventory.group("workers").unwrap().len(), 6);

    Pipeline {
        deployment,
        inventory,
    }
}

fn connect_address(pipeline: &Pipeline, group: &str) -> String {
    pipeline.inventory.group(group).unwrap()[0]
        .connect_address()
        .to_string()
}

#[tokio::test]
async fn test_gate_failure_stops_downstream_roles() {
    let scratch = tempfile::tempdir().unwrap();
    make_artifact(scratch.path());

    let kdl = deployment_kdl(&scratch.path().display().to_string(), false);
    let pipeline = provision(&kdl).await;

    let factory = FakeChannelFactory::new();
    let engine = Engine::new(EngineConfig::from_settings(&pipeline.deployment.settings));
    let ctx = RunContext::new(&pipeline.deployment.name);

    let report = engine
        .run(
            &pipeline.deployment,
            &pipeline.inventory,
            &SecretStore::new(),
            &factory,
            &ctx,
        )
        .await;

    // Roles 1 and 2 converged the workers
    let build_host = factory.host(&connect_address(&pipeline, "stage-build"));
    assert!(build_host.has_file("/etc/motd"));
    assert!(build_host.has_file("/opt/runtime/.done"));

    // Role 3's gate failed: the run aborted with a fatal gate error
    assert!(!report.is_success());
    assert!(report.aborted);
    assert!(
        report
            .errors
            .iter()
            .any(|e| e.contains("buildkit") && e.contains("/run/runtime.sock"))
    );
    // ... and no bootstrap step ran past the gate
    assert!(!build_host.has_file("/usr/local/bin/buildkitd"));

    // Role 4 never executed
    assert!(!factory.any_ran("touch /var/log/report-wired"));
}

#[tokio::test]
async fn test_pipeline_converges_and_second_run_is_unchanged() {
    let scratch = tempfile::tempdir().unwrap();
    make_artifact(scratch.path());

    let kdl = deployment_kdl(&scratch.path().display().to_string(), true);
    let pipeline = provision(&kdl).await;

    let factory = FakeChannelFactory::new();
    let ctx = RunContext::new(&pipeline.deployment.name);
    let mut secrets = SecretStore::new();
    secrets.set_override("REGISTRY_USER", "builder");
    secrets.set_override("REGISTRY_PASS", "s3cret");

    let engine = Engine::new(EngineConfig::from_settings(&pipeline.deployment.settings));
    let report = engine
        .run(
            &pipeline.deployment,
            &pipeline.inventory,
            &secrets,
            &factory,
            &ctx,
        )
        .await;
    assert!(report.is_success(), "first run failed: {}", report);

    // The builder stage got its rootless image builder and credentials
    let build_host = factory.host(&connect_address(&pipeline, "stage-build"));
    assert!(build_host.has_file("/usr/local/bin/buildkitd"));
    assert!(build_host.has_file("/usr/local/bin/buildctl"));
    let auth = build_host.files.lock().unwrap()["/home/build/.docker/config.json"].clone();
    assert!(String::from_utf8(auth).unwrap().contains("ghcr.io"));

    // The report stage was wired
    let report_host = factory.host(&connect_address(&pipeline, "stage-report"));
    assert!(report_host.has_file("/var/log/report-wired"));

    // Templated file content picked up the run context
    let motd = build_host.files.lock().unwrap()["/etc/motd"].clone();
    assert_eq!(
        String::from_utf8(motd).unwrap(),
        "sentinel worker stage-build\n"
    );

    // Re-running the whole pipeline reports zero changes
    let engine = Engine::new(EngineConfig::from_settings(&pipeline.deployment.settings));
    let second = engine
        .run(
            &pipeline.deployment,
            &pipeline.inventory,
            &secrets,
            &factory,
            &ctx,
        )
        .await;

    assert!(second.is_success());
    assert_eq!(second.changed(), 0, "second run changed something: {}", second);
}
