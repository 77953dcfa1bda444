//! Google Cloud provider implementation

use crate::error::GcloudError;
use crate::gcloud::{
    CreateInstanceConfig, Gcloud, InstanceInfo, machine_type_for, parse_machine_type,
};
use async_trait::async_trait;
use convoy_cloud::{
    AuthStatus, CloudError, ComputeProvider, MachineState, MachineStatus, PollConfig, ProviderState,
    ResolvedHost,
};
use convoy_core::MachineSpec;
use std::collections::HashMap;
use std::time::Duration;

/// Label attached to every machine Convoy manages; the value is the
/// project name and acts as the provisioning namespace.
const NAMESPACE_LABEL: &str = "convoy";

/// Label recording the declared boot image (not recoverable from the
/// instance itself once created).
const IMAGE_LABEL: &str = "convoy-image";

/// Google Cloud provider
pub struct GcpProvider {
    gcloud: Gcloud,
    namespace: String,
}

impl GcpProvider {
    pub fn new(
        cloud_project: impl Into<String>,
        zone: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            gcloud: Gcloud::new(cloud_project, zone),
            namespace: namespace.into(),
        }
    }

    fn machine_state_from(&self, instance: &InstanceInfo) -> MachineState {
        let status = match instance.status.as_deref() {
            Some("RUNNING") => MachineStatus::Running,
            Some("PROVISIONING") | Some("STAGING") => MachineStatus::Creating,
            Some("STOPPING") | Some("TERMINATED") | Some("SUSPENDED") => MachineStatus::Stopped,
            _ => MachineStatus::Unknown,
        };

        let mut state = MachineState::new(instance.id.clone().unwrap_or_default())
            .with_status(status)
            .with_attribute("name", serde_json::json!(instance.name));

        if let Some(machine_type) = instance.machine_type_name()
            && let Some((tier, cores, memory_gb)) = parse_machine_type(machine_type)
        {
            state.set_attribute("tier", serde_json::json!(tier));
            state.set_attribute("cores", serde_json::json!(cores));
            state.set_attribute("memory_gb", serde_json::json!(memory_gb));
        }

        if let Some(image) = instance.labels.get(IMAGE_LABEL) {
            state.set_attribute("image", serde_json::json!(image));
        }
        if let Some(subnet) = instance.subnet_name() {
            state.set_attribute("subnet", serde_json::json!(subnet));
        }
        if let Some(ip) = instance.internal_ip() {
            state.set_attribute("internal_ip", serde_json::json!(ip));
        }
        if let Some(ip) = instance.external_ip() {
            state.set_attribute("external_ip", serde_json::json!(ip));
        }

        state
    }

    fn labels_for(&self, spec: &MachineSpec) -> HashMap<String, String> {
        let mut labels = HashMap::new();
        labels.insert(NAMESPACE_LABEL.to_string(), self.namespace.clone());
        labels.insert(IMAGE_LABEL.to_string(), spec.image.clone());
        labels
    }
}

#[async_trait]
impl ComputeProvider for GcpProvider {
    fn name(&self) -> &str {
        "gcp"
    }

    fn display_name(&self) -> &str {
        "Google Cloud"
    }

    async fn check_auth(&self) -> convoy_cloud::Result<AuthStatus> {
        match self.gcloud.check_auth().await {
            Ok(accounts) => match accounts.first() {
                Some(account) => Ok(AuthStatus::ok(account.account.clone())),
                None => Ok(AuthStatus::failed(
                    "no active gcloud account (run `gcloud auth login`)",
                )),
            },
            Err(GcloudError::GcloudNotFound) => {
                Ok(AuthStatus::failed("gcloud CLI is not installed"))
            }
            Err(e) => Ok(AuthStatus::failed(e.to_string())),
        }
    }

    async fn describe(&self) -> convoy_cloud::Result<ProviderState> {
        let instances = self
            .gcloud
            .list_instances()
            .await
            .map_err(|e| CloudError::ApiError(e.to_string()))?;

        let mut state = ProviderState::new();
        for instance in instances {
            // Only machines in our provisioning namespace
            if instance.labels.get(NAMESPACE_LABEL) != Some(&self.namespace) {
                continue;
            }
            state.add(instance.name.clone(), self.machine_state_from(&instance));
        }

        Ok(state)
    }

    async fn create_machine(
        &self,
        name: &str,
        spec: &MachineSpec,
    ) -> convoy_cloud::Result<MachineState> {
        let config = CreateInstanceConfig {
            name: name.to_string(),
            machine_type: machine_type_for(&spec.tier, spec.cores, spec.memory_gb),
            image_family: spec.image.clone(),
            disk_gb: spec.disk_gb,
            subnet: spec.subnet.clone(),
            preemptible: spec.preemptible,
            ssh_public_key: spec.ssh_public_key.clone(),
            labels: self.labels_for(spec),
        };

        let instance =
            self.gcloud
                .create_instance(&config)
                .await
                .map_err(|e| CloudError::ReconcileFailed {
                    machine: name.to_string(),
                    message: e.to_string(),
                })?;

        Ok(self.machine_state_from(&instance))
    }

    async fn update_machine(
        &self,
        name: &str,
        _spec: &MachineSpec,
        _current: &MachineState,
    ) -> convoy_cloud::Result<MachineState> {
        // Sizing, image and placement cannot change in place; the
        // provisioner only routes here when drift was detected, so all
        // drift on this backend is incompatible.
        Err(CloudError::ReconcileFailed {
            machine: name.to_string(),
            message: "machine type, image and subnet cannot be updated in place; \
                      destroy the machine or revert the declaration"
                .to_string(),
        })
    }

    async fn destroy_machine(&self, name: &str) -> convoy_cloud::Result<()> {
        self.gcloud
            .delete_instance(name)
            .await
            .map_err(|e| CloudError::ApiError(e.to_string()))
    }

    async fn resolve_addresses(
        &self,
        name: &str,
        poll: &PollConfig,
    ) -> convoy_cloud::Result<ResolvedHost> {
        // Create is eventually consistent: describe until the backend
        // reports an allocated network interface.
        for attempt in 0..poll.max_retries {
            let instance = self
                .gcloud
                .get_instance(name)
                .await
                .map_err(|e| CloudError::ApiError(e.to_string()))?;

            if let Some(instance) = instance
                && let Some(internal) = instance.internal_ip()
            {
                return Ok(ResolvedHost {
                    name: name.to_string(),
                    internal_address: internal,
                    external_address: instance.external_ip().unwrap_or_default(),
                    ready: instance.is_running(),
                });
            }

            if attempt + 1 < poll.max_retries {
                let delay = poll.delay_for_attempt(attempt);
                tracing::debug!(machine = %name, attempt, delay_ms = delay, "Waiting for network interface");
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
        }

        Err(CloudError::PlacementFailed {
            machine: name.to_string(),
            message: format!(
                "no network interface allocated after {} attempts",
                poll.max_retries
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> GcpProvider {
        GcpProvider::new("sec-pipeline", "europe-west1-b", "pipeline")
    }

    fn instance(status: &str) -> InstanceInfo {
        serde_json::from_value(serde_json::json!({
            "id": "42",
            "name": "stage-build",
            "status": status,
            "machineType": "zones/z/machineTypes/e2-custom-2-4096",
            "labels": { "convoy": "pipeline", "convoy-image": "debian-12" },
            "networkInterfaces": [{
                "networkIP": "10.0.0.2",
                "subnetwork": "regions/r/subnetworks/pipeline-subnet",
                "accessConfigs": [{ "natIP": "203.0.113.10" }]
            }]
        }))
        .unwrap()
    }

    #[test]
    fn test_machine_state_attributes() {
        let state = provider().machine_state_from(&instance("RUNNING"));

        assert_eq!(state.status, MachineStatus::Running);
        assert_eq!(state.get_attribute::<String>("tier").unwrap(), "e2");
        assert_eq!(state.get_attribute::<u32>("cores").unwrap(), 2);
        assert_eq!(state.get_attribute::<u32>("memory_gb").unwrap(), 4);
        assert_eq!(state.get_attribute::<String>("image").unwrap(), "debian-12");
        assert_eq!(
            state.get_attribute::<String>("subnet").unwrap(),
            "pipeline-subnet"
        );
        assert_eq!(
            state.get_attribute::<String>("internal_ip").unwrap(),
            "10.0.0.2"
        );
    }

    #[test]
    fn test_machine_state_status_mapping() {
        let p = provider();
        assert_eq!(
            p.machine_state_from(&instance("PROVISIONING")).status,
            MachineStatus::Creating
        );
        assert_eq!(
            p.machine_state_from(&instance("TERMINATED")).status,
            MachineStatus::Stopped
        );
        assert_eq!(
            p.machine_state_from(&instance("WEIRD")).status,
            MachineStatus::Unknown
        );
    }

    #[test]
    fn test_labels_for_spec() {
        let spec = MachineSpec {
            image: "debian-12".to_string(),
            ..Default::default()
        };
        let labels = provider().labels_for(&spec);

        assert_eq!(labels.get("convoy"), Some(&"pipeline".to_string()));
        assert_eq!(labels.get("convoy-image"), Some(&"debian-12".to_string()));
    }
}
