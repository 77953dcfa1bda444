//! gcloud CLI wrapper
//!
//! Wraps `gcloud compute` commands with JSON output for Google Cloud
//! operations.

use crate::error::{GcloudError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Default timeout for one gcloud invocation
const COMMAND_TIMEOUT_SECS: u64 = 120;

/// gcloud CLI wrapper
pub struct Gcloud {
    project: String,
    zone: String,
    timeout: Duration,
}

impl Gcloud {
    pub fn new(project: impl Into<String>, zone: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            zone: zone.into(),
            timeout: Duration::from_secs(COMMAND_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Check if gcloud is installed and has an active account
    pub async fn check_auth(&self) -> Result<Vec<AuthAccount>> {
        let which = Command::new("which").arg("gcloud").output().await?;
        if !which.status.success() {
            return Err(GcloudError::GcloudNotFound);
        }

        let output = self
            .run_raw(&["auth", "list", "--filter=status:ACTIVE", "--format=json"])
            .await?;

        let accounts: Vec<AuthAccount> = serde_json::from_str(&output)?;
        Ok(accounts)
    }

    /// Run a gcloud command and return stdout
    async fn run_raw(&self, args: &[&str]) -> Result<String> {
        let mut cmd = Command::new("gcloud");
        cmd.args(args);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        tracing::debug!("Running: gcloud {}", args.join(" "));

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(output) => output?,
            Err(_) => return Err(GcloudError::Timeout(self.timeout.as_secs())),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GcloudError::CommandFailed(stderr.trim().to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Run a `compute` subcommand scoped to the project, in JSON
    async fn run_compute(&self, args: &[&str]) -> Result<String> {
        let project_flag = format!("--project={}", self.project);
        let mut full: Vec<&str> = vec!["compute"];
        full.extend_from_slice(args);
        full.push(&project_flag);
        full.push("--format=json");
        self.run_raw(&full).await
    }

    /// List all instances in the zone
    pub async fn list_instances(&self) -> Result<Vec<InstanceInfo>> {
        let zones_flag = format!("--zones={}", self.zone);
        let output = self
            .run_compute(&["instances", "list", &zones_flag])
            .await?;

        if output.trim().is_empty() || output.trim() == "[]" {
            return Ok(Vec::new());
        }

        let instances: Vec<InstanceInfo> = serde_json::from_str(&output)?;
        Ok(instances)
    }

    /// Get an instance by name
    pub async fn get_instance(&self, name: &str) -> Result<Option<InstanceInfo>> {
        let instances = self.list_instances().await?;
        Ok(instances.into_iter().find(|i| i.name == name))
    }

    /// Create an instance
    pub async fn create_instance(&self, config: &CreateInstanceConfig) -> Result<InstanceInfo> {
        let zone_flag = format!("--zone={}", self.zone);
        let type_flag = format!("--machine-type={}", config.machine_type);
        let image_flag = format!("--image-family={}", config.image_family);
        let subnet_flag = format!("--subnet={}", config.subnet);

        let mut args: Vec<String> = vec![
            "instances".to_string(),
            "create".to_string(),
            config.name.clone(),
            zone_flag,
            type_flag,
            image_flag,
            "--image-project=debian-cloud".to_string(),
            subnet_flag,
        ];

        if config.preemptible {
            args.push("--preemptible".to_string());
        }
        if let Some(disk_gb) = config.disk_gb {
            args.push(format!("--boot-disk-size={}GB", disk_gb));
        }
        if let Some(ssh_key) = &config.ssh_public_key {
            args.push(format!("--metadata=ssh-keys={}", ssh_key));
        }
        if !config.labels.is_empty() {
            let mut pairs: Vec<String> = config
                .labels
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            pairs.sort();
            args.push(format!("--labels={}", pairs.join(",")));
        }

        let arg_refs: Vec<&str> = args.iter().map(|s| s.as_str()).collect();
        let output = self.run_compute(&arg_refs).await?;

        // `instances create` returns a one-element array
        let mut instances: Vec<InstanceInfo> = serde_json::from_str(&output)?;
        instances
            .pop()
            .ok_or_else(|| GcloudError::CommandFailed("create returned no instance".to_string()))
    }

    /// Delete an instance
    pub async fn delete_instance(&self, name: &str) -> Result<()> {
        let zone_flag = format!("--zone={}", self.zone);
        self.run_compute(&["instances", "delete", name, &zone_flag, "--quiet"])
            .await?;
        Ok(())
    }
}

/// Active gcloud account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthAccount {
    pub account: String,
    pub status: Option<String>,
}

/// Instance creation parameters
#[derive(Debug, Clone)]
pub struct CreateInstanceConfig {
    pub name: String,
    pub machine_type: String,
    pub image_family: String,
    pub disk_gb: Option<u32>,
    pub subnet: String,
    pub preemptible: bool,
    pub ssh_public_key: Option<String>,
    pub labels: HashMap<String, String>,
}

/// Instance as reported by gcloud (camelCase JSON)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceInfo {
    pub id: Option<String>,
    pub name: String,
    pub status: Option<String>,
    pub machine_type: Option<String>,
    #[serde(default)]
    pub network_interfaces: Vec<NetworkInterface>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    pub scheduling: Option<Scheduling>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterface {
    #[serde(rename = "networkIP")]
    pub network_ip: Option<String>,
    pub subnetwork: Option<String>,
    #[serde(default)]
    pub access_configs: Vec<AccessConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessConfig {
    #[serde(rename = "natIP")]
    pub nat_ip: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scheduling {
    pub preemptible: Option<bool>,
}

impl InstanceInfo {
    pub fn is_running(&self) -> bool {
        self.status.as_deref() == Some("RUNNING")
    }

    /// Internal address, present once the network interface is allocated
    pub fn internal_ip(&self) -> Option<String> {
        self.network_interfaces
            .first()
            .and_then(|ni| ni.network_ip.clone())
    }

    /// External NAT address, if one is attached
    pub fn external_ip(&self) -> Option<String> {
        self.network_interfaces
            .first()
            .and_then(|ni| ni.access_configs.first())
            .and_then(|ac| ac.nat_ip.clone())
    }

    /// Machine type name (gcloud reports a resource URL)
    pub fn machine_type_name(&self) -> Option<&str> {
        self.machine_type
            .as_deref()
            .map(|t| t.rsplit('/').next().unwrap_or(t))
    }

    /// Subnet name of the first interface (also URL-shaped)
    pub fn subnet_name(&self) -> Option<&str> {
        self.network_interfaces
            .first()
            .and_then(|ni| ni.subnetwork.as_deref())
            .map(|s| s.rsplit('/').next().unwrap_or(s))
    }
}

/// Build a custom machine-type name from tier + sizing
pub fn machine_type_for(tier: &str, cores: u32, memory_gb: u32) -> String {
    format!("{}-custom-{}-{}", tier, cores, memory_gb * 1024)
}

/// Parse a custom machine-type name back to (tier, cores, memory_gb)
pub fn parse_machine_type(machine_type: &str) -> Option<(String, u32, u32)> {
    let parts: Vec<&str> = machine_type.split('-').collect();
    if parts.len() == 4 && parts[1] == "custom" {
        let cores = parts[2].parse().ok()?;
        let memory_mb: u32 = parts[3].parse().ok()?;
        return Some((parts[0].to_string(), cores, memory_mb / 1024));
    }
    None
}
