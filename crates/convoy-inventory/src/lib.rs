//! Host-group inventory
//!
//! The inventory is the hand-off contract between the provisioning and
//! configuration phases: a pure function of the resolved hosts and the
//! static group rules declared on the machines. The serialized artifact
//! is deterministic — regenerating it from the same resolved set is
//! byte-for-byte identical.

pub mod error;

pub use error::{InventoryError, Result};

use convoy_cloud::ResolvedHost;
use convoy_core::MachineSpec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Default artifact file name under the project root
pub const INVENTORY_FILE: &str = "inventory.json";

/// One host entry in the inventory artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryHost {
    pub name: String,
    pub internal_address: String,
    pub external_address: String,
}

impl InventoryHost {
    /// Address the convergence engine connects to: external when the
    /// machine has one, internal otherwise (jump-host setups).
    pub fn connect_address(&self) -> &str {
        if self.external_address.is_empty() {
            &self.internal_address
        } else {
            &self.external_address
        }
    }
}

/// Stage-name → hosts mapping produced by the materializer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    pub project: String,

    /// Groups keyed by name; BTreeMap keeps serialization deterministic
    pub groups: BTreeMap<String, Vec<InventoryHost>>,
}

impl Inventory {
    pub fn group(&self, name: &str) -> Option<&[InventoryHost]> {
        self.groups.get(name).map(|hosts| hosts.as_slice())
    }

    /// Deterministic serialization of the artifact
    pub fn to_json(&self) -> Result<String> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        tracing::info!(path = %path.display(), groups = self.groups.len(), "Wrote inventory artifact");
        Ok(())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Materialize the host-group mapping
///
/// Pure function: `(machine declarations × resolved hosts) → groups`.
/// Group membership comes from the static `groups` rules on the machine
/// declarations, never inferred. A host may belong to several groups.
/// Every group in `required_groups` must end up non-empty, otherwise
/// the materializer fails with [`InventoryError::UnresolvedTarget`]
/// instead of silently handing an empty group to the engine.
pub fn materialize(
    project: impl Into<String>,
    machines: &BTreeMap<String, MachineSpec>,
    hosts: &[ResolvedHost],
    required_groups: &[&str],
) -> Result<Inventory> {
    let mut groups: BTreeMap<String, Vec<InventoryHost>> = BTreeMap::new();

    // Declared groups exist even when empty so emptiness is observable
    for spec in machines.values() {
        for group in &spec.groups {
            groups.entry(group.clone()).or_default();
        }
    }

    // machines is a BTreeMap, so members come out sorted by name
    for (name, spec) in machines {
        let Some(host) = hosts.iter().find(|h| h.name == *name) else {
            tracing::warn!(machine = %name, "Machine has no resolved host, leaving it out of the inventory");
            continue;
        };

        for group in &spec.groups {
            groups.entry(group.clone()).or_default().push(InventoryHost {
                name: host.name.clone(),
                internal_address: host.internal_address.clone(),
                external_address: host.external_address.clone(),
            });
        }
    }

    for required in required_groups {
        if groups.get(*required).is_none_or(|hosts| hosts.is_empty()) {
            return Err(InventoryError::UnresolvedTarget((*required).to_string()));
        }
    }

    Ok(Inventory {
        project: project.into(),
        groups,
    })
}
