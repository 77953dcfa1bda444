use colored::Colorize;
use convoy_cloud::StateManager;
use convoy_core::Deployment;
use convoy_inventory::{INVENTORY_FILE, materialize};
use std::path::{Path, PathBuf};

pub async fn handle(
    deployment: &Deployment,
    project_root: &Path,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let manager = StateManager::new(project_root);
    let state = manager.load().await?;
    let hosts = state.resolved_hosts();

    let required = deployment.graph.required_groups();
    let inventory = materialize(&deployment.name, &deployment.machines, &hosts, &required)?;

    let path = output.unwrap_or_else(|| project_root.join(INVENTORY_FILE));
    inventory.write_to(&path)?;

    println!("{}", format!("インベントリ: {}", path.display()).bold());
    for (group, members) in &inventory.groups {
        println!("  {} ({} 台)", group.cyan(), members.len());
        for member in members {
            println!("    • {} {}", member.name, member.connect_address());
        }
    }

    Ok(())
}
