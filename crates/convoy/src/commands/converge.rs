use crate::utils;
use colored::Colorize;
use convoy_converge::{Engine, EngineConfig};
use convoy_core::{Deployment, RunContext, SshChannelFactory};
use convoy_inventory::{INVENTORY_FILE, Inventory};
use std::path::{Path, PathBuf};

pub async fn handle(
    deployment: &Deployment,
    project_root: &Path,
    inventory_path: Option<PathBuf>,
    secret_overrides: &[String],
) -> anyhow::Result<()> {
    let path = inventory_path.unwrap_or_else(|| project_root.join(INVENTORY_FILE));
    let inventory = Inventory::load_from(&path)?;

    let secrets = utils::secret_store(secret_overrides)?;
    let ctx = RunContext::new(&deployment.name);
    let channels = SshChannelFactory::new(
        deployment.settings.ssh_user.clone(),
        deployment.settings.ssh_key_file.clone().map(PathBuf::from),
    );

    println!(
        "{}",
        format!(
            "▶ {} 束縛をグラフ順に適用中...",
            deployment.graph.bindings.len()
        )
        .green()
        .bold()
    );

    let engine = Engine::new(EngineConfig::from_settings(&deployment.settings));
    let report = engine
        .run(deployment, &inventory, &secrets, &channels, &ctx)
        .await;

    println!();
    println!("{}", report);
    println!();

    if report.is_success() {
        println!("{}", "✓ すべてのホストが収束しました".green().bold());
        Ok(())
    } else {
        anyhow::bail!("収束に失敗したホストまたはロールがあります")
    }
}
