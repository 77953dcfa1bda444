use crate::utils;
use colored::Colorize;
use convoy_cloud::{Provisioner, StateManager};
use convoy_core::Deployment;
use std::path::Path;

pub async fn handle(deployment: &Deployment, project_root: &Path) -> anyhow::Result<()> {
    let provider = utils::provider_for(deployment)?;
    let provisioner = Provisioner::new(provider.clone());
    let desired = utils::resource_set(deployment);

    println!(
        "{}",
        format!(
            "▶ {} 上に {} 台をプロビジョニング中...",
            provider.display_name(),
            desired.len()
        )
        .green()
        .bold()
    );

    let manager = StateManager::new(project_root);
    let lock = manager.acquire_lock().await?;

    let plan = provisioner.plan(&desired).await?;
    println!("  計画: {}", plan.summary());

    let outcome = provisioner.apply(&desired, &plan).await?;

    // 解決済みの接続情報を状態ファイルへ記録
    let mut state = manager.load().await?;
    for (name, machine_state) in &outcome.states {
        state.set_machine(name.clone(), machine_state.clone());
    }
    manager.save(&state).await?;
    lock.release().await?;

    for result in &outcome.result.succeeded {
        println!("  {} {}", "✓".green(), result.message);
    }
    for result in &outcome.result.failed {
        println!(
            "  {} {}: {}",
            "✗".red(),
            result.action_id,
            result.error.as_deref().unwrap_or("unknown")
        );
    }

    println!();
    if outcome.result.is_success() {
        println!(
            "{}",
            format!("✓ {} 台のホストを解決しました", outcome.hosts.len())
                .green()
                .bold()
        );
        Ok(())
    } else {
        anyhow::bail!(
            "{} 台のマシンのプロビジョニングに失敗しました",
            outcome.result.failed.len()
        )
    }
}
