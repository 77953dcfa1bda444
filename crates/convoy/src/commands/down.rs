use crate::utils;
use colored::Colorize;
use convoy_cloud::{Provisioner, StateManager};
use convoy_core::Deployment;
use std::io::Write;
use std::path::Path;

pub async fn handle(deployment: &Deployment, project_root: &Path, yes: bool) -> anyhow::Result<()> {
    let desired = utils::resource_set(deployment);

    if !yes {
        print!(
            "{} 台のマシンを破棄します。よろしいですか? [y/N] ",
            desired.len()
        );
        std::io::stdout().flush()?;

        let mut answer = String::new();
        std::io::stdin().read_line(&mut answer)?;
        if !matches!(answer.trim(), "y" | "Y" | "yes") {
            println!("中止しました");
            return Ok(());
        }
    }

    let provider = utils::provider_for(deployment)?;
    let provisioner = Provisioner::new(provider);

    let manager = StateManager::new(project_root);
    let lock = manager.acquire_lock().await?;

    let result = provisioner.destroy(&desired).await?;

    let mut state = manager.load().await?;
    for action in &result.succeeded {
        if let Some(name) = action.action_id.strip_prefix("delete-") {
            state.remove_machine(name);
        }
    }
    manager.save(&state).await?;
    lock.release().await?;

    for action in &result.succeeded {
        println!("  {} {}", "✓".green(), action.message);
    }
    for action in &result.failed {
        println!(
            "  {} {}: {}",
            "✗".red(),
            action.action_id,
            action.error.as_deref().unwrap_or("unknown")
        );
    }

    if result.is_success() {
        println!("{}", "✓ 破棄が完了しました".green().bold());
        Ok(())
    } else {
        anyhow::bail!("{} 台のマシンの破棄に失敗しました", result.failed.len())
    }
}
