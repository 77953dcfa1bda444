use crate::utils;
use colored::Colorize;
use convoy_cloud::MachineStatus;
use convoy_core::Deployment;

pub async fn handle(deployment: &Deployment) -> anyhow::Result<()> {
    let provider = utils::provider_for(deployment)?;

    let auth = provider.check_auth().await?;
    if !auth.authenticated {
        anyhow::bail!(
            "認証に失敗しました: {}",
            auth.error.unwrap_or_else(|| "unknown".to_string())
        );
    }

    let state = provider.describe().await?;
    let mut names: Vec<&String> = state.machines.keys().collect();
    names.sort();

    println!("{}", format!("プロジェクト: {}", deployment.name).bold());
    for name in names {
        let machine = &state.machines[name];
        let status = match machine.status {
            MachineStatus::Running => machine.status.to_string().green(),
            MachineStatus::Error => machine.status.to_string().red(),
            _ => machine.status.to_string().yellow(),
        };
        let internal = machine
            .get_attribute::<String>("internal_ip")
            .unwrap_or_else(|| "-".to_string());
        let external = machine
            .get_attribute::<String>("external_ip")
            .unwrap_or_else(|| "-".to_string());
        let declared = if deployment.machines.contains_key(name) {
            ""
        } else {
            " (宣言外)"
        };
        println!("  {} [{}] {} / {}{}", name.cyan(), status, internal, external, declared);
    }

    Ok(())
}
