use crate::utils;
use colored::Colorize;
use convoy_cloud::{ActionType, Provisioner};
use convoy_core::Deployment;

pub async fn handle(deployment: &Deployment) -> anyhow::Result<()> {
    let provider = utils::provider_for(deployment)?;
    let provisioner = Provisioner::new(provider);
    let desired = utils::resource_set(deployment);

    let account = provisioner.check_auth().await?;
    println!("認証済み: {}", account.cyan());
    println!();

    let plan = provisioner.plan(&desired).await?;
    for action in &plan.actions {
        let marker = match action.action_type {
            ActionType::Create => "+".green(),
            ActionType::Update => "~".yellow(),
            ActionType::Delete => "-".red(),
            ActionType::NoOp => "=".normal(),
        };
        println!("  {} {}", marker, action.description);
    }

    println!();
    println!("{}", plan.summary());

    Ok(())
}
