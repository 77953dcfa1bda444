use super::{converge, inventory, provision};
use convoy_core::Deployment;
use std::path::Path;

/// provision → inventory → converge を順に実行する
pub async fn handle(
    deployment: &Deployment,
    project_root: &Path,
    secret_overrides: &[String],
) -> anyhow::Result<()> {
    provision::handle(deployment, project_root).await?;
    println!();
    inventory::handle(deployment, project_root, None).await?;
    println!();
    converge::handle(deployment, project_root, None, secret_overrides).await
}
