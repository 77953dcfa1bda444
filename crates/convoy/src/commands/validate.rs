use colored::Colorize;
use convoy_core::Deployment;

pub fn handle(deployment: &Deployment) {
    // ロード時に validate 済み。ここでは概要を表示する
    println!("{}", format!("プロジェクト: {}", deployment.name).bold());
    println!("  マシン: {} 台", deployment.machines.len());
    println!("  ロール: {} 個", deployment.roles.len());
    println!("  ブートストラップ: {} 個", deployment.bootstraps.len());
    println!("  グラフ束縛: {} 件", deployment.graph.bindings.len());
    println!();
    println!("{}", "✓ 宣言は有効です".green().bold());
}
