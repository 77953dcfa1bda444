mod commands;
mod utils;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "convoy")]
#[command(about = "宣言したマシン群をプロビジョニングし、構成へ収束させる", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 宣言ファイルを検証
    Validate,
    /// プロビジョニング計画を表示
    Plan,
    /// マシンをプロビジョニングして状態を保存
    Provision,
    /// インベントリ成果物を生成
    Inventory {
        /// 書き込み先 (デフォルト: inventory.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// ロールグラフをホストへ適用
    Converge {
        /// インベントリ成果物のパス
        #[arg(short, long)]
        inventory: Option<PathBuf>,
        /// シークレットのオーバーライド (KEY=VALUE、環境変数より優先)
        #[arg(long = "secret", value_name = "KEY=VALUE")]
        secrets: Vec<String>,
    },
    /// プロビジョニング → インベントリ → 収束 を一括実行
    Up {
        /// シークレットのオーバーライド (KEY=VALUE、環境変数より優先)
        #[arg(long = "secret", value_name = "KEY=VALUE")]
        secrets: Vec<String>,
    },
    /// マシンの現在状態を表示
    Status,
    /// 宣言されたマシンを破棄
    Down {
        /// 確認プロンプトをスキップ
        #[arg(short, long)]
        yes: bool,
    },
    /// バージョンを表示
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 通常のCLIコマンドはstderrにログ出力
    tracing_subscriber::fmt::init();

    // Versionコマンドは設定ファイル不要
    if matches!(cli.command, Commands::Version) {
        println!("convoy {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // プロジェクトルートを検索して宣言を読み込む
    let project_root = convoy_core::find_project_root()?;
    let deployment = convoy_core::load_deployment(&project_root)?;

    match cli.command {
        Commands::Validate => {
            commands::validate::handle(&deployment);
        }
        Commands::Plan => {
            commands::plan::handle(&deployment).await?;
        }
        Commands::Provision => {
            commands::provision::handle(&deployment, &project_root).await?;
        }
        Commands::Inventory { output } => {
            commands::inventory::handle(&deployment, &project_root, output).await?;
        }
        Commands::Converge { inventory, secrets } => {
            commands::converge::handle(&deployment, &project_root, inventory, &secrets).await?;
        }
        Commands::Up { secrets } => {
            commands::up::handle(&deployment, &project_root, &secrets).await?;
        }
        Commands::Status => {
            commands::status::handle(&deployment).await?;
        }
        Commands::Down { yes } => {
            commands::down::handle(&deployment, &project_root, yes).await?;
        }
        Commands::Version => {
            unreachable!("Version is handled before config loading");
        }
    }

    Ok(())
}
