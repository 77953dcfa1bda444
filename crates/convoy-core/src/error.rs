use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConvoyError {
    #[error("KDLパースエラー: {0}")]
    KdlParse(#[from] kdl::KdlError),

    #[error("ファイル読み込みエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("無効な設定: {0}")]
    InvalidConfig(String),

    #[error("テンプレート展開エラー: {0}")]
    TemplateRenderError(String),

    #[error(
        "プロジェクトルートが見つかりません\n探索開始位置: {0}\nヒント: convoy.kdl ファイルを含むディレクトリで実行してください"
    )]
    ProjectRootNotFound(PathBuf),

    #[error("ロールが見つかりません: {0}")]
    RoleNotFound(String),

    #[error("ホストグループが見つかりません: {0}")]
    GroupNotFound(String),

    #[error("ブートストラップ定義が見つかりません: {0}")]
    BootstrapNotFound(String),

    #[error("シークレットが解決できません: {0}")]
    MissingSecret(String),

    #[error("リモートコマンドがタイムアウトしました: {host} ({seconds}秒)")]
    RemoteTimeout { host: String, seconds: u64 },

    #[error("リモート接続エラー: {0}")]
    RemoteConnection(String),
}

pub type Result<T> = std::result::Result<T, ConvoyError>;
