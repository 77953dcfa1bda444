//! Convoy core
//!
//! デプロイメント宣言のモデルとパーサー、および各フェーズで共有される
//! 基盤機能（シークレット解決、テンプレート展開、リモートチャネル、
//! 実行コンテキスト）を提供します。

pub mod context;
pub mod discovery;
pub mod error;
pub mod loader;
pub mod model;
pub mod parser;
pub mod remote;
pub mod secrets;
pub mod template;

// Re-exports
pub use context::RunContext;
pub use discovery::{find_deploy_file, find_project_root};
pub use error::{ConvoyError, Result};
pub use loader::{load_deployment, load_deployment_file};
pub use model::*;
pub use parser::parse_deployment;
pub use remote::{ChannelFactory, ExecOutput, RemoteChannel, SshChannel, SshChannelFactory};
pub use secrets::SecretStore;
pub use template::{Variables, render_str};
