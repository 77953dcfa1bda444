//! ブートストラップ手順の宣言モデル
//!
//! ルートレスイメージビルダー導入のような、多段・冪等・前提条件付きの
//! インストール手順を宣言する。実行は convoy-bootstrap が担う。

use serde::{Deserialize, Serialize};

/// アーティファクトインストール手順の宣言
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BootstrapSpec {
    /// 導入するバージョン
    pub version: String,

    /// アーティファクトURLテンプレート
    ///
    /// `{version}` と `{arch}` がホストの実アーキテクチャ由来の値で
    /// 置換される（content-addressed）。`https://` のほか、検証済み
    /// ミラーを使う air-gapped 環境向けにローカルパスも受け付ける。
    pub artifact: String,

    /// バイナリの配置先
    pub install_dir: String,

    /// アーカイブから取り出すバイナリ名（bin/ 配下）
    pub binaries: Vec<String>,

    /// 前提条件: このソケットが存在しなければハードゲート失敗
    pub prerequisite_socket: Option<String>,

    /// レジストリ認証ファイルの書き込み先
    pub auth_file: Option<String>,

    /// 認証対象レジストリURL
    pub registry: Option<String>,

    /// レジストリユーザー名のシークレットキー
    pub username_secret: Option<String>,

    /// レジストリパスワードのシークレットキー
    pub password_secret: Option<String>,
}
