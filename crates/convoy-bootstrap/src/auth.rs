//! レジストリ認証ファイル生成
//!
//! ルートレスビルダーが参照する config.json 形式の認証ファイルを
//! 生成します。ユーザー名とパスワードの両方が解決できた場合のみ
//! レジストリURLをキーとするエントリを書き、どちらかが欠けていれば
//! 空の auths マップを書きます。どちらも正常な終端構成であり、
//! 失敗にはなりません。

use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// config.json の構造
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RegistryAuthConfig {
    /// 認証情報 (レジストリ -> AuthEntry)
    pub auths: BTreeMap<String, AuthEntry>,
}

/// 認証エントリ
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthEntry {
    /// Base64エンコードされた "username:password"
    pub auth: String,
}

/// 認証ファイルの内容を生成
///
/// 出力は決定的（BTreeMap + pretty JSON + 改行終端）。
pub fn render_auth_config(
    registry: Option<&str>,
    username: Option<&str>,
    password: Option<&str>,
) -> crate::Result<String> {
    let mut config = RegistryAuthConfig::default();

    if let (Some(registry), Some(username), Some(password)) = (registry, username, password) {
        let auth = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", username, password));
        config
            .auths
            .insert(registry.to_string(), AuthEntry { auth });
    }

    let mut json = serde_json::to_string_pretty(&config)?;
    json.push('\n');
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_credentials_present() {
        let content = render_auth_config(Some("ghcr.io"), Some("builder"), Some("s3cret")).unwrap();
        let config: RegistryAuthConfig = serde_json::from_str(&content).unwrap();

        assert_eq!(config.auths.len(), 1);
        let entry = config.auths.get("ghcr.io").unwrap();
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(&entry.auth)
            .unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap(), "builder:s3cret");
    }

    #[test]
    fn test_missing_credentials_write_empty_map() {
        for (user, pass) in [
            (None, None),
            (Some("builder"), None),
            (None, Some("s3cret")),
        ] {
            let content = render_auth_config(Some("ghcr.io"), user, pass).unwrap();
            let config: RegistryAuthConfig = serde_json::from_str(&content).unwrap();
            assert!(config.auths.is_empty());
        }
    }

    #[test]
    fn test_no_registry_writes_empty_map() {
        let content = render_auth_config(None, Some("builder"), Some("s3cret")).unwrap();
        let config: RegistryAuthConfig = serde_json::from_str(&content).unwrap();
        assert!(config.auths.is_empty());
    }

    #[test]
    fn test_output_is_deterministic() {
        let a = render_auth_config(Some("ghcr.io"), Some("builder"), Some("s3cret")).unwrap();
        let b = render_auth_config(Some("ghcr.io"), Some("builder"), Some("s3cret")).unwrap();
        assert_eq!(a, b);
        assert!(a.ends_with('\n'));
    }
}
