//! テンプレート展開機能
//!
//! Teraを使用してタスクのファイル内容・コマンド文字列を
//! 実行コンテキスト変数で展開します。

use crate::error::{ConvoyError, Result};
use std::collections::HashMap;
use tera::{Context, Tera};

/// 変数コンテキスト
pub type Variables = HashMap<String, serde_json::Value>;

/// 文字列テンプレートを1回だけ展開
///
/// テンプレート構文を含まない入力はそのまま返す（展開コストを避ける）。
pub fn render_str(template: &str, variables: &Variables) -> Result<String> {
    if !template.contains("{{") && !template.contains("{%") {
        return Ok(template.to_string());
    }

    let mut context = Context::new();
    for (key, value) in variables {
        context.insert(key, value);
    }

    Tera::one_off(template, &context, false)
        .map_err(|e| ConvoyError::TemplateRenderError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Variables {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
            .collect()
    }

    #[test]
    fn test_render_plain_passthrough() {
        let rendered = render_str("no templates here", &Variables::new()).unwrap();
        assert_eq!(rendered, "no templates here");
    }

    #[test]
    fn test_render_with_variables() {
        let rendered = render_str(
            "registry {{ REGISTRY_URL }} for {{ host_name }}",
            &vars(&[("REGISTRY_URL", "ghcr.io"), ("host_name", "stage-build")]),
        )
        .unwrap();
        assert_eq!(rendered, "registry ghcr.io for stage-build");
    }

    #[test]
    fn test_render_undefined_variable_is_error() {
        let result = render_str("{{ MISSING }}", &Variables::new());
        assert!(matches!(result, Err(ConvoyError::TemplateRenderError(_))));
    }
}
