//! Page-side snippets. Elements handed to the engine are registered in
//! `window.__consentNodes` and addressed by a numeric id from then on.

pub mod element;
pub mod page;
pub mod style;

use serde_json::Value;

pub fn build_js_call(func: &str, args: &[Value]) -> String {
    let args_str = args
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    format!("({})({})", func, args_str)
}

/// Wraps `(el, arg) => ...` so it runs against a registered element.
/// Replies `{ gone: true }` when the element was detached, else
/// `{ value }`.
pub fn node_call(body: &str) -> String {
    format!(
        r#"(id, arg) => {{
    const reg = window.__consentNodes;
    const el = reg && reg.byId.get(id);
    if (!el || !el.isConnected) return {{ gone: true }};
    return {{ value: ({body})(el, arg) }};
}}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn calls_are_json_encoded() {
        let call = build_js_call("(a, b) => a", &[json!(3), json!("x\"y")]);
        assert_eq!(call, r#"((a, b) => a)(3, "x\"y")"#);
    }

    #[test]
    fn node_calls_check_attachment() {
        let wrapped = node_call(element::TEXT_CONTENT);
        assert!(wrapped.contains("el.isConnected"));
        assert!(wrapped.contains("(el) => el.textContent"));
    }
}
