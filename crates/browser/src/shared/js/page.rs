pub const LOCATION: &str = "() => window.location.href";

pub const IS_TOP_FRAME: &str = "() => window.top === window";

pub const READY_STATE: &str = "() => document.readyState";

pub const COOKIE: &str = "() => document.cookie";

/// Host-side evaluation of engine code. Script errors (CSP included) read
/// as `undefined`.
pub const EVAL_IN_PAGE: &str = r#"
(code) => {
    try {
        return window.eval(code);
    } catch (e) {
        console.warn('eval error', code, e);
        return undefined;
    }
}
"#;

pub const CLOSE: &str = "() => { window.close(); return true; }";
