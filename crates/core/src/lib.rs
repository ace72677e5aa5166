mod actions;
mod config;
mod context;
mod dom;
mod error;
mod messages;
mod rules;

pub use actions::*;
pub use config::{AutoAction, EngineConfig};
pub use context::RunContext;
pub use dom::{Document, MouseEventKind, NodeId, Rect, Scope};
pub use error::{ConsentError, DomError, ErrorCategory, RuleError};
pub use messages::{DecodedRules, InboundCommand, MessageSink, OutboundMessage, RuleSet};
pub use rules::*;

/// JavaScript truthiness of an evaluation result.
pub fn is_truthy(value: &serde_json::Value) -> bool {
    use serde_json::Value;
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::is_truthy;
    use serde_json::json;

    #[test]
    fn truthiness_follows_javascript() {
        assert!(is_truthy(&json!(1)));
        assert!(is_truthy(&json!("no")));
        assert!(is_truthy(&json!([])));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!(false)));
    }
}
