use consent_core::DomError;

/// Classifies a CDP failure by its message.
pub fn to_dom_error(e: impl std::fmt::Display, action: &str) -> DomError {
    let s = e.to_string();
    if s.contains("SyntaxError") || s.contains("not a valid selector") {
        DomError::InvalidSelector(format!("{action}: {s}"))
    } else if s.contains("Error") || s.contains("exception") {
        DomError::Script(format!("{action}: {s}"))
    } else {
        DomError::Backend(format!("{action} failed: {s}"))
    }
}
