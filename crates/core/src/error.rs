use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error categories for the consent engine. None of them are fatal to the
/// host: the state machine downgrades every one to "no change".
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCategory {
    /// More than one handler claimed the page
    Detection,
    /// No popup showed up within the retry budget
    Confirmation,
    /// Page-context expression threw or the channel timed out
    Evaluation,
    /// A required step of an action failed
    Step,
    /// Rule data that cannot be interpreted
    MalformedRule,
    /// The document backend failed
    Dom,
    /// The outbound channel is gone
    Channel,
    /// Configuration could not be used
    Config,
}

/// Structured error with context, in the shape every crate of the workspace
/// reports failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsentError {
    pub category: ErrorCategory,
    pub message: String,
    /// Optional context (cmp name, selector, request id, ...)
    pub context: serde_json::Value,
    /// Whether retrying the same operation later may succeed
    pub recoverable: bool,
}

impl ConsentError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            context: serde_json::json!({}),
            recoverable: false,
        }
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }

    pub fn recoverable(mut self) -> Self {
        self.recoverable = true;
        self
    }

    pub fn detection_conflict(names: &[String]) -> Self {
        Self::new(
            ErrorCategory::Detection,
            "Found multiple CMPs, check the detection rules.",
        )
        .with_context(serde_json::json!({ "cmps": names }))
    }

    pub fn eval_timeout(id: &str) -> Self {
        Self::new(ErrorCategory::Evaluation, format!("eval #{} timed out", id))
            .with_context(serde_json::json!({ "id": id }))
            .recoverable()
    }

    pub fn eval_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Evaluation, message)
    }

    pub fn step_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Step, message)
    }

    pub fn malformed_rule(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::MalformedRule, message)
    }

    pub fn channel_closed(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Channel, message)
    }
}

impl std::fmt::Display for ConsentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.category, self.message)
    }
}

impl std::error::Error for ConsentError {}

/// Failures reported by a [`crate::Document`] backend.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DomError {
    #[error("invalid selector `{0}`")]
    InvalidSelector(String),

    #[error("node {0} is no longer attached")]
    NodeGone(u64),

    #[error("script failed: {0}")]
    Script(String),

    #[error("document backend error: {0}")]
    Backend(String),
}

impl From<DomError> for ConsentError {
    fn from(err: DomError) -> Self {
        let recoverable = matches!(err, DomError::NodeGone(_) | DomError::Backend(_));
        let mut out = ConsentError::new(ErrorCategory::Dom, err.to_string());
        out.recoverable = recoverable;
        out
    }
}

/// Rule data that failed to decode.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("rule `{name}` could not be decoded: {source}")]
    Decode {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("rule `{name}` has an invalid url pattern: {source}")]
    UrlPattern {
        name: String,
        #[source]
        source: regex::Error,
    },
}

impl From<RuleError> for ConsentError {
    fn from(err: RuleError) -> Self {
        ConsentError::malformed_rule(err.to_string())
    }
}
