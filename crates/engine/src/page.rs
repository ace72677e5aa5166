use std::rc::Rc;

use consent_core::{Document, MessageSink};
use serde_json::Value;
use tracing::debug;

use crate::bridge::EvalBridge;
use crate::config::TimeoutConfig;
use crate::resolver::Resolver;

/// Everything a handler needs to act on one page: the document, the eval
/// bridge to the host and the timing budget.
pub struct PageContext {
    doc: Rc<dyn Document>,
    bridge: EvalBridge,
    timings: TimeoutConfig,
}

impl PageContext {
    pub fn new(doc: Rc<dyn Document>, sink: Rc<dyn MessageSink>, timings: TimeoutConfig) -> Self {
        let bridge = EvalBridge::new(sink, timings.eval);
        Self {
            doc,
            bridge,
            timings,
        }
    }

    pub fn doc(&self) -> &dyn Document {
        self.doc.as_ref()
    }

    pub fn bridge(&self) -> &EvalBridge {
        &self.bridge
    }

    pub fn timings(&self) -> &TimeoutConfig {
        &self.timings
    }

    pub fn resolver(&self) -> Resolver<'_> {
        Resolver::new(self.doc.as_ref())
    }

    /// Current location, empty when the backend cannot tell.
    pub async fn url(&self) -> String {
        match self.doc.location().await {
            Ok(url) => url,
            Err(err) => {
                debug!(error = %err, "location unavailable");
                String::new()
            }
        }
    }

    pub async fn is_top_frame(&self) -> bool {
        self.doc.is_top_frame().await.unwrap_or(true)
    }

    /// Evaluates `code` in the page's script context through the host.
    /// Failures and timeouts read as `false`.
    pub async fn eval_value(&self, code: &str) -> Value {
        match self.bridge.request(code).await {
            Ok(value) => value,
            Err(err) => {
                debug!(error = %err, "eval failed");
                Value::Bool(false)
            }
        }
    }
}
