use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use consent_core::{ConsentError, MessageSink, OutboundMessage};
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, warn};
use uuid::Uuid;

/// Request/response table for expressions evaluated by the host in the
/// page's own script context.
///
/// Every request owns exactly one entry; the entry disappears on answer,
/// on deadline, or when the waiting future is dropped.
pub struct EvalBridge {
    sink: Rc<dyn MessageSink>,
    pending: RefCell<HashMap<String, oneshot::Sender<Value>>>,
    timeout: Duration,
}

struct PendingEntry<'a> {
    table: &'a RefCell<HashMap<String, oneshot::Sender<Value>>>,
    id: String,
}

impl Drop for PendingEntry<'_> {
    fn drop(&mut self) {
        self.table.borrow_mut().remove(&self.id);
    }
}

impl EvalBridge {
    pub fn new(sink: Rc<dyn MessageSink>, timeout: Duration) -> Self {
        Self {
            sink,
            pending: RefCell::new(HashMap::new()),
            timeout,
        }
    }

    pub async fn request(&self, code: &str) -> Result<Value, ConsentError> {
        let id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.pending.borrow_mut().insert(id.clone(), tx);
        let _entry = PendingEntry {
            table: &self.pending,
            id: id.clone(),
        };

        self.sink.send(OutboundMessage::EvalRequest {
            id: id.clone(),
            code: code.to_string(),
        });

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(ConsentError::channel_closed(format!(
                "eval #{} abandoned by responder",
                id
            ))),
            Err(_) => {
                debug!(id = %id, "eval request timed out");
                Err(ConsentError::eval_timeout(&id))
            }
        }
    }

    /// Fulfils a pending request. Unknown ids (late or duplicate answers)
    /// are dropped.
    pub fn resolve(&self, id: &str, value: Value) -> bool {
        let sender = self.pending.borrow_mut().remove(id);
        match sender {
            Some(tx) => tx.send(value).is_ok(),
            None => {
                warn!(id, "no pending eval for response");
                false
            }
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.borrow().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::mpsc;

    fn bridge() -> (EvalBridge, mpsc::UnboundedReceiver<OutboundMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (EvalBridge::new(Rc::new(tx), Duration::from_millis(1000)), rx)
    }

    fn request_id(msg: OutboundMessage) -> String {
        match msg {
            OutboundMessage::EvalRequest { id, .. } => id,
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn answered_request_resolves_and_clears_entry() {
        let (bridge, mut rx) = bridge();

        let answer = async {
            let id = request_id(rx.recv().await.unwrap());
            assert!(bridge.resolve(&id, json!(42)));
        };
        let (value, ()) = tokio::join!(bridge.request("6 * 7"), answer);

        assert_eq!(value.unwrap(), json!(42));
        assert_eq!(bridge.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_removes_entry_and_late_answer_is_ignored() {
        let (bridge, mut rx) = bridge();

        let err = bridge.request("never()").await.unwrap_err();
        assert_eq!(err.category, consent_core::ErrorCategory::Evaluation);
        assert_eq!(bridge.pending_count(), 0);

        let id = request_id(rx.recv().await.unwrap());
        assert!(!bridge.resolve(&id, json!(true)));
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_request_does_not_leak() {
        let (bridge, _rx) = bridge();
        {
            let fut = bridge.request("slow()");
            let _ = tokio::time::timeout(Duration::from_millis(10), fut).await;
        }
        assert_eq!(bridge.pending_count(), 0);
    }
}
