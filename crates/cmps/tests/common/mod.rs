#![allow(dead_code)]

use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use consent_core::{Document, MessageSink, OutboundMessage};
use consent_engine::{PageContext, TimeoutConfig};
use consent_snapshot::SnapshotDocument;
use serde_json::Value;
use tokio::sync::mpsc;

type EvalRequests = mpsc::UnboundedReceiver<(String, String)>;

/// Stands in for the host: keeps outbound messages and queues eval requests.
pub struct HostSink {
    recorded: RefCell<Vec<OutboundMessage>>,
    evals: mpsc::UnboundedSender<(String, String)>,
}

impl MessageSink for HostSink {
    fn send(&self, message: OutboundMessage) {
        if let OutboundMessage::EvalRequest { id, code } = &message {
            let _ = self.evals.send((id.clone(), code.clone()));
        }
        self.recorded.borrow_mut().push(message);
    }
}

impl HostSink {
    pub fn count(&self, kind: &str) -> usize {
        self.recorded
            .borrow()
            .iter()
            .filter(|m| m.kind() == kind)
            .count()
    }
}

/// A page over a snapshot document.
pub struct Page {
    pub doc: Rc<SnapshotDocument>,
    pub sink: Rc<HostSink>,
    pub ctx: PageContext,
    requests: RefCell<Option<EvalRequests>>,
}

impl Page {
    pub fn new(doc: SnapshotDocument) -> Self {
        let doc = Rc::new(doc);
        let (evals, requests) = mpsc::unbounded_channel();
        let sink = Rc::new(HostSink {
            recorded: RefCell::new(Vec::new()),
            evals,
        });
        let ctx = PageContext::new(
            doc.clone() as Rc<dyn Document>,
            sink.clone() as Rc<dyn MessageSink>,
            TimeoutConfig::default(),
        );
        Self {
            doc,
            sink,
            ctx,
            requests: RefCell::new(Some(requests)),
        }
    }

    pub fn parse(markup: &str) -> Self {
        Self::new(SnapshotDocument::parse(markup))
    }

    /// Runs `fut` while answering eval requests from the snapshot's scripted
    /// results. Unscripted code answers `false`.
    pub async fn hosted<F: Future>(&self, fut: F) -> F::Output {
        let mut requests = self
            .requests
            .borrow_mut()
            .take()
            .expect("host already running");
        let host = async {
            while let Some((id, code)) = requests.recv().await {
                let value = self
                    .doc
                    .evaluate(&code)
                    .await
                    .unwrap_or(Value::Bool(false));
                self.ctx.bridge().resolve(&id, value);
            }
        };
        tokio::select! {
            out = fut => out,
            _ = host => unreachable!("host loop ended"),
        }
    }
}
