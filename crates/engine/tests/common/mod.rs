#![allow(dead_code)]

use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use consent_core::{Document, MessageSink, OutboundMessage};
use consent_engine::{EvalBridge, PageContext, TimeoutConfig};
use consent_snapshot::SnapshotDocument;
use serde_json::Value;
use tokio::sync::mpsc;

/// Records every outbound message and forwards eval requests to a host loop.
pub struct HostSink {
    recorded: RefCell<Vec<OutboundMessage>>,
    evals: mpsc::UnboundedSender<(String, String)>,
}

impl HostSink {
    pub fn new() -> (Rc<Self>, mpsc::UnboundedReceiver<(String, String)>) {
        let (evals, rx) = mpsc::unbounded_channel();
        let sink = Rc::new(Self {
            recorded: RefCell::new(Vec::new()),
            evals,
        });
        (sink, rx)
    }

    pub fn messages(&self) -> Vec<OutboundMessage> {
        self.recorded.borrow().clone()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.recorded
            .borrow()
            .iter()
            .filter(|m| m.kind() != "evalRequest")
            .map(|m| m.kind())
            .collect()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.recorded
            .borrow()
            .iter()
            .filter(|m| m.kind() == kind)
            .count()
    }
}

impl MessageSink for HostSink {
    fn send(&self, message: OutboundMessage) {
        if let OutboundMessage::EvalRequest { id, code } = &message {
            let _ = self.evals.send((id.clone(), code.clone()));
        }
        self.recorded.borrow_mut().push(message);
    }
}

/// Answers eval requests from the snapshot's scripted results, like a host
/// evaluating in the page would. Unscripted code answers `false`.
pub async fn answer_evals(
    doc: Rc<SnapshotDocument>,
    bridge: &EvalBridge,
    mut requests: mpsc::UnboundedReceiver<(String, String)>,
) {
    while let Some((id, code)) = requests.recv().await {
        let value = doc.evaluate(&code).await.unwrap_or(Value::Bool(false));
        bridge.resolve(&id, value);
    }
}

/// Runs `fut` while a host loop answers eval requests.
pub async fn with_host<F: Future>(
    doc: Rc<SnapshotDocument>,
    bridge: &EvalBridge,
    requests: mpsc::UnboundedReceiver<(String, String)>,
    fut: F,
) -> F::Output {
    tokio::select! {
        out = fut => out,
        _ = answer_evals(doc, bridge, requests) => unreachable!("host loop ended"),
    }
}

pub struct Fixture {
    pub doc: Rc<SnapshotDocument>,
    pub sink: Rc<HostSink>,
    pub page: PageContext,
    pub requests: Option<mpsc::UnboundedReceiver<(String, String)>>,
}

impl Fixture {
    pub fn new(markup: &str) -> Self {
        Self::from_doc(SnapshotDocument::parse(markup))
    }

    pub fn from_doc(doc: SnapshotDocument) -> Self {
        let doc = Rc::new(doc);
        let (sink, requests) = HostSink::new();
        let page = PageContext::new(
            doc.clone() as Rc<dyn Document>,
            sink.clone() as Rc<dyn MessageSink>,
            TimeoutConfig::default(),
        );
        Self {
            doc,
            sink,
            page,
            requests: Some(requests),
        }
    }

    pub fn take_requests(&mut self) -> mpsc::UnboundedReceiver<(String, String)> {
        self.requests.take().expect("eval requests already taken")
    }
}
