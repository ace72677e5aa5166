//! The host side of the engine's message protocol: answers `init` with the
//! stored config and rules, evaluates eval requests in the page and starts
//! the self-test once a scheduled opt-out has completed.

use std::rc::Rc;

use consent_core::{Document, EngineConfig, InboundCommand, OutboundMessage, RuleSet};
use consent_engine::AutoConsent;
use futures::StreamExt;
use futures::future::LocalBoxFuture;
use futures::stream::FuturesUnordered;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

struct HostState {
    config: EngineConfig,
    rules: RuleSet,
    self_test_pending: bool,
}

impl HostState {
    /// Reaction to one outbound message, if it needs one.
    fn respond<'a>(
        &mut self,
        engine: &'a AutoConsent,
        doc: &Rc<dyn Document>,
        message: &OutboundMessage,
    ) -> Option<LocalBoxFuture<'a, ()>> {
        match message {
            OutboundMessage::Init { .. } => Some(Box::pin(engine.receive(InboundCommand::InitResponse {
                config: self.config.clone(),
                rule_set: self.rules.clone(),
            }))),
            OutboundMessage::EvalRequest { id, code } => {
                let doc = doc.clone();
                let id = id.clone();
                let code = code.clone();
                Some(Box::pin(async move {
                    let result = doc.evaluate(&code).await.unwrap_or_else(|err| {
                        warn!(error = %err, "eval in page failed");
                        Value::Null
                    });
                    engine
                        .receive(InboundCommand::EvalResponse { id, result })
                        .await;
                }))
            }
            OutboundMessage::OptOutResult {
                result: true,
                schedule_self_test: true,
                ..
            }
            | OutboundMessage::OptInResult {
                result: true,
                schedule_self_test: true,
                ..
            } => {
                self.self_test_pending = true;
                None
            }
            OutboundMessage::AutoconsentDone { .. } if self.self_test_pending => {
                self.self_test_pending = false;
                Some(Box::pin(engine.receive(InboundCommand::SelfTest)))
            }
            _ => None,
        }
    }
}

fn log_message(message: &OutboundMessage) {
    match message {
        OutboundMessage::EvalRequest { id, .. } => debug!(id = %id, "eval requested"),
        OutboundMessage::DetectionConflict { names } => warn!(?names, "several CMPs detected"),
        other => info!(kind = other.kind(), "engine message"),
    }
}

/// Announces the engine and serves it until it has nothing left to do.
/// `emit` sees every outbound message except eval traffic.
pub async fn run_host<'e, F>(
    engine: &'e AutoConsent,
    doc: Rc<dyn Document>,
    mut outbound: mpsc::UnboundedReceiver<OutboundMessage>,
    config: EngineConfig,
    rules: RuleSet,
    mut emit: F,
) where
    F: FnMut(&OutboundMessage),
{
    let mut state = HostState {
        config,
        rules,
        self_test_pending: false,
    };
    let mut tasks: FuturesUnordered<LocalBoxFuture<'e, ()>> = FuturesUnordered::new();
    tasks.push(Box::pin(engine.announce()));

    let mut handle = |message: OutboundMessage, tasks: &mut FuturesUnordered<LocalBoxFuture<'e, ()>>| {
        log_message(&message);
        if !matches!(message, OutboundMessage::EvalRequest { .. }) {
            emit(&message);
        }
        if let Some(task) = state.respond(engine, &doc, &message) {
            tasks.push(task);
        }
    };

    loop {
        tokio::select! {
            Some(message) = outbound.recv() => handle(message, &mut tasks),
            Some(()) = tasks.next(), if !tasks.is_empty() => {}
            else => return,
        }

        if tasks.is_empty() {
            // messages sent by the last finished task may still be queued
            while let Ok(message) = outbound.try_recv() {
                handle(message, &mut tasks);
            }
            if tasks.is_empty() {
                debug!(phase = ?engine.phase(), "engine idle");
                return;
            }
        }
    }
}
