//! Candidate-selection state machine: one consistent consent decision per
//! page load.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use consent_core::{
    AutoAction, ConsentError, Document, EngineConfig, InboundCommand, MessageSink,
    OutboundMessage, RuleSet,
};
use futures::StreamExt;
use futures::future::join_all;
use futures::stream::FuturesUnordered;
use tracing::{debug, error, info, warn};

use crate::config::TimeoutConfig;
use crate::handler::CmpHandler;
use crate::handlers::{DeclarativeCmp, RuleCmp};
use crate::page::PageContext;
use crate::primitives::poll;

/// Prehidden on every page, whatever handlers are registered.
pub const GLOBAL_PREHIDE_SELECTORS: &str = "#didomi-popup,.didomi-popup-container,.didomi-popup-notice,.didomi-consent-popup-preferences,#didomi-notice,.didomi-popup-backdrop,.didomi-screen-medium";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Detecting,
    NoneFound,
    Confirming,
    NoPopup,
    Deciding,
    Executing,
    Reporting,
    Done,
}

/// Per-page engine state. Lives as long as the page context it runs in.
pub struct AutoConsent {
    page: PageContext,
    sink: Rc<dyn MessageSink>,
    handlers: RefCell<Vec<Rc<dyn CmpHandler>>>,
    found_cmp: RefCell<Option<Rc<dyn CmpHandler>>>,
    config: RefCell<EngineConfig>,
    phase: Cell<Phase>,
}

impl AutoConsent {
    pub fn new(
        doc: Rc<dyn Document>,
        sink: Rc<dyn MessageSink>,
        handlers: Vec<Rc<dyn CmpHandler>>,
        timings: TimeoutConfig,
    ) -> Self {
        Self {
            page: PageContext::new(doc, Rc::clone(&sink), timings),
            sink,
            handlers: RefCell::new(handlers),
            found_cmp: RefCell::new(None),
            config: RefCell::new(EngineConfig::default()),
            phase: Cell::new(Phase::Idle),
        }
    }

    pub fn page(&self) -> &PageContext {
        &self.page
    }

    pub fn phase(&self) -> Phase {
        self.phase.get()
    }

    pub fn found_cmp(&self) -> Option<String> {
        self.found_cmp.borrow().as_ref().map(|cmp| cmp.name().to_string())
    }

    pub fn handler_names(&self) -> Vec<String> {
        self.handlers
            .borrow()
            .iter()
            .map(|h| h.name().to_string())
            .collect()
    }

    fn set_phase(&self, next: Phase) {
        let prev = self.phase.replace(next);
        if prev != next {
            debug!(from = ?prev, to = ?next, "phase transition");
        }
    }

    fn config(&self) -> EngineConfig {
        self.config.borrow().clone()
    }

    fn send(&self, message: OutboundMessage) {
        debug!(kind = message.kind(), "-> host");
        self.sink.send(message);
    }

    /// Asks the host for configuration and rules.
    pub async fn announce(&self) {
        let url = self.page.url().await;
        self.send(OutboundMessage::Init { url });
    }

    /// Dispatches one inbound command. `initResponse` drives the whole
    /// detection flow, so eval responses must be fed concurrently.
    pub async fn receive(&self, command: InboundCommand) {
        match command {
            InboundCommand::InitResponse { config, rule_set } => {
                self.initialize(config, &rule_set).await;
            }
            InboundCommand::OptOut => {
                self.do_opt_out().await;
            }
            InboundCommand::OptIn => {
                self.do_opt_in().await;
            }
            InboundCommand::SelfTest => {
                self.do_self_test().await;
            }
            InboundCommand::EvalResponse { id, result } => {
                self.page.bridge().resolve(&id, result);
            }
        }
    }

    pub fn add_handler(&self, handler: Rc<dyn CmpHandler>) {
        self.handlers.borrow_mut().push(handler);
    }

    /// Registers the handlers of a rule set. Broken rules are logged and
    /// skipped.
    pub fn add_rules(&self, rules: &RuleSet) {
        let decoded = rules.decode();
        for err in &decoded.errors {
            error!(error = %err, "skipping malformed rule");
        }
        for (name, config) in decoded.declarative {
            self.add_handler(Rc::new(DeclarativeCmp::new(&name, config)));
        }
        for config in decoded.rule_cmps {
            self.add_handler(Rc::new(RuleCmp::new(config)));
        }
    }

    pub fn disable(&self, names: &[String]) {
        self.handlers
            .borrow_mut()
            .retain(|h| !names.iter().any(|n| n == h.name()));
    }

    pub async fn initialize(&self, config: EngineConfig, rules: &RuleSet) -> bool {
        *self.config.borrow_mut() = config.clone();
        if !config.enabled {
            info!("consent handling disabled");
            self.set_phase(Phase::Done);
            return false;
        }

        self.add_rules(rules);
        if !config.disabled_cmps.is_empty() {
            self.disable(&config.disabled_cmps);
        }
        if config.enable_prehide {
            self.prehide_elements().await;
        }
        self.wait_until_ready().await;
        self.start().await
    }

    /// Hides every known popup with opacity until a decision is made.
    pub async fn prehide_elements(&self) -> bool {
        let mut selectors = vec![GLOBAL_PREHIDE_SELECTORS.to_string()];
        for handler in self.handlers.borrow().iter() {
            selectors.extend(handler.prehide_selectors());
        }
        self.page.prehide(&selectors).await
    }

    async fn undo_prehide_if_enabled(&self) {
        if self.config.borrow().enable_prehide {
            self.page.undo_prehide().await;
        }
    }

    async fn wait_until_ready(&self) {
        let timings = self.page.timings();
        let doc = self.page.doc();
        let ready = poll(
            move || async move {
                !matches!(doc.ready_state().await.as_deref(), Ok("loading"))
            },
            timings.ready_retries,
            timings.ready_interval,
        )
        .await;
        if !ready {
            warn!("document still loading, starting detection anyway");
        }
    }

    /// Runs detection, confirmation and the configured auto action.
    pub async fn start(&self) -> bool {
        let config = self.config();

        self.set_phase(Phase::Detecting);
        let candidates = self.find_cmps(config.detect_retries).await;
        if candidates.is_empty() {
            info!("no CMP detected");
            self.set_phase(Phase::NoneFound);
            self.undo_prehide_if_enabled().await;
            return false;
        }

        let url = self.page.url().await;
        for cmp in &candidates {
            self.send(OutboundMessage::CmpDetected {
                url: url.clone(),
                cmp: cmp.name().to_string(),
            });
        }

        self.set_phase(Phase::Confirming);
        let mut races: FuturesUnordered<_> = candidates
            .iter()
            .map(|cmp| async move {
                let open = self.wait_for_popup(cmp.as_ref()).await;
                (Rc::clone(cmp), open)
            })
            .collect();

        let mut confirmed = false;
        while let Some((cmp, open)) = races.next().await {
            if open {
                self.confirm(cmp, &url);
                confirmed = true;
                break;
            }
            debug!(cmp = cmp.name(), "popup not found");
        }

        if !confirmed {
            info!("no popup confirmed");
            self.set_phase(Phase::NoPopup);
            self.undo_prehide_if_enabled().await;
            return false;
        }

        let late = async {
            while let Some((cmp, open)) = races.next().await {
                if open {
                    self.confirm(cmp, &url);
                }
            }
        };
        let (acted, ()) = futures::join!(self.decide(config.auto_action), late);
        acted
    }

    /// First confirmation wins; later ones are only reported.
    fn confirm(&self, cmp: Rc<dyn CmpHandler>, url: &str) {
        let name = cmp.name().to_string();
        {
            let mut found = self.found_cmp.borrow_mut();
            match found.as_ref() {
                None => {
                    info!(cmp = %name, "popup confirmed");
                    *found = Some(cmp);
                }
                Some(active) => {
                    debug!(cmp = %name, active = active.name(), "late popup confirmation ignored");
                }
            }
        }
        self.send(OutboundMessage::PopupFound {
            cmp: name,
            url: url.to_string(),
        });
    }

    async fn decide(&self, action: AutoAction) -> bool {
        self.set_phase(Phase::Deciding);
        match action {
            AutoAction::OptOut => self.do_opt_out().await,
            AutoAction::OptIn => self.do_opt_in().await,
            AutoAction::DoNothing => {
                self.set_phase(Phase::Done);
                true
            }
        }
    }

    /// Detection passes until something is found or the retry budget is
    /// spent.
    pub async fn find_cmps(&self, retries: u32) -> Vec<Rc<dyn CmpHandler>> {
        let mut remaining = retries;
        loop {
            let found = self.detection_pass().await;
            if found.len() > 1 {
                let names: Vec<String> = found.iter().map(|h| h.name().to_string()).collect();
                let err = ConsentError::detection_conflict(&names);
                warn!(context = %err.context, "{}", err);
                self.send(OutboundMessage::DetectionConflict { names });
            }
            if !found.is_empty() || remaining == 0 {
                return found;
            }
            remaining -= 1;
            tokio::time::sleep(self.page.timings().detect_interval).await;
        }
    }

    async fn detection_pass(&self) -> Vec<Rc<dyn CmpHandler>> {
        let is_top = self.page.is_top_frame().await;
        let url = self.page.url().await;
        let eligible: Vec<Rc<dyn CmpHandler>> = self
            .handlers
            .borrow()
            .iter()
            .filter(|h| h.run_context().allows(is_top, &url))
            .cloned()
            .collect();

        let results = join_all(eligible.iter().map(|handler| async move {
            match handler.detect_cmp(&self.page).await {
                Ok(detected) => detected,
                Err(err) => {
                    warn!(cmp = handler.name(), error = %err, "detection failed");
                    false
                }
            }
        }))
        .await;

        eligible
            .into_iter()
            .zip(results)
            .filter_map(|(handler, detected)| {
                if detected {
                    debug!(cmp = handler.name(), "CMP detected");
                }
                detected.then_some(handler)
            })
            .collect()
    }

    pub async fn wait_for_popup(&self, cmp: &dyn CmpHandler) -> bool {
        let timings = self.page.timings();
        let page = &self.page;
        poll(
            move || async move {
                match cmp.detect_popup(page).await {
                    Ok(open) => open,
                    Err(err) => {
                        debug!(cmp = cmp.name(), error = %err, "popup check failed");
                        false
                    }
                }
            },
            timings.popup_retries,
            timings.popup_interval,
        )
        .await
    }

    pub async fn do_opt_out(&self) -> bool {
        self.execute(true).await
    }

    pub async fn do_opt_in(&self) -> bool {
        self.execute(false).await
    }

    async fn execute(&self, opt_out: bool) -> bool {
        self.set_phase(Phase::Executing);
        let found = self.found_cmp.borrow().clone();

        let result = match &found {
            None => false,
            Some(cmp) => {
                let outcome = if opt_out {
                    cmp.opt_out(&self.page).await
                } else {
                    cmp.opt_in(&self.page).await
                };
                outcome.unwrap_or_else(|err| {
                    warn!(cmp = cmp.name(), error = %err, opt_out, "consent routine failed");
                    false
                })
            }
        };

        self.undo_prehide_if_enabled().await;

        self.set_phase(Phase::Reporting);
        let url = self.page.url().await;
        let cmp = found
            .as_ref()
            .map(|c| c.name().to_string())
            .unwrap_or_else(|| "none".to_string());
        if opt_out {
            let schedule_self_test = found.as_ref().is_some_and(|c| c.has_self_test());
            self.send(OutboundMessage::OptOutResult {
                cmp: cmp.clone(),
                result,
                schedule_self_test,
                url: url.clone(),
            });
        } else {
            self.send(OutboundMessage::OptInResult {
                cmp: cmp.clone(),
                result,
                schedule_self_test: false,
                url: url.clone(),
            });
        }

        if result && found.as_ref().is_some_and(|c| !c.is_intermediate()) {
            self.send(OutboundMessage::AutoconsentDone { cmp, url });
        }
        self.set_phase(Phase::Done);
        result
    }

    pub async fn do_self_test(&self) -> bool {
        let found = self.found_cmp.borrow().clone();
        let result = match &found {
            None => false,
            Some(cmp) => cmp.test(&self.page).await.unwrap_or_else(|err| {
                warn!(cmp = cmp.name(), error = %err, "self test failed");
                false
            }),
        };
        let url = self.page.url().await;
        self.send(OutboundMessage::SelfTestResult {
            cmp: found
                .map(|c| c.name().to_string())
                .unwrap_or_else(|| "none".to_string()),
            result,
            url,
        });
        result
    }
}
