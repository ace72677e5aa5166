//! Interpreter for the generic action language.

use async_recursion::async_recursion;
use consent_core::{
    ActionNode, ConsentAction, ConsentCategory, ConsentError, DomError, EvalAction, ForEachAction,
    IfCssAction, Matcher, MouseEventKind, Scope, SlideAction, SlideAxis, WaitCssAction,
};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::page::PageContext;
use crate::primitives::poll;

/// Class added to elements hidden by a `hide` action.
pub const HIDDEN_CLASS: &str = "Autoconsent-Hidden";

/// Page slot an async `eval` action leaves its result in.
const ASYNC_RESULT_SLOT: &str = "window.__consentCheckResult";

pub struct ActionRunner<'a> {
    page: &'a PageContext,
}

impl<'a> ActionRunner<'a> {
    pub fn new(page: &'a PageContext) -> Self {
        Self { page }
    }

    /// Executes one action tree. `consents` are the categories to enable;
    /// lookups start at `scope`.
    #[async_recursion(?Send)]
    pub async fn execute(
        &self,
        node: &ActionNode,
        consents: &[ConsentCategory],
        scope: Scope,
    ) -> Result<(), ConsentError> {
        debug!(action = node.kind(), scope = ?scope, "executing action");
        match node {
            ActionNode::Click(action) => self.click(&action.matcher, scope).await,
            ActionNode::List(list) => {
                for action in &list.actions {
                    self.execute(action, consents, scope).await?;
                }
                Ok(())
            }
            ActionNode::Consent(action) => self.consent(action, consents, scope).await,
            ActionNode::Ifcss(action) => self.if_css(action, consents, scope).await,
            ActionNode::Waitcss(action) => {
                self.wait_css(action, scope).await;
                Ok(())
            }
            ActionNode::Foreach(action) => self.for_each(action, consents, scope).await,
            ActionNode::Hide(action) => {
                let resolved = self.page.resolver().find(&action.matcher, scope).await?;
                if let Some(target) = resolved.target {
                    self.page.doc().add_class(target, HIDDEN_CLASS).await?;
                }
                Ok(())
            }
            ActionNode::Slide(action) => self.slide(action, scope).await,
            ActionNode::Close => Ok(self.page.doc().close().await?),
            ActionNode::Wait(action) => {
                tokio::time::sleep(Duration::from_millis(action.wait_time)).await;
                Ok(())
            }
            ActionNode::Evaluate(action) => {
                self.evaluate(action).await;
                Ok(())
            }
        }
    }

    async fn click(&self, matcher: &Matcher, scope: Scope) -> Result<(), ConsentError> {
        let resolved = self.page.resolver().find(matcher, scope).await?;
        if let Some(target) = resolved.target {
            self.page.doc().click(target).await?;
        }
        tokio::time::sleep(self.page.timings().step_settle).await;
        Ok(())
    }

    async fn consent(
        &self,
        action: &ConsentAction,
        consents: &[ConsentCategory],
        scope: Scope,
    ) -> Result<(), ConsentError> {
        for rule in &action.consents {
            let should_enable = rule.category.is_some_and(|c| consents.contains(&c));
            match (&rule.matcher, &rule.toggle_action) {
                (Some(matcher), Some(toggle)) => {
                    let enabled = self.page.resolver().matches(matcher, scope).await?;
                    if enabled != should_enable {
                        debug!(category = ?rule.category, should_enable, "toggling consent");
                        self.execute(toggle, &[], scope).await?;
                    }
                }
                _ => {
                    let branch = if should_enable {
                        &rule.true_action
                    } else {
                        &rule.false_action
                    };
                    if let Some(action) = branch {
                        self.execute(action, &[], scope).await?;
                    }
                }
            }
        }
        Ok(())
    }

    /// `trueAction` runs when the target is absent, `falseAction` when it
    /// is present.
    async fn if_css(
        &self,
        action: &IfCssAction,
        consents: &[ConsentCategory],
        scope: Scope,
    ) -> Result<(), ConsentError> {
        let resolved = self.page.resolver().find(&action.matcher, scope).await?;
        let branch = match resolved.target {
            None => &action.true_action,
            Some(_) => &action.false_action,
        };
        if let Some(next) = branch {
            self.execute(next, consents, scope).await?;
        }
        Ok(())
    }

    /// Polls until the target appears (or disappears when negated). Always
    /// completes, whether or not the condition was met.
    async fn wait_css(&self, action: &WaitCssAction, scope: Scope) {
        let timings = self.page.timings();
        let retries = action
            .retries
            .filter(|r| *r > 0)
            .unwrap_or(timings.waitcss_retries);
        let interval = action
            .wait_time
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .unwrap_or(timings.waitcss_interval);

        let resolver = self.page.resolver();
        let resolver = &resolver;
        let matcher = &action.matcher;
        let negated = action.negated;
        let met = poll(
            move || async move {
                match resolver.find(matcher, scope).await {
                    Ok(resolved) => resolved.target.is_some() != negated,
                    Err(err) => {
                        debug!(error = %err, "waitcss lookup failed");
                        false
                    }
                }
            },
            retries,
            interval,
        )
        .await;

        if !met {
            debug!(selector = %matcher.target.selector, negated, "waitcss gave up");
        }
    }

    async fn for_each(
        &self,
        action: &ForEachAction,
        consents: &[ConsentCategory],
        scope: Scope,
    ) -> Result<(), ConsentError> {
        let matches = self.page.resolver().find_all(&action.matcher, scope).await?;
        for target in matches.into_iter().filter_map(|m| m.target) {
            self.execute(&action.action, consents, Scope::Node(target)).await?;
        }
        Ok(())
    }

    async fn slide(&self, action: &SlideAction, scope: Scope) -> Result<(), ConsentError> {
        let resolver = self.page.resolver();
        let Some(target) = resolver.find(&action.matcher, scope).await?.target else {
            return Ok(());
        };
        let Some(drag_target) = resolver.find(&action.drag_target, scope).await?.target else {
            warn!(selector = %action.drag_target.target.selector, "slide has no drag target");
            return Ok(());
        };

        let doc = self.page.doc();
        let from = doc.bounding_rect(target).await?;
        let to = doc.bounding_rect(drag_target).await?;
        let (mut dx, mut dy) = (to.left - from.left, to.top - from.top);
        match action.axis {
            SlideAxis::X => dy = 0.0,
            SlideAxis::Y => dx = 0.0,
            SlideAxis::Both => {}
        }

        let (x, y) = from.center();
        let pause = self.page.timings().slide_pause;
        doc.dispatch_mouse(target, MouseEventKind::Mousedown, x, y).await?;
        tokio::time::sleep(pause).await;
        doc.dispatch_mouse(target, MouseEventKind::Mousemove, x + dx, y + dy).await?;
        tokio::time::sleep(pause).await;
        doc.dispatch_mouse(target, MouseEventKind::Mouseup, x + dx, y + dy).await?;
        Ok(())
    }

    /// Runs page code directly in the document. Failures are logged and
    /// never abort the surrounding action.
    async fn evaluate(&self, action: &EvalAction) {
        let doc = self.page.doc();
        let outcome = async {
            let value = doc.evaluate(&action.code).await?;
            if !action.is_async {
                return Ok(value);
            }
            let delay = action
                .timeout
                .map(Duration::from_millis)
                .unwrap_or(self.page.timings().async_eval_delay);
            tokio::time::sleep(delay).await;
            let slot = doc.evaluate(ASYNC_RESULT_SLOT).await?;
            Ok::<Value, DomError>(slot)
        };

        match outcome.await {
            Ok(value) => debug!(result = %value, "eval action finished"),
            Err(err) => warn!(code = %action.code, error = %err, "eval action failed"),
        }
    }
}

/// Known categories a `DO_CONSENT` action tree can toggle, each once, in
/// declaration order.
pub fn consent_categories(action: &ActionNode) -> Vec<ConsentCategory> {
    let rules = match action {
        ActionNode::List(list) => list
            .actions
            .iter()
            .filter_map(|a| match a {
                ActionNode::Consent(consent) => Some(consent.consents.iter()),
                _ => None,
            })
            .flatten()
            .collect::<Vec<_>>(),
        ActionNode::Consent(consent) => consent.consents.iter().collect(),
        _ => Vec::new(),
    };
    let mut categories = Vec::new();
    for category in rules.into_iter().filter_map(|rule| rule.category) {
        if !categories.contains(&category) {
            categories.push(category);
        }
    }
    categories
}
