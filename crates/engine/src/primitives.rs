//! Primitive page actions shared by rule steps and built-in handlers.
//!
//! None of these fail: backend errors are logged and read as `false`.

use std::future::Future;
use std::time::Duration;

use consent_core::{HideMethod, NodeId, Scope, VisibilityMode, is_truthy};
use tracing::{debug, warn};

use crate::page::PageContext;

pub const STYLE_OVERRIDE_ID: &str = "autoconsent-css-rules";
pub const PREHIDE_STYLE_ID: &str = "autoconsent-prehide";

/// CSS rule hiding `selectors`, in the exact shape appended to the override
/// stylesheets.
pub fn hiding_rule(selectors: &[String], method: HideMethod) -> String {
    let snippet = match method {
        HideMethod::Opacity => "opacity: 0",
        HideMethod::Display => "display: none",
    };
    format!(
        "{} {{ {} !important; z-index: -1 !important; pointer-events: none !important; }} ",
        selectors.join(","),
        snippet
    )
}

/// Evaluates `predicate` up to `retries + 1` times with `interval` between
/// attempts and returns the last result.
pub async fn poll<F, Fut>(mut predicate: F, retries: u32, interval: Duration) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let mut remaining = retries;
    loop {
        let result = predicate().await;
        if result || remaining == 0 {
            return result;
        }
        remaining -= 1;
        tokio::time::sleep(interval).await;
    }
}

impl PageContext {
    /// Elements matching `selector` in the whole document.
    pub async fn query(&self, selector: &str) -> Vec<NodeId> {
        self.query_in(Scope::Document, selector).await
    }

    pub async fn query_in(&self, scope: Scope, selector: &str) -> Vec<NodeId> {
        match self.doc().query_all(scope, selector).await {
            Ok(nodes) => nodes,
            Err(err) => {
                debug!(selector, error = %err, "query failed");
                Vec::new()
            }
        }
    }

    pub async fn exists(&self, selector: &str) -> bool {
        !self.query(selector).await.is_empty()
    }

    pub async fn node_visible(&self, node: NodeId) -> bool {
        self.doc().is_visible(node).await.unwrap_or(false)
    }

    pub async fn text_of(&self, node: NodeId) -> String {
        self.doc().text_content(node).await.unwrap_or_default()
    }

    pub async fn is_checked(&self, node: NodeId) -> bool {
        self.doc().is_checked(node).await.unwrap_or(false)
    }

    pub async fn cookie(&self) -> String {
        self.doc().cookie().await.unwrap_or_default()
    }

    pub async fn visible(&self, selector: &str, mode: VisibilityMode) -> bool {
        let nodes = self.query(selector).await;
        let mut results = Vec::with_capacity(nodes.len());
        for node in nodes {
            results.push(self.node_visible(node).await);
        }

        match mode {
            VisibilityMode::None => results.iter().all(|visible| !visible),
            _ if results.is_empty() => false,
            VisibilityMode::Any => results.iter().any(|visible| *visible),
            VisibilityMode::All => results.iter().all(|visible| *visible),
        }
    }

    /// Clicks the first match, or every match with `all`. `true` iff
    /// something matched.
    pub async fn click(&self, selector: &str, all: bool) -> bool {
        let nodes = self.query(selector).await;
        self.click_nodes(&nodes, all).await
    }

    pub async fn click_nodes(&self, nodes: &[NodeId], all: bool) -> bool {
        let targets = if all { nodes } else { &nodes[..nodes.len().min(1)] };
        for node in targets {
            if let Err(err) = self.doc().click(*node).await {
                warn!(node = %node, error = %err, "click failed");
            }
        }
        !nodes.is_empty()
    }

    /// Adds a hiding rule to the persistent override stylesheet.
    pub async fn hide(&self, selectors: &[String], method: HideMethod) -> bool {
        self.append_hiding_rule(STYLE_OVERRIDE_ID, selectors, method)
            .await
    }

    /// Hides `selectors` with opacity in the removable prehide stylesheet.
    pub async fn prehide(&self, selectors: &[String]) -> bool {
        self.append_hiding_rule(PREHIDE_STYLE_ID, selectors, HideMethod::Opacity)
            .await
    }

    pub async fn undo_prehide(&self) -> bool {
        match self.doc().remove_style(PREHIDE_STYLE_ID).await {
            Ok(existed) => existed,
            Err(err) => {
                warn!(error = %err, "failed to remove prehide styles");
                false
            }
        }
    }

    async fn append_hiding_rule(&self, style_id: &str, selectors: &[String], method: HideMethod) -> bool {
        let rule = hiding_rule(selectors, method);
        match self.doc().append_style(style_id, &rule).await {
            Ok(()) => !selectors.is_empty(),
            Err(err) => {
                warn!(style_id, error = %err, "failed to append hiding rule");
                false
            }
        }
    }

    pub async fn wait_for_element(&self, selector: &str, timeout_ms: u64) -> bool {
        let attempts = self.timings().attempts_for(timeout_ms);
        let interval = self.timings().poll_interval;
        poll(move || self.exists(selector), attempts, interval).await
    }

    pub async fn wait_for_visible(&self, selector: &str, timeout_ms: u64, mode: VisibilityMode) -> bool {
        let attempts = self.timings().attempts_for(timeout_ms);
        let interval = self.timings().poll_interval;
        poll(move || self.visible(selector, mode), attempts, interval).await
    }

    /// Waits for `selector`, then clicks regardless of whether it appeared.
    pub async fn wait_for_then_click(&self, selector: &str, timeout_ms: u64, all: bool) -> bool {
        self.wait_for_element(selector, timeout_ms).await;
        self.click(selector, all).await
    }

    pub async fn wait(&self, ms: u64) -> bool {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        true
    }

    /// Truthiness of `code` evaluated in the page's script context.
    pub async fn eval(&self, code: &str) -> bool {
        is_truthy(&self.eval_value(code).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn hiding_rule_text() {
        let rule = hiding_rule(&["#a".into(), ".b".into()], HideMethod::Display);
        assert_eq!(
            rule,
            "#a,.b { display: none !important; z-index: -1 !important; pointer-events: none !important; } "
        );
        assert!(hiding_rule(&[], HideMethod::Opacity).starts_with(" { opacity: 0 !important;"));
    }

    #[tokio::test(start_paused = true)]
    async fn poll_evaluates_retries_plus_one_times() {
        let calls = Cell::new(0);
        let start = tokio::time::Instant::now();

        let result = poll(
            || {
                calls.set(calls.get() + 1);
                async { false }
            },
            3,
            Duration::from_millis(200),
        )
        .await;

        assert!(!result);
        assert_eq!(calls.get(), 4);
        assert_eq!(start.elapsed(), Duration::from_millis(600));
    }

    #[tokio::test(start_paused = true)]
    async fn poll_stops_on_first_success() {
        let calls = Cell::new(0);
        let result = poll(
            || {
                calls.set(calls.get() + 1);
                let done = calls.get() == 2;
                async move { done }
            },
            10,
            Duration::from_millis(50),
        )
        .await;

        assert!(result);
        assert_eq!(calls.get(), 2);
    }
}
