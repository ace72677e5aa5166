//! Interpreter for the rule-step language.

use async_recursion::async_recursion;
use consent_core::{RuleStep, StepCheck};
use futures::future::join_all;
use tracing::{debug, error};

use crate::page::PageContext;

async fn run_check(page: &PageContext, check: &StepCheck) -> bool {
    match check {
        StepCheck::Exists { selector } => page.exists(selector).await,
        StepCheck::Visible { selector, mode } => page.visible(selector, *mode).await,
        StepCheck::Eval { code } => page.eval(code).await,
        StepCheck::WaitFor { selector, timeout_ms } => {
            page.wait_for_element(selector, *timeout_ms).await
        }
        StepCheck::WaitForVisible {
            selector,
            timeout_ms,
            mode,
        } => page.wait_for_visible(selector, *timeout_ms, *mode).await,
        StepCheck::Click { selector, all } => page.click(selector, *all).await,
        StepCheck::WaitForThenClick {
            selector,
            timeout_ms,
            all,
        } => page.wait_for_then_click(selector, *timeout_ms, *all).await,
        StepCheck::Wait { ms } => page.wait(*ms).await,
        StepCheck::Hide { selectors, method } => page.hide(selectors, *method).await,
    }
}

/// Runs every check of `step` together with its conditional branch and
/// AND-s the results. A step that produced no result at all is `false`, and
/// so is a malformed conditional, though its sibling checks still run.
#[async_recursion(?Send)]
pub async fn evaluate_step(page: &PageContext, step: &RuleStep) -> bool {
    let checks = join_all(step.checks.iter().map(|check| run_check(page, check)));
    let branch = async {
        let cond = step.conditional.as_ref()?;
        if !cond.test.is_valid_condition() {
            error!(step = ?cond.test, "conditional test must be an `exists` or `visible` check");
            return Some(false);
        }
        if evaluate_step(page, &cond.test).await {
            Some(run_sequential(page, &cond.then_steps).await)
        } else {
            match &cond.else_steps {
                Some(steps) => Some(run_sequential(page, steps).await),
                None => None,
            }
        }
    };

    let (mut results, branch) = futures::join!(checks, branch);
    results.extend(branch);

    if results.is_empty() {
        debug!(step = ?step, "step produced no results");
        return false;
    }
    results.into_iter().all(|ok| ok)
}

/// Runs steps one after another, stopping at the first failing non-optional
/// step.
pub async fn run_sequential(page: &PageContext, steps: &[RuleStep]) -> bool {
    for step in steps {
        if !evaluate_step(page, step).await && !step.optional {
            debug!(step = ?step, "step failed");
            return false;
        }
    }
    true
}

/// Runs all steps concurrently; `true` iff every step succeeded.
pub async fn run_parallel(page: &PageContext, steps: &[RuleStep]) -> bool {
    join_all(steps.iter().map(|step| evaluate_step(page, step)))
        .await
        .into_iter()
        .all(|ok| ok)
}
