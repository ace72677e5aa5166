mod common;

use std::time::Duration;

use common::{Fixture, with_host};
use consent_core::{RuleStep, StepCheck, VisibilityMode};
use consent_engine::{PREHIDE_STYLE_ID, STYLE_OVERRIDE_ID, evaluate_step, run_parallel, run_sequential};
use serde_json::json;
use tokio::time::Instant;

const PAGE: &str = r#"
    <html><body>
      <div id="cmp" style="height: 120px">
        <button class="reject">Reject</button>
        <button class="reject">Reject again</button>
        <button id="accept">Accept</button>
      </div>
      <div id="shadow" style="display: none"><span class="ghost">ghost</span></div>
      <span class="mixed">shown</span>
      <span class="mixed" hidden>not shown</span>
    </body></html>
"#;

fn steps(value: serde_json::Value) -> Vec<RuleStep> {
    serde_json::from_value(value).unwrap()
}

#[tokio::test(start_paused = true)]
async fn sequential_short_circuits_on_required_failure() {
    let fx = Fixture::new(PAGE);
    let plan = steps(json!([
        { "exists": "#missing" },
        { "click": "#accept" }
    ]));

    assert!(!run_sequential(&fx.page, &plan).await);
    assert!(!fx.doc.was_clicked("#accept"));
}

#[tokio::test(start_paused = true)]
async fn sequential_skips_optional_failures() {
    let fx = Fixture::new(PAGE);
    let plan = steps(json!([
        { "exists": "#missing", "optional": true },
        { "click": "#accept" }
    ]));

    assert!(run_sequential(&fx.page, &plan).await);
    assert!(fx.doc.was_clicked("#accept"));
}

#[tokio::test(start_paused = true)]
async fn parallel_runs_every_step() {
    let fx = Fixture::new(PAGE);
    let plan = steps(json!([
        { "exists": "#missing" },
        { "click": "#accept" }
    ]));

    assert!(!run_parallel(&fx.page, &plan).await);
    assert!(fx.doc.was_clicked("#accept"));
}

#[tokio::test(start_paused = true)]
async fn multiple_checks_in_one_step_are_and_ed() {
    let mut fx = Fixture::from_doc(
        consent_snapshot::SnapshotDocument::parse(PAGE).with_eval("window.__tcfapi !== undefined", json!(0)),
    );
    let step: RuleStep = serde_json::from_value(json!({
        "exists": "#cmp",
        "eval": "window.__tcfapi !== undefined"
    }))
    .unwrap();

    let requests = fx.take_requests();
    let ok = with_host(fx.doc.clone(), fx.page.bridge(), requests, evaluate_step(&fx.page, &step)).await;
    assert!(!ok);
    assert_eq!(fx.sink.count("evalRequest"), 1);
}

#[tokio::test(start_paused = true)]
async fn eval_without_answer_times_out_to_false() {
    let fx = Fixture::new(PAGE);
    let step = RuleStep::new(StepCheck::Eval { code: "slow()".into() });
    let start = Instant::now();

    assert!(!evaluate_step(&fx.page, &step).await);
    assert_eq!(start.elapsed(), Duration::from_millis(1000));
    assert_eq!(fx.page.bridge().pending_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn conditional_runs_matching_branch() {
    let fx = Fixture::new(PAGE);
    let step: RuleStep = serde_json::from_value(json!({
        "if": { "exists": "#cmp" },
        "then": [{ "click": ".reject", "all": true }],
        "else": [{ "click": "#accept" }]
    }))
    .unwrap();

    assert!(evaluate_step(&fx.page, &step).await);
    assert_eq!(fx.doc.clicks().len(), 2);
    assert!(!fx.doc.was_clicked("#accept"));
}

#[tokio::test(start_paused = true)]
async fn false_condition_without_else_yields_false() {
    let fx = Fixture::new(PAGE);
    let step: RuleStep = serde_json::from_value(json!({
        "if": { "exists": "#missing" },
        "then": [{ "click": "#accept" }]
    }))
    .unwrap();

    assert!(!evaluate_step(&fx.page, &step).await);
    assert!(fx.doc.clicks().is_empty());
}

#[tokio::test(start_paused = true)]
async fn malformed_conditional_is_false_but_sibling_checks_run() {
    let fx = Fixture::new(PAGE);
    let step: RuleStep = serde_json::from_value(json!({
        "click": "#accept",
        "if": { "click": "#cmp" },
        "then": [{ "click": ".reject" }]
    }))
    .unwrap();

    assert!(!evaluate_step(&fx.page, &step).await);
    assert!(fx.doc.was_clicked("#accept"));
    assert!(!fx.doc.was_clicked("#cmp"));
    assert!(!fx.doc.was_clicked(".reject"));
}

#[tokio::test(start_paused = true)]
async fn click_defaults_to_first_match() {
    let fx = Fixture::new(PAGE);
    let step = RuleStep::new(StepCheck::Click { selector: ".reject".into(), all: false });

    assert!(evaluate_step(&fx.page, &step).await);
    assert_eq!(fx.doc.clicks(), vec![fx.doc.first(".reject").unwrap()]);
}

#[tokio::test(start_paused = true)]
async fn visibility_modes() {
    let fx = Fixture::new(PAGE);

    assert!(fx.page.visible(".mixed", VisibilityMode::Any).await);
    assert!(!fx.page.visible(".mixed", VisibilityMode::All).await);
    assert!(!fx.page.visible(".mixed", VisibilityMode::None).await);
    assert!(fx.page.visible(".ghost", VisibilityMode::None).await);
    assert!(fx.page.visible("#missing", VisibilityMode::None).await);
    assert!(!fx.page.visible("#missing", VisibilityMode::Any).await);
}

#[tokio::test(start_paused = true)]
async fn wait_for_polls_until_budget_is_spent() {
    let fx = Fixture::new(PAGE);
    let start = Instant::now();

    assert!(!fx.page.wait_for_element("#late", 1000).await);
    assert_eq!(start.elapsed(), Duration::from_millis(1000));
}

#[tokio::test(start_paused = true)]
async fn wait_for_then_click_clicks_once_present() {
    let fx = Fixture::new(PAGE);

    let step: RuleStep = serde_json::from_value(json!({ "waitForThenClick": "#accept", "timeout": 400 })).unwrap();
    assert!(evaluate_step(&fx.page, &step).await);
    assert!(fx.doc.was_clicked("#accept"));
}

#[tokio::test(start_paused = true)]
async fn wait_for_visible_sees_revealed_element() {
    let fx = Fixture::new(PAGE);
    let doc = fx.doc.clone();

    let reveal = async move {
        tokio::time::sleep(Duration::from_millis(450)).await;
        doc.set_displayed("#shadow", true);
    };
    let (visible, ()) = tokio::join!(fx.page.wait_for_visible(".ghost", 2000, VisibilityMode::Any), reveal);
    assert!(visible);
}

#[tokio::test(start_paused = true)]
async fn hide_and_prehide_use_separate_stylesheets() {
    let fx = Fixture::new(PAGE);
    let step: RuleStep = serde_json::from_value(json!({ "hide": ["#cmp", ".mixed"] })).unwrap();

    assert!(evaluate_step(&fx.page, &step).await);
    assert!(fx.page.prehide(&["#cmp".to_string()]).await);
    assert_eq!(
        fx.doc.style_text(STYLE_OVERRIDE_ID).unwrap(),
        "#cmp,.mixed { display: none !important; z-index: -1 !important; pointer-events: none !important; } "
    );
    assert!(fx.doc.style_text(PREHIDE_STYLE_ID).unwrap().contains("opacity: 0 !important"));

    assert!(fx.page.undo_prehide().await);
    assert!(fx.doc.style_text(PREHIDE_STYLE_ID).is_none());
    assert!(fx.doc.style_text(STYLE_OVERRIDE_ID).is_some());
}

#[tokio::test(start_paused = true)]
async fn empty_hide_list_is_false() {
    let fx = Fixture::new(PAGE);
    let step: RuleStep = serde_json::from_value(json!({ "hide": [] })).unwrap();
    assert!(!evaluate_step(&fx.page, &step).await);
}

#[tokio::test(start_paused = true)]
async fn wait_step_suspends() {
    let fx = Fixture::new(PAGE);
    let start = Instant::now();
    let step: RuleStep = serde_json::from_value(json!({ "wait": 300 })).unwrap();

    assert!(evaluate_step(&fx.page, &step).await);
    assert_eq!(start.elapsed(), Duration::from_millis(300));
}
