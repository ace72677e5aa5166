mod common;

use std::time::Duration;

use common::Fixture;
use consent_core::{ActionNode, ConsentCategory, Matcher, MouseEventKind, Scope};
use consent_engine::{ActionRunner, HIDDEN_CLASS};
use consent_snapshot::{DomEvent, SnapshotDocument};
use serde_json::json;
use tokio::time::Instant;

const SETTINGS: &str = r#"
    <html><body>
      <div id="dialog">
        <h2>Manage purposes</h2>
        <div class="purpose" data-cat="D"><label>Storage</label><input class="toggle" id="storage" type="checkbox"></div>
        <div class="purpose" data-cat="B"><label>Analytics</label><input class="toggle" id="analytics" type="checkbox" checked></div>
        <div class="purpose" data-cat="X"><label>Other</label><input class="toggle" id="other" type="checkbox"></div>
        <button class="save">Save choices</button>
        <button class="save">Save</button>
      </div>
      <div class="vendor"><span class="name">A</span><input type="checkbox" checked></div>
      <div class="vendor"><span class="name">B</span><input type="checkbox" checked></div>
      <div class="vendor"><span class="name">C</span></div>
      <div id="slider" style="left: 10px; top: 20px; width: 40px; height: 20px"></div>
      <div id="rail-end" style="left: 210px; top: 60px; width: 10px; height: 10px"></div>
      <div id="collapsed" style="display: none"><button class="inner">x</button></div>
    </body></html>
"#;

fn action(value: serde_json::Value) -> ActionNode {
    serde_json::from_value(value).unwrap()
}

#[tokio::test(start_paused = true)]
async fn consent_toggles_only_mismatched_categories() {
    let fx = Fixture::new(SETTINGS);
    let node = action(json!({
        "type": "consent",
        "consents": [
            {
                "type": "D",
                "matcher": { "type": "checkbox", "target": { "selector": "#storage" } },
                "toggleAction": { "type": "click", "target": { "selector": "#storage" } }
            },
            {
                "type": "B",
                "matcher": { "type": "checkbox", "target": { "selector": "#analytics" } },
                "toggleAction": { "type": "click", "target": { "selector": "#analytics" } }
            },
            {
                "type": "X",
                "matcher": { "type": "checkbox", "target": { "selector": "#other" } },
                "toggleAction": { "type": "click", "target": { "selector": "#other" } }
            }
        ]
    }));

    ActionRunner::new(&fx.page)
        .execute(&node, &[ConsentCategory::StorageAccess], Scope::Document)
        .await
        .unwrap();

    // analytics is on but not requested, so it is toggled off as well
    assert_eq!(
        fx.doc.clicks(),
        vec![fx.doc.first("#storage").unwrap(), fx.doc.first("#analytics").unwrap()]
    );
}

#[tokio::test(start_paused = true)]
async fn consent_with_matching_state_clicks_nothing_extra() {
    let fx = Fixture::new(SETTINGS);
    let node = action(json!({
        "type": "consent",
        "consents": [
            {
                "type": "D",
                "matcher": { "type": "checkbox", "target": { "selector": "#storage" } },
                "toggleAction": { "type": "click", "target": { "selector": "#storage" } }
            },
            {
                "type": "B",
                "matcher": { "type": "checkbox", "target": { "selector": "#analytics" } },
                "toggleAction": { "type": "click", "target": { "selector": "#analytics" } }
            },
            {
                "type": "X",
                "matcher": { "type": "checkbox", "target": { "selector": "#other" } },
                "toggleAction": { "type": "click", "target": { "selector": "#other" } }
            }
        ]
    }));

    ActionRunner::new(&fx.page)
        .execute(
            &node,
            &[ConsentCategory::StorageAccess, ConsentCategory::Analytics],
            Scope::Document,
        )
        .await
        .unwrap();

    assert_eq!(fx.doc.clicks(), vec![fx.doc.first("#storage").unwrap()]);
}

#[tokio::test(start_paused = true)]
async fn consent_without_toggle_uses_true_and_false_actions() {
    let fx = Fixture::new(SETTINGS);
    let node = action(json!({
        "type": "consent",
        "consents": [
            { "type": "D", "trueAction": { "type": "click", "target": { "selector": "#storage" } } },
            {
                "type": "X",
                "trueAction": { "type": "click", "target": { "selector": "#analytics" } },
                "falseAction": { "type": "click", "target": { "selector": "#other" } }
            }
        ]
    }));

    ActionRunner::new(&fx.page)
        .execute(&node, &[ConsentCategory::StorageAccess], Scope::Document)
        .await
        .unwrap();

    assert!(fx.doc.was_clicked("#storage"));
    assert!(fx.doc.was_clicked("#other"));
    assert!(!fx.doc.was_clicked("#analytics"));
}

#[tokio::test(start_paused = true)]
async fn ifcss_runs_true_action_when_target_is_absent() {
    let fx = Fixture::new(SETTINGS);
    let node = action(json!({
        "type": "ifcss",
        "target": { "selector": "#nope" },
        "trueAction": { "type": "click", "target": { "selector": "#storage" } },
        "falseAction": { "type": "click", "target": { "selector": "#other" } }
    }));

    ActionRunner::new(&fx.page)
        .execute(&node, &[], Scope::Document)
        .await
        .unwrap();

    assert!(fx.doc.was_clicked("#storage"));
    assert!(!fx.doc.was_clicked("#other"));
}

#[tokio::test(start_paused = true)]
async fn waitcss_gives_up_after_its_budget() {
    let fx = Fixture::new(SETTINGS);
    let node = action(json!({
        "type": "waitcss",
        "target": { "selector": "#never" },
        "retries": 2,
        "waitTime": 100
    }));
    let start = Instant::now();

    ActionRunner::new(&fx.page)
        .execute(&node, &[], Scope::Document)
        .await
        .unwrap();

    assert_eq!(start.elapsed(), Duration::from_millis(200));
}

#[tokio::test(start_paused = true)]
async fn negated_waitcss_waits_for_disappearance() {
    let fx = Fixture::new(SETTINGS);
    let doc = fx.doc.clone();
    let node = action(json!({
        "type": "waitcss",
        "target": { "selector": "#dialog" },
        "negated": true
    }));
    let start = Instant::now();

    let remove = async move {
        tokio::time::sleep(Duration::from_millis(600)).await;
        doc.remove("#dialog");
    };
    let runner = ActionRunner::new(&fx.page);
    let (result, ()) = tokio::join!(runner.execute(&node, &[], Scope::Document), remove);

    result.unwrap();
    assert_eq!(start.elapsed(), Duration::from_millis(750));
}

#[tokio::test(start_paused = true)]
async fn foreach_scopes_lookups_to_each_match() {
    let fx = Fixture::new(SETTINGS);
    let node = action(json!({
        "type": "foreach",
        "target": { "selector": ".vendor" },
        "action": {
            "type": "ifcss",
            "target": { "selector": "input[checked]" },
            "falseAction": { "type": "click", "target": { "selector": "input" } }
        }
    }));

    ActionRunner::new(&fx.page)
        .execute(&node, &[], Scope::Document)
        .await
        .unwrap();

    let clicked = fx.doc.clicks();
    assert_eq!(clicked.len(), 2);
    // the lookup after the loop is global again
    let after = fx
        .page
        .resolver()
        .find(&Matcher::css("input"), Scope::Document)
        .await
        .unwrap();
    assert_eq!(after.target, fx.doc.first("#storage"));
}

#[tokio::test(start_paused = true)]
async fn parent_and_text_filters_narrow_targets() {
    let fx = Fixture::new(SETTINGS);
    let node = action(json!({
        "type": "click",
        "parent": { "selector": "#dialog" },
        "target": { "selector": "button", "textFilter": ["choices", "auswahl"] }
    }));

    ActionRunner::new(&fx.page)
        .execute(&node, &[], Scope::Document)
        .await
        .unwrap();

    assert_eq!(fx.doc.clicks(), vec![fx.doc.first(".save").unwrap()]);
}

#[tokio::test(start_paused = true)]
async fn missing_parent_resolves_nothing() {
    let fx = Fixture::new(SETTINGS);
    let matcher: Matcher = serde_json::from_value(json!({
        "parent": { "selector": "#absent" },
        "target": { "selector": "button" }
    }))
    .unwrap();

    let resolved = fx.page.resolver().find(&matcher, Scope::Document).await.unwrap();
    assert_eq!(resolved.target, None);
    assert!(fx.page.resolver().find_all(&matcher, Scope::Document).await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn child_and_display_filters() {
    let fx = Fixture::new(SETTINGS);
    let with_checked: Matcher = serde_json::from_value(json!({
        "target": {
            "selector": ".purpose",
            "childFilter": { "target": { "selector": "input[checked]" } }
        }
    }))
    .unwrap();
    let resolver = fx.page.resolver();

    let all = resolver.find_all(&with_checked, Scope::Document).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].target, fx.doc.first(".purpose[data-cat=B]"));

    let hidden: Matcher = serde_json::from_value(json!({
        "target": { "selector": "div[id]", "displayFilter": false }
    }))
    .unwrap();
    let found = resolver.find_all(&hidden, Scope::Document).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].target, fx.doc.first("#collapsed"));
}

#[tokio::test(start_paused = true)]
async fn iframe_filter_checks_frame_position() {
    let top = Fixture::new(SETTINGS);
    let framed = Fixture::from_doc(SnapshotDocument::parse(SETTINGS).in_frame());
    let matcher: Matcher = serde_json::from_value(json!({
        "target": { "selector": "#dialog", "iframeFilter": true }
    }))
    .unwrap();

    let in_top = top.page.resolver().find(&matcher, Scope::Document).await.unwrap();
    let in_frame = framed.page.resolver().find(&matcher, Scope::Document).await.unwrap();
    assert_eq!(in_top.target, None);
    assert!(in_frame.target.is_some());
}

#[tokio::test(start_paused = true)]
async fn hide_adds_marker_class() {
    let fx = Fixture::new(SETTINGS);
    let node = action(json!({ "type": "hide", "target": { "selector": "#dialog" } }));

    ActionRunner::new(&fx.page)
        .execute(&node, &[], Scope::Document)
        .await
        .unwrap();

    assert!(fx.doc.has_class(fx.doc.first("#dialog").unwrap(), HIDDEN_CLASS));
}

#[tokio::test(start_paused = true)]
async fn slide_drags_along_one_axis() {
    let fx = Fixture::new(SETTINGS);
    let node = action(json!({
        "type": "slide",
        "target": { "selector": "#slider" },
        "dragTarget": { "target": { "selector": "#rail-end" } },
        "axis": "x"
    }));

    ActionRunner::new(&fx.page)
        .execute(&node, &[], Scope::Document)
        .await
        .unwrap();

    let slider = fx.doc.first("#slider").unwrap();
    let mouse: Vec<DomEvent> = fx
        .doc
        .events()
        .into_iter()
        .filter(|e| matches!(e, DomEvent::Mouse { .. }))
        .collect();
    assert_eq!(
        mouse,
        vec![
            DomEvent::Mouse { node: slider, kind: MouseEventKind::Mousedown, x: 30.0, y: 30.0 },
            DomEvent::Mouse { node: slider, kind: MouseEventKind::Mousemove, x: 230.0, y: 30.0 },
            DomEvent::Mouse { node: slider, kind: MouseEventKind::Mouseup, x: 230.0, y: 30.0 },
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn async_eval_reads_result_slot_after_delay() {
    let fx = Fixture::from_doc(
        SnapshotDocument::parse(SETTINGS)
            .with_eval("startCheck()", json!(null))
            .with_eval("window.__consentCheckResult", json!(true)),
    );
    let node = action(json!({ "type": "eval", "code": "startCheck()", "async": true, "timeout": 400 }));
    let start = Instant::now();

    ActionRunner::new(&fx.page)
        .execute(&node, &[], Scope::Document)
        .await
        .unwrap();

    assert_eq!(start.elapsed(), Duration::from_millis(400));
    assert_eq!(
        fx.doc.events(),
        vec![
            DomEvent::Evaluate("startCheck()".into()),
            DomEvent::Evaluate("window.__consentCheckResult".into()),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn failing_eval_does_not_abort_list() {
    let fx = Fixture::new(SETTINGS);
    let node = action(json!({
        "type": "list",
        "actions": [
            { "type": "eval", "code": "throw new Error()" },
            { "type": "click", "target": { "selector": "#other" } },
            { "type": "close" }
        ]
    }));

    ActionRunner::new(&fx.page)
        .execute(&node, &[], Scope::Document)
        .await
        .unwrap();

    assert!(fx.doc.was_clicked("#other"));
    assert!(fx.doc.is_closed());
}
