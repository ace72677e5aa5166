mod common;

use common::Fixture;
use consent_core::{ConsentCategory, DeclarativeCmpConfig, RuleCmpConfig};
use consent_engine::{CmpHandler, DeclarativeCmp, HIDDEN_CLASS, RuleCmp};
use consent_snapshot::DomEvent;
use serde_json::json;

const DIALOG: &str = r#"
    <html><body>
      <div id="banner">
        <button id="settings">Settings</button>
        <button id="save">Save</button>
      </div>
      <div id="purposes">
        <input class="toggle" id="storage" type="checkbox">
        <input class="toggle" id="analytics" type="checkbox" checked>
        <button id="unknown-on">On</button>
        <button id="unknown-off">Off</button>
      </div>
    </body></html>
"#;

fn declarative(value: serde_json::Value) -> DeclarativeCmp {
    let config: DeclarativeCmpConfig = serde_json::from_value(value).unwrap();
    DeclarativeCmp::new("banner", config)
}

fn rule_cmp(value: serde_json::Value) -> RuleCmp {
    let config: RuleCmpConfig = serde_json::from_value(value).unwrap();
    RuleCmp::new(config)
}

#[tokio::test(start_paused = true)]
async fn declarative_open_hides_then_opens_options() {
    let fx = Fixture::new(DIALOG);
    let cmp = declarative(json!({
        "detectors": [],
        "methods": [
            { "name": "HIDE_CMP", "action": { "type": "hide", "target": { "selector": "#banner" } } },
            { "name": "OPEN_OPTIONS", "action": { "type": "click", "target": { "selector": "#settings" } } },
            { "name": "SAVE_CONSENT", "action": { "type": "click", "target": { "selector": "#save" } } }
        ]
    }));

    assert!(cmp.open_cmp(&fx.page).await.unwrap());

    let banner = fx.doc.first("#banner").unwrap();
    let settings = fx.doc.first("#settings").unwrap();
    assert_eq!(
        fx.doc.events(),
        vec![
            DomEvent::AddClass(banner, HIDDEN_CLASS.to_string()),
            DomEvent::Click(settings),
        ]
    );
    assert!(!fx.doc.was_clicked("#save"));
}

#[tokio::test(start_paused = true)]
async fn declarative_open_without_methods_still_succeeds() {
    let fx = Fixture::new(DIALOG);
    let cmp = declarative(json!({ "detectors": [], "methods": [] }));

    assert!(cmp.open_cmp(&fx.page).await.unwrap());
    assert!(fx.doc.events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn rule_open_runs_steps_in_order() {
    let fx = Fixture::new(DIALOG);
    let cmp = rule_cmp(json!({
        "name": "banner-rules",
        "openCmp": [{ "click": "#settings" }, { "click": "#save" }]
    }));

    assert!(cmp.open_cmp(&fx.page).await.unwrap());
    assert_eq!(
        fx.doc.clicks(),
        vec![fx.doc.first("#settings").unwrap(), fx.doc.first("#save").unwrap()]
    );
}

#[tokio::test(start_paused = true)]
async fn rule_open_stops_at_failing_step() {
    let fx = Fixture::new(DIALOG);
    let cmp = rule_cmp(json!({
        "name": "banner-rules",
        "openCmp": [{ "click": "#settings" }, { "exists": "#missing" }, { "click": "#save" }]
    }));

    assert!(!cmp.open_cmp(&fx.page).await.unwrap());
    assert!(fx.doc.was_clicked("#settings"));
    assert!(!fx.doc.was_clicked("#save"));
}

#[tokio::test(start_paused = true)]
async fn rule_without_open_steps_reports_false() {
    let fx = Fixture::new(DIALOG);
    let cmp = rule_cmp(json!({ "name": "banner-rules" }));

    assert!(!cmp.open_cmp(&fx.page).await.unwrap());
    assert!(fx.doc.clicks().is_empty());
}

fn consent_dialog() -> DeclarativeCmp {
    declarative(json!({
        "detectors": [],
        "methods": [{
            "name": "DO_CONSENT",
            "action": {
                "type": "list",
                "actions": [
                    {
                        "type": "consent",
                        "consents": [
                            {
                                "type": "D",
                                "matcher": { "type": "checkbox", "target": { "selector": "#storage" } },
                                "toggleAction": { "type": "click", "target": { "selector": "#storage" } }
                            },
                            {
                                "type": "Z",
                                "trueAction": { "type": "click", "target": { "selector": "#unknown-on" } },
                                "falseAction": { "type": "click", "target": { "selector": "#unknown-off" } }
                            }
                        ]
                    },
                    {
                        "type": "consent",
                        "consents": [
                            {
                                "type": "B",
                                "matcher": { "type": "checkbox", "target": { "selector": "#analytics" } },
                                "toggleAction": { "type": "click", "target": { "selector": "#analytics" } }
                            },
                            {
                                "type": "D",
                                "matcher": { "type": "checkbox", "target": { "selector": "#storage" } },
                                "toggleAction": { "type": "click", "target": { "selector": "#storage" } }
                            }
                        ]
                    }
                ]
            }
        }]
    }))
}

#[test]
fn categories_keep_known_codes_once() {
    assert_eq!(
        consent_dialog().consent_categories(),
        vec![ConsentCategory::StorageAccess, ConsentCategory::Analytics]
    );
}

#[tokio::test(start_paused = true)]
async fn unknown_category_is_never_enabled() {
    let fx = Fixture::new(DIALOG);
    let cmp = consent_dialog();

    cmp.execute_method(&fx.page, "DO_CONSENT", &ConsentCategory::ALL)
        .await
        .unwrap();

    assert!(fx.doc.was_clicked("#unknown-off"));
    assert!(!fx.doc.was_clicked("#unknown-on"));
    assert!(fx.doc.was_clicked("#storage"));
    assert!(!fx.doc.was_clicked("#analytics"));
}

#[tokio::test(start_paused = true)]
async fn opt_out_requests_no_category() {
    let fx = Fixture::new(DIALOG);
    let cmp = consent_dialog();

    assert!(cmp.opt_out(&fx.page).await.unwrap());

    assert!(fx.doc.was_clicked("#unknown-off"));
    assert!(fx.doc.was_clicked("#analytics"));
    assert!(!fx.doc.was_clicked("#storage"));
}
