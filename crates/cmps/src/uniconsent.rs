use async_trait::async_trait;
use consent_core::{ConsentError, DEFAULT_STEP_TIMEOUT_MS, VisibilityMode};
use consent_engine::{CmpHandler, PageContext};

const BOX: &str = ".unic .unic-box,.unic .unic-bar";
const BUTTONS: &str = ".unic button";
const CHECKBOXES: &str = ".unic input[type=checkbox]";

const MANAGE_LABELS: &[&str] = &["Manage Options", "Optionen verwalten"];
const SAVE_LABELS: &[&str] = &["Confirm Choices", "Save Choices", "Auswahl speichern"];

/// UniConsent. Its buttons carry no stable classes, so they are matched by
/// their (English or German) label.
#[derive(Debug, Default)]
pub struct Uniconsent;

async fn labelled(page: &PageContext, labels: &[&str]) -> Vec<consent_core::NodeId> {
    let mut found = Vec::new();
    for button in page.query(BUTTONS).await {
        let text = page.text_of(button).await;
        if labels.iter().any(|label| text.contains(label)) {
            found.push(button);
        }
    }
    found
}

#[async_trait(?Send)]
impl CmpHandler for Uniconsent {
    fn name(&self) -> &str {
        "Uniconsent"
    }

    fn prehide_selectors(&self) -> Vec<String> {
        vec![".unic".to_string(), ".modal:has(.unic)".to_string()]
    }

    fn has_self_test(&self) -> bool {
        true
    }

    async fn detect_cmp(&self, page: &PageContext) -> Result<bool, ConsentError> {
        Ok(page.exists(BOX).await)
    }

    async fn detect_popup(&self, page: &PageContext) -> Result<bool, ConsentError> {
        Ok(page.visible(BOX, VisibilityMode::Any).await)
    }

    async fn opt_out(&self, page: &PageContext) -> Result<bool, ConsentError> {
        page.wait_for_element(BUTTONS, 1000).await;
        let manage = labelled(page, MANAGE_LABELS).await;
        page.click_nodes(&manage, true).await;

        if !page.wait_for_element(CHECKBOXES, 1000).await {
            return Ok(false);
        }
        page.wait_for_element(BUTTONS, 1000).await;
        for checkbox in page.query(CHECKBOXES).await {
            if page.is_checked(checkbox).await {
                page.click_nodes(&[checkbox], false).await;
            }
        }

        match labelled(page, SAVE_LABELS).await.first() {
            Some(save) => {
                page.click_nodes(&[*save], false).await;
                // let the popup close
                page.wait(500).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn opt_in(&self, page: &PageContext) -> Result<bool, ConsentError> {
        Ok(page
            .wait_for_then_click(".unic #unic-agree", DEFAULT_STEP_TIMEOUT_MS, false)
            .await)
    }

    async fn test(&self, page: &PageContext) -> Result<bool, ConsentError> {
        page.wait(1000).await;
        Ok(!page.exists(BOX).await)
    }
}
