use std::cell::Cell;

use async_trait::async_trait;
use consent_core::{ConsentError, VisibilityMode};
use consent_engine::{CmpHandler, PageContext};

const MODAL: &str = ".klaro > .cookie-modal";
const DECLINE: &str = ".klaro .cn-decline";

/// Klaro. Remembers whether the settings modal was already open at
/// detection time so opt-out can skip the "learn more" step.
#[derive(Debug, Default)]
pub struct Klaro {
    settings_open: Cell<bool>,
}

#[async_trait(?Send)]
impl CmpHandler for Klaro {
    fn name(&self) -> &str {
        "Klaro"
    }

    fn prehide_selectors(&self) -> Vec<String> {
        vec![".klaro".to_string()]
    }

    fn has_self_test(&self) -> bool {
        true
    }

    async fn detect_cmp(&self, page: &PageContext) -> Result<bool, ConsentError> {
        if page.exists(MODAL).await {
            self.settings_open.set(true);
            return Ok(true);
        }
        Ok(page.exists(".klaro > .cookie-notice").await)
    }

    async fn detect_popup(&self, page: &PageContext) -> Result<bool, ConsentError> {
        Ok(page
            .visible(".klaro > .cookie-notice,.klaro > .cookie-modal", VisibilityMode::Any)
            .await)
    }

    async fn opt_out(&self, page: &PageContext) -> Result<bool, ConsentError> {
        if page.click(DECLINE, false).await {
            return Ok(true);
        }
        if !self.settings_open.get() {
            page.click(".klaro .cn-learn-more", false).await;
            page.wait_for_element(MODAL, 2000).await;
            self.settings_open.set(true);
        }
        if page.click(DECLINE, false).await {
            return Ok(true);
        }

        page.click(".cm-purpose:not(.cm-toggle-all) > input:not(.half-checked)", true)
            .await;
        Ok(page.click(".cm-btn-accept", false).await)
    }

    async fn opt_in(&self, page: &PageContext) -> Result<bool, ConsentError> {
        if page.click(".klaro .cm-btn-accept-all", false).await {
            return Ok(true);
        }
        if self.settings_open.get() {
            page.click(".cm-purpose:not(.cm-toggle-all) > input.half-checked", true)
                .await;
            return Ok(page.click(".cm-btn-accept", false).await);
        }
        Ok(page.click(".klaro .cookie-notice .cm-btn-success", false).await)
    }

    async fn test(&self, page: &PageContext) -> Result<bool, ConsentError> {
        Ok(page
            .eval("klaro.getManager().config.services.every(c => c.required || !klaro.getManager().consents[c.name])")
            .await)
    }
}
