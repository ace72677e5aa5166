use std::cell::Cell;

use async_trait::async_trait;
use consent_core::{ConsentError, VisibilityMode};
use consent_engine::{CmpHandler, PageContext};

/// consentmanager.net. Prefers the page's `__cmp` API when it is exposed
/// and falls back to clicking through the box otherwise.
#[derive(Debug, Default)]
pub struct ConsentManager {
    api_available: Cell<bool>,
}

#[async_trait(?Send)]
impl CmpHandler for ConsentManager {
    fn name(&self) -> &str {
        "consentmanager.net"
    }

    fn prehide_selectors(&self) -> Vec<String> {
        vec!["#cmpbox,#cmpbox2".to_string()]
    }

    fn has_self_test(&self) -> bool {
        self.api_available.get()
    }

    async fn detect_cmp(&self, page: &PageContext) -> Result<bool, ConsentError> {
        let api = page
            .eval(r#"window.__cmp && typeof __cmp("getCMPData") === "object""#)
            .await;
        self.api_available.set(api);
        if api {
            return Ok(true);
        }
        Ok(page.exists("#cmpbox").await)
    }

    async fn detect_popup(&self, page: &PageContext) -> Result<bool, ConsentError> {
        if self.api_available.get() {
            // the API reports no choice early in the page lifecycle
            page.wait(500).await;
            return Ok(page.eval("!__cmp('consentStatus').userChoiceExists").await);
        }
        Ok(page.visible("#cmpbox .cmpmore", VisibilityMode::Any).await)
    }

    async fn opt_out(&self, page: &PageContext) -> Result<bool, ConsentError> {
        page.wait(500).await;
        if self.api_available.get() {
            return Ok(page.eval("__cmp('setConsent', 0)").await);
        }
        if page.click(".cmpboxbtnno", false).await {
            return Ok(true);
        }
        if page.exists(".cmpwelcomeprpsbtn").await {
            page.click(".cmpwelcomeprpsbtn > a[aria-checked=true]", true)
                .await;
            page.click(".cmpboxbtnsave", false).await;
            return Ok(true);
        }

        page.click(".cmpboxbtncustom", false).await;
        page.wait_for_element(".cmptblbox", 2000).await;
        page.click(".cmptdchoice > a[aria-checked=true]", true)
            .await;
        page.click(".cmpboxbtnyescustomchoices", false).await;
        Ok(true)
    }

    async fn opt_in(&self, page: &PageContext) -> Result<bool, ConsentError> {
        if self.api_available.get() {
            return Ok(page.eval("__cmp('setConsent', 1)").await);
        }
        Ok(page.click(".cmpboxbtnyes", false).await)
    }

    async fn test(&self, page: &PageContext) -> Result<bool, ConsentError> {
        if !self.api_available.get() {
            return Ok(false);
        }
        Ok(page.eval("__cmp('consentStatus').userChoiceExists").await)
    }
}
