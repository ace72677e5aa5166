use async_trait::async_trait;
use consent_core::{ConsentError, HideMethod, VisibilityMode};
use consent_engine::{CmpHandler, PageContext};

const BANNER: &str = "#_evidon_banner";

#[derive(Debug, Default)]
pub struct Evidon;

#[async_trait(?Send)]
impl CmpHandler for Evidon {
    fn name(&self) -> &str {
        "Evidon"
    }

    async fn detect_cmp(&self, page: &PageContext) -> Result<bool, ConsentError> {
        Ok(page.exists(BANNER).await)
    }

    async fn detect_popup(&self, page: &PageContext) -> Result<bool, ConsentError> {
        Ok(page.visible(BANNER, VisibilityMode::Any).await)
    }

    async fn opt_out(&self, page: &PageContext) -> Result<bool, ConsentError> {
        if page.click("#_evidon-decline-button", false).await {
            return Ok(true);
        }

        let dialog = ["#evidon-prefdiag-overlay", "#evidon-prefdiag-background"].map(String::from);
        page.hide(&dialog, HideMethod::Display).await;
        page.click("#_evidon-option-button", false).await;
        page.wait_for_element("#evidon-prefdiag-overlay", 5000)
            .await;
        page.click("#evidon-prefdiag-decline", false).await;
        Ok(true)
    }

    async fn opt_in(&self, page: &PageContext) -> Result<bool, ConsentError> {
        Ok(page.click("#_evidon-accept-button", false).await)
    }
}
