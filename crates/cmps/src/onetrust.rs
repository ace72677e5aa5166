use async_trait::async_trait;
use consent_core::{ConsentError, VisibilityMode};
use consent_engine::{CmpHandler, PageContext, poll};

use crate::ms;

const BANNER: &str = "#onetrust-banner-sdk";
const SAVE: &str = ".save-preference-btn-handler,.js-consent-save";

#[derive(Debug, Default)]
pub struct Onetrust;

#[async_trait(?Send)]
impl CmpHandler for Onetrust {
    fn name(&self) -> &str {
        "Onetrust"
    }

    fn prehide_selectors(&self) -> Vec<String> {
        vec!["#onetrust-banner-sdk,#onetrust-consent-sdk,.onetrust-pc-dark-filter,.js-consent-banner".to_string()]
    }

    fn has_self_test(&self) -> bool {
        true
    }

    async fn detect_cmp(&self, page: &PageContext) -> Result<bool, ConsentError> {
        Ok(page.exists(BANNER).await)
    }

    async fn detect_popup(&self, page: &PageContext) -> Result<bool, ConsentError> {
        Ok(page.visible(BANNER, VisibilityMode::All).await)
    }

    async fn opt_out(&self, page: &PageContext) -> Result<bool, ConsentError> {
        if page.exists("#onetrust-pc-btn-handler").await {
            page.click("#onetrust-pc-btn-handler", false).await;
        } else {
            page.click(".ot-sdk-show-settings,button.js-cookie-settings", false)
                .await;
        }

        page.wait_for_element("#onetrust-consent-sdk", 2000).await;
        page.wait(1000).await;
        page.click(
            "#onetrust-consent-sdk input.category-switch-handler:checked,.js-editor-toggle-state:checked",
            true,
        )
        .await;
        page.wait(1000).await;
        page.wait_for_element(SAVE, 2000).await;
        page.click(SAVE, false).await;

        // the banner lingers for a moment after saving
        poll(move || page.visible(BANNER, VisibilityMode::None), 10, ms(500)).await;
        Ok(true)
    }

    async fn opt_in(&self, page: &PageContext) -> Result<bool, ConsentError> {
        Ok(page
            .click("#onetrust-accept-btn-handler,.js-accept-cookies", false)
            .await)
    }

    async fn test(&self, page: &PageContext) -> Result<bool, ConsentError> {
        Ok(page
            .eval("window.OnetrustActiveGroups.split(',').filter(s => s.length > 0).length <= 1")
            .await)
    }
}
