use async_trait::async_trait;
use consent_core::{ConsentError, DEFAULT_STEP_TIMEOUT_MS, Scope, VisibilityMode};
use consent_engine::{CmpHandler, PageContext, poll};
use tracing::debug;

use crate::ms;

const RECEPTACLE: &str = ".cmp-root .cmp-receptacle";
const SECONDARY_BUTTON: &str = ".cmp-main-button:not(.cmp-main-button--primary)";
const ACTIVE_CONTENT: &str = ".cmp-accordion-item-content.cmp-active";

/// Conversant. Opt-out walks every accordion item of the first tab and
/// denies each purpose inside it.
#[derive(Debug, Default)]
pub struct Conversant;

impl Conversant {
    async fn deny_item(&self, page: &PageContext, item: consent_core::NodeId) {
        let item_scope = Scope::Node(item);
        let titles = page
            .query_in(item_scope, ".cmp-accordion-item-title")
            .await;
        page.click_nodes(&titles, false).await;

        poll(
            move || async move { !page.query_in(item_scope, ACTIVE_CONTENT).await.is_empty() },
            10,
            ms(50),
        )
        .await;
        let Some(content) = page
            .query_in(item_scope, ACTIVE_CONTENT)
            .await
            .first()
            .copied()
        else {
            debug!(item = %item, "accordion item did not expand");
            return;
        };

        let content = Scope::Node(content);
        for selector in [
            ".cmp-toggle-actions .cmp-toggle-deny:not(.cmp-toggle-deny--active)",
            ".cmp-toggle-actions .cmp-toggle-checkbox:not(.cmp-toggle-checkbox--active)",
        ] {
            let toggles = page.query_in(content, selector).await;
            page.click_nodes(&toggles, true).await;
        }
    }
}

#[async_trait(?Send)]
impl CmpHandler for Conversant {
    fn name(&self) -> &str {
        "Conversant"
    }

    fn prehide_selectors(&self) -> Vec<String> {
        vec![".cmp-root".to_string()]
    }

    fn has_self_test(&self) -> bool {
        true
    }

    async fn detect_cmp(&self, page: &PageContext) -> Result<bool, ConsentError> {
        Ok(page.exists(RECEPTACLE).await)
    }

    async fn detect_popup(&self, page: &PageContext) -> Result<bool, ConsentError> {
        Ok(page.visible(RECEPTACLE, VisibilityMode::Any).await)
    }

    async fn opt_out(&self, page: &PageContext) -> Result<bool, ConsentError> {
        if !page
            .wait_for_then_click(SECONDARY_BUTTON, DEFAULT_STEP_TIMEOUT_MS, false)
            .await
        {
            return Ok(false);
        }
        if !page
            .wait_for_element(".cmp-view-tab-tabs", DEFAULT_STEP_TIMEOUT_MS)
            .await
        {
            return Ok(false);
        }
        page.wait_for_then_click(".cmp-view-tab-tabs > :first-child", DEFAULT_STEP_TIMEOUT_MS, false)
            .await;
        page.wait_for_then_click(
            ".cmp-view-tab-tabs > .cmp-view-tab--active:first-child",
            DEFAULT_STEP_TIMEOUT_MS,
            false,
        )
        .await;

        for item in page.query(".cmp-accordion-item").await {
            self.deny_item(page, item).await;
        }

        page.click(SECONDARY_BUTTON, false).await;
        Ok(true)
    }

    async fn opt_in(&self, page: &PageContext) -> Result<bool, ConsentError> {
        Ok(page
            .wait_for_then_click(
                ".cmp-main-button.cmp-main-button--primary",
                DEFAULT_STEP_TIMEOUT_MS,
                false,
            )
            .await)
    }

    async fn test(&self, page: &PageContext) -> Result<bool, ConsentError> {
        Ok(page.cookie().await.contains("cmp-data=0"))
    }
}
