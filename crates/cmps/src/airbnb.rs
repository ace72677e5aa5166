use async_trait::async_trait;
use consent_core::{ConsentError, DEFAULT_STEP_TIMEOUT_MS, RunContext, VisibilityMode};
use consent_engine::{CmpHandler, PageContext, poll};
use tracing::warn;

use crate::ms;

const BANNER: &str = "div[data-testid=main-cookies-banner-container]";
const CHECKED_TOGGLE: &str = "[data-testid=modal-container] button[aria-checked=true]:not([disabled])";

/// Upper bound on toggle clicks; one click may flip several toggles.
const MAX_TOGGLE_CLICKS: usize = 64;

#[derive(Debug, Default)]
pub struct Airbnb;

#[async_trait(?Send)]
impl CmpHandler for Airbnb {
    fn name(&self) -> &str {
        "airbnb"
    }

    fn run_context(&self) -> RunContext {
        RunContext::top_frame_only().with_url_pattern(r"^https://(www\.)?airbnb\.[^/]+/")
    }

    fn prehide_selectors(&self) -> Vec<String> {
        vec![
            BANNER.to_string(),
            r#"div:has(> div:first-child):has(> div:last-child):has(> section [data-testid="strictly-necessary-cookies"])"#
                .to_string(),
        ]
    }

    fn has_self_test(&self) -> bool {
        true
    }

    async fn detect_cmp(&self, page: &PageContext) -> Result<bool, ConsentError> {
        Ok(page.exists(BANNER).await)
    }

    async fn detect_popup(&self, page: &PageContext) -> Result<bool, ConsentError> {
        Ok(page.visible(BANNER, VisibilityMode::Any).await)
    }

    async fn opt_out(&self, page: &PageContext) -> Result<bool, ConsentError> {
        page.wait_for_then_click(
            &format!("{BANNER} button._snbhip0"),
            DEFAULT_STEP_TIMEOUT_MS,
            false,
        )
        .await;

        let mut clicks = 0;
        while let Some(toggle) = page.query(CHECKED_TOGGLE).await.first().copied() {
            if clicks == MAX_TOGGLE_CLICKS {
                warn!(clicks, "toggles keep reporting checked, giving up");
                break;
            }
            page.click_nodes(&[toggle], false).await;
            clicks += 1;
        }

        Ok(page
            .wait_for_then_click("button[data-testid=save-btn]", DEFAULT_STEP_TIMEOUT_MS, false)
            .await)
    }

    async fn opt_in(&self, page: &PageContext) -> Result<bool, ConsentError> {
        Ok(page
            .wait_for_then_click(
                &format!("{BANNER} button._148dgdpk"),
                DEFAULT_STEP_TIMEOUT_MS,
                false,
            )
            .await)
    }

    async fn test(&self, page: &PageContext) -> Result<bool, ConsentError> {
        Ok(poll(
            move || async move { page.cookie().await.contains("OptanonAlertBoxClosed") },
            20,
            ms(200),
        )
        .await)
    }
}
