use std::cell::Cell;

use async_trait::async_trait;
use consent_core::{ConsentError, DEFAULT_STEP_TIMEOUT_MS, RunContext};
use consent_engine::{CmpHandler, PageContext, poll};
use futures::future::select_all;
use tracing::debug;
use url::Url;

use crate::ms;

const CCPA_NOTICE_HOST: &str = "ccpa-notice.sp-prod.net";
const CCPA_MANAGER_HOST: &str = "ccpa-pm.sp-prod.net";
const MANAGER_PATH: &str = "/privacy-manager/index.html";

const REJECT_ALL: &str = ".sp_choice_type_REJECT_ALL";
const REJECT_TOGGLE: &str = ".reject-toggle";
const FEATURES: &str = ".pm-features";

/// Which frame of the Sourcepoint message flow we were detected in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Surface {
    #[default]
    Message,
    CcpaNotice,
    CcpaManager,
}

/// Sourcepoint message and privacy-manager iframes. Self-tests are left to
/// the parent frame.
#[derive(Debug, Default)]
pub struct Sourcepoint {
    surface: Cell<Surface>,
}

fn has_param(url: &Url, key: &str) -> bool {
    url.query_pairs().any(|(k, _)| k == key)
}

fn classify(url: &Url) -> Option<Surface> {
    let host = url.host_str().unwrap_or_default();
    if host == CCPA_NOTICE_HOST && has_param(url, "message_id") {
        return Some(Surface::CcpaNotice);
    }
    if host == CCPA_MANAGER_HOST {
        return Some(Surface::CcpaManager);
    }

    let message_page = matches!(url.path(), "/index.html" | MANAGER_PATH);
    let has_id = ["message_id", "requestUUID", "consentUUID"]
        .iter()
        .any(|key| has_param(url, key));
    (message_page && has_id).then_some(Surface::Message)
}

impl Sourcepoint {
    async fn manager_open(page: &PageContext) -> bool {
        Url::parse(&page.url().await).is_ok_and(|url| url.path() == MANAGER_PATH)
    }

    async fn opt_out_ccpa(&self, page: &PageContext) -> bool {
        // two-button toggles, then switches
        page.click(
            ".priv-purpose-container .sp-switch-arrow-block a.neutral.on .right",
            true,
        )
        .await;
        page.click(
            ".priv-purpose-container .sp-switch-arrow-block a.switch-bg.on",
            true,
        )
        .await;
        page.click(".priv-save-btn", false).await
    }
}

#[async_trait(?Send)]
impl CmpHandler for Sourcepoint {
    fn name(&self) -> &str {
        "Sourcepoint-frame"
    }

    fn run_context(&self) -> RunContext {
        RunContext::sub_frame_only()
    }

    fn prehide_selectors(&self) -> Vec<String> {
        vec![
            "div[id^='sp_message_container_'],.message-overlay".to_string(),
            "#sp_privacy_manager_container".to_string(),
        ]
    }

    async fn detect_cmp(&self, page: &PageContext) -> Result<bool, ConsentError> {
        let location = page.url().await;
        let Ok(url) = Url::parse(&location) else {
            debug!(url = %location, "unparseable frame location");
            return Ok(false);
        };
        match classify(&url) {
            Some(surface) => {
                self.surface.set(surface);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn detect_popup(&self, page: &PageContext) -> Result<bool, ConsentError> {
        match self.surface.get() {
            Surface::CcpaNotice => Ok(true),
            Surface::CcpaManager => Ok(page.wait_for_element(".priv-save-btn", 2000).await),
            Surface::Message => {
                page.wait_for_element(
                    ".sp_choice_type_11,.sp_choice_type_12,.sp_choice_type_13,.sp_choice_type_ACCEPT_ALL",
                    2000,
                )
                .await;
                // paywall: opting out would break the page
                Ok(!page.exists(".sp_choice_type_9").await)
            }
        }
    }

    async fn opt_out(&self, page: &PageContext) -> Result<bool, ConsentError> {
        if self.surface.get() == Surface::CcpaManager {
            return Ok(self.opt_out_ccpa(page).await);
        }

        if !Self::manager_open(page).await {
            let actionable = page
                .wait_for_element(".sp_choice_type_12,.sp_choice_type_13", DEFAULT_STEP_TIMEOUT_MS)
                .await;
            if !actionable {
                return Ok(false);
            }
            if !page.exists(".sp_choice_type_12").await {
                // "do not sell" button only
                return Ok(page.click(".sp_choice_type_13", false).await);
            }
            page.click(".sp_choice_type_12", false).await;
            poll(move || Self::manager_open(page), 200, ms(100)).await;
        }

        page.wait_for_element(".type-modal", 20_000).await;

        let probes = [REJECT_ALL, REJECT_TOGGLE, FEATURES]
            .into_iter()
            .enumerate()
            .map(|(path, selector)| {
                Box::pin(async move {
                    page.wait_for_element(selector, 2000)
                        .await
                        .then_some(path)
                })
            });
        let (path, _, _) = select_all(probes).await;
        match path {
            Some(0) => {
                page.wait(1000).await;
                return Ok(page.click(REJECT_ALL, false).await);
            }
            Some(1) => {
                page.click(REJECT_TOGGLE, false).await;
            }
            Some(_) => {
                page.wait_for_element(FEATURES, 10_000).await;
                page.click(".checked > span", true).await;
                page.click(".chevron", false).await;
            }
            None => debug!("no reject path offered"),
        }

        Ok(page.click(".sp_choice_type_SAVE_AND_EXIT", false).await)
    }

    async fn opt_in(&self, page: &PageContext) -> Result<bool, ConsentError> {
        page.wait_for_element(".sp_choice_type_11,.sp_choice_type_ACCEPT_ALL", 2000)
            .await;
        if page.click(".sp_choice_type_11", false).await {
            return Ok(true);
        }
        Ok(page.click(".sp_choice_type_ACCEPT_ALL", false).await)
    }
}
