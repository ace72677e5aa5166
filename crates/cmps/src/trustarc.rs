use std::cell::Cell;

use async_trait::async_trait;
use consent_core::{ConsentError, HideMethod, NodeId, RunContext, VisibilityMode};
use consent_engine::{CmpHandler, PageContext, poll};
use tracing::debug;

use crate::ms;

const SETTINGS_BUTTON: &str = "#truste-show-consent";
const SHORTCUT_OPT_OUT: &str = "#truste-consent-required";
const SHORTCUT_OPT_IN: &str = "#truste-consent-button";
const POPUP_CONTENT: &str = "#truste-consent-content";
const BANNER_OVERLAY: &str = "#trustarc-banner-overlay";
const BANNER_CONTAINER: &str = "#truste-consent-track";

/// TrustArc banner in the top frame. Without a "required only" shortcut the
/// opt-out just opens the preference frame, which [`TrustArcFrame`] handles.
#[derive(Debug, Default)]
pub struct TrustArcTop {
    shortcut: Cell<Option<NodeId>>,
    opt_in_done: Cell<bool>,
}

#[async_trait(?Send)]
impl CmpHandler for TrustArcTop {
    fn name(&self) -> &str {
        "TrustArc-top"
    }

    fn run_context(&self) -> RunContext {
        RunContext::top_frame_only()
    }

    fn prehide_selectors(&self) -> Vec<String> {
        vec![
            ".trustarc-banner-container".to_string(),
            format!(".truste_popframe,.truste_overlay,.truste_box_overlay,{BANNER_CONTAINER}"),
        ]
    }

    fn is_intermediate(&self) -> bool {
        !self.opt_in_done.get() && self.shortcut.get().is_none()
    }

    async fn detect_cmp(&self, page: &PageContext) -> Result<bool, ConsentError> {
        let found = page
            .exists(&format!("{SETTINGS_BUTTON},{BANNER_CONTAINER}"))
            .await;
        if found {
            self.shortcut
                .set(page.query(SHORTCUT_OPT_OUT).await.first().copied());
        }
        Ok(found)
    }

    async fn detect_popup(&self, page: &PageContext) -> Result<bool, ConsentError> {
        Ok(page
            .visible(
                &format!("{POPUP_CONTENT},{BANNER_OVERLAY},{BANNER_CONTAINER}"),
                VisibilityMode::All,
            )
            .await)
    }

    async fn opt_out(&self, page: &PageContext) -> Result<bool, ConsentError> {
        if let Some(shortcut) = self.shortcut.get() {
            page.click_nodes(&[shortcut], false).await;
            return Ok(true);
        }

        let overlays = [".truste_popframe", ".truste_overlay", ".truste_box_overlay", BANNER_CONTAINER]
            .map(String::from);
        page.hide(&overlays, HideMethod::Display).await;
        page.click(SETTINGS_BUTTON, false).await;
        Ok(true)
    }

    async fn opt_in(&self, page: &PageContext) -> Result<bool, ConsentError> {
        self.opt_in_done.set(true);
        Ok(page.click(SHORTCUT_OPT_IN, false).await)
    }

    async fn open_cmp(&self, _page: &PageContext) -> Result<bool, ConsentError> {
        Ok(true)
    }
}

const FRAME_CLOSE: &str = "#gwt-debug-close_id";

/// The TrustArc preference manager, loaded in its own iframe.
#[derive(Debug, Default)]
pub struct TrustArcFrame;

impl TrustArcFrame {
    async fn navigate_to_settings(&self, page: &PageContext) -> bool {
        poll(
            move || async move {
                page.exists(".shp").await
                    || page.visible(".advance", VisibilityMode::Any).await
                    || page.exists(".switch span:first-child").await
            },
            10,
            ms(500),
        )
        .await;

        // splash screen
        if page.exists(".shp").await {
            page.click(".shp", false).await;
        }
        page.wait_for_element(".prefPanel", 5000).await;
        if page.visible(".advance", VisibilityMode::Any).await {
            page.click(".advance", false).await;
        }

        poll(
            move || page.visible(".switch span:first-child", VisibilityMode::Any),
            5,
            ms(1000),
        )
        .await
    }

    /// The frame usually closes itself after submitting.
    async fn close_if_still_open(&self, page: &PageContext) {
        if page.click(FRAME_CLOSE, false).await {
            debug!("closed preference frame manually");
        }
    }
}

#[async_trait(?Send)]
impl CmpHandler for TrustArcFrame {
    fn name(&self) -> &str {
        "TrustArc-frame"
    }

    fn run_context(&self) -> RunContext {
        RunContext::sub_frame_only().with_url_pattern(r"^https://consent-pref\.trustarc\.com/\?")
    }

    async fn detect_cmp(&self, _page: &PageContext) -> Result<bool, ConsentError> {
        Ok(true)
    }

    async fn detect_popup(&self, page: &PageContext) -> Result<bool, ConsentError> {
        Ok(page.visible("#defaultpreferencemanager", VisibilityMode::Any).await
            && page.visible(".mainContent", VisibilityMode::Any).await)
    }

    async fn opt_out(&self, page: &PageContext) -> Result<bool, ConsentError> {
        poll(
            move || async move {
                page.doc()
                    .ready_state()
                    .await
                    .is_ok_and(|state| state == "complete")
            },
            20,
            ms(100),
        )
        .await;
        page.wait_for_element(".mainContent[aria-hidden=false]", 5000)
            .await;

        if page.click(".rejectAll", false).await {
            return Ok(true);
        }
        if page.exists(".prefPanel").await {
            page.wait_for_element(r#".prefPanel[style="visibility: visible;"]"#, 3000)
                .await;
        }
        if page.click("#catDetails0", false).await {
            page.click(".submit", false).await;
            return Ok(true);
        }
        if page.click(".required", false).await {
            return Ok(true);
        }

        self.navigate_to_settings(page).await;
        page.click(".switch span:nth-child(1):not(.active)", true)
            .await;
        page.click(".submit", false).await;
        self.close_if_still_open(page).await;
        Ok(true)
    }

    async fn opt_in(&self, page: &PageContext) -> Result<bool, ConsentError> {
        if page.click(".call", false).await {
            return Ok(true);
        }

        self.navigate_to_settings(page).await;
        page.click(".switch span:nth-child(2)", true).await;
        page.click(".submit", false).await;
        self.close_if_still_open(page).await;
        Ok(true)
    }
}
