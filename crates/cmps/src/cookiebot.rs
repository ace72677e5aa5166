use async_trait::async_trait;
use consent_core::ConsentError;
use consent_engine::{CmpHandler, PageContext};

const DIALOG: &str = "#CybotCookiebotDialog,#dtcookie-container,#cookiebanner,#cb-cookiebanner";

/// Cookiebot, including the white-labelled variants some sites ship.
#[derive(Debug, Default)]
pub struct Cookiebot;

#[async_trait(?Send)]
impl CmpHandler for Cookiebot {
    fn name(&self) -> &str {
        "Cybotcookiebot"
    }

    fn prehide_selectors(&self) -> Vec<String> {
        vec!["#CybotCookiebotDialog,#dtcookie-container,#cookiebanner,#cb-cookieoverlay".to_string()]
    }

    fn has_self_test(&self) -> bool {
        true
    }

    async fn detect_cmp(&self, page: &PageContext) -> Result<bool, ConsentError> {
        Ok(page
            .exists("#CybotCookiebotDialogBodyLevelButtonPreferences")
            .await)
    }

    async fn detect_popup(&self, page: &PageContext) -> Result<bool, ConsentError> {
        Ok(page.exists(DIALOG).await)
    }

    async fn opt_out(&self, page: &PageContext) -> Result<bool, ConsentError> {
        if page
            .click(".cookie-alert-extended-detail-link", false)
            .await
        {
            page.wait_for_element(".cookie-alert-configuration", 2000)
                .await;
            page.click(".cookie-alert-configuration-input:checked", true)
                .await;
            page.click(".cookie-alert-extended-button-secondary", false)
                .await;
            return Ok(true);
        }
        if page.exists("#dtcookie-container").await {
            return Ok(page.click(".h-dtcookie-decline", false).await);
        }
        if page.click(".cookiebot__button--settings", false).await {
            return Ok(true);
        }
        if page
            .click("#CybotCookiebotDialogBodyButtonDecline", false)
            .await
        {
            return Ok(true);
        }

        page.click(".cookiebanner__link--details", false).await;
        page.click(
            r#".CybotCookiebotDialogBodyLevelButton:checked:enabled,input[id*="CybotCookiebotDialogBodyLevelButton"]:checked:enabled"#,
            true,
        )
        .await;
        page.click("#CybotCookiebotDialogBodyButtonDecline", false)
            .await;
        page.click("input[id^=CybotCookiebotDialogBodyLevelButton]:checked", true)
            .await;
        if page
            .exists("#CybotCookiebotDialogBodyButtonAcceptSelected")
            .await
        {
            page.click("#CybotCookiebotDialogBodyButtonAcceptSelected", false)
                .await;
        } else {
            page.click(
                "#CybotCookiebotDialogBodyLevelButtonAccept,#CybotCookiebotDialogBodyButtonAccept,#CybotCookiebotDialogBodyLevelButtonLevelOptinAllowallSelection",
                true,
            )
            .await;
        }

        // Custom submit buttons with no usable selector: go through the API.
        if page
            .eval("window.CookieConsent.hasResponse !== true")
            .await
        {
            page.eval("window.Cookiebot.dialog.submitConsent()").await;
            page.wait(500).await;
        }
        // third "confirm settings" modal
        if page.exists("#cb-confirmedSettings").await {
            page.eval("endCookieProcess()").await;
        }
        Ok(true)
    }

    async fn opt_in(&self, page: &PageContext) -> Result<bool, ConsentError> {
        if page.exists("#dtcookie-container").await {
            return Ok(page.click(".h-dtcookie-accept", false).await);
        }
        page.click(".CybotCookiebotDialogBodyLevelButton:not(:checked):enabled", true)
            .await;
        page.click("#CybotCookiebotDialogBodyLevelButtonAccept", false)
            .await;
        page.click("#CybotCookiebotDialogBodyButtonAccept", false)
            .await;
        Ok(true)
    }

    async fn test(&self, page: &PageContext) -> Result<bool, ConsentError> {
        Ok(page.eval("window.CookieConsent.declined === true").await)
    }
}
