use async_trait::async_trait;
use consent_core::{ConsentCategory, ConsentError, RunContext};

use crate::page::PageContext;

/// A consent management platform the engine knows how to drive.
///
/// Built-ins, rule-language handlers and declarative handlers all sit behind
/// this one interface; the state machine never looks past it.
#[async_trait(?Send)]
pub trait CmpHandler {
    fn name(&self) -> &str;

    /// Where the handler may run. Top frame only unless overridden.
    fn run_context(&self) -> RunContext {
        RunContext::default()
    }

    fn prehide_selectors(&self) -> Vec<String> {
        Vec::new()
    }

    /// Intermediate handlers only dismiss a first layer; a successful
    /// opt-out does not complete the page.
    fn is_intermediate(&self) -> bool {
        false
    }

    fn has_self_test(&self) -> bool {
        false
    }

    /// Categories this handler can toggle individually.
    fn consent_categories(&self) -> Vec<ConsentCategory> {
        Vec::new()
    }

    /// Is the CMP present on the page at all?
    async fn detect_cmp(&self, page: &PageContext) -> Result<bool, ConsentError>;

    /// Is its popup currently shown?
    async fn detect_popup(&self, _page: &PageContext) -> Result<bool, ConsentError> {
        Ok(false)
    }

    async fn opt_out(&self, page: &PageContext) -> Result<bool, ConsentError>;

    async fn opt_in(&self, page: &PageContext) -> Result<bool, ConsentError>;

    /// Brings up the CMP's settings dialog.
    async fn open_cmp(&self, _page: &PageContext) -> Result<bool, ConsentError> {
        Ok(false)
    }

    /// Verifies a previous opt-out took effect.
    async fn test(&self, _page: &PageContext) -> Result<bool, ConsentError> {
        Ok(true)
    }
}
