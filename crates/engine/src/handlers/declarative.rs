use std::collections::HashMap;

use async_trait::async_trait;
use consent_core::{
    ActionNode, ConsentCategory, ConsentError, DeclarativeCmpConfig, METHOD_DO_CONSENT,
    METHOD_HIDE_CMP, METHOD_OPEN_OPTIONS, METHOD_SAVE_CONSENT, PresenceMatcher, RunContext, Scope,
};
use tracing::{debug, warn};

use crate::actions::{ActionRunner, consent_categories};
use crate::handler::CmpHandler;
use crate::page::PageContext;

/// Prefix of every declarative handler name.
pub const DECLARATIVE_PREFIX: &str = "com_";

/// Handler driven by named methods in the generic action language.
pub struct DeclarativeCmp {
    name: String,
    config: DeclarativeCmpConfig,
    methods: HashMap<String, ActionNode>,
}

impl DeclarativeCmp {
    pub fn new(name: &str, config: DeclarativeCmpConfig) -> Self {
        let methods = config
            .methods
            .iter()
            .filter_map(|m| m.action.clone().map(|action| (m.name.clone(), action)))
            .collect();
        Self {
            name: format!("{}{}", DECLARATIVE_PREFIX, name),
            config,
            methods,
        }
    }

    /// Runs a named method. Missing methods are a successful no-op.
    pub async fn execute_method(
        &self,
        page: &PageContext,
        method: &str,
        consents: &[ConsentCategory],
    ) -> Result<(), ConsentError> {
        let Some(action) = self.methods.get(method) else {
            debug!(cmp = %self.name, method, "method not defined, skipping");
            return Ok(());
        };
        ActionRunner::new(page)
            .execute(action, consents, Scope::Document)
            .await
    }

    async fn any_matches<'m, I>(&self, page: &PageContext, groups: I) -> bool
    where
        I: Iterator<Item = &'m [PresenceMatcher]>,
    {
        let resolver = page.resolver();
        for group in groups {
            if group.is_empty() {
                continue;
            }
            let mut all = true;
            for matcher in group {
                match resolver.matches(matcher, Scope::Document).await {
                    Ok(true) => {}
                    Ok(false) => {
                        all = false;
                        break;
                    }
                    Err(err) => {
                        warn!(cmp = %self.name, error = %err, "matcher failed");
                        all = false;
                        break;
                    }
                }
            }
            if all {
                return true;
            }
        }
        false
    }

    async fn run_methods(
        &self,
        page: &PageContext,
        consents: &[ConsentCategory],
    ) -> Result<bool, ConsentError> {
        self.execute_method(page, METHOD_HIDE_CMP, &[]).await?;
        self.execute_method(page, METHOD_OPEN_OPTIONS, &[]).await?;
        self.execute_method(page, METHOD_HIDE_CMP, &[]).await?;
        self.execute_method(page, METHOD_DO_CONSENT, consents).await?;
        self.execute_method(page, METHOD_SAVE_CONSENT, &[]).await?;
        Ok(true)
    }
}

#[async_trait(?Send)]
impl CmpHandler for DeclarativeCmp {
    fn name(&self) -> &str {
        &self.name
    }

    fn run_context(&self) -> RunContext {
        RunContext::anywhere()
    }

    fn consent_categories(&self) -> Vec<ConsentCategory> {
        self.methods
            .get(METHOD_DO_CONSENT)
            .map(consent_categories)
            .unwrap_or_default()
    }

    /// Present when every matcher of at least one detector matches.
    async fn detect_cmp(&self, page: &PageContext) -> Result<bool, ConsentError> {
        let groups = self.config.detectors.iter().map(|d| d.present_matcher.as_slice());
        Ok(self.any_matches(page, groups).await)
    }

    async fn detect_popup(&self, page: &PageContext) -> Result<bool, ConsentError> {
        let groups = self.config.detectors.iter().map(|d| d.showing_matcher.as_slice());
        Ok(self.any_matches(page, groups).await)
    }

    async fn opt_out(&self, page: &PageContext) -> Result<bool, ConsentError> {
        self.run_methods(page, &[]).await
    }

    async fn opt_in(&self, page: &PageContext) -> Result<bool, ConsentError> {
        self.run_methods(page, &ConsentCategory::ALL).await
    }

    async fn open_cmp(&self, page: &PageContext) -> Result<bool, ConsentError> {
        self.execute_method(page, METHOD_HIDE_CMP, &[]).await?;
        self.execute_method(page, METHOD_OPEN_OPTIONS, &[]).await?;
        Ok(true)
    }
}
