use async_trait::async_trait;
use consent_core::{ConsentError, RuleCmpConfig, RuleStep, RunContext};

use crate::handler::CmpHandler;
use crate::page::PageContext;
use crate::steps::{run_parallel, run_sequential};

/// Handler defined entirely in the rule-step language.
#[derive(Debug, Clone)]
pub struct RuleCmp {
    config: RuleCmpConfig,
}

impl RuleCmp {
    pub fn new(config: RuleCmpConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RuleCmpConfig {
        &self.config
    }
}

async fn sequential_or(page: &PageContext, steps: &Option<Vec<RuleStep>>, absent: bool) -> bool {
    match steps {
        Some(steps) => run_sequential(page, steps).await,
        None => absent,
    }
}

#[async_trait(?Send)]
impl CmpHandler for RuleCmp {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn run_context(&self) -> RunContext {
        self.config.run_context.clone()
    }

    fn prehide_selectors(&self) -> Vec<String> {
        self.config.prehide_selectors.clone()
    }

    fn is_intermediate(&self) -> bool {
        self.config.intermediate
    }

    fn has_self_test(&self) -> bool {
        self.config.test.is_some()
    }

    async fn detect_cmp(&self, page: &PageContext) -> Result<bool, ConsentError> {
        Ok(match &self.config.detect_cmp {
            Some(steps) => run_parallel(page, steps).await,
            None => false,
        })
    }

    async fn detect_popup(&self, page: &PageContext) -> Result<bool, ConsentError> {
        Ok(sequential_or(page, &self.config.detect_popup, false).await)
    }

    async fn opt_out(&self, page: &PageContext) -> Result<bool, ConsentError> {
        Ok(sequential_or(page, &self.config.opt_out, false).await)
    }

    async fn opt_in(&self, page: &PageContext) -> Result<bool, ConsentError> {
        Ok(sequential_or(page, &self.config.opt_in, false).await)
    }

    async fn open_cmp(&self, page: &PageContext) -> Result<bool, ConsentError> {
        Ok(sequential_or(page, &self.config.open_cmp, false).await)
    }

    async fn test(&self, page: &PageContext) -> Result<bool, ConsentError> {
        Ok(sequential_or(page, &self.config.test, true).await)
    }
}
