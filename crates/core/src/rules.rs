//! Rule-step language: the declarative format of hand-authored CMP rules.
//!
//! A step object may carry several leaf checks at once (`exists` together
//! with `eval`, ...). All of them run and their results are AND-ed.

use serde::Deserialize;

use crate::RunContext;

/// How `visible` judges a selector matching several elements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisibilityMode {
    Any,
    #[default]
    All,
    None,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HideMethod {
    #[default]
    Display,
    Opacity,
}

pub const DEFAULT_STEP_TIMEOUT_MS: u64 = 10_000;

/// One leaf check or action of a step.
#[derive(Debug, Clone, PartialEq)]
pub enum StepCheck {
    Exists { selector: String },
    Visible { selector: String, mode: VisibilityMode },
    Eval { code: String },
    WaitFor { selector: String, timeout_ms: u64 },
    WaitForVisible { selector: String, timeout_ms: u64, mode: VisibilityMode },
    Click { selector: String, all: bool },
    WaitForThenClick { selector: String, timeout_ms: u64, all: bool },
    Wait { ms: u64 },
    Hide { selectors: Vec<String>, method: HideMethod },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Conditional {
    pub test: Box<RuleStep>,
    pub then_steps: Vec<RuleStep>,
    pub else_steps: Option<Vec<RuleStep>>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(from = "RawRuleStep")]
pub struct RuleStep {
    pub checks: Vec<StepCheck>,
    pub conditional: Option<Conditional>,
    pub optional: bool,
}

impl RuleStep {
    pub fn new(check: StepCheck) -> Self {
        Self {
            checks: vec![check],
            conditional: None,
            optional: false,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// A conditional test must be an `exists` or `visible` check.
    pub fn is_valid_condition(&self) -> bool {
        self.checks
            .iter()
            .any(|c| matches!(c, StepCheck::Exists { .. } | StepCheck::Visible { .. }))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawRuleStep {
    exists: Option<String>,
    visible: Option<String>,
    check: Option<VisibilityMode>,
    eval: Option<String>,
    wait_for: Option<String>,
    wait_for_visible: Option<String>,
    timeout: Option<u64>,
    click: Option<String>,
    all: bool,
    wait_for_then_click: Option<String>,
    wait: Option<u64>,
    hide: Option<Vec<String>>,
    method: Option<HideMethod>,
    #[serde(rename = "if")]
    condition: Option<Box<RawRuleStep>>,
    then: Option<Vec<RawRuleStep>>,
    #[serde(rename = "else")]
    otherwise: Option<Vec<RawRuleStep>>,
    optional: bool,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

impl From<RawRuleStep> for RuleStep {
    fn from(raw: RawRuleStep) -> Self {
        let timeout_ms = raw.timeout.unwrap_or(DEFAULT_STEP_TIMEOUT_MS);
        let mut checks = Vec::new();

        if let Some(selector) = non_empty(raw.exists) {
            checks.push(StepCheck::Exists { selector });
        }
        if let Some(selector) = non_empty(raw.visible) {
            let mode = raw.check.unwrap_or(VisibilityMode::All);
            checks.push(StepCheck::Visible { selector, mode });
        }
        if let Some(code) = non_empty(raw.eval) {
            checks.push(StepCheck::Eval { code });
        }
        if let Some(selector) = non_empty(raw.wait_for) {
            checks.push(StepCheck::WaitFor { selector, timeout_ms });
        }
        if let Some(selector) = non_empty(raw.wait_for_visible) {
            let mode = raw.check.unwrap_or(VisibilityMode::Any);
            checks.push(StepCheck::WaitForVisible { selector, timeout_ms, mode });
        }
        if let Some(selector) = non_empty(raw.click) {
            checks.push(StepCheck::Click { selector, all: raw.all });
        }
        if let Some(selector) = non_empty(raw.wait_for_then_click) {
            checks.push(StepCheck::WaitForThenClick {
                selector,
                timeout_ms,
                all: raw.all,
            });
        }
        if let Some(ms) = raw.wait.filter(|ms| *ms > 0) {
            checks.push(StepCheck::Wait { ms });
        }
        if let Some(selectors) = raw.hide {
            checks.push(StepCheck::Hide {
                selectors,
                method: raw.method.unwrap_or_default(),
            });
        }

        let conditional = raw.condition.map(|test| Conditional {
            test: Box::new(RuleStep::from(*test)),
            then_steps: raw
                .then
                .unwrap_or_default()
                .into_iter()
                .map(RuleStep::from)
                .collect(),
            else_steps: raw
                .otherwise
                .map(|steps| steps.into_iter().map(RuleStep::from).collect()),
        });

        Self {
            checks,
            conditional,
            optional: raw.optional,
        }
    }
}

/// A hand-authored CMP rule in the rule-step language.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuleCmpConfig {
    pub name: String,
    pub prehide_selectors: Vec<String>,
    pub run_context: RunContext,
    pub intermediate: bool,
    pub detect_cmp: Option<Vec<RuleStep>>,
    pub detect_popup: Option<Vec<RuleStep>>,
    pub opt_out: Option<Vec<RuleStep>>,
    pub opt_in: Option<Vec<RuleStep>>,
    pub open_cmp: Option<Vec<RuleStep>>,
    pub test: Option<Vec<RuleStep>>,
}
