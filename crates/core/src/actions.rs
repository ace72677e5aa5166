//! Generic action language (Consent-O-Matic rule format).

use serde::{Deserialize, Deserializer};

/// Consent purposes a `consent` action can toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
pub enum ConsentCategory {
    /// Information storage and access
    #[serde(rename = "D")]
    StorageAccess,
    /// Preferences and functionality
    #[serde(rename = "A")]
    Preferences,
    /// Performance and analytics
    #[serde(rename = "B")]
    Analytics,
    /// Content selection, delivery and reporting
    #[serde(rename = "E")]
    ContentPersonalization,
    /// Ad selection, delivery and reporting
    #[serde(rename = "F")]
    AdPersonalization,
    /// Other purposes
    #[serde(rename = "X")]
    Other,
}

impl ConsentCategory {
    pub const ALL: [ConsentCategory; 6] = [
        ConsentCategory::StorageAccess,
        ConsentCategory::Preferences,
        ConsentCategory::Analytics,
        ConsentCategory::ContentPersonalization,
        ConsentCategory::AdPersonalization,
        ConsentCategory::Other,
    ];

    pub fn code(self) -> &'static str {
        match self {
            ConsentCategory::StorageAccess => "D",
            ConsentCategory::Preferences => "A",
            ConsentCategory::Analytics => "B",
            ConsentCategory::ContentPersonalization => "E",
            ConsentCategory::AdPersonalization => "F",
            ConsentCategory::Other => "X",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }
}

/// Case-insensitive substring filter on `textContent`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TextFilter {
    One(String),
    AnyOf(Vec<String>),
}

impl TextFilter {
    pub fn matches(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        match self {
            TextFilter::One(needle) => text.contains(&needle.to_lowercase()),
            TextFilter::AnyOf(needles) => needles
                .iter()
                .any(|needle| text.contains(&needle.to_lowercase())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StyleFilter {
    #[serde(alias = "option")]
    pub property: String,
    pub value: String,
    #[serde(default)]
    pub negated: bool,
}

impl StyleFilter {
    pub fn keeps(&self, actual: Option<&str>) -> bool {
        let equal = actual == Some(self.value.as_str());
        if self.negated { !equal } else { equal }
    }
}

/// One level of an element lookup.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ElementQuery {
    pub selector: String,
    pub text_filter: Option<TextFilter>,
    pub style_filters: Vec<StyleFilter>,
    /// `true`: element must occupy height, `false`: must not
    pub display_filter: Option<bool>,
    /// `true`: document must be a nested frame, `false`: must be top level
    pub iframe_filter: Option<bool>,
    /// Keeps only elements containing a match for the nested matcher
    pub child_filter: Option<Box<Matcher>>,
}

impl ElementQuery {
    pub fn css(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            ..Self::default()
        }
    }
}

/// Resolver query: a target, optionally searched inside each parent match.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Matcher {
    pub target: ElementQuery,
    #[serde(default)]
    pub parent: Option<ElementQuery>,
}

impl Matcher {
    pub fn css(selector: impl Into<String>) -> Self {
        Self {
            target: ElementQuery::css(selector),
            parent: None,
        }
    }

    pub fn within(mut self, parent: ElementQuery) -> Self {
        self.parent = Some(parent);
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    /// Target is present
    #[default]
    Css,
    /// Target is present and checked
    Checkbox,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PresenceMatcher {
    #[serde(rename = "type", default)]
    pub kind: MatchKind,
    #[serde(flatten)]
    pub matcher: Matcher,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ActionNode {
    Click(ClickAction),
    List(ListAction),
    Consent(ConsentAction),
    Ifcss(IfCssAction),
    Waitcss(WaitCssAction),
    Foreach(ForEachAction),
    Hide(HideAction),
    Slide(SlideAction),
    Close,
    Wait(WaitAction),
    #[serde(rename = "eval")]
    Evaluate(EvalAction),
}

impl ActionNode {
    pub fn kind(&self) -> &'static str {
        match self {
            ActionNode::Click(_) => "click",
            ActionNode::List(_) => "list",
            ActionNode::Consent(_) => "consent",
            ActionNode::Ifcss(_) => "ifcss",
            ActionNode::Waitcss(_) => "waitcss",
            ActionNode::Foreach(_) => "foreach",
            ActionNode::Hide(_) => "hide",
            ActionNode::Slide(_) => "slide",
            ActionNode::Close => "close",
            ActionNode::Wait(_) => "wait",
            ActionNode::Evaluate(_) => "eval",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClickAction {
    #[serde(flatten)]
    pub matcher: Matcher,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ListAction {
    #[serde(default)]
    pub actions: Vec<ActionNode>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConsentAction {
    #[serde(default)]
    pub consents: Vec<ConsentRule>,
}

/// Maps one category onto either a toggle (matcher + toggleAction) or a pair
/// of true/false actions.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentRule {
    /// `None` for codes outside D, A, B, E, F and X; such a rule is never
    /// enabled.
    #[serde(rename = "type", deserialize_with = "known_category")]
    pub category: Option<ConsentCategory>,
    #[serde(default)]
    pub matcher: Option<PresenceMatcher>,
    #[serde(default)]
    pub toggle_action: Option<Box<ActionNode>>,
    #[serde(default)]
    pub true_action: Option<Box<ActionNode>>,
    #[serde(default)]
    pub false_action: Option<Box<ActionNode>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IfCssAction {
    #[serde(flatten)]
    pub matcher: Matcher,
    #[serde(default)]
    pub true_action: Option<Box<ActionNode>>,
    #[serde(default)]
    pub false_action: Option<Box<ActionNode>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitCssAction {
    #[serde(flatten)]
    pub matcher: Matcher,
    #[serde(default)]
    pub retries: Option<u32>,
    #[serde(default)]
    pub wait_time: Option<u64>,
    #[serde(default)]
    pub negated: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ForEachAction {
    #[serde(flatten)]
    pub matcher: Matcher,
    pub action: Box<ActionNode>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HideAction {
    #[serde(flatten)]
    pub matcher: Matcher,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum SlideAxis {
    #[serde(alias = "X")]
    #[serde(rename = "x")]
    X,
    #[serde(alias = "Y")]
    #[serde(rename = "y")]
    Y,
    #[default]
    #[serde(other)]
    Both,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideAction {
    #[serde(flatten)]
    pub matcher: Matcher,
    pub drag_target: Matcher,
    #[serde(default)]
    pub axis: SlideAxis,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitAction {
    #[serde(default)]
    pub wait_time: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EvalAction {
    pub code: String,
    #[serde(rename = "async", default)]
    pub is_async: bool,
    #[serde(default)]
    pub timeout: Option<u64>,
}

pub const METHOD_HIDE_CMP: &str = "HIDE_CMP";
pub const METHOD_OPEN_OPTIONS: &str = "OPEN_OPTIONS";
pub const METHOD_DO_CONSENT: &str = "DO_CONSENT";
pub const METHOD_SAVE_CONSENT: &str = "SAVE_CONSENT";

/// Declarative CMP: how to notice it and the named methods to drive it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeclarativeCmpConfig {
    #[serde(default)]
    pub detectors: Vec<Detector>,
    #[serde(default)]
    pub methods: Vec<MethodConfig>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detector {
    #[serde(deserialize_with = "one_or_many")]
    pub present_matcher: Vec<PresenceMatcher>,
    #[serde(deserialize_with = "one_or_many")]
    pub showing_matcher: Vec<PresenceMatcher>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MethodConfig {
    pub name: String,
    #[serde(default)]
    pub action: Option<ActionNode>,
}

fn known_category<'de, D>(deserializer: D) -> Result<Option<ConsentCategory>, D::Error>
where
    D: Deserializer<'de>,
{
    let code = String::deserialize(deserializer)?;
    Ok(ConsentCategory::from_code(&code))
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<PresenceMatcher>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(PresenceMatcher),
        Many(Vec<PresenceMatcher>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(m) => vec![m],
        OneOrMany::Many(ms) => ms,
    })
}
