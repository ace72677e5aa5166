//! Wire messages between the engine and its host collaborator.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use crate::{DeclarativeCmpConfig, EngineConfig, RuleCmpConfig, RuleError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OutboundMessage {
    Init {
        url: String,
    },
    EvalRequest {
        id: String,
        code: String,
    },
    CmpDetected {
        url: String,
        cmp: String,
    },
    PopupFound {
        cmp: String,
        url: String,
    },
    #[serde(rename_all = "camelCase")]
    OptOutResult {
        cmp: String,
        result: bool,
        schedule_self_test: bool,
        url: String,
    },
    #[serde(rename_all = "camelCase")]
    OptInResult {
        cmp: String,
        result: bool,
        schedule_self_test: bool,
        url: String,
    },
    SelfTestResult {
        cmp: String,
        result: bool,
        url: String,
    },
    AutoconsentDone {
        cmp: String,
        url: String,
    },
    DetectionConflict {
        names: Vec<String>,
    },
}

impl OutboundMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            OutboundMessage::Init { .. } => "init",
            OutboundMessage::EvalRequest { .. } => "evalRequest",
            OutboundMessage::CmpDetected { .. } => "cmpDetected",
            OutboundMessage::PopupFound { .. } => "popupFound",
            OutboundMessage::OptOutResult { .. } => "optOutResult",
            OutboundMessage::OptInResult { .. } => "optInResult",
            OutboundMessage::SelfTestResult { .. } => "selfTestResult",
            OutboundMessage::AutoconsentDone { .. } => "autoconsentDone",
            OutboundMessage::DetectionConflict { .. } => "detectionConflict",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InboundCommand {
    #[serde(rename_all = "camelCase")]
    InitResponse {
        #[serde(default)]
        config: EngineConfig,
        #[serde(default, alias = "rules")]
        rule_set: RuleSet,
    },
    OptIn,
    OptOut,
    SelfTest,
    EvalResponse {
        id: String,
        #[serde(default)]
        result: serde_json::Value,
    },
}

/// Rule data as delivered by the host. Entries stay raw until
/// [`RuleSet::decode`] so one broken rule cannot sink the others.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSet {
    pub consentomatic: BTreeMap<String, serde_json::Value>,
    pub autoconsent: Vec<serde_json::Value>,
}

#[derive(Debug, Default)]
pub struct DecodedRules {
    pub rule_cmps: Vec<RuleCmpConfig>,
    pub declarative: Vec<(String, DeclarativeCmpConfig)>,
    pub errors: Vec<RuleError>,
}

impl RuleSet {
    pub fn decode(&self) -> DecodedRules {
        let mut out = DecodedRules::default();

        for (name, raw) in &self.consentomatic {
            match serde_json::from_value::<DeclarativeCmpConfig>(raw.clone()) {
                Ok(cfg) => out.declarative.push((name.clone(), cfg)),
                Err(source) => out.errors.push(RuleError::Decode {
                    name: name.clone(),
                    source,
                }),
            }
        }

        for (idx, raw) in self.autoconsent.iter().enumerate() {
            let name = raw
                .get("name")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| format!("autoconsent[{}]", idx));
            let decoded = serde_json::from_value::<RuleCmpConfig>(raw.clone())
                .map_err(|source| RuleError::Decode {
                    name: name.clone(),
                    source,
                })
                .and_then(|cfg| cfg.run_context.validate(&name).map(|_| cfg));
            match decoded {
                Ok(cfg) => out.rule_cmps.push(cfg),
                Err(err) => out.errors.push(err),
            }
        }

        out
    }
}

/// Outbound half of the channel to the host.
pub trait MessageSink {
    fn send(&self, message: OutboundMessage);
}

impl MessageSink for mpsc::UnboundedSender<OutboundMessage> {
    fn send(&self, message: OutboundMessage) {
        if let Err(err) = mpsc::UnboundedSender::send(self, message) {
            debug!(kind = err.0.kind(), "host channel closed, dropping message");
        }
    }
}
