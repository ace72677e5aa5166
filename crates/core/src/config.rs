use serde::{Deserialize, Serialize};

/// What the engine does on its own once a popup is confirmed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AutoAction {
    OptOut,
    OptIn,
    /// Leave the decision to whoever sends `optIn`/`optOut` later
    #[default]
    #[serde(alias = "none")]
    DoNothing,
}

/// Runtime configuration delivered with `initResponse`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub enabled: bool,
    pub auto_action: AutoAction,
    /// Handler names excluded from detection
    #[serde(alias = "disabledNames")]
    pub disabled_cmps: Vec<String>,
    pub enable_prehide: bool,
    pub detect_retries: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_action: AutoAction::DoNothing,
            disabled_cmps: Vec::new(),
            enable_prehide: true,
            detect_retries: 20,
        }
    }
}

impl EngineConfig {
    pub fn with_auto_action(mut self, action: AutoAction) -> Self {
        self.auto_action = action;
        self
    }

    pub fn with_detect_retries(mut self, retries: u32) -> Self {
        self.detect_retries = retries;
        self
    }

    pub fn without_prehide(mut self) -> Self {
        self.enable_prehide = false;
        self
    }

    pub fn is_disabled(&self, name: &str) -> bool {
        self.disabled_cmps.iter().any(|n| n == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_falls_back_to_defaults() {
        let cfg: EngineConfig = serde_json::from_value(serde_json::json!({
            "autoAction": "optOut",
            "disabledNames": ["Evidon"]
        }))
        .unwrap();

        assert!(cfg.enabled);
        assert_eq!(cfg.auto_action, AutoAction::OptOut);
        assert!(cfg.is_disabled("Evidon"));
        assert_eq!(cfg.detect_retries, 20);
    }

    #[test]
    fn do_nothing_round_trips_under_its_wire_name() {
        let value = serde_json::to_value(EngineConfig::default()).unwrap();
        assert_eq!(value["autoAction"], "doNothing");
    }
}
