use regex::Regex;
use serde::Deserialize;
use tracing::warn;

use crate::RuleError;

/// Which browsing contexts a handler may run in. Evaluated before any
/// detection call.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunContext {
    #[serde(rename = "main", alias = "allowInTopFrame")]
    pub allow_in_top_frame: bool,
    #[serde(rename = "frame", alias = "allowInSubFrame")]
    pub allow_in_sub_frame: bool,
    pub url_pattern: Option<String>,
}

impl Default for RunContext {
    fn default() -> Self {
        Self {
            allow_in_top_frame: true,
            allow_in_sub_frame: false,
            url_pattern: None,
        }
    }
}

impl RunContext {
    pub fn top_frame_only() -> Self {
        Self::default()
    }

    pub fn sub_frame_only() -> Self {
        Self {
            allow_in_top_frame: false,
            allow_in_sub_frame: true,
            url_pattern: None,
        }
    }

    /// Runs in every frame, whatever the url.
    pub fn anywhere() -> Self {
        Self {
            allow_in_top_frame: true,
            allow_in_sub_frame: true,
            url_pattern: None,
        }
    }

    pub fn with_url_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.url_pattern = Some(pattern.into());
        self
    }

    pub fn validate(&self, name: &str) -> Result<(), RuleError> {
        match self.url_pattern.as_deref() {
            Some(pattern) if !pattern.is_empty() => Regex::new(pattern)
                .map(|_| ())
                .map_err(|source| RuleError::UrlPattern {
                    name: name.to_string(),
                    source,
                }),
            _ => Ok(()),
        }
    }

    /// Whether a handler with this context may run in the current frame.
    pub fn allows(&self, is_top_frame: bool, url: &str) -> bool {
        if is_top_frame && !self.allow_in_top_frame {
            return false;
        }
        if !is_top_frame && !self.allow_in_sub_frame {
            return false;
        }
        match self.url_pattern.as_deref() {
            Some(pattern) if !pattern.is_empty() => match Regex::new(pattern) {
                Ok(re) => re.is_match(url),
                Err(err) => {
                    warn!(pattern, error = %err, "ignoring handler with invalid url pattern");
                    false
                }
            },
            _ => true,
        }
    }
}
