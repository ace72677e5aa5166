use std::time::Duration;

/// How the browser is launched and how long a page may take to load.
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    pub headless: bool,
    pub viewport: Option<(u32, u32)>,
    pub navigation: Duration,
    /// Upper bound on one whole page run, detection to self-test.
    pub run_budget: Duration,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport: None,
            navigation: Duration::from_secs(30),
            run_budget: Duration::from_secs(60),
        }
    }
}

impl LaunchConfig {
    pub fn headful(mut self) -> Self {
        self.headless = false;
        self
    }

    pub fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport = Some((width, height));
        self
    }

    pub fn with_navigation(mut self, ms: u64) -> Self {
        self.navigation = Duration::from_millis(ms);
        self
    }

    pub fn with_run_budget(mut self, secs: u64) -> Self {
        self.run_budget = Duration::from_secs(secs);
        self
    }
}
