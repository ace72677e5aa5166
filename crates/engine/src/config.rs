use std::time::Duration;

/// Every timing knob of the engine. Budgets are linear: a fixed interval
/// between a bounded number of attempts.
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// Deadline of one cross-context eval request
    pub eval: Duration,
    /// Interval of `waitForSelector`/`waitForVisible` polling
    pub poll_interval: Duration,
    /// Pause between two detection passes
    pub detect_interval: Duration,
    /// Extra `detectPopup` attempts after the first one
    pub popup_retries: u32,
    pub popup_interval: Duration,
    /// Pause after every generic `click`
    pub step_settle: Duration,
    pub waitcss_retries: u32,
    pub waitcss_interval: Duration,
    /// Delay before reading the result slot of an async `eval` action
    pub async_eval_delay: Duration,
    /// Pause between the pointer events of a `slide`
    pub slide_pause: Duration,
    /// Attempts to wait for `readyState` to leave `loading`
    pub ready_retries: u32,
    pub ready_interval: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            eval: Duration::from_millis(1000),
            poll_interval: Duration::from_millis(200),
            detect_interval: Duration::from_millis(500),
            popup_retries: 5,
            popup_interval: Duration::from_millis(500),
            step_settle: Duration::ZERO,
            waitcss_retries: 10,
            waitcss_interval: Duration::from_millis(250),
            async_eval_delay: Duration::from_millis(250),
            slide_pause: Duration::from_millis(10),
            ready_retries: 50,
            ready_interval: Duration::from_millis(100),
        }
    }
}

impl TimeoutConfig {
    pub fn with_eval(mut self, ms: u64) -> Self {
        self.eval = Duration::from_millis(ms);
        self
    }

    pub fn with_popup_budget(mut self, retries: u32, interval_ms: u64) -> Self {
        self.popup_retries = retries;
        self.popup_interval = Duration::from_millis(interval_ms);
        self
    }

    pub fn with_step_settle(mut self, ms: u64) -> Self {
        self.step_settle = Duration::from_millis(ms);
        self
    }

    /// Number of poll attempts a `timeout_ms` budget buys.
    pub fn attempts_for(&self, timeout_ms: u64) -> u32 {
        let interval = u64::try_from(self.poll_interval.as_millis())
            .unwrap_or(u64::MAX)
            .max(1);
        u32::try_from(timeout_ms.div_ceil(interval)).unwrap_or(u32::MAX)
    }

    pub fn fast() -> Self {
        Self {
            eval: Duration::from_millis(500),
            detect_interval: Duration::from_millis(250),
            popup_interval: Duration::from_millis(250),
            ..Self::default()
        }
    }

    pub fn patient() -> Self {
        Self {
            eval: Duration::from_millis(3000),
            detect_interval: Duration::from_millis(1000),
            popup_retries: 10,
            popup_interval: Duration::from_millis(1000),
            ..Self::default()
        }
    }
}
