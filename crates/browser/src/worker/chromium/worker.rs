use std::rc::Rc;

use chromiumoxide::browser::{Browser, BrowserConfig as ChromeConfig, HeadlessMode};
use consent_core::{Document, EngineConfig, MessageSink, OutboundMessage, RuleSet};
use consent_engine::{AutoConsent, CmpHandler, Phase, TimeoutConfig};
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::document::ChromiumDocument;
use crate::host::run_host;
use crate::shared::LaunchConfig;

/// Outcome of running the engine against one page.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub url: String,
    pub found_cmp: Option<String>,
    pub phase: Phase,
    pub messages: Vec<OutboundMessage>,
    pub timed_out: bool,
}

/// Launches Chromium and drives the consent engine on the pages it opens.
pub struct ConsentWorker {
    browser: Browser,
    launch: LaunchConfig,
    timings: TimeoutConfig,
}

impl ConsentWorker {
    pub async fn launch(launch: LaunchConfig) -> anyhow::Result<Self> {
        // one profile per instance avoids SingletonLock conflicts
        let profile = std::env::temp_dir().join(format!("consent-pilot-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&profile)?;

        let mut builder = ChromeConfig::builder()
            .headless_mode(if launch.headless { HeadlessMode::True } else { HeadlessMode::False })
            .user_data_dir(profile);
        if let Some((width, height)) = launch.viewport {
            builder = builder.window_size(width, height);
        }
        let chrome_cfg = builder.build().map_err(anyhow::Error::msg)?;

        let (browser, mut handler) = Browser::launch(chrome_cfg).await?;
        tokio::spawn(async move { while handler.next().await.is_some() {} });
        info!(headless = launch.headless, "browser launched");

        Ok(Self {
            browser,
            launch,
            timings: TimeoutConfig::default(),
        })
    }

    pub fn with_timings(mut self, timings: TimeoutConfig) -> Self {
        self.timings = timings;
        self
    }

    /// Opens `url`, runs detection and the configured action, and collects
    /// every message the engine emitted.
    pub async fn run<F>(&self, url: &str, config: EngineConfig, rules: RuleSet, emit: F) -> anyhow::Result<RunReport>
    where
        F: FnMut(&OutboundMessage),
    {
        let page = self.browser.new_page("about:blank").await?;
        tokio::time::timeout(self.launch.navigation, async {
            page.goto(url).await?;
            page.wait_for_navigation().await
        })
        .await
        .map_err(|_| anyhow::anyhow!("navigation to {url} timed out"))??;

        let doc = Rc::new(ChromiumDocument::new(page.clone()));
        let landed = doc.location().await?;
        info!(url = %landed, "page loaded");

        let (tx, rx) = mpsc::unbounded_channel();
        let handlers: Vec<Rc<dyn CmpHandler>> = consent_cmps::builtin_handlers();
        let engine = AutoConsent::new(
            doc.clone() as Rc<dyn Document>,
            Rc::new(tx) as Rc<dyn MessageSink>,
            handlers,
            self.timings.clone(),
        );

        let mut messages = Vec::new();
        let mut emit = emit;
        let hosted = run_host(&engine, doc as Rc<dyn Document>, rx, config, rules, |message| {
            messages.push(message.clone());
            emit(message);
        });
        let timed_out = tokio::time::timeout(self.launch.run_budget, hosted)
            .await
            .is_err();
        if timed_out {
            warn!(url = %landed, "run budget exhausted");
        }

        if let Err(err) = page.close().await {
            warn!(error = %err, "failed to close page");
        }

        Ok(RunReport {
            url: landed,
            found_cmp: engine.found_cmp(),
            phase: engine.phase(),
            messages,
            timed_out,
        })
    }

    pub async fn shutdown(mut self) -> anyhow::Result<()> {
        self.browser.close().await?;
        self.browser.wait().await?;
        Ok(())
    }
}
