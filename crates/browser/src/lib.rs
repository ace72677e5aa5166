//! Runs the consent engine against live Chromium pages.

pub mod host;
pub mod shared;
pub mod worker;

pub use host::run_host;
pub use shared::LaunchConfig;
pub use worker::chromium::{ChromiumDocument, ConsentWorker, RunReport};
