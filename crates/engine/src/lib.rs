pub mod actions;
pub mod bridge;
pub mod config;
pub mod handler;
pub mod handlers;
pub mod machine;
pub mod page;
pub mod primitives;
pub mod resolver;
pub mod steps;

pub use actions::{ActionRunner, HIDDEN_CLASS};
pub use bridge::EvalBridge;
pub use config::TimeoutConfig;
pub use handler::CmpHandler;
pub use handlers::{DeclarativeCmp, RuleCmp};
pub use machine::{AutoConsent, GLOBAL_PREHIDE_SELECTORS, Phase};
pub use page::PageContext;
pub use primitives::{PREHIDE_STYLE_ID, STYLE_OVERRIDE_ID, hiding_rule, poll};
pub use resolver::{Resolved, Resolver};
pub use steps::{evaluate_step, run_parallel, run_sequential};
