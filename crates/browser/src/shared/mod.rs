pub mod config;
pub mod errors;
pub mod js;

pub use config::LaunchConfig;
pub use errors::to_dom_error;
