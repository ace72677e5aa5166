mod declarative;
mod rule_cmp;

pub use declarative::{DECLARATIVE_PREFIX, DeclarativeCmp};
pub use rule_cmp::RuleCmp;
