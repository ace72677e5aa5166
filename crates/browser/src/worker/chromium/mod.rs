mod document;
mod worker;

pub use document::ChromiumDocument;
pub use worker::{ConsentWorker, RunReport};
