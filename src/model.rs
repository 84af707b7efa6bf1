//! Core data model for todo-ai.
//!
//! Tasks are what the store persists; drafts are what the extractor
//! hands over before defaults are applied.

mod draft;
mod task;

pub use draft::Draft;
pub use task::{DEFAULT_PRIORITY, Task};
