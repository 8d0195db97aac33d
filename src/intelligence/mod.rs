pub mod types;
pub mod reference;
pub mod detection;
pub mod engine;

pub use types::*;
pub use reference::KnowledgeBase;
pub use detection::detect;
pub use engine::{analyze, RuleBasedEngine};
