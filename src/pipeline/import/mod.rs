pub mod format;
pub mod loader;

pub use format::*;
pub use loader::*;
