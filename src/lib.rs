pub mod core;
pub mod utils;

// Re-export everything from core for ergonomic library use
// Users can write `monforge::config` instead of `monforge::core::config`
pub use crate::core::*;
pub use crate::utils::*;
