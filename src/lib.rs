pub mod antibot;
pub mod browser;
pub mod cli;
pub mod core;
pub mod extract;
pub mod fetch;

// --- Primary exports ---
pub use crate::core::config;
pub use crate::core::types;
pub use crate::core::types::*;
