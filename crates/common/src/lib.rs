//! Slidecast Common Utilities
//!
//! Shared infrastructure for all slidecast crates:
//! - Error taxonomy and result aliases
//! - Run clock
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
