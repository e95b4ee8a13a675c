//! Schema module - configuration and descriptor types for the engine.

mod config;
mod descriptor;

pub use config::*;
pub use descriptor::*;
