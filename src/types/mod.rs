//! Core types

/// Bridge configuration
pub mod config;

#[cfg(test)]
mod tests;

pub use config::{BridgeConfig, BridgeConfigBuilder, ConfigError};
