//! Configuration module
//!
//! Persisted JSON settings for regions, timings, retry limits and targets.

pub mod settings;

pub use settings::{Config, ConfigError, ShopMode};
