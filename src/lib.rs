//! Shop Sniper - screen-vision auto-buyer for rare shop items
//!
//! Watches a configured screen region of a browser-rendered game, finds
//! in-stock shop rows with word-level OCR, and drives the mouse and
//! keyboard to buy configured rare items the moment they restock.
//! Detection combines template matching, OCR text location and HSV
//! color-blob detection; input is synthesized at the OS level, so the
//! game itself needs no modification.
//!
//! ## Resilience
//!
//! Nothing here is ever fatal past startup: missing template assets
//! degrade detection, OCR misses read as "not currently present", and a
//! failed shop cycle is logged and retried from the top on the next scan
//! interval.

pub mod buyer;
pub mod calibrate;
pub mod config;
pub mod geometry;
pub mod input;
pub mod vision;

pub use buyer::{
    BotEvent, RunFlags, ShopCycleController, Stats, StatsSnapshot, Supervisor,
};
pub use config::{Config, ConfigError, ShopMode};
