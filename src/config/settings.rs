//! Persisted bot configuration
//!
//! A JSON document deep-merged over defaults on load, so a config written
//! by an older build keeps working when new keys appear. Every empirically
//! tuned number (retry caps, settle delays, detection thresholds) lives
//! here rather than as a hard constant; their correct values are tied to
//! the target UI's animation timing and need re-tuning, not redesign.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::geometry::Region;

/// Which shop categories a run scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShopMode {
    Seed,
    Egg,
    Both,
}

impl ShopMode {
    pub fn includes_seed(&self) -> bool {
        matches!(self, ShopMode::Seed | ShopMode::Both)
    }

    pub fn includes_egg(&self) -> bool {
        matches!(self, ShopMode::Egg | ShopMode::Both)
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Screen region the game renders in; `None` captures the full screen.
    pub monitor_region: Option<Region>,
    /// Seconds between shop cycles.
    pub scan_interval: f32,
    /// Seconds between consecutive buy clicks.
    pub click_delay: f32,
    /// Which shop categories to scan.
    pub shop_mode: ShopMode,
    /// Item display names to buy, matched by OCR.
    pub ocr_targets: Vec<String>,
    /// Template name to image path.
    pub templates: BTreeMap<String, String>,
    /// Detection thresholds.
    pub detection: DetectionSettings,
    /// Navigation key bindings.
    pub navigation: NavigationSettings,
    /// Bounded-retry caps.
    pub limits: RetryLimits,
    /// Settle delays and intervals, in seconds.
    pub timings: TimingSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            monitor_region: None,
            scan_interval: 0.5,
            click_delay: 0.1,
            shop_mode: ShopMode::Both,
            ocr_targets: vec![
                "Mythical Egg".to_string(),
                "Sunflower Seed".to_string(),
                "Bamboo Seed".to_string(),
                "Dawnbinder Pod".to_string(),
                "Moonbinder Pod".to_string(),
                "Cactus Seed".to_string(),
                "Starweaver Pod".to_string(),
            ],
            templates: BTreeMap::from([
                ("mythical_egg".to_string(), "templates/mythical_egg.png".to_string()),
                ("mythical_seed".to_string(), "templates/mythical_seed.png".to_string()),
                ("buy_button".to_string(), "templates/buy_button.png".to_string()),
                ("open_egg_shop".to_string(), "templates/open_egg_shop.png".to_string()),
            ]),
            detection: DetectionSettings::default(),
            navigation: NavigationSettings::default(),
            limits: RetryLimits::default(),
            timings: TimingSettings::default(),
        }
    }
}

/// Detection thresholds and markers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionSettings {
    /// Minimum template correlation score.
    pub confidence_threshold: f32,
    /// Minimum pixel distance between two distinct template matches.
    pub match_min_separation: f32,
    /// Token marking an in-stock shop row.
    pub stock_marker: String,
    /// Text shown when an item is exhausted.
    pub sold_out_marker: String,
    /// Maximum vertical distance between a stock marker and the item name.
    pub stock_row_proximity: i32,
    /// How far below a clicked item to accept a buy button, in reference
    /// pixels.
    pub buy_button_max_y_dist: i32,
    /// Horizontal tolerance around a clicked item for its buy button, in
    /// reference pixels.
    pub buy_button_max_x_dist: i32,
    /// Frame height the two distances above were tuned at.
    pub reference_height: u32,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.8,
            match_min_separation: 20.0,
            stock_marker: "STOCK".to_string(),
            sold_out_marker: "NO STOCK".to_string(),
            stock_row_proximity: 60,
            buy_button_max_y_dist: 150,
            buy_button_max_x_dist: 200,
            reference_height: 534,
        }
    }
}

/// Key bindings for shop navigation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationSettings {
    /// Hotkey teleporting to the shop anchor.
    pub teleport_hotkey: String,
    /// Key opening the shop panel.
    pub open_shop_key: String,
    /// Key scrolling the panel up while searching for the egg-shop entry.
    pub scroll_up_key: String,
    /// Mouse-wheel notches per page scroll.
    pub scroll_lines: i32,
}

impl Default for NavigationSettings {
    fn default() -> Self {
        Self {
            teleport_hotkey: "shift+1".to_string(),
            open_shop_key: "space".to_string(),
            scroll_up_key: "up".to_string(),
            scroll_lines: 5,
        }
    }
}

/// Caps on the bounded retry loops.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryLimits {
    /// Maximum buy clicks per item before giving up.
    pub max_buy_attempts: u32,
    /// Maximum shop pages scanned per category.
    pub max_scroll_pages: u32,
    /// Maximum scroll-up presses while searching for the egg-shop entry.
    pub egg_shop_search_scrolls: u32,
}

impl Default for RetryLimits {
    fn default() -> Self {
        Self {
            max_buy_attempts: 50,
            max_scroll_pages: 25,
            egg_shop_search_scrolls: 10,
        }
    }
}

/// Settle delays, in seconds. These are UI-animation waits, not polls;
/// animations are assumed to finish within a fixed budget because the game
/// exposes no reliable "panel open" signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingSettings {
    /// Grace period after start for the operator to focus the game window.
    pub startup_delay: f32,
    /// Wait after clicking the region center for focus.
    pub focus_wait: f32,
    /// Wait after the teleport hotkey.
    pub teleport_wait: f32,
    /// Wait after opening a shop panel.
    pub shop_open_wait: f32,
    /// Wait for an item's accordion to expand after clicking it.
    pub accordion_wait: f32,
    /// Wait after a page scroll.
    pub scroll_settle: f32,
    /// Poll interval while paused.
    pub pause_poll: f32,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            startup_delay: 3.0,
            focus_wait: 0.5,
            teleport_wait: 1.0,
            shop_open_wait: 1.5,
            accordion_wait: 0.5,
            scroll_settle: 0.3,
            pause_poll: 0.1,
        }
    }
}

impl Config {
    /// Load the config from `path`, deep-merging the document over the
    /// defaults. A missing file yields the defaults; an unparseable file
    /// logs a warning and yields the defaults rather than aborting.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            log::info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let text = fs::read_to_string(path)?;
        let loaded: Value = match serde_json::from_str(&text) {
            Ok(v) => v,
            Err(e) => {
                log::warn!("Invalid config file {}: {e}; using defaults", path.display());
                return Ok(Self::default());
            }
        };

        let defaults = serde_json::to_value(Self::default())?;
        let merged = deep_merge(defaults, loaded);
        Ok(serde_json::from_value(merged)?)
    }

    /// Write the config to `path` as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), text)?;
        Ok(())
    }

    /// Update the monitor region and persist the change.
    pub fn set_monitor_region(
        &mut self,
        region: Region,
        path: impl Into<PathBuf>,
    ) -> Result<(), ConfigError> {
        self.monitor_region = Some(region);
        self.save(path.into())
    }
}

/// Recursively merge `overlay` onto `base`; objects merge per key,
/// everything else is replaced by the overlay value.
fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (_, overlay) => overlay,
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config format error: {0}")]
    Format(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.limits.max_buy_attempts, 50);
        assert_eq!(config.limits.max_scroll_pages, 25);
        assert!((config.detection.confidence_threshold - 0.8).abs() < f32::EPSILON);
        assert_eq!(config.shop_mode, ShopMode::Both);
        assert!(config.monitor_region.is_none());
    }

    #[test]
    fn test_deep_merge_keeps_unset_nested_keys() {
        let base = serde_json::to_value(Config::default()).unwrap();
        let overlay: Value =
            serde_json::from_str(r#"{"limits": {"max_buy_attempts": 10}}"#).unwrap();
        let merged: Config = serde_json::from_value(deep_merge(base, overlay)).unwrap();
        assert_eq!(merged.limits.max_buy_attempts, 10);
        // Sibling keys in the same nested object survive.
        assert_eq!(merged.limits.max_scroll_pages, 25);
        assert!((merged.timings.shop_open_wait - 1.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let config = Config::load("/nonexistent/config.json").unwrap();
        assert_eq!(config.limits.max_buy_attempts, 50);
    }

    #[test]
    fn test_load_invalid_json_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{not json").unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.shop_mode, ShopMode::Both);
    }

    #[test]
    fn test_save_and_reload_region() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = Config::default();
        config
            .set_monitor_region(Region::new(271, 87, 645, 534), &path)
            .unwrap();

        let reloaded = Config::load(&path).unwrap();
        assert_eq!(reloaded.monitor_region, Some(Region::new(271, 87, 645, 534)));
    }

    #[test]
    fn test_shop_mode_categories() {
        assert!(ShopMode::Both.includes_seed());
        assert!(ShopMode::Both.includes_egg());
        assert!(ShopMode::Seed.includes_seed());
        assert!(!ShopMode::Seed.includes_egg());
        assert!(!ShopMode::Egg.includes_seed());
    }
}
