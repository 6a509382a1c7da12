//! Shop buying engine
//!
//! The controller runs the scan-and-buy cycle against the vision and input
//! layers; the supervisor owns its worker thread and lifecycle flags.

pub mod controller;
pub mod supervisor;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::geometry::ScreenPoint;
use crate::input::InputError;
use crate::vision::ocr::OcrError;
use crate::vision::CaptureError;

pub use controller::ShopCycleController;
pub use supervisor::{RunFlags, Supervisor};

/// Which shop a purchase target lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShopCategory {
    Seed,
    Egg,
}

impl ShopCategory {
    /// Categorize a target by its display name. A name matching no category
    /// keyword belongs to no shop and is never scanned for.
    pub fn of(target: &str) -> Option<Self> {
        let lower = target.to_lowercase();
        if lower.contains("egg") {
            Some(ShopCategory::Egg)
        } else if lower.contains("seed") || lower.contains("pod") {
            Some(ShopCategory::Seed)
        } else {
            None
        }
    }
}

/// Why a per-item buy loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuyOutcome {
    /// The sold-out marker appeared; the item is exhausted.
    SoldOut,
    /// No buy control could be located near the item.
    NoButton,
    /// The attempt cap was reached without the item selling out.
    CapReached,
    /// The run was stopped mid-loop.
    Interrupted,
}

/// Notable moments in a run, delivered to an optional observer.
#[derive(Debug, Clone)]
pub enum BotEvent {
    /// A purchase target was found in stock.
    Detection { item: String, position: ScreenPoint },
    /// A buy click was issued for the item.
    Purchase { item: String },
    /// Free-form progress message.
    Status(String),
}

/// Observer callback for [`BotEvent`]s.
pub type EventSink = Box<dyn Fn(&BotEvent) + Send>;

/// Session counters, shared between the worker and anyone observing it.
/// Counters accumulate across stop/start within one process.
#[derive(Debug, Default)]
pub struct Stats {
    items_detected: AtomicU64,
    items_purchased: AtomicU64,
    cycles_completed: AtomicU64,
    last_detection: Mutex<Option<Instant>>,
}

/// Point-in-time copy of the session counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub items_detected: u64,
    pub items_purchased: u64,
    pub cycles_completed: u64,
    pub since_last_detection: Option<Duration>,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_detection(&self) {
        self.items_detected.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut last) = self.last_detection.lock() {
            *last = Some(Instant::now());
        }
    }

    pub fn record_purchase(&self) {
        self.items_purchased.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cycle(&self) {
        self.cycles_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let since_last_detection = self
            .last_detection
            .lock()
            .ok()
            .and_then(|last| last.map(|t| t.elapsed()));
        StatsSnapshot {
            items_detected: self.items_detected.load(Ordering::Relaxed),
            items_purchased: self.items_purchased.load(Ordering::Relaxed),
            cycles_completed: self.cycles_completed.load(Ordering::Relaxed),
            since_last_detection,
        }
    }
}

/// Errors surfaced from one shop cycle. The run loop logs these and keeps
/// going; a transient capture or OCR failure must not end the session.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Ocr(#[from] OcrError),
    #[error(transparent)]
    Input(#[from] InputError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_from_target_name() {
        assert_eq!(ShopCategory::of("Mythical Egg"), Some(ShopCategory::Egg));
        assert_eq!(ShopCategory::of("Sunflower Seed"), Some(ShopCategory::Seed));
        assert_eq!(ShopCategory::of("Dawnbinder Pod"), Some(ShopCategory::Seed));
        assert_eq!(ShopCategory::of("Starweaver Pod"), Some(ShopCategory::Seed));
        // A name with no category keyword joins neither scan.
        assert_eq!(ShopCategory::of("Watering Can"), None);
    }

    #[test]
    fn test_stats_counters_accumulate() {
        let stats = Stats::new();
        stats.record_detection();
        stats.record_purchase();
        stats.record_purchase();
        stats.record_cycle();

        let snap = stats.snapshot();
        assert_eq!(snap.items_detected, 1);
        assert_eq!(snap.items_purchased, 2);
        assert_eq!(snap.cycles_completed, 1);
        assert!(snap.since_last_detection.is_some());
    }

    #[test]
    fn test_stats_fresh_snapshot_has_no_detection_time() {
        let snap = Stats::new().snapshot();
        assert_eq!(snap.items_detected, 0);
        assert!(snap.since_last_detection.is_none());
    }
}
