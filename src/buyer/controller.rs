//! Shop cycle state machine
//!
//! Drives one scan-and-buy cycle at a time: focus the game, teleport to the
//! shop anchor, open the panel, then page through each enabled shop buying
//! every in-stock target. All vision and input collaborators are injected
//! behind traits so the cycle can run against fakes in tests.
//!
//! A cycle failure is logged and swallowed; the next scan interval restarts
//! navigation from the top, which self-heals transient UI glitches.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::buyer::{BotError, BotEvent, BuyOutcome, EventSink, RunFlags, ShopCategory, Stats};
use crate::config::Config;
use crate::geometry::LocalPoint;
use crate::input::{InputSynthesizer, KeySpec};
use crate::vision::color::ColorLocator;
use crate::vision::ocr::{self, OcrEngine};
use crate::vision::template::TemplateRegistry;
use crate::vision::text::{StockItem, TextLocator};
use crate::vision::{Frame, FrameSource};

const BUY_BUTTON_TEMPLATE: &str = "buy_button";
const OPEN_EGG_SHOP_TEMPLATE: &str = "open_egg_shop";

/// Runs the scan-and-buy cycle against injected vision and input services.
pub struct ShopCycleController {
    frames: Box<dyn FrameSource>,
    input: Box<dyn InputSynthesizer>,
    ocr: Box<dyn OcrEngine>,
    templates: TemplateRegistry,
    text: TextLocator,
    color: ColorLocator,
    config: Config,
    flags: Arc<RunFlags>,
    stats: Arc<Stats>,
    events: Option<EventSink>,
}

impl ShopCycleController {
    pub fn new(
        frames: Box<dyn FrameSource>,
        input: Box<dyn InputSynthesizer>,
        ocr: Box<dyn OcrEngine>,
        templates: TemplateRegistry,
        config: Config,
        flags: Arc<RunFlags>,
        stats: Arc<Stats>,
    ) -> Self {
        let text = TextLocator::new(
            config.detection.stock_marker.as_str(),
            config.detection.stock_row_proximity,
        );
        for target in &config.ocr_targets {
            if ShopCategory::of(target).is_none() {
                log::warn!("Target '{target}' names no known shop category; it will never be scanned");
            }
        }
        Self {
            frames,
            input,
            ocr,
            templates,
            text,
            color: ColorLocator::new(),
            config,
            flags,
            stats,
            events: None,
        }
    }

    /// Attach an observer invoked synchronously from the worker thread.
    pub fn with_event_sink(mut self, sink: EventSink) -> Self {
        self.events = Some(sink);
        self
    }

    /// Main loop: one shop cycle per scan interval until stopped.
    pub fn run_loop(&mut self) {
        log::info!("Worker started");
        self.emit(BotEvent::Status("started".to_string()));

        let startup = self.config.timings.startup_delay;
        if startup > 0.0 {
            log::info!("Waiting {startup:.1}s; focus the game window now");
            self.wait(startup);
        }

        while self.flags.is_running() {
            if self.flags.is_paused() {
                thread::sleep(Duration::from_secs_f32(
                    self.config.timings.pause_poll.max(0.01),
                ));
                continue;
            }
            match self.shop_cycle() {
                Ok(()) => self.stats.record_cycle(),
                Err(e) => log::error!("Shop cycle failed: {e}"),
            }
            self.wait(self.config.scan_interval);
        }

        self.emit(BotEvent::Status("stopped".to_string()));
        log::info!("Worker stopped");
    }

    /// One full cycle: focus, teleport, open the shop, scan each enabled
    /// category.
    fn shop_cycle(&mut self) -> Result<(), BotError> {
        log::debug!("Starting shop cycle");

        // Re-click the region center so the game window has input focus.
        let focus = match self.config.monitor_region {
            Some(r) => r.center(),
            None => {
                let frame = self.frames.capture(None)?;
                let (w, h) = frame.dimensions();
                frame.to_screen(LocalPoint::new(w as i32 / 2, h as i32 / 2))
            }
        };
        self.input.click(focus)?;
        if !self.wait(self.config.timings.focus_wait) {
            return Ok(());
        }

        let teleport = KeySpec::parse(&self.config.navigation.teleport_hotkey)?;
        self.input.press(&teleport)?;
        if !self.wait(self.config.timings.teleport_wait) {
            return Ok(());
        }

        let open_shop = KeySpec::parse(&self.config.navigation.open_shop_key)?;
        self.input.press(&open_shop)?;
        if !self.wait(self.config.timings.shop_open_wait) {
            return Ok(());
        }

        if self.config.shop_mode.includes_seed() {
            self.scan_pages(ShopCategory::Seed)?;
        }
        if self.config.shop_mode.includes_egg()
            && self.flags.should_continue()
            && self.enter_egg_shop()?
        {
            self.scan_pages(ShopCategory::Egg)?;
        }

        log::debug!("Shop cycle complete");
        Ok(())
    }

    /// Scroll the panel up until the egg-shop entry is visible, then open
    /// it. The panel position varies with how far the seed scan scrolled,
    /// hence the bounded search.
    fn enter_egg_shop(&mut self) -> Result<bool, BotError> {
        let scroll_up = KeySpec::parse(&self.config.navigation.scroll_up_key)?;
        let open_shop = KeySpec::parse(&self.config.navigation.open_shop_key)?;

        for _ in 0..=self.config.limits.egg_shop_search_scrolls {
            if !self.flags.should_continue() {
                return Ok(false);
            }
            let frame = self.frames.capture(self.config.monitor_region)?;
            if self.templates.exists(&frame, OPEN_EGG_SHOP_TEMPLATE) {
                self.input.press(&open_shop)?;
                log::info!("Opened egg shop");
                self.wait(self.config.timings.shop_open_wait);
                return Ok(true);
            }
            self.input.press(&scroll_up)?;
            if !self.wait(self.config.timings.scroll_settle) {
                return Ok(false);
            }
        }

        log::warn!(
            "Egg shop entry not found after {} scrolls",
            self.config.limits.egg_shop_search_scrolls
        );
        Ok(false)
    }

    /// Page through the open shop buying every in-stock target of the given
    /// category. Always exhausts the page budget; an absent item is simply
    /// not found, so re-scanning a bought-out page is a no-op.
    fn scan_pages(&mut self, category: ShopCategory) -> Result<(), BotError> {
        let targets: Vec<String> = self
            .config
            .ocr_targets
            .iter()
            .filter(|t| ShopCategory::of(t) == Some(category))
            .cloned()
            .collect();
        if targets.is_empty() {
            return Ok(());
        }
        log::info!("Scanning {category:?} shop for {targets:?}");

        for page in 0..self.config.limits.max_scroll_pages {
            if !self.flags.should_continue() {
                return Ok(());
            }
            log::debug!("Scanning shop page {}", page + 1);

            let frame = self.frames.capture(self.config.monitor_region)?;
            let words = self.ocr.read_words(&ocr::preprocess(&frame))?;
            let target_refs: Vec<&str> = targets.iter().map(String::as_str).collect();
            let items = self.text.find_shop_items_with_stock(&words, &target_refs);
            if !items.is_empty() {
                log::info!("Found {} in-stock items on page {}", items.len(), page + 1);
            }

            for item in items {
                if !self.flags.should_continue() {
                    return Ok(());
                }
                match self.buy_until_sold_out(&frame, &item)? {
                    BuyOutcome::SoldOut => log::info!("{}: sold out", item.name),
                    BuyOutcome::NoButton => {
                        log::debug!("{}: no buy control found, moving on", item.name)
                    }
                    BuyOutcome::CapReached => log::warn!(
                        "{}: hit the {} attempt cap without selling out",
                        item.name,
                        self.config.limits.max_buy_attempts
                    ),
                    BuyOutcome::Interrupted => return Ok(()),
                }
            }

            // Wheel scroll needs the cursor over the panel.
            let (w, h) = frame.dimensions();
            let center = frame.to_screen(LocalPoint::new(w as i32 / 2, h as i32 / 2));
            self.input.move_to(center)?;
            self.input.scroll_down(self.config.navigation.scroll_lines)?;
            if !self.wait(self.config.timings.scroll_settle) {
                return Ok(());
            }
        }
        Ok(())
    }

    /// Click an item to expand its purchase control, then keep clicking the
    /// buy control until the sold-out marker appears, the control vanishes,
    /// or the attempt cap is hit.
    fn buy_until_sold_out(
        &mut self,
        scan_frame: &Frame,
        item: &StockItem,
    ) -> Result<BuyOutcome, BotError> {
        let item_screen = scan_frame.to_screen(item.position);
        log::info!(
            "Buying '{}' at ({}, {})",
            item.name,
            item_screen.x,
            item_screen.y
        );

        self.input.click(item_screen)?;
        self.stats.record_detection();
        self.emit(BotEvent::Detection {
            item: item.name.clone(),
            position: item_screen,
        });
        if !self.wait(self.config.timings.accordion_wait) {
            return Ok(BuyOutcome::Interrupted);
        }

        for attempt in 0..self.config.limits.max_buy_attempts {
            if !self.flags.should_continue() {
                return Ok(BuyOutcome::Interrupted);
            }

            let frame = self.frames.capture(self.config.monitor_region)?;
            let words = self.ocr.read_words(&ocr::preprocess(&frame))?;
            // Full-phrase check: the marker's trailing word alone is on
            // screen for every in-stock row and must not end the loop.
            if self
                .text
                .exists_phrase(&words, &self.config.detection.sold_out_marker)
            {
                return Ok(BuyOutcome::SoldOut);
            }

            let Some(button) = self.find_buy_control(&frame, item.position) else {
                return Ok(BuyOutcome::NoButton);
            };

            self.input.click(frame.to_screen(button))?;
            self.stats.record_purchase();
            log::info!("Purchased '{}' (attempt {})", item.name, attempt + 1);
            self.emit(BotEvent::Purchase {
                item: item.name.clone(),
            });
            if !self.wait(self.config.click_delay) {
                return Ok(BuyOutcome::Interrupted);
            }
        }

        Ok(BuyOutcome::CapReached)
    }

    /// Locate the buy control for an item: template match first, else green
    /// color blobs restricted to below-and-near the item's position, with
    /// the distance window scaled from the reference layout to the frame's
    /// actual size. Closest candidate by vertical offset wins.
    fn find_buy_control(&self, frame: &Frame, item: LocalPoint) -> Option<LocalPoint> {
        if let Some(m) = self.templates.find_best(frame, BUY_BUTTON_TEMPLATE) {
            return Some(m.center);
        }

        let scale = frame.height_scale(self.config.detection.reference_height);
        let max_dy = (self.config.detection.buy_button_max_y_dist as f32 * scale) as i32;
        let max_dx = (self.config.detection.buy_button_max_x_dist as f32 * scale) as i32;

        self.color
            .find_buy_buttons(frame)
            .into_iter()
            .filter(|p| {
                p.y > item.y && p.y < item.y + max_dy && (p.x - item.x).abs() < max_dx
            })
            .min_by_key(|p| (p.y - item.y).abs())
    }

    /// Sleep for `secs`, waking early when the run is stopped or paused.
    /// Returns whether the caller should keep going.
    fn wait(&self, secs: f32) -> bool {
        let deadline = Instant::now() + Duration::from_secs_f32(secs.max(0.0));
        loop {
            if !self.flags.should_continue() {
                return false;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return true;
            }
            thread::sleep(remaining.min(Duration::from_millis(10)));
        }
    }

    fn emit(&self, event: BotEvent) {
        if let Some(sink) = &self.events {
            sink(&event);
        }
    }
}
