//! Shop Sniper CLI
//!
//! Wires the production capture, OCR and input backends into the buying
//! engine and runs it from the console. Calibration and single-frame
//! snapshots live here too, for setting up and tuning a new machine.

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use shop_sniper::buyer::{BotEvent, RunFlags, ShopCycleController, Stats, StatsSnapshot, Supervisor};
use shop_sniper::calibrate;
use shop_sniper::config::Config;
use shop_sniper::input::EnigoInput;
use shop_sniper::vision::ocr::TesseractOcr;
use shop_sniper::vision::template::TemplateRegistry;
use shop_sniper::vision::{FrameSource, MonitorSource};

#[derive(Parser)]
#[command(name = "sniper", version, about = "Screen-vision auto-buyer for rare shop items")]
struct Cli {
    /// Path to the JSON config file.
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start a buying session.
    Run,
    /// Interactively define the game region and persist it to the config.
    Calibrate,
    /// Capture one frame of the configured region to a PNG, for tuning
    /// templates and thresholds.
    Snapshot {
        /// Output image path.
        #[arg(default_value = "snapshot.png")]
        output: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Command::Run => run(&cli.config),
        Command::Calibrate => calibrate_region(&cli.config),
        Command::Snapshot { output } => snapshot(&cli.config, &output),
    }
}

fn run(config_path: &Path) -> anyhow::Result<()> {
    let config = Config::load(config_path)?;
    if config.monitor_region.is_none() {
        log::warn!("No monitor region configured; capturing the full screen. Run `sniper calibrate` to set one.");
    }

    let mut templates = TemplateRegistry::new(
        config.detection.confidence_threshold,
        config.detection.match_min_separation,
    );
    for (name, path) in &config.templates {
        templates.load(name, path);
    }

    let input = EnigoInput::new().context("failed to initialize the input backend")?;
    let flags = Arc::new(RunFlags::new());
    let stats = Arc::new(Stats::new());

    let controller = ShopCycleController::new(
        Box::new(MonitorSource::new()),
        Box::new(input),
        Box::new(TesseractOcr::new()),
        templates,
        config,
        Arc::clone(&flags),
        Arc::clone(&stats),
    )
    .with_event_sink(Box::new(|event| {
        if let BotEvent::Purchase { item } = event {
            println!(">> bought {item}");
        }
    }));

    let mut supervisor = Supervisor::new(controller, flags, stats);
    supervisor.start();

    println!("Running. 'p' + ENTER pauses/resumes, 's' + ENTER prints stats, ENTER stops.");
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        match line?.trim() {
            "p" => {
                supervisor.toggle_pause();
            }
            "s" => print_stats(&supervisor.stats()),
            _ => break,
        }
    }

    supervisor.stop();
    print_stats(&supervisor.stats());
    Ok(())
}

fn calibrate_region(config_path: &Path) -> anyhow::Result<()> {
    let mut config = Config::load(config_path)?;
    let mut input = EnigoInput::new().context("failed to initialize the input backend")?;

    let region = calibrate::calibrate_region(&mut input)?;
    config.set_monitor_region(region, config_path)?;
    println!("Saved region to {}", config_path.display());
    Ok(())
}

fn snapshot(config_path: &Path, output: &Path) -> anyhow::Result<()> {
    let config = Config::load(config_path)?;
    let mut source = MonitorSource::new();

    let frame = source.capture(config.monitor_region)?;
    let (w, h) = frame.dimensions();
    frame
        .image
        .save(output)
        .with_context(|| format!("failed to write {}", output.display()))?;
    println!("Wrote {w}x{h} snapshot to {}", output.display());
    Ok(())
}

fn print_stats(stats: &StatsSnapshot) {
    println!(
        "Cycles: {}  Detected: {}  Purchased: {}",
        stats.cycles_completed, stats.items_detected, stats.items_purchased
    );
    if let Some(ago) = stats.since_last_detection {
        println!("Last detection {:.0}s ago", ago.as_secs_f32());
    }
}
