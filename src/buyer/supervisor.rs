//! Session lifecycle
//!
//! Owns the single background worker that drives the shop cycle, plus the
//! advisory run/pause flags it polls. The foreground thread only starts,
//! stops, pauses and reads stats; all capture and input happen on the
//! worker, sequentially, because concurrent input injection against the
//! same UI would race with itself.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::buyer::{ShopCycleController, Stats, StatsSnapshot};

/// How long `stop` waits for the worker before detaching it. Worst-case
/// stop latency is one in-flight buy loop plus this.
const STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// Single-writer/multi-reader run state, polled cooperatively by the worker
/// at every loop boundary and sleep. Advisory only; there is no preemption.
#[derive(Debug, Default)]
pub struct RunFlags {
    running: AtomicBool,
    paused: AtomicBool,
}

impl RunFlags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the session running and clear any stale pause.
    pub fn start(&self) {
        self.paused.store(false, Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Flip the pause flag, returning the new state.
    pub fn toggle_pause(&self) -> bool {
        !self.paused.fetch_xor(true, Ordering::SeqCst)
    }

    /// Whether in-cycle work should proceed. Pausing aborts the current
    /// cycle early; the run loop idles until resumed and then restarts
    /// navigation from the top.
    pub fn should_continue(&self) -> bool {
        self.is_running() && !self.is_paused()
    }
}

/// Work the supervisor runs on its background thread.
pub trait Runner: Send + 'static {
    /// Run until the shared flags say stop.
    fn run(&mut self);
}

impl Runner for ShopCycleController {
    fn run(&mut self) {
        self.run_loop();
    }
}

struct Worker {
    handle: thread::JoinHandle<()>,
    done: mpsc::Receiver<()>,
}

/// Starts, stops and pauses the background worker and exposes its stats.
pub struct Supervisor<R: Runner> {
    runner: Arc<Mutex<R>>,
    flags: Arc<RunFlags>,
    stats: Arc<Stats>,
    worker: Option<Worker>,
}

impl<R: Runner> Supervisor<R> {
    pub fn new(runner: R, flags: Arc<RunFlags>, stats: Arc<Stats>) -> Self {
        Self {
            runner: Arc::new(Mutex::new(runner)),
            flags,
            stats,
            worker: None,
        }
    }

    /// Launch the worker thread. No-op if a session is already running, or
    /// if a previous worker that outlived its stop timeout is still
    /// draining — re-raising the run flag would wake that worker instead,
    /// while the new thread blocked forever on the runner lock.
    pub fn start(&mut self) {
        if self.flags.is_running() {
            log::warn!("Session already running");
            return;
        }
        if let Some(worker) = self.worker.take() {
            match worker.done.try_recv() {
                Ok(()) | Err(mpsc::TryRecvError::Disconnected) => {
                    let _ = worker.handle.join();
                }
                Err(mpsc::TryRecvError::Empty) => {
                    log::warn!("Previous worker is still shutting down; try again shortly");
                    self.worker = Some(worker);
                    return;
                }
            }
        }
        self.flags.start();

        let runner = Arc::clone(&self.runner);
        let (done_tx, done_rx) = mpsc::channel();
        let spawned = thread::Builder::new()
            .name("shop-worker".to_string())
            .spawn(move || {
                match runner.lock() {
                    Ok(mut r) => r.run(),
                    Err(e) => log::error!("Worker state poisoned: {e}"),
                }
                let _ = done_tx.send(());
            });

        match spawned {
            Ok(handle) => {
                self.worker = Some(Worker {
                    handle,
                    done: done_rx,
                });
                log::info!("Session started");
            }
            Err(e) => {
                log::error!("Failed to spawn worker: {e}");
                self.flags.stop();
            }
        }
    }

    /// Signal the worker to exit and join it with a bounded timeout. A
    /// worker stuck past the timeout is left to drain in the background
    /// rather than hanging shutdown; it is retained so `start` can refuse
    /// to run a second worker against the same state.
    pub fn stop(&mut self) {
        self.flags.stop();
        let Some(worker) = self.worker.take() else {
            return;
        };
        match worker.done.recv_timeout(STOP_TIMEOUT) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                let _ = worker.handle.join();
                log::info!("Session stopped");
            }
            Err(RecvTimeoutError::Timeout) => {
                log::warn!("Worker did not stop within {STOP_TIMEOUT:?}; letting it drain");
                self.worker = Some(worker);
            }
        }
    }

    /// Flip the pause state without stopping the worker. Returns the new
    /// state.
    pub fn toggle_pause(&self) -> bool {
        let paused = self.flags.toggle_pause();
        log::info!("Session {}", if paused { "paused" } else { "resumed" });
        paused
    }

    pub fn is_running(&self) -> bool {
        self.flags.is_running()
    }

    /// Counters for the current process; they accumulate across stop/start.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

impl<R: Runner> Drop for Supervisor<R> {
    fn drop(&mut self) {
        self.stop();
    }
}
