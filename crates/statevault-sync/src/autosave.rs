// crates/statevault-sync/src/autosave.rs
// ============================================================================
// Module: Auto-Save Scheduler
// Description: Best-effort periodic save on a pluggable scheduler.
// Purpose: Keep local snapshots fresh without letting one bad save stop it.
// Dependencies: statevault-core, statevault-config, tracing
// ============================================================================

//! ## Overview
//! At most one timer is live at a time: `start` replaces any previous timer
//! and `stop` is idempotent. A failing or panicking save is logged and
//! counted as failed; the timer keeps running. `start` while auto-save is
//! disabled does nothing, so re-enabling through `reconfigure` only resumes a
//! timer that was started while enabled.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::panic::AssertUnwindSafe;
use std::panic::catch_unwind;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use statevault_config::PersistenceConfig;
use statevault_core::StoreError;
use tracing::debug;
use tracing::warn;

use crate::scheduler::Scheduler;
use crate::scheduler::TickFn;
use crate::scheduler::TimerHandle;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Save callback run on every auto-save tick.
pub type SaveFn = Arc<dyn Fn() -> Result<(), StoreError> + Send + Sync>;

/// Mutable scheduler state.
struct AutoSaveState {
    /// Active configuration.
    config: PersistenceConfig,
    /// Callback registered by the last `start`.
    save_fn: Option<SaveFn>,
    /// Whether the host wants auto-save running (`start` without `stop`).
    requested: bool,
    /// Live timer, if any.
    timer: Option<Box<dyn TimerHandle>>,
}

/// Outcome counters shared with the tick callback.
#[derive(Default)]
struct AutoSaveCounters {
    /// Saves that returned `Ok`.
    completed: AtomicU64,
    /// Saves that returned `Err` or panicked.
    failed: AtomicU64,
}

impl AutoSaveCounters {
    /// Counts one failed save and returns the new total.
    fn record_failure(&self) -> u64 {
        self.failed.fetch_add(1, Ordering::Relaxed).saturating_add(1)
    }
}

// ============================================================================
// SECTION: Auto-Save Scheduler
// ============================================================================

/// Periodic, best-effort save driver.
pub struct AutoSaveScheduler {
    /// Timer source.
    scheduler: Arc<dyn Scheduler>,
    /// Config, callback, and live timer.
    state: Mutex<AutoSaveState>,
    /// Save outcome counters.
    counters: Arc<AutoSaveCounters>,
}

impl AutoSaveScheduler {
    /// Creates an idle scheduler.
    #[must_use]
    pub fn new(scheduler: Arc<dyn Scheduler>, config: PersistenceConfig) -> Self {
        Self {
            scheduler,
            state: Mutex::new(AutoSaveState {
                config,
                save_fn: None,
                requested: false,
                timer: None,
            }),
            counters: Arc::new(AutoSaveCounters::default()),
        }
    }

    /// Starts saving with `save_fn` every configured interval.
    ///
    /// Does nothing while auto-save is disabled; call `start` again after
    /// enabling it. Replaces any running timer.
    pub fn start(&self, save_fn: SaveFn) {
        let mut state = self.lock();
        if !state.config.auto_save() {
            debug!("auto-save disabled; start ignored");
            return;
        }
        state.save_fn = Some(save_fn);
        state.requested = true;
        self.reschedule(&mut state);
    }

    /// Stops the timer. Idempotent.
    pub fn stop(&self) {
        let mut state = self.lock();
        state.requested = false;
        if let Some(timer) = state.timer.take() {
            timer.cancel();
            debug!("auto-save stopped");
        }
    }

    /// Applies `config`, restarting a requested timer with the new interval.
    pub fn reconfigure(&self, config: PersistenceConfig) {
        let mut state = self.lock();
        state.config = config;
        if state.requested {
            self.reschedule(&mut state);
        }
    }

    /// Returns true while a timer is live.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.lock().timer.as_ref().is_some_and(|timer| timer.is_active())
    }

    /// Returns the number of saves that failed.
    #[must_use]
    pub fn failed_saves(&self) -> u64 {
        self.counters.failed.load(Ordering::Relaxed)
    }

    /// Returns the number of saves that succeeded.
    #[must_use]
    pub fn completed_saves(&self) -> u64 {
        self.counters.completed.load(Ordering::Relaxed)
    }

    /// Cancels the current timer and schedules a new one when enabled.
    fn reschedule(&self, state: &mut AutoSaveState) {
        if let Some(timer) = state.timer.take() {
            timer.cancel();
        }
        if !state.config.auto_save() {
            debug!("auto-save disabled; no timer scheduled");
            return;
        }
        let Some(save_fn) = state.save_fn.clone() else {
            return;
        };
        let counters = Arc::clone(&self.counters);
        let tick: TickFn = Arc::new(move || {
            let outcome = catch_unwind(AssertUnwindSafe(save_fn.as_ref()));
            match outcome {
                Ok(Ok(())) => {
                    counters.completed.fetch_add(1, Ordering::Relaxed);
                }
                Ok(Err(err)) => {
                    let failed = counters.record_failure();
                    warn!(
                        error = %err,
                        failed_saves = failed,
                        "auto-save failed; timer keeps running"
                    );
                }
                Err(_) => {
                    let failed = counters.record_failure();
                    warn!(failed_saves = failed, "auto-save panicked; timer keeps running");
                }
            }
        });
        let interval = state.config.auto_save_interval();
        state.timer = Some(self.scheduler.schedule_repeating(interval, tick));
        debug!(
            interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
            "auto-save scheduled"
        );
    }

    /// Locks the state, recovering from poisoning.
    fn lock(&self) -> MutexGuard<'_, AutoSaveState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for AutoSaveScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
