// crates/statevault-sync/src/scheduler.rs
// ============================================================================
// Module: Timer Scheduling
// Description: Repeating timers on tokio or on a manually driven clock.
// Purpose: Make timer-driven side effects testable without wall-clock waits.
// Dependencies: tokio, tracing
// ============================================================================

//! ## Overview
//! [`Scheduler`] hands out repeating timers. Each timer first fires one
//! interval after it was scheduled. Timers stop when cancelled or when their
//! [`TimerHandle`] is dropped.
//!
//! [`TokioScheduler`] drives timers with `tokio::time::interval` on a runtime
//! handle; missed ticks are delayed rather than bursted.
//! [`ManualScheduler`] keeps a virtual clock that only moves on
//! [`ManualScheduler::advance`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio::time::MissedTickBehavior;
use tracing::debug;

// ============================================================================
// SECTION: Contracts
// ============================================================================

/// Callback invoked on every tick.
pub type TickFn = Arc<dyn Fn() + Send + Sync>;

/// Smallest interval a timer runs at; shorter requests are raised to it.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Handle to a scheduled timer.
pub trait TimerHandle: Send + Sync {
    /// Stops the timer. Idempotent.
    fn cancel(&self);

    /// Returns true until the timer is cancelled.
    fn is_active(&self) -> bool;
}

/// Source of repeating timers.
pub trait Scheduler: Send + Sync {
    /// Calls `tick` every `interval`, starting one interval from now.
    fn schedule_repeating(&self, interval: Duration, tick: TickFn) -> Box<dyn TimerHandle>;
}

// ============================================================================
// SECTION: Tokio Scheduler
// ============================================================================

/// Scheduler backed by a tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    /// Runtime timers are spawned on.
    handle: Handle,
}

impl TokioScheduler {
    /// Creates a scheduler spawning onto `handle`.
    #[must_use]
    pub const fn new(handle: Handle) -> Self {
        Self {
            handle,
        }
    }

    /// Creates a scheduler for the runtime of the calling context, if any.
    #[must_use]
    pub fn current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_repeating(&self, interval: Duration, tick: TickFn) -> Box<dyn TimerHandle> {
        let interval = interval.max(MIN_INTERVAL);
        let task = self.handle.spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                tick();
            }
        });
        debug!(
            interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
            "scheduled repeating timer"
        );
        Box::new(TokioTimer {
            task,
        })
    }
}

/// Timer running as a tokio task.
struct TokioTimer {
    /// Timer task.
    task: JoinHandle<()>,
}

impl TimerHandle for TokioTimer {
    fn cancel(&self) {
        self.task.abort();
    }

    fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for TokioTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

// ============================================================================
// SECTION: Manual Scheduler
// ============================================================================

/// Deterministic scheduler driven by [`ManualScheduler::advance`].
#[derive(Clone, Default)]
pub struct ManualScheduler {
    /// Shared virtual clock and timers.
    inner: Arc<Mutex<ManualState>>,
}

/// Virtual clock state.
#[derive(Default)]
struct ManualState {
    /// Virtual time since creation.
    now: Duration,
    /// Next timer id, used to order simultaneous ticks.
    next_id: u64,
    /// Registered timers.
    timers: Vec<ManualTimer>,
}

/// One registered timer.
struct ManualTimer {
    /// Registration order.
    id: u64,
    /// Tick period.
    interval: Duration,
    /// Virtual time of the next tick.
    next_due: Duration,
    /// Callback.
    tick: TickFn,
    /// Cleared on cancel or handle drop.
    active: Arc<AtomicBool>,
}

impl ManualScheduler {
    /// Creates a scheduler at virtual time zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the elapsed virtual time.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.lock().now
    }

    /// Returns the number of live timers.
    #[must_use]
    pub fn active_timers(&self) -> usize {
        self.lock().timers.iter().filter(|timer| timer.active.load(Ordering::Acquire)).count()
    }

    /// Moves virtual time forward by `by`, firing every tick that falls due.
    ///
    /// Ticks run in due-time order without the scheduler lock held, so a
    /// callback may schedule or cancel timers.
    pub fn advance(&self, by: Duration) {
        let target = self.lock().now.saturating_add(by);
        while let Some(tick) = self.next_due(target) {
            tick();
        }
        let mut state = self.lock();
        state.now = target;
        state.timers.retain(|timer| timer.active.load(Ordering::Acquire));
    }

    /// Pops the earliest tick due at or before `target`.
    fn next_due(&self, target: Duration) -> Option<TickFn> {
        let mut state = self.lock();
        let timer = state
            .timers
            .iter_mut()
            .filter(|timer| timer.active.load(Ordering::Acquire) && timer.next_due <= target)
            .min_by_key(|timer| (timer.next_due, timer.id))?;
        let due = timer.next_due;
        timer.next_due = due.saturating_add(timer.interval);
        let tick = Arc::clone(&timer.tick);
        state.now = due;
        Some(tick)
    }

    /// Locks the shared state, recovering from poisoning.
    fn lock(&self) -> MutexGuard<'_, ManualState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_repeating(&self, interval: Duration, tick: TickFn) -> Box<dyn TimerHandle> {
        let interval = interval.max(MIN_INTERVAL);
        let active = Arc::new(AtomicBool::new(true));
        let mut state = self.lock();
        let id = state.next_id;
        state.next_id = state.next_id.saturating_add(1);
        let next_due = state.now.saturating_add(interval);
        state.timers.push(ManualTimer {
            id,
            interval,
            next_due,
            tick,
            active: Arc::clone(&active),
        });
        Box::new(ManualTimerHandle {
            active,
        })
    }
}

/// Handle to a [`ManualScheduler`] timer.
struct ManualTimerHandle {
    /// Shared liveness flag.
    active: Arc<AtomicBool>,
}

impl TimerHandle for ManualTimerHandle {
    fn cancel(&self) {
        self.active.store(false, Ordering::Release);
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl Drop for ManualTimerHandle {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
    }
}
