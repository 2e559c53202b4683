// crates/statevault-sync/tests/autosave.rs
// ============================================================================
// Module: Auto-Save Scheduler Tests
// Description: Timer lifecycle, failure tolerance, and reconfiguration.
// Purpose: Ensure auto-save keeps a single timer and survives bad saves.
// Dependencies: statevault-sync, statevault-config, statevault-core, tokio
// ============================================================================

//! ## Overview
//! Uses [`ManualScheduler`] for deterministic ticks and tokio's paused clock
//! for the runtime-backed scheduler.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use statevault_config::PersistenceConfig;
use statevault_config::PersistenceConfigOverrides;
use statevault_core::StoreError;
use statevault_sync::AutoSaveScheduler;
use statevault_sync::ManualScheduler;
use statevault_sync::SaveFn;
use statevault_sync::Scheduler;
use statevault_sync::TokioScheduler;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn config(auto_save: bool, interval_secs: u64) -> PersistenceConfig {
    PersistenceConfig::default()
        .merged(&PersistenceConfigOverrides {
            auto_save: Some(auto_save),
            auto_save_interval: Some(Duration::from_secs(interval_secs)),
            ..PersistenceConfigOverrides::default()
        })
        .unwrap()
}

fn counting_save(counter: &Arc<AtomicU64>) -> SaveFn {
    let counter = Arc::clone(counter);
    Arc::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
}

/// Save that panics on its first call and succeeds afterwards.
fn panics_once_save(calls: &Arc<AtomicU64>) -> SaveFn {
    let calls = Arc::clone(calls);
    Arc::new(move || {
        if calls.fetch_add(1, Ordering::SeqCst) == 0 {
            panic!("snapshot closure exploded");
        }
        Ok(())
    })
}

fn secs(value: u64) -> Duration {
    Duration::from_secs(value)
}

// ============================================================================
// SECTION: Lifecycle
// ============================================================================

#[test]
fn start_is_a_no_op_when_auto_save_is_disabled() {
    let scheduler = ManualScheduler::new();
    let autosave = AutoSaveScheduler::new(Arc::new(scheduler.clone()), config(false, 30));
    let saves = Arc::new(AtomicU64::new(0));
    autosave.start(counting_save(&saves));

    assert!(!autosave.is_running());
    assert_eq!(scheduler.active_timers(), 0);
    scheduler.advance(secs(300));
    assert_eq!(saves.load(Ordering::SeqCst), 0);
}

#[test]
fn saves_fire_once_per_interval() {
    let scheduler = ManualScheduler::new();
    let autosave = AutoSaveScheduler::new(Arc::new(scheduler.clone()), config(true, 30));
    let saves = Arc::new(AtomicU64::new(0));
    autosave.start(counting_save(&saves));

    scheduler.advance(secs(29));
    assert_eq!(saves.load(Ordering::SeqCst), 0);
    scheduler.advance(secs(1));
    assert_eq!(saves.load(Ordering::SeqCst), 1);
    scheduler.advance(secs(60));
    assert_eq!(saves.load(Ordering::SeqCst), 3);
    assert_eq!(autosave.completed_saves(), 3);
}

#[test]
fn restart_replaces_instead_of_stacking() {
    let scheduler = ManualScheduler::new();
    let autosave = AutoSaveScheduler::new(Arc::new(scheduler.clone()), config(true, 10));
    let first = Arc::new(AtomicU64::new(0));
    let second = Arc::new(AtomicU64::new(0));
    autosave.start(counting_save(&first));
    autosave.start(counting_save(&second));

    assert_eq!(scheduler.active_timers(), 1);
    scheduler.advance(secs(30));
    assert_eq!(first.load(Ordering::SeqCst), 0);
    assert_eq!(second.load(Ordering::SeqCst), 3);
}

#[test]
fn stop_is_idempotent() {
    let scheduler = ManualScheduler::new();
    let autosave = AutoSaveScheduler::new(Arc::new(scheduler.clone()), config(true, 10));
    autosave.stop();
    let saves = Arc::new(AtomicU64::new(0));
    autosave.start(counting_save(&saves));
    autosave.stop();
    autosave.stop();

    assert!(!autosave.is_running());
    assert_eq!(scheduler.active_timers(), 0);
    scheduler.advance(secs(60));
    assert_eq!(saves.load(Ordering::SeqCst), 0);
}

#[test]
fn failing_saves_are_counted_and_timer_survives() {
    let scheduler = ManualScheduler::new();
    let autosave = AutoSaveScheduler::new(Arc::new(scheduler.clone()), config(true, 5));
    let calls = Arc::new(AtomicU64::new(0));
    let save: SaveFn = {
        let calls = Arc::clone(&calls);
        Arc::new(move || {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(StoreError::Write("disk full".to_string()))
            } else {
                Ok(())
            }
        })
    };
    autosave.start(save);

    scheduler.advance(secs(15));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(autosave.failed_saves(), 2);
    assert_eq!(autosave.completed_saves(), 1);
    assert!(autosave.is_running());
}

#[test]
fn panicking_save_is_counted_and_timer_survives() {
    let scheduler = ManualScheduler::new();
    let autosave = AutoSaveScheduler::new(Arc::new(scheduler.clone()), config(true, 5));
    let calls = Arc::new(AtomicU64::new(0));
    autosave.start(panics_once_save(&calls));

    scheduler.advance(secs(15));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(autosave.failed_saves(), 1);
    assert_eq!(autosave.completed_saves(), 2);
    assert!(autosave.is_running());
    assert_eq!(scheduler.active_timers(), 1);
}

#[tokio::test(start_paused = true)]
async fn panicking_save_does_not_end_the_tokio_timer() {
    let scheduler = TokioScheduler::current().unwrap();
    let autosave = AutoSaveScheduler::new(Arc::new(scheduler), config(true, 1));
    let calls = Arc::new(AtomicU64::new(0));
    autosave.start(panics_once_save(&calls));

    tokio::time::sleep(Duration::from_millis(5_500)).await;
    assert!(calls.load(Ordering::SeqCst) >= 4);
    assert_eq!(autosave.failed_saves(), 1);
    assert!(autosave.completed_saves() >= 3);
    assert!(autosave.is_running());
    autosave.stop();
}

// ============================================================================
// SECTION: Reconfiguration
// ============================================================================

#[test]
fn reconfigure_restarts_with_new_interval() {
    let scheduler = ManualScheduler::new();
    let autosave = AutoSaveScheduler::new(Arc::new(scheduler.clone()), config(true, 30));
    let saves = Arc::new(AtomicU64::new(0));
    autosave.start(counting_save(&saves));
    scheduler.advance(secs(20));

    autosave.reconfigure(config(true, 5));
    assert_eq!(scheduler.active_timers(), 1);
    scheduler.advance(secs(10));
    assert_eq!(saves.load(Ordering::SeqCst), 2);
}

#[test]
fn reconfigure_can_disable_and_reenable() {
    let scheduler = ManualScheduler::new();
    let autosave = AutoSaveScheduler::new(Arc::new(scheduler.clone()), config(true, 10));
    let saves = Arc::new(AtomicU64::new(0));
    autosave.start(counting_save(&saves));

    autosave.reconfigure(config(false, 10));
    assert!(!autosave.is_running());
    scheduler.advance(secs(30));
    assert_eq!(saves.load(Ordering::SeqCst), 0);

    autosave.reconfigure(config(true, 10));
    assert!(autosave.is_running());
    scheduler.advance(secs(10));
    assert_eq!(saves.load(Ordering::SeqCst), 1);
}

#[test]
fn enabling_after_a_disabled_start_waits_for_an_explicit_start() {
    let scheduler = ManualScheduler::new();
    let autosave = AutoSaveScheduler::new(Arc::new(scheduler.clone()), config(false, 10));
    let saves = Arc::new(AtomicU64::new(0));
    autosave.start(counting_save(&saves));

    autosave.reconfigure(config(true, 10));
    assert!(!autosave.is_running());
    assert_eq!(scheduler.active_timers(), 0);
    scheduler.advance(secs(30));
    assert_eq!(saves.load(Ordering::SeqCst), 0);

    autosave.start(counting_save(&saves));
    assert!(autosave.is_running());
    scheduler.advance(secs(10));
    assert_eq!(saves.load(Ordering::SeqCst), 1);
}

#[test]
fn reconfigure_after_stop_does_not_restart() {
    let scheduler = ManualScheduler::new();
    let autosave = AutoSaveScheduler::new(Arc::new(scheduler.clone()), config(true, 10));
    let saves = Arc::new(AtomicU64::new(0));
    autosave.start(counting_save(&saves));
    autosave.stop();

    autosave.reconfigure(config(true, 1));
    assert!(!autosave.is_running());
    scheduler.advance(secs(10));
    assert_eq!(saves.load(Ordering::SeqCst), 0);
}

// ============================================================================
// SECTION: Schedulers
// ============================================================================

#[test]
fn manual_timer_stops_when_handle_is_dropped() {
    let scheduler = ManualScheduler::new();
    let ticks = Arc::new(AtomicU64::new(0));
    let handle = {
        let ticks = Arc::clone(&ticks);
        scheduler.schedule_repeating(
            secs(1),
            Arc::new(move || {
                ticks.fetch_add(1, Ordering::SeqCst);
            }),
        )
    };
    scheduler.advance(secs(2));
    drop(handle);
    scheduler.advance(secs(5));
    assert_eq!(ticks.load(Ordering::SeqCst), 2);
    assert_eq!(scheduler.active_timers(), 0);
    assert_eq!(scheduler.now(), secs(7));
}

#[tokio::test(start_paused = true)]
async fn tokio_scheduler_ticks_after_each_interval() {
    let scheduler = TokioScheduler::current().unwrap();
    let ticks = Arc::new(AtomicU64::new(0));
    let handle = {
        let ticks = Arc::clone(&ticks);
        scheduler.schedule_repeating(
            secs(30),
            Arc::new(move || {
                ticks.fetch_add(1, Ordering::SeqCst);
            }),
        )
    };

    tokio::time::sleep(secs(29)).await;
    assert_eq!(ticks.load(Ordering::SeqCst), 0);
    tokio::time::sleep(secs(2)).await;
    assert_eq!(ticks.load(Ordering::SeqCst), 1);
    tokio::time::sleep(secs(30)).await;
    assert_eq!(ticks.load(Ordering::SeqCst), 2);

    handle.cancel();
    handle.cancel();
    tokio::time::sleep(secs(120)).await;
    assert_eq!(ticks.load(Ordering::SeqCst), 2);
    assert!(!handle.is_active());
}
