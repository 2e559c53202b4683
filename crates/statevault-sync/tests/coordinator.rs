// crates/statevault-sync/tests/coordinator.rs
// ============================================================================
// Module: Sync Coordinator Tests
// Description: Ordering, single-flight, retries, and status accounting.
// Purpose: Ensure sync failures are surfaced and never leave a stuck flag.
// Dependencies: statevault-sync, statevault-core, tokio, time
// ============================================================================

//! ## Overview
//! Drives [`SyncCoordinator`] against a scripted in-process remote. Retry
//! timing runs on tokio's paused clock.

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

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use statevault_config::PersistenceConfig;
use statevault_config::StateVaultConfig;
use statevault_core::ManualClock;
use statevault_sync::ActivityRecord;
use statevault_sync::ComplianceSettingsRecord;
use statevault_sync::FailureIncidentRecord;
use statevault_sync::RemoteError;
use statevault_sync::RemoteStore;
use statevault_sync::RetryPolicy;
use statevault_sync::SyncCategory;
use statevault_sync::SyncCoordinator;
use statevault_sync::SyncError;
use statevault_sync::SyncState;
use statevault_sync::TestResultRecord;
use time::OffsetDateTime;
use tokio::sync::Notify;

// ============================================================================
// SECTION: Scripted Remote
// ============================================================================

/// Remote that logs calls and fails according to a per-operation script.
#[derive(Default)]
struct ScriptedRemote {
    calls: Mutex<Vec<String>>,
    script: Mutex<HashMap<&'static str, Vec<RemoteError>>>,
    gate_first_call: AtomicBool,
    entered: Notify,
    release: Notify,
}

impl ScriptedRemote {
    fn gated() -> Self {
        let remote = Self::default();
        remote.gate_first_call.store(true, Ordering::SeqCst);
        remote
    }

    fn fail(&self, operation: &'static str, errors: Vec<RemoteError>) {
        self.script.lock().unwrap().insert(operation, errors);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    async fn answer(&self, operation: &'static str, call: String) -> Result<(), RemoteError> {
        self.calls.lock().unwrap().push(call);
        if self.gate_first_call.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        let mut script = self.script.lock().unwrap();
        match script.get_mut(operation) {
            Some(errors) if !errors.is_empty() => Err(errors.remove(0)),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl RemoteStore for ScriptedRemote {
    async fn create_or_update_test_result(
        &self,
        result: &TestResultRecord,
    ) -> Result<(), RemoteError> {
        self.answer("test_result", format!("test_result:{}", result.id)).await
    }

    async fn create_failure_incident(
        &self,
        incident: &FailureIncidentRecord,
    ) -> Result<(), RemoteError> {
        self.answer("incident", format!("incident:{}", incident.id)).await
    }

    async fn upsert_compliance_settings(
        &self,
        settings: &ComplianceSettingsRecord,
        conflict_key: &str,
    ) -> Result<(), RemoteError> {
        self.answer("settings", format!("settings:{}@{conflict_key}", settings.id)).await
    }

    async fn load_incident_history(
        &self,
        facility_id: &str,
    ) -> Result<Vec<FailureIncidentRecord>, RemoteError> {
        self.answer("load_incident_history", format!("load_incident_history:{facility_id}"))
            .await?;
        Ok(vec![incident("remote-i1")])
    }

    async fn load_compliance_settings(
        &self,
        facility_id: &str,
    ) -> Result<Option<ComplianceSettingsRecord>, RemoteError> {
        self.answer("load_compliance_settings", format!("load_compliance_settings:{facility_id}"))
            .await?;
        Ok(Some(settings("remote-s1")))
    }

    async fn load_recent_activity(
        &self,
        facility_id: &str,
        limit: usize,
    ) -> Result<Vec<ActivityRecord>, RemoteError> {
        self.answer("load_recent_activity", format!("load_recent_activity:{facility_id}:{limit}"))
            .await?;
        Ok(Vec::new())
    }

    async fn load_recent_test_results(
        &self,
        facility_id: &str,
        limit: usize,
    ) -> Result<Vec<TestResultRecord>, RemoteError> {
        self.answer(
            "load_recent_test_results",
            format!("load_recent_test_results:{facility_id}:{limit}"),
        )
        .await?;
        Ok(vec![test_result("remote-t1")])
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

const FACILITY: &str = "facility-7";

fn test_result(id: &str) -> TestResultRecord {
    TestResultRecord {
        id: id.to_string(),
        facility_id: FACILITY.to_string(),
        payload: json!({"passed": true}),
    }
}

fn incident(id: &str) -> FailureIncidentRecord {
    FailureIncidentRecord {
        id: id.to_string(),
        facility_id: FACILITY.to_string(),
        payload: json!({"severity": "high"}),
    }
}

fn settings(id: &str) -> ComplianceSettingsRecord {
    ComplianceSettingsRecord {
        id: id.to_string(),
        facility_id: FACILITY.to_string(),
        payload: json!({"threshold": 3}),
    }
}

fn full_state() -> SyncState {
    SyncState {
        test_results: vec![test_result("t1"), test_result("t2")],
        incidents: vec![incident("i1")],
        settings: Some(settings("s1")),
    }
}

fn retry(attempts: u32, delay_ms: u64) -> RetryPolicy {
    RetryPolicy {
        retry_attempts: attempts,
        retry_delay: Duration::from_millis(delay_ms),
    }
}

fn coordinator(remote: &Arc<ScriptedRemote>, policy: RetryPolicy) -> SyncCoordinator {
    SyncCoordinator::with_clock(
        remote.clone(),
        FACILITY,
        policy,
        Arc::new(ManualClock::at_unix(1_767_225_600)),
    )
}

// ============================================================================
// SECTION: Success
// ============================================================================

#[tokio::test]
async fn sync_pushes_categories_in_fixed_order() {
    let remote = Arc::new(ScriptedRemote::default());
    let coordinator = coordinator(&remote, RetryPolicy::NONE);
    coordinator.sync(&full_state()).await.unwrap();
    assert_eq!(remote.calls(), vec![
        "test_result:t1".to_string(),
        "test_result:t2".to_string(),
        "incident:i1".to_string(),
        format!("settings:s1@{FACILITY}"),
    ]);
}

#[tokio::test]
async fn successful_sync_updates_status() {
    let remote = Arc::new(ScriptedRemote::default());
    let coordinator = coordinator(&remote, RetryPolicy::NONE);
    coordinator.record_local_changes(9);
    coordinator.sync(&full_state()).await.unwrap();

    let status = coordinator.status();
    assert!(!status.is_syncing);
    assert_eq!(status.pending_changes, 0);
    assert_eq!(status.failed_changes, 0);
    assert!(status.sync_errors.is_empty());
    assert_eq!(
        status.last_sync_time,
        Some(OffsetDateTime::from_unix_timestamp(1_767_225_600).unwrap())
    );
}

#[tokio::test]
async fn empty_state_syncs_without_remote_calls() {
    let remote = Arc::new(ScriptedRemote::default());
    let coordinator = coordinator(&remote, RetryPolicy::NONE);
    coordinator.sync(&SyncState::default()).await.unwrap();
    assert!(remote.calls().is_empty());
    assert!(coordinator.status().last_sync_time.is_some());
}

// ============================================================================
// SECTION: Failure
// ============================================================================

#[tokio::test]
async fn incident_failure_is_recorded_and_surfaced() {
    let remote = Arc::new(ScriptedRemote::default());
    remote.fail("incident", vec![RemoteError::Rejected("bad incident".to_string())]);
    let coordinator = coordinator(&remote, RetryPolicy::NONE);

    let err = coordinator.sync(&full_state()).await.unwrap_err();
    match err {
        SyncError::Remote {
            category,
            item_id,
            source,
        } => {
            assert_eq!(category, SyncCategory::Incident);
            assert_eq!(item_id, "i1");
            assert_eq!(source, RemoteError::Rejected("bad incident".to_string()));
        }
        other => panic!("unexpected error: {other}"),
    }

    let status = coordinator.status();
    assert!(status.failed_changes >= 1);
    assert!(!status.is_syncing);
    assert_eq!(status.sync_errors.len(), 1);
    assert!(status.sync_errors[0].starts_with("incident i1: "));
    assert_eq!(status.pending_changes, 2);
    assert_eq!(status.last_sync_time, None);
    assert!(!remote.calls().iter().any(|call| call.starts_with("settings")));
}

#[tokio::test]
async fn next_sync_clears_previous_errors() {
    let remote = Arc::new(ScriptedRemote::default());
    remote.fail("test_result", vec![RemoteError::Rejected("no".to_string())]);
    let coordinator = coordinator(&remote, RetryPolicy::NONE);
    assert!(coordinator.sync(&full_state()).await.is_err());
    assert_eq!(coordinator.status().sync_errors.len(), 1);

    coordinator.sync(&full_state()).await.unwrap();
    let status = coordinator.status();
    assert!(status.sync_errors.is_empty());
    assert_eq!(status.failed_changes, 0);
}

// ============================================================================
// SECTION: Retry
// ============================================================================

#[tokio::test(start_paused = true)]
async fn transient_failures_are_retried_with_delay() {
    let remote = Arc::new(ScriptedRemote::default());
    remote.fail("test_result", vec![
        RemoteError::Unavailable("down".to_string()),
        RemoteError::Timeout("slow".to_string()),
    ]);
    let coordinator = coordinator(&remote, retry(3, 1_000));
    let state = SyncState {
        test_results: vec![test_result("t1")],
        ..SyncState::default()
    };

    let started = tokio::time::Instant::now();
    coordinator.sync(&state).await.unwrap();
    assert_eq!(remote.calls().len(), 3);
    assert!(started.elapsed() >= Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn retries_stop_after_configured_attempts() {
    let remote = Arc::new(ScriptedRemote::default());
    remote.fail("incident", vec![RemoteError::Unavailable("down".to_string()); 10]);
    let coordinator = coordinator(&remote, retry(2, 500));
    let state = SyncState {
        incidents: vec![incident("i1")],
        ..SyncState::default()
    };

    let err = coordinator.sync(&state).await.unwrap_err();
    assert!(matches!(err, SyncError::Remote { source: RemoteError::Unavailable(_), .. }));
    assert_eq!(remote.calls().len(), 3);
    assert_eq!(coordinator.status().failed_changes, 1);
}

#[tokio::test(start_paused = true)]
async fn rejections_are_not_retried() {
    let remote = Arc::new(ScriptedRemote::default());
    remote.fail("settings", vec![RemoteError::Rejected("conflict".to_string())]);
    let coordinator = coordinator(&remote, retry(5, 1_000));
    let state = SyncState {
        settings: Some(settings("s1")),
        ..SyncState::default()
    };

    let started = tokio::time::Instant::now();
    assert!(coordinator.sync(&state).await.is_err());
    assert_eq!(remote.calls().len(), 1);
    assert_eq!(started.elapsed(), Duration::ZERO);
}

// ============================================================================
// SECTION: Single Flight
// ============================================================================

#[tokio::test]
async fn concurrent_sync_is_rejected_without_side_effects() {
    let remote = Arc::new(ScriptedRemote::gated());
    let coordinator = Arc::new(coordinator(&remote, RetryPolicy::NONE));

    let first = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move { coordinator.sync(&full_state()).await })
    };
    remote.entered.notified().await;
    assert!(coordinator.status().is_syncing);

    let second = coordinator.sync(&full_state()).await;
    assert!(matches!(second, Err(SyncError::AlreadyInProgress)));
    let status = coordinator.status();
    assert!(status.is_syncing);
    assert!(status.sync_errors.is_empty());
    assert_eq!(status.failed_changes, 0);
    assert_eq!(remote.calls().len(), 1);

    remote.release.notify_one();
    first.await.unwrap().unwrap();
    assert!(!coordinator.status().is_syncing);
    assert_eq!(remote.calls().len(), 4);
}

#[tokio::test]
async fn dropped_sync_releases_the_flight_slot() {
    let remote = Arc::new(ScriptedRemote::gated());
    let coordinator = Arc::new(coordinator(&remote, RetryPolicy::NONE));

    let first = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move { coordinator.sync(&full_state()).await })
    };
    remote.entered.notified().await;
    first.abort();
    assert!(first.await.unwrap_err().is_cancelled());

    assert!(!coordinator.status().is_syncing);
    coordinator.sync(&full_state()).await.unwrap();
}

// ============================================================================
// SECTION: Status
// ============================================================================

#[tokio::test]
async fn status_is_a_copy() {
    let remote = Arc::new(ScriptedRemote::default());
    let coordinator = coordinator(&remote, RetryPolicy::NONE);
    let mut status = coordinator.status();
    status.failed_changes = 42;
    status.sync_errors.push("local edit".to_string());
    assert_eq!(coordinator.status().failed_changes, 0);
    assert!(coordinator.status().sync_errors.is_empty());
}

#[tokio::test]
async fn reset_status_clears_counters() {
    let remote = Arc::new(ScriptedRemote::default());
    remote.fail("test_result", vec![RemoteError::Rejected("no".to_string())]);
    let coordinator = coordinator(&remote, RetryPolicy::NONE);
    coordinator.record_local_changes(3);
    assert!(coordinator.sync(&full_state()).await.is_err());

    coordinator.reset_status();
    assert_eq!(coordinator.status(), statevault_sync::SyncStatus::default());
}

// ============================================================================
// SECTION: Remote Loads
// ============================================================================

#[tokio::test]
async fn load_from_remote_uses_facility_and_limits() {
    let remote = Arc::new(ScriptedRemote::default());
    let coordinator = coordinator(&remote, RetryPolicy::NONE);
    let snapshot = coordinator.load_from_remote().await.unwrap();

    assert_eq!(snapshot.incidents, vec![incident("remote-i1")]);
    assert_eq!(snapshot.settings, Some(settings("remote-s1")));
    assert_eq!(snapshot.recent_test_results, vec![test_result("remote-t1")]);
    assert_eq!(remote.calls(), vec![
        format!("load_incident_history:{FACILITY}"),
        format!("load_compliance_settings:{FACILITY}"),
        format!("load_recent_activity:{FACILITY}:20"),
        format!("load_recent_test_results:{FACILITY}:50"),
    ]);
    let status = coordinator.status();
    assert!(!status.is_syncing);
    assert_eq!(status.last_sync_time, None);
}

#[tokio::test]
async fn load_failure_names_the_operation() {
    let remote = Arc::new(ScriptedRemote::default());
    remote.fail("load_compliance_settings", vec![RemoteError::Rejected("denied".to_string())]);
    let coordinator = coordinator(&remote, RetryPolicy::NONE);
    let err = coordinator.load_from_remote().await.unwrap_err();
    assert!(matches!(err, SyncError::Load { operation: "load_compliance_settings", .. }));
}

// ============================================================================
// SECTION: Configuration
// ============================================================================

#[tokio::test]
async fn from_config_uses_configured_facility_and_retry_settings() {
    let config = StateVaultConfig::from_toml_str(concat!(
        "[persistence]\nretry_attempts = 4\nretry_delay_ms = 250\n\n",
        "[sync]\nfacility_id = \"facility-9\"\n",
    ))
    .unwrap();
    let remote = Arc::new(ScriptedRemote::default());
    let coordinator =
        SyncCoordinator::from_config(Arc::clone(&remote) as Arc<dyn RemoteStore>, &config.sync, &config.persistence)
            .unwrap();

    assert_eq!(coordinator.facility_id(), "facility-9");
    assert_eq!(coordinator.retry_policy(), retry(4, 250));
    coordinator.load_from_remote().await.unwrap();
    assert_eq!(remote.calls()[0], "load_incident_history:facility-9");
}

#[test]
fn from_config_without_facility_builds_nothing() {
    let config = StateVaultConfig::default();
    let remote = Arc::new(ScriptedRemote::default());
    assert!(
        SyncCoordinator::from_config(remote, &config.sync, &PersistenceConfig::default())
            .is_none()
    );
}
