// crates/statevault-sync/src/remote.rs
// ============================================================================
// Module: Remote Store Interface
// Description: Async contract for the remote compliance store.
// Purpose: Keep the remote schema behind a narrow, fakeable trait.
// Dependencies: async-trait, thiserror
// ============================================================================

//! ## Overview
//! [`RemoteStore`] lists the only remote operations State Vault performs.
//! Implementations classify failures with [`RemoteError`]; only transient
//! variants are retried by the coordinator.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::records::ActivityRecord;
use crate::records::ComplianceSettingsRecord;
use crate::records::FailureIncidentRecord;
use crate::records::TestResultRecord;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Remote store failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// Remote unreachable or temporarily failing.
    #[error("remote unavailable: {0}")]
    Unavailable(String),
    /// Remote did not answer in time.
    #[error("remote timed out: {0}")]
    Timeout(String),
    /// Remote refused the request; retrying will not help.
    #[error("remote rejected request: {0}")]
    Rejected(String),
}

impl RemoteError {
    /// Returns true when the failure may succeed on retry.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout(_))
    }
}

// ============================================================================
// SECTION: Remote Store
// ============================================================================

/// Remote compliance store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Creates or updates a test result.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] when the remote call fails.
    async fn create_or_update_test_result(
        &self,
        result: &TestResultRecord,
    ) -> Result<(), RemoteError>;

    /// Creates a failure incident.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] when the remote call fails.
    async fn create_failure_incident(
        &self,
        incident: &FailureIncidentRecord,
    ) -> Result<(), RemoteError>;

    /// Upserts facility settings, resolving conflicts on `conflict_key`.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] when the remote call fails.
    async fn upsert_compliance_settings(
        &self,
        settings: &ComplianceSettingsRecord,
        conflict_key: &str,
    ) -> Result<(), RemoteError>;

    /// Loads the incident history of a facility.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] when the remote call fails.
    async fn load_incident_history(
        &self,
        facility_id: &str,
    ) -> Result<Vec<FailureIncidentRecord>, RemoteError>;

    /// Loads the settings of a facility.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] when the remote call fails.
    async fn load_compliance_settings(
        &self,
        facility_id: &str,
    ) -> Result<Option<ComplianceSettingsRecord>, RemoteError>;

    /// Loads up to `limit` recent activity entries.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] when the remote call fails.
    async fn load_recent_activity(
        &self,
        facility_id: &str,
        limit: usize,
    ) -> Result<Vec<ActivityRecord>, RemoteError>;

    /// Loads up to `limit` recent test results.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] when the remote call fails.
    async fn load_recent_test_results(
        &self,
        facility_id: &str,
        limit: usize,
    ) -> Result<Vec<TestResultRecord>, RemoteError>;
}

/// Shared remote store handle.
pub type SharedRemote = Arc<dyn RemoteStore>;
