// crates/statevault-sync/src/records.rs
// ============================================================================
// Module: Sync Records
// Description: Record envelopes exchanged with the remote store.
// Purpose: Carry opaque compliance payloads with the ids sync needs.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Sync only needs an identifier and a facility per record; the payload is
//! passed through untouched. [`SyncState`] groups the three pushed
//! categories and [`RemoteSnapshot`] is what the remote loaders return.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

// ============================================================================
// SECTION: Categories
// ============================================================================

/// Category of pushed records, in sync order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncCategory {
    /// Test results.
    TestResult,
    /// Failure incidents.
    Incident,
    /// Compliance settings.
    Settings,
}

impl SyncCategory {
    /// Returns the stable label used in logs and error entries.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TestResult => "test_result",
            Self::Incident => "incident",
            Self::Settings => "settings",
        }
    }
}

impl fmt::Display for SyncCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Records
// ============================================================================

/// A test result to create or update remotely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResultRecord {
    /// Record identifier.
    pub id: String,
    /// Owning facility.
    pub facility_id: String,
    /// Opaque domain payload.
    #[serde(default)]
    pub payload: Value,
}

/// A failure incident to create remotely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureIncidentRecord {
    /// Record identifier.
    pub id: String,
    /// Owning facility.
    pub facility_id: String,
    /// Opaque domain payload.
    #[serde(default)]
    pub payload: Value,
}

/// Facility compliance settings, upserted by facility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceSettingsRecord {
    /// Record identifier.
    pub id: String,
    /// Owning facility; also the upsert conflict key.
    pub facility_id: String,
    /// Opaque domain payload.
    #[serde(default)]
    pub payload: Value,
}

/// A recent activity entry returned by the remote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    /// Entry identifier.
    pub id: String,
    /// Owning facility.
    pub facility_id: String,
    /// Opaque domain payload.
    #[serde(default)]
    pub payload: Value,
}

// ============================================================================
// SECTION: Aggregates
// ============================================================================

/// Local state pushed by a sync.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncState {
    /// Test results, pushed first.
    #[serde(default)]
    pub test_results: Vec<TestResultRecord>,
    /// Failure incidents, pushed second.
    #[serde(default)]
    pub incidents: Vec<FailureIncidentRecord>,
    /// Compliance settings, pushed last when present.
    #[serde(default)]
    pub settings: Option<ComplianceSettingsRecord>,
}

impl SyncState {
    /// Returns the number of records a sync would push.
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.test_results.len() + self.incidents.len() + usize::from(self.settings.is_some())
    }
}

/// Authoritative remote view for cold start or manual refresh.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteSnapshot {
    /// Incident history for the facility.
    pub incidents: Vec<FailureIncidentRecord>,
    /// Facility settings, if any.
    pub settings: Option<ComplianceSettingsRecord>,
    /// Most recent activity entries.
    pub recent_activity: Vec<ActivityRecord>,
    /// Most recent test results.
    pub recent_test_results: Vec<TestResultRecord>,
}
