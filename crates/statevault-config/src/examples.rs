// crates/statevault-config/src/examples.rs
// ============================================================================
// Module: Config Examples
// Description: Canonical example configuration payload.
// Purpose: Deterministic example for docs and tooling.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Canonical example `statevault.toml`. Values match the built-in defaults
//! except for the storage backend, which selects `SQLite`.

/// Returns a canonical example `statevault.toml` configuration.
#[must_use]
pub fn config_toml_example() -> String {
    String::from(
        r#"[persistence]
auto_save = true
auto_save_interval_ms = 30000
max_backup_count = 5
sync_on_connect = true
retry_attempts = 3
retry_delay_ms = 1000

[storage]
type = "sqlite"
path = "statevault.db"
busy_timeout_ms = 5000
journal_mode = "wal"
sync_mode = "full"

[state]
schema_version = "1"

[sync]
facility_id = "facility-1"
"#,
    )
}
