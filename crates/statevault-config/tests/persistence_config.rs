//! Persistence config tests for statevault-config.
// crates/statevault-config/tests/persistence_config.rs
// =============================================================================
// Module: Persistence Config Tests
// Description: Validate defaults, partial merges, and range checks.
// Purpose: Ensure persistence settings are always valid once constructed.
// =============================================================================

use std::time::Duration;

use statevault_config::ConfigError;
use statevault_config::MAX_BACKUP_COUNT;
use statevault_config::MAX_RETRY_ATTEMPTS;
use statevault_config::PersistenceConfig;
use statevault_config::PersistenceConfigOverrides;

type TestResult = Result<(), String>;

fn assert_invalid(result: Result<PersistenceConfig, ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(_) => Err("expected invalid persistence config".to_string()),
    }
}

#[test]
fn defaults_match_documented_values() -> TestResult {
    let config = PersistenceConfig::default();
    if !config.auto_save() || !config.sync_on_connect() {
        return Err("auto_save and sync_on_connect default to true".to_string());
    }
    if config.auto_save_interval() != Duration::from_secs(30) {
        return Err(format!("unexpected interval {:?}", config.auto_save_interval()));
    }
    if config.max_backup_count().get() != 5 {
        return Err(format!("unexpected backup count {}", config.max_backup_count()));
    }
    if config.retry_attempts() != 3 || config.retry_delay() != Duration::from_secs(1) {
        return Err("unexpected retry defaults".to_string());
    }
    Ok(())
}

#[test]
fn merge_changes_only_named_fields() -> TestResult {
    let base = PersistenceConfig::default();
    let overrides = PersistenceConfigOverrides {
        max_backup_count: Some(2),
        retry_delay: Some(Duration::from_millis(250)),
        ..PersistenceConfigOverrides::default()
    };
    let merged = base.merged(&overrides).map_err(|err| err.to_string())?;
    if merged.max_backup_count().get() != 2 {
        return Err("max_backup_count not applied".to_string());
    }
    if merged.retry_delay() != Duration::from_millis(250) {
        return Err("retry_delay not applied".to_string());
    }
    if merged.auto_save_interval() != base.auto_save_interval()
        || merged.retry_attempts() != base.retry_attempts()
        || merged.auto_save() != base.auto_save()
    {
        return Err("untouched fields changed".to_string());
    }
    Ok(())
}

#[test]
fn empty_overrides_are_identity() -> TestResult {
    let base = PersistenceConfig::default();
    let merged = base.merged(&PersistenceConfigOverrides::default()).map_err(|err| err.to_string())?;
    if merged != base {
        return Err("empty overrides changed config".to_string());
    }
    Ok(())
}

#[test]
fn zero_interval_is_rejected() -> TestResult {
    let overrides = PersistenceConfigOverrides {
        auto_save_interval: Some(Duration::ZERO),
        ..PersistenceConfigOverrides::default()
    };
    assert_invalid(
        PersistenceConfig::default().merged(&overrides),
        "auto_save_interval_ms must be greater than zero",
    )
}

#[test]
fn zero_backup_count_is_rejected() -> TestResult {
    let overrides = PersistenceConfigOverrides {
        max_backup_count: Some(0),
        ..PersistenceConfigOverrides::default()
    };
    assert_invalid(PersistenceConfig::default().merged(&overrides), "must be at least 1")
}

#[test]
fn oversized_backup_count_is_rejected() -> TestResult {
    let overrides = PersistenceConfigOverrides {
        max_backup_count: Some(MAX_BACKUP_COUNT + 1),
        ..PersistenceConfigOverrides::default()
    };
    assert_invalid(PersistenceConfig::default().merged(&overrides), "max_backup_count exceeds max")
}

#[test]
fn excessive_retry_attempts_are_rejected() -> TestResult {
    let overrides = PersistenceConfigOverrides {
        retry_attempts: Some(MAX_RETRY_ATTEMPTS + 1),
        ..PersistenceConfigOverrides::default()
    };
    assert_invalid(PersistenceConfig::default().merged(&overrides), "retry_attempts exceeds max")
}

#[test]
fn zero_retries_are_allowed() -> TestResult {
    let overrides = PersistenceConfigOverrides {
        retry_attempts: Some(0),
        ..PersistenceConfigOverrides::default()
    };
    let merged = PersistenceConfig::default().merged(&overrides).map_err(|err| err.to_string())?;
    if merged.retry_attempts() != 0 {
        return Err("retry_attempts not applied".to_string());
    }
    Ok(())
}
