// crates/statevault-config/src/persistence.rs
// ============================================================================
// Module: Persistence Configuration
// Description: Auto-save, backup retention, and sync retry settings.
// Purpose: Provide an immutable, always-valid persistence config.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! [`PersistenceConfig`] can only be obtained from [`Default`] or from
//! [`PersistenceConfig::merged`], so every value in circulation has passed
//! validation. Hosts describe changes with [`PersistenceConfigOverrides`];
//! fields left as `None` keep their current value.
//!
//! In TOML, durations are integer milliseconds (`auto_save_interval_ms`,
//! `retry_delay_ms`).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;
use serde::Deserializer;

use crate::config::ConfigError;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Default auto-save interval.
pub const DEFAULT_AUTO_SAVE_INTERVAL: Duration = Duration::from_secs(30);
/// Default backup retention bound.
pub const DEFAULT_MAX_BACKUP_COUNT: usize = 5;
/// Default number of sync retries after the first attempt.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
/// Default delay between sync attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);
/// Upper bound for the backup retention count.
pub const MAX_BACKUP_COUNT: usize = 1_000;
/// Upper bound for sync retries.
pub const MAX_RETRY_ATTEMPTS: u32 = 20;
/// Upper bound for the auto-save interval.
pub const MAX_AUTO_SAVE_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);
/// Upper bound for the retry delay.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(5 * 60);

// ============================================================================
// SECTION: Persistence Config
// ============================================================================

/// Validated persistence settings.
///
/// # Invariants
/// - `auto_save_interval` is non-zero and at most [`MAX_AUTO_SAVE_INTERVAL`].
/// - `max_backup_count` is between 1 and [`MAX_BACKUP_COUNT`].
/// - `retry_attempts` is at most [`MAX_RETRY_ATTEMPTS`].
/// - `retry_delay` is at most [`MAX_RETRY_DELAY`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistenceConfig {
    /// Whether periodic auto-save runs.
    auto_save: bool,
    /// Period between auto-saves.
    auto_save_interval: Duration,
    /// Backup retention bound.
    max_backup_count: NonZeroUsize,
    /// Whether reconnecting triggers a sync.
    sync_on_connect: bool,
    /// Retries after the first failed remote attempt.
    retry_attempts: u32,
    /// Delay between remote attempts.
    retry_delay: Duration,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            auto_save: true,
            auto_save_interval: DEFAULT_AUTO_SAVE_INTERVAL,
            max_backup_count: NonZeroUsize::MIN.saturating_add(DEFAULT_MAX_BACKUP_COUNT - 1),
            sync_on_connect: true,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl PersistenceConfig {
    /// Returns whether auto-save is enabled.
    #[must_use]
    pub const fn auto_save(&self) -> bool {
        self.auto_save
    }

    /// Returns the auto-save period.
    #[must_use]
    pub const fn auto_save_interval(&self) -> Duration {
        self.auto_save_interval
    }

    /// Returns the backup retention bound.
    #[must_use]
    pub const fn max_backup_count(&self) -> NonZeroUsize {
        self.max_backup_count
    }

    /// Returns whether reconnecting triggers a sync.
    #[must_use]
    pub const fn sync_on_connect(&self) -> bool {
        self.sync_on_connect
    }

    /// Returns the number of retries after a failed first attempt.
    #[must_use]
    pub const fn retry_attempts(&self) -> u32 {
        self.retry_attempts
    }

    /// Returns the delay between remote attempts.
    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    /// Applies `overrides` and returns the resulting config.
    ///
    /// `self` is left untouched whether or not the merge succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when any merged value is out of range.
    pub fn merged(&self, overrides: &PersistenceConfigOverrides) -> Result<Self, ConfigError> {
        let max_backup_count = match overrides.max_backup_count {
            Some(count) => validate_backup_count(count)?,
            None => self.max_backup_count,
        };
        let merged = Self {
            auto_save: overrides.auto_save.unwrap_or(self.auto_save),
            auto_save_interval: overrides.auto_save_interval.unwrap_or(self.auto_save_interval),
            max_backup_count,
            sync_on_connect: overrides.sync_on_connect.unwrap_or(self.sync_on_connect),
            retry_attempts: overrides.retry_attempts.unwrap_or(self.retry_attempts),
            retry_delay: overrides.retry_delay.unwrap_or(self.retry_delay),
        };
        merged.validate()?;
        Ok(merged)
    }

    /// Checks every range invariant.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.auto_save_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "persistence.auto_save_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.auto_save_interval > MAX_AUTO_SAVE_INTERVAL {
            return Err(ConfigError::Invalid(
                "persistence.auto_save_interval_ms exceeds max".to_string(),
            ));
        }
        validate_backup_count(self.max_backup_count.get())?;
        if self.retry_attempts > MAX_RETRY_ATTEMPTS {
            return Err(ConfigError::Invalid(format!(
                "persistence.retry_attempts exceeds max {MAX_RETRY_ATTEMPTS}"
            )));
        }
        if self.retry_delay > MAX_RETRY_DELAY {
            return Err(ConfigError::Invalid("persistence.retry_delay_ms exceeds max".to_string()));
        }
        Ok(())
    }
}

/// Validates a raw backup count.
fn validate_backup_count(count: usize) -> Result<NonZeroUsize, ConfigError> {
    let Some(count) = NonZeroUsize::new(count) else {
        return Err(ConfigError::Invalid(
            "persistence.max_backup_count must be at least 1".to_string(),
        ));
    };
    if count.get() > MAX_BACKUP_COUNT {
        return Err(ConfigError::Invalid(format!(
            "persistence.max_backup_count exceeds max {MAX_BACKUP_COUNT}"
        )));
    }
    Ok(count)
}

// ============================================================================
// SECTION: Overrides
// ============================================================================

/// Partial persistence settings; `None` keeps the current value.
///
/// This is also the shape of the `[persistence]` TOML table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct PersistenceConfigOverrides {
    /// Enables or disables auto-save.
    #[serde(default)]
    pub auto_save: Option<bool>,
    /// Auto-save period.
    #[serde(default, rename = "auto_save_interval_ms", deserialize_with = "optional_millis")]
    pub auto_save_interval: Option<Duration>,
    /// Backup retention bound.
    #[serde(default)]
    pub max_backup_count: Option<usize>,
    /// Sync on reconnect.
    #[serde(default)]
    pub sync_on_connect: Option<bool>,
    /// Retries after the first failed remote attempt.
    #[serde(default)]
    pub retry_attempts: Option<u32>,
    /// Delay between remote attempts.
    #[serde(default, rename = "retry_delay_ms", deserialize_with = "optional_millis")]
    pub retry_delay: Option<Duration>,
}

/// Reads an optional millisecond count as a [`Duration`].
fn optional_millis<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
}
