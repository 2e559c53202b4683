// crates/statevault-sync/src/retry.rs
// ============================================================================
// Module: Retry Policy
// Description: Bounded retries with a fixed delay for transient failures.
// Purpose: Re-invoke remote operations before a failure becomes final.
// Dependencies: statevault-config, tokio, tracing
// ============================================================================

//! ## Overview
//! An operation runs once and is retried up to `retry_attempts` more times,
//! sleeping `retry_delay` between attempts. Only transient
//! [`RemoteError`]s are retried; a rejection ends the loop immediately.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::future::Future;
use std::time::Duration;

use statevault_config::PersistenceConfig;
use tracing::debug;

use crate::remote::RemoteError;

// ============================================================================
// SECTION: Retry Policy
// ============================================================================

/// Retry settings for remote operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub retry_attempts: u32,
    /// Delay between attempts.
    pub retry_delay: Duration,
}

impl RetryPolicy {
    /// Policy that never retries.
    pub const NONE: Self = Self {
        retry_attempts: 0,
        retry_delay: Duration::ZERO,
    };

    /// Builds the policy described by `config`.
    #[must_use]
    pub const fn from_config(config: &PersistenceConfig) -> Self {
        Self {
            retry_attempts: config.retry_attempts(),
            retry_delay: config.retry_delay(),
        }
    }

    /// Runs `op` under this policy.
    ///
    /// # Errors
    ///
    /// Returns the last [`RemoteError`] once retries are exhausted or the
    /// error is not transient.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, RemoteError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let mut retries: u32 = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && retries < self.retry_attempts => {
                    retries = retries.saturating_add(1);
                    debug!(
                        operation,
                        retry = retries,
                        max_retries = self.retry_attempts,
                        error = %err,
                        "retrying remote operation"
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&PersistenceConfig::default())
    }
}
