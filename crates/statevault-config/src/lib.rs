// crates/statevault-config/src/lib.rs
// ============================================================================
// Module: State Vault Config Library
// Description: Persistence config model, validation, and file loading.
// Purpose: Single source of truth for statevault.toml semantics.
// Dependencies: serde, toml, statevault-store-sqlite
// ============================================================================

//! ## Overview
//! `statevault-config` defines [`PersistenceConfig`], its partial
//! [`PersistenceConfigOverrides`], and the [`StateVaultConfig`] file model.
//! Validation is strict and fails closed; a config value is never half
//! applied.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod examples;
pub mod persistence;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
pub use examples::config_toml_example;
pub use persistence::*;
