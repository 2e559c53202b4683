// crates/statevault-core/src/core/mod.rs
// ============================================================================
// Module: State Vault Core Types
// Description: Envelope, backup, digest, and time primitives.
// Purpose: Provide stable, serializable records shared by every State Vault crate.
// Dependencies: serde, serde_json, serde_jcs, sha2, time
// ============================================================================

//! ## Overview
//! Core types are the on-disk contract: a [`StateEnvelope`] is what lands under
//! `state.current`, a list of [`Backup`] values is what lands under
//! `state.backups`, and an [`ExportBundle`] is what operator tooling moves
//! between machines.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod clock;
pub mod envelope;
pub mod hashing;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use clock::Clock;
pub use clock::ManualClock;
pub use clock::SharedClock;
pub use clock::SystemClock;
pub use envelope::Backup;
pub use envelope::EXPORT_FORMAT;
pub use envelope::ExportBundle;
pub use envelope::IntegrityError;
pub use envelope::StateEnvelope;
pub use hashing::ChecksumValidator;
pub use hashing::DEFAULT_HASH_ALGORITHM;
pub use hashing::HashAlgorithm;
pub use hashing::HashDigest;
pub use hashing::HashError;
