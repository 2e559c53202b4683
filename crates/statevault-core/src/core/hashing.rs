// crates/statevault-core/src/core/hashing.rs
// ============================================================================
// Module: State Vault Checksums
// Description: Canonical JSON digests and envelope integrity validation.
// Purpose: Detect corrupted snapshots with a deterministic, order-sensitive digest.
// Dependencies: serde, serde_jcs, sha2, thiserror
// ============================================================================

//! ## Overview
//! Payloads are canonicalized with RFC 8785 (JCS) before hashing, so the same
//! logical value always yields the same digest across calls and restarts,
//! regardless of map insertion order. Array order is significant.
//!
//! [`ChecksumValidator::is_valid`] never fails: anything that cannot be
//! canonicalized is reported as invalid.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

use crate::core::envelope::IntegrityError;
use crate::core::envelope::StateEnvelope;

// ============================================================================
// SECTION: Hash Algorithm
// ============================================================================

/// Supported digest algorithms for envelope checksums.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgorithm {
    /// SHA-256 over canonical JSON.
    Sha256,
}

/// Default digest algorithm for new envelopes.
pub const DEFAULT_HASH_ALGORITHM: HashAlgorithm = HashAlgorithm::Sha256;

// ============================================================================
// SECTION: Hash Digest
// ============================================================================

/// Envelope checksum: algorithm tag plus lowercase hex digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashDigest {
    /// Algorithm used to produce `value`.
    pub algorithm: HashAlgorithm,
    /// Lowercase hex-encoded digest bytes.
    pub value: String,
}

impl HashDigest {
    /// Creates a digest from raw bytes.
    #[must_use]
    pub fn new(algorithm: HashAlgorithm, bytes: &[u8]) -> Self {
        Self {
            algorithm,
            value: hex_encode(bytes),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while computing a digest.
#[derive(Debug, Error)]
pub enum HashError {
    /// The payload could not be canonicalized.
    #[error("failed to canonicalize payload: {0}")]
    Canonicalization(String),
}

// ============================================================================
// SECTION: Checksum Validator
// ============================================================================

/// Computes and verifies envelope checksums.
///
/// # Invariants
/// - Output depends only on the payload value and the algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChecksumValidator {
    /// Algorithm used for newly computed digests.
    algorithm: HashAlgorithm,
}

impl Default for ChecksumValidator {
    fn default() -> Self {
        Self::new(DEFAULT_HASH_ALGORITHM)
    }
}

impl ChecksumValidator {
    /// Creates a validator producing digests with `algorithm`.
    #[must_use]
    pub const fn new(algorithm: HashAlgorithm) -> Self {
        Self {
            algorithm,
        }
    }

    /// Returns the algorithm used for new digests.
    #[must_use]
    pub const fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Computes the digest of `payload` over its canonical JSON form.
    ///
    /// # Errors
    ///
    /// Returns [`HashError::Canonicalization`] when the payload cannot be
    /// serialized (for example non-finite floats).
    pub fn compute_digest<T: Serialize + ?Sized>(
        &self,
        payload: &T,
    ) -> Result<HashDigest, HashError> {
        digest_with(self.algorithm, payload)
    }

    /// Returns true when the envelope's stored checksum matches its data.
    #[must_use]
    pub fn is_valid(&self, envelope: &StateEnvelope) -> bool {
        self.verify(envelope).is_ok()
    }

    /// Verifies an envelope, reporting why it failed.
    ///
    /// The digest is recomputed with the algorithm recorded in the envelope,
    /// not the validator's default.
    ///
    /// # Errors
    ///
    /// Returns [`IntegrityError`] when the payload cannot be canonicalized or
    /// the recomputed digest differs from the stored one.
    pub fn verify(&self, envelope: &StateEnvelope) -> Result<(), IntegrityError> {
        let actual = digest_with(envelope.checksum.algorithm, &envelope.data)
            .map_err(|err| IntegrityError::Unhashable(err.to_string()))?;
        if actual.value != envelope.checksum.value {
            return Err(IntegrityError::Mismatch {
                expected: envelope.checksum.value.clone(),
                actual: actual.value,
            });
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Hashing Helpers
// ============================================================================

/// Returns canonical JSON bytes for a serializable value using RFC 8785.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when serialization fails.
pub fn canonical_json_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, HashError> {
    serde_jcs::to_vec(value).map_err(|err| HashError::Canonicalization(err.to_string()))
}

/// Hashes the canonical JSON form of `value` with `algorithm`.
fn digest_with<T: Serialize + ?Sized>(
    algorithm: HashAlgorithm,
    value: &T,
) -> Result<HashDigest, HashError> {
    let bytes = canonical_json_bytes(value)?;
    match algorithm {
        HashAlgorithm::Sha256 => {
            let digest = Sha256::digest(&bytes);
            Ok(HashDigest::new(HashAlgorithm::Sha256, &digest))
        }
    }
}

/// Encodes bytes as a lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(char::from(HEX[usize::from(byte >> 4)]));
        out.push(char::from(HEX[usize::from(byte & 0x0f)]));
    }
    out
}
