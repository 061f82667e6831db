use thiserror::Error;

use crate::algorithm::PqAlgorithm;

/// Error type for cryptographic operations.
///
/// Every failure here is definite: a malformed key or signature is invalid,
/// never "unverified". Validation paths map these to deterministic rejects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("unsupported algorithm")]
    UnsupportedAlgorithm,

    #[error("{kind} must be {expected} bytes for {algorithm}, got {actual}")]
    BadLength {
        kind: &'static str,
        algorithm: PqAlgorithm,
        expected: usize,
        actual: usize,
    },

    #[error("{kind} exceeds {max} byte bound for {algorithm}: {actual}")]
    OverLength {
        kind: &'static str,
        algorithm: PqAlgorithm,
        max: usize,
        actual: usize,
    },

    #[error("truncated serialization: need at least {need} bytes, got {got}")]
    Truncated { need: usize, got: usize },

    #[error("unknown algorithm tag 0x{0:02x}")]
    UnknownTag(u8),

    #[error("algorithm mismatch: signature is {signature}, key is {key}")]
    AlgorithmMismatch {
        signature: PqAlgorithm,
        key: PqAlgorithm,
    },

    #[error("signing failed for {0}")]
    SigningFailed(PqAlgorithm),

    #[error("key generation failed for {0}")]
    KeyGenFailed(PqAlgorithm),

    #[error("invalid legacy key material")]
    InvalidLegacyKey,
}

pub type CryptoResult<T> = Result<T, CryptoError>;
