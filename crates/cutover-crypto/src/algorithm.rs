// Post-quantum signature algorithm identifiers.
//
// SAFETY INVARIANTS:
// 1. Every key and signature object carries its algorithm and must match the
//    length table below, or it is invalid (never merely "unverified").
// 2. Serialized keys and signatures are self-describing: the first byte is
//    the algorithm tag, so new algorithms can be added without re-encoding
//    existing material.
// 3. Unknown fails every operation closed.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Serialization tag for Dilithium3.
pub const TAG_DILITHIUM3: u8 = 0x01;
/// Serialization tag for Falcon-512.
pub const TAG_FALCON512: u8 = 0x02;

/// Post-quantum signature algorithm.
///
/// Dilithium3 is the primary scheme; Falcon-512 is the fallback with much
/// smaller keys and signatures. Adding an algorithm means adding a variant
/// here plus a dispatch arm in [`crate::scheme`] — no trait objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PqAlgorithm {
    /// CRYSTALS-Dilithium mode 3 (primary).
    Dilithium3,
    /// FALCON-512 (fallback).
    Falcon512,
    /// Unrecognized algorithm. All operations on it fail closed.
    Unknown,
}

impl PqAlgorithm {
    /// Public key length in bytes. Exact match required.
    pub fn public_key_len(&self) -> Option<usize> {
        match self {
            PqAlgorithm::Dilithium3 => Some(1952),
            PqAlgorithm::Falcon512 => Some(897),
            PqAlgorithm::Unknown => None,
        }
    }

    /// Secret key length in bytes. Exact match required.
    pub fn secret_key_len(&self) -> Option<usize> {
        match self {
            PqAlgorithm::Dilithium3 => Some(4032),
            PqAlgorithm::Falcon512 => Some(1281),
            PqAlgorithm::Unknown => None,
        }
    }

    /// Maximum signature length in bytes. Dilithium3 signatures are exactly
    /// this long; Falcon signatures are variable-length up to the bound.
    pub fn max_signature_len(&self) -> Option<usize> {
        match self {
            PqAlgorithm::Dilithium3 => Some(3309),
            PqAlgorithm::Falcon512 => Some(666),
            PqAlgorithm::Unknown => None,
        }
    }

    /// Whether signatures for this algorithm are fixed-length.
    pub fn fixed_signature_len(&self) -> bool {
        matches!(self, PqAlgorithm::Dilithium3)
    }

    /// Serialization tag byte.
    pub fn tag(&self) -> Option<u8> {
        match self {
            PqAlgorithm::Dilithium3 => Some(TAG_DILITHIUM3),
            PqAlgorithm::Falcon512 => Some(TAG_FALCON512),
            PqAlgorithm::Unknown => None,
        }
    }

    /// Resolve a tag byte. Unrecognized tags map to `Unknown`, which fails
    /// closed everywhere, so forward-compatible parsing never aborts.
    pub fn from_tag(tag: u8) -> PqAlgorithm {
        match tag {
            TAG_DILITHIUM3 => PqAlgorithm::Dilithium3,
            TAG_FALCON512 => PqAlgorithm::Falcon512,
            _ => PqAlgorithm::Unknown,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, PqAlgorithm::Unknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PqAlgorithm::Dilithium3 => "Dilithium3",
            PqAlgorithm::Falcon512 => "Falcon512",
            PqAlgorithm::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for PqAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PqAlgorithm {
    type Err = ();

    /// Never fails: unrecognized names become `Unknown`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "Dilithium3" => PqAlgorithm::Dilithium3,
            "Falcon512" => PqAlgorithm::Falcon512,
            _ => PqAlgorithm::Unknown,
        })
    }
}
