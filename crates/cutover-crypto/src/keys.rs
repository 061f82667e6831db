// Algorithm-tagged key and signature buffers.
//
// SAFETY INVARIANTS:
// 1. Construction validates length against the algorithm table; an object
//    that exists is well-formed for its algorithm.
// 2. PqSecretKey is move-only (no Clone) and its backing memory is
//    overwritten on drop.
// 3. The secret/public link is only established by
//    [`crate::scheme::generate_keypair`]; there is no derive-public-from-
//    secret path that could forge it.

use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::algorithm::PqAlgorithm;
use crate::error::{CryptoError, CryptoResult};

/// Post-quantum public key.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawKeyMaterial")]
pub struct PqPublicKey {
    algorithm: PqAlgorithm,
    bytes: Vec<u8>,
}

/// Serde-facing shape of a key or signature. Decoded material is funneled
/// through the validating constructors so invariant 1 holds for keys read
/// back from disk or the wire, not just freshly built ones.
#[derive(Deserialize)]
struct RawKeyMaterial {
    algorithm: PqAlgorithm,
    bytes: Vec<u8>,
}

impl TryFrom<RawKeyMaterial> for PqPublicKey {
    type Error = CryptoError;

    fn try_from(raw: RawKeyMaterial) -> Result<Self, Self::Error> {
        PqPublicKey::from_bytes(raw.algorithm, raw.bytes)
    }
}

impl TryFrom<RawKeyMaterial> for PqSignature {
    type Error = CryptoError;

    fn try_from(raw: RawKeyMaterial) -> Result<Self, Self::Error> {
        PqSignature::from_bytes(raw.algorithm, raw.bytes)
    }
}

impl PqPublicKey {
    pub fn from_bytes(algorithm: PqAlgorithm, bytes: Vec<u8>) -> CryptoResult<Self> {
        let expected = algorithm
            .public_key_len()
            .ok_or(CryptoError::UnsupportedAlgorithm)?;
        if bytes.len() != expected {
            return Err(CryptoError::BadLength {
                kind: "public key",
                algorithm,
                expected,
                actual: bytes.len(),
            });
        }
        Ok(Self { algorithm, bytes })
    }

    pub fn algorithm(&self) -> PqAlgorithm {
        self.algorithm
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Self-describing serialization: tag byte first, then raw key bytes.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + self.bytes.len());
        // Construction guarantees a supported algorithm.
        out.push(self.algorithm.tag().unwrap_or(0));
        out.extend_from_slice(&self.bytes);
        out
    }

    pub fn deserialize(data: &[u8]) -> CryptoResult<Self> {
        let (&tag, rest) = data
            .split_first()
            .ok_or(CryptoError::Truncated { need: 1, got: 0 })?;
        let algorithm = PqAlgorithm::from_tag(tag);
        if !algorithm.is_supported() {
            return Err(CryptoError::UnknownTag(tag));
        }
        Self::from_bytes(algorithm, rest.to_vec())
    }
}

impl fmt::Debug for PqPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PqPublicKey({}, {}..)",
            self.algorithm,
            hex::encode(&self.bytes[..8.min(self.bytes.len())])
        )
    }
}

/// Post-quantum secret key. Move-only; wiped on drop.
pub struct PqSecretKey {
    algorithm: PqAlgorithm,
    bytes: Vec<u8>,
}

impl PqSecretKey {
    pub fn from_bytes(algorithm: PqAlgorithm, bytes: Vec<u8>) -> CryptoResult<Self> {
        let expected = algorithm
            .secret_key_len()
            .ok_or(CryptoError::UnsupportedAlgorithm)?;
        if bytes.len() != expected {
            let actual = bytes.len();
            let mut bytes = bytes;
            bytes.zeroize();
            return Err(CryptoError::BadLength {
                kind: "secret key",
                algorithm,
                expected,
                actual,
            });
        }
        Ok(Self { algorithm, bytes })
    }

    pub fn algorithm(&self) -> PqAlgorithm {
        self.algorithm
    }

    pub(crate) fn expose_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl Drop for PqSecretKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl fmt::Debug for PqSecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print key material.
        write!(f, "PqSecretKey({})", self.algorithm)
    }
}

/// Post-quantum signature.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawKeyMaterial")]
pub struct PqSignature {
    algorithm: PqAlgorithm,
    bytes: Vec<u8>,
}

impl PqSignature {
    pub fn from_bytes(algorithm: PqAlgorithm, bytes: Vec<u8>) -> CryptoResult<Self> {
        let max = algorithm
            .max_signature_len()
            .ok_or(CryptoError::UnsupportedAlgorithm)?;
        if algorithm.fixed_signature_len() {
            if bytes.len() != max {
                return Err(CryptoError::BadLength {
                    kind: "signature",
                    algorithm,
                    expected: max,
                    actual: bytes.len(),
                });
            }
        } else if bytes.is_empty() || bytes.len() > max {
            return Err(CryptoError::OverLength {
                kind: "signature",
                algorithm,
                max,
                actual: bytes.len(),
            });
        }
        Ok(Self { algorithm, bytes })
    }

    pub fn algorithm(&self) -> PqAlgorithm {
        self.algorithm
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Self-describing serialization: tag byte first, then raw signature.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + self.bytes.len());
        out.push(self.algorithm.tag().unwrap_or(0));
        out.extend_from_slice(&self.bytes);
        out
    }

    pub fn deserialize(data: &[u8]) -> CryptoResult<Self> {
        let (&tag, rest) = data
            .split_first()
            .ok_or(CryptoError::Truncated { need: 1, got: 0 })?;
        let algorithm = PqAlgorithm::from_tag(tag);
        if !algorithm.is_supported() {
            return Err(CryptoError::UnknownTag(tag));
        }
        Self::from_bytes(algorithm, rest.to_vec())
    }
}

impl fmt::Debug for PqSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PqSignature({}, {} bytes)", self.algorithm, self.bytes.len())
    }
}
