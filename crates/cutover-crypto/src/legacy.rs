// Legacy elliptic-curve collaborator.
//
// The cut-over engine never defines the legacy scheme; it consumes it
// through the [`LegacyVerifier`] seam. The secp256k1-backed implementation
// here is the production collaborator; hosts with their own verification
// stack can supply a different one.

use std::fmt;

use ripemd::Ripemd160;
use secp256k1::{ecdsa, Message, PublicKey, Secp256k1, SecretKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{CryptoError, CryptoResult};

/// Compressed secp256k1 public key length.
pub const LEGACY_PUBKEY_LEN: usize = 33;
/// Compact ECDSA signature length.
pub const LEGACY_SIG_LEN: usize = 64;

/// Short digest identifying a legacy public key: RIPEMD160(SHA256(pubkey)).
/// Used as the migration registry lookup key and as the 20-byte payload of
/// key-hash addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LegacyFingerprint(pub [u8; 20]);

impl LegacyFingerprint {
    /// Fingerprint of a serialized legacy public key.
    pub fn of_pubkey(pubkey: &[u8]) -> LegacyFingerprint {
        let sha = Sha256::digest(pubkey);
        let rip = Ripemd160::digest(sha);
        let mut out = [0u8; 20];
        out.copy_from_slice(&rip);
        LegacyFingerprint(out)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn from_slice(data: &[u8]) -> Option<LegacyFingerprint> {
        let arr: [u8; 20] = data.try_into().ok()?;
        Some(LegacyFingerprint(arr))
    }
}

impl fmt::Display for LegacyFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Verification seam for the pre-existing legacy signature scheme.
pub trait LegacyVerifier: Send + Sync {
    /// Verify `signature` (compact encoding) over a 32-byte digest against a
    /// serialized public key. Malformed inputs are `false`, never an error.
    fn verify(&self, signature: &[u8], digest: &[u8; 32], pubkey: &[u8]) -> bool;
}

/// secp256k1-backed legacy verifier and signer.
pub struct Secp256k1Verifier {
    secp: Secp256k1<secp256k1::All>,
}

impl Secp256k1Verifier {
    pub fn new() -> Self {
        Self {
            secp: Secp256k1::new(),
        }
    }

    /// Generate a legacy keypair, returning (secret bytes, compressed pubkey).
    pub fn generate_keypair<R: rand::Rng + rand::CryptoRng>(
        &self,
        rng: &mut R,
    ) -> ([u8; 32], Vec<u8>) {
        let (sk, pk) = self.secp.generate_keypair(rng);
        (sk.secret_bytes(), pk.serialize().to_vec())
    }

    /// Sign a 32-byte digest with a legacy secret key (compact encoding).
    pub fn sign_digest(&self, secret: &[u8; 32], digest: &[u8; 32]) -> CryptoResult<Vec<u8>> {
        let sk = SecretKey::from_slice(secret).map_err(|_| CryptoError::InvalidLegacyKey)?;
        let msg = Message::from_digest_slice(digest).map_err(|_| CryptoError::InvalidLegacyKey)?;
        let sig = self.secp.sign_ecdsa(&msg, &sk);
        Ok(sig.serialize_compact().to_vec())
    }
}

impl Default for Secp256k1Verifier {
    fn default() -> Self {
        Self::new()
    }
}

impl LegacyVerifier for Secp256k1Verifier {
    fn verify(&self, signature: &[u8], digest: &[u8; 32], pubkey: &[u8]) -> bool {
        let Ok(sig) = ecdsa::Signature::from_compact(signature) else {
            return false;
        };
        let Ok(pk) = PublicKey::from_slice(pubkey) else {
            return false;
        };
        let Ok(msg) = Message::from_digest_slice(digest) else {
            return false;
        };
        self.secp.verify_ecdsa(&msg, &sig, &pk).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_sign_verify_round_trip() {
        let v = Secp256k1Verifier::new();
        let (sk, pk) = v.generate_keypair(&mut rand::thread_rng());
        let digest = [0x5au8; 32];
        let sig = v.sign_digest(&sk, &digest).unwrap();
        assert!(v.verify(&sig, &digest, &pk));

        let mut wrong = digest;
        wrong[0] ^= 1;
        assert!(!v.verify(&sig, &wrong, &pk));
    }

    #[test]
    fn malformed_inputs_are_false_not_errors() {
        let v = Secp256k1Verifier::new();
        let digest = [0u8; 32];
        assert!(!v.verify(&[], &digest, &[]));
        assert!(!v.verify(&[1u8; 64], &digest, &[2u8; 33]));
    }

    #[test]
    fn fingerprint_is_deterministic_and_20_bytes() {
        let v = Secp256k1Verifier::new();
        let (_, pk) = v.generate_keypair(&mut rand::thread_rng());
        let a = LegacyFingerprint::of_pubkey(&pk);
        let b = LegacyFingerprint::of_pubkey(&pk);
        assert_eq!(a, b);
        assert_eq!(a.as_bytes().len(), 20);
        assert_eq!(LegacyFingerprint::from_slice(a.as_bytes()), Some(a));
        assert_eq!(LegacyFingerprint::from_slice(&[0u8; 19]), None);
    }
}
