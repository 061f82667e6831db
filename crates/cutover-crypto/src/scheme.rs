// Signature scheme registry: uniform keygen/sign/verify over the supported
// post-quantum algorithms.
//
// Dispatch is a tagged-variant match keyed by [`PqAlgorithm`], not trait
// objects: a new algorithm is a new enum variant plus a new arm in each of
// the three operations. All three operations fail closed on an unsupported
// algorithm, and verify additionally rejects any signature/key pair whose
// algorithm tags differ before the raw bytes are even parsed
// (cross-algorithm confusion is a specific attack this guards against).

use log::warn;
use pqcrypto_traits::sign::{DetachedSignature as _, PublicKey as _, SecretKey as _};

use crate::algorithm::PqAlgorithm;
use crate::error::{CryptoError, CryptoResult};
use crate::keys::{PqPublicKey, PqSecretKey, PqSignature};

/// Algorithms this build can generate, sign, and verify with.
pub fn supported_algorithms() -> &'static [PqAlgorithm] {
    &[PqAlgorithm::Dilithium3, PqAlgorithm::Falcon512]
}

/// Generate a fresh keypair. This is the only path that links a secret key
/// to its public key.
pub fn generate_keypair(algorithm: PqAlgorithm) -> CryptoResult<(PqSecretKey, PqPublicKey)> {
    match algorithm {
        PqAlgorithm::Dilithium3 => {
            let (pk, sk) = pqcrypto_dilithium::dilithium3::keypair();
            let secret = PqSecretKey::from_bytes(algorithm, sk.as_bytes().to_vec())?;
            let public = PqPublicKey::from_bytes(algorithm, pk.as_bytes().to_vec())?;
            Ok((secret, public))
        }
        PqAlgorithm::Falcon512 => {
            let (pk, sk) = pqcrypto_falcon::falcon512::keypair();
            let secret = PqSecretKey::from_bytes(algorithm, sk.as_bytes().to_vec())?;
            let public = PqPublicKey::from_bytes(algorithm, pk.as_bytes().to_vec())?;
            Ok((secret, public))
        }
        PqAlgorithm::Unknown => Err(CryptoError::UnsupportedAlgorithm),
    }
}

/// Sign a message digest with a secret key.
pub fn sign(secret: &PqSecretKey, digest: &[u8]) -> CryptoResult<PqSignature> {
    let algorithm = secret.algorithm();
    match algorithm {
        PqAlgorithm::Dilithium3 => {
            let sk = pqcrypto_dilithium::dilithium3::SecretKey::from_bytes(secret.expose_bytes())
                .map_err(|_| CryptoError::SigningFailed(algorithm))?;
            let sig = pqcrypto_dilithium::dilithium3::detached_sign(digest, &sk);
            PqSignature::from_bytes(algorithm, sig.as_bytes().to_vec())
        }
        PqAlgorithm::Falcon512 => {
            let sk = pqcrypto_falcon::falcon512::SecretKey::from_bytes(secret.expose_bytes())
                .map_err(|_| CryptoError::SigningFailed(algorithm))?;
            let sig = pqcrypto_falcon::falcon512::detached_sign(digest, &sk);
            PqSignature::from_bytes(algorithm, sig.as_bytes().to_vec())
        }
        PqAlgorithm::Unknown => Err(CryptoError::UnsupportedAlgorithm),
    }
}

/// Verify a signature over a message digest.
///
/// Returns `false` for any malformed input, including a signature whose
/// algorithm tag differs from the key's. Never panics, never errors:
/// consensus paths need a definite boolean.
pub fn verify(signature: &PqSignature, digest: &[u8], public: &PqPublicKey) -> bool {
    if signature.algorithm() != public.algorithm() {
        warn!(
            "rejecting cross-algorithm verify: signature {} vs key {}",
            signature.algorithm(),
            public.algorithm()
        );
        return false;
    }
    match public.algorithm() {
        PqAlgorithm::Dilithium3 => {
            let Ok(pk) = pqcrypto_dilithium::dilithium3::PublicKey::from_bytes(public.as_bytes())
            else {
                return false;
            };
            let Ok(sig) = pqcrypto_dilithium::dilithium3::DetachedSignature::from_bytes(
                signature.as_bytes(),
            ) else {
                return false;
            };
            pqcrypto_dilithium::dilithium3::verify_detached_signature(&sig, digest, &pk).is_ok()
        }
        PqAlgorithm::Falcon512 => {
            let Ok(pk) = pqcrypto_falcon::falcon512::PublicKey::from_bytes(public.as_bytes())
            else {
                return false;
            };
            let Ok(sig) =
                pqcrypto_falcon::falcon512::DetachedSignature::from_bytes(signature.as_bytes())
            else {
                return false;
            };
            pqcrypto_falcon::falcon512::verify_detached_signature(&sig, digest, &pk).is_ok()
        }
        PqAlgorithm::Unknown => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest(seed: u8) -> [u8; 32] {
        [seed; 32]
    }

    #[test]
    fn sign_verify_round_trip_all_algorithms() {
        for &algo in supported_algorithms() {
            let (sk, pk) = generate_keypair(algo).unwrap();
            let sig = sign(&sk, &digest(0xaa)).unwrap();
            assert!(verify(&sig, &digest(0xaa), &pk), "{algo} round trip");
        }
    }

    #[test]
    fn verify_fails_on_flipped_message_byte() {
        for &algo in supported_algorithms() {
            let (sk, pk) = generate_keypair(algo).unwrap();
            let mut msg = digest(0x11);
            let sig = sign(&sk, &msg).unwrap();
            msg[7] ^= 0x01;
            assert!(!verify(&sig, &msg, &pk), "{algo} flipped message");
        }
    }

    #[test]
    fn verify_fails_on_flipped_signature_byte() {
        for &algo in supported_algorithms() {
            let (sk, pk) = generate_keypair(algo).unwrap();
            let sig = sign(&sk, &digest(0x22)).unwrap();
            let mut bytes = sig.as_bytes().to_vec();
            bytes[0] ^= 0x01;
            // A flipped byte might break the encoding entirely (Falcon) or
            // just the math (Dilithium); either way verification must fail.
            match PqSignature::from_bytes(algo, bytes) {
                Ok(bad) => assert!(!verify(&bad, &digest(0x22), &pk)),
                Err(_) => {}
            }
        }
    }

    #[test]
    fn verify_fails_on_flipped_public_key_byte() {
        for &algo in supported_algorithms() {
            let (sk, pk) = generate_keypair(algo).unwrap();
            let sig = sign(&sk, &digest(0x55)).unwrap();
            let mut bytes = pk.as_bytes().to_vec();
            bytes[0] ^= 0x01;
            let bad = PqPublicKey::from_bytes(algo, bytes).unwrap();
            assert!(!verify(&sig, &digest(0x55), &bad), "{algo} flipped key");
        }
    }

    #[test]
    fn verify_fails_on_wrong_key() {
        for &algo in supported_algorithms() {
            let (sk, _pk) = generate_keypair(algo).unwrap();
            let (_sk2, pk2) = generate_keypair(algo).unwrap();
            let sig = sign(&sk, &digest(0x33)).unwrap();
            assert!(!verify(&sig, &digest(0x33), &pk2), "{algo} wrong key");
        }
    }

    #[test]
    fn verify_rejects_cross_algorithm_pair() {
        let (sk_d, _) = generate_keypair(PqAlgorithm::Dilithium3).unwrap();
        let (_, pk_f) = generate_keypair(PqAlgorithm::Falcon512).unwrap();
        let sig = sign(&sk_d, &digest(0x44)).unwrap();
        assert!(!verify(&sig, &digest(0x44), &pk_f));
    }

    #[test]
    fn keygen_fails_closed_on_unknown() {
        assert_eq!(
            generate_keypair(PqAlgorithm::Unknown).unwrap_err(),
            CryptoError::UnsupportedAlgorithm
        );
    }
}
