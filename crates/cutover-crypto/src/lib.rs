pub mod algorithm;
pub mod error;
pub mod keys;
pub mod legacy;
pub mod scheme;

pub use algorithm::PqAlgorithm;
pub use error::{CryptoError, CryptoResult};
pub use keys::{PqPublicKey, PqSecretKey, PqSignature};
pub use legacy::{LegacyFingerprint, LegacyVerifier, Secp256k1Verifier};
pub use scheme::{generate_keypair, sign, supported_algorithms, verify};
