use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

/// Double SHA-256, the ledger's transaction and commitment digest.
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    let mut out = [0u8; 32];
    out.copy_from_slice(&second);
    out
}

/// RIPEMD160(SHA256(data)): the 20-byte key-hash used in addresses and
/// fingerprints.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let sha = Sha256::digest(data);
    let rip = Ripemd160::digest(sha);
    let mut out = [0u8; 20];
    out.copy_from_slice(&rip);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digests_are_deterministic() {
        assert_eq!(sha256d(b"abc"), sha256d(b"abc"));
        assert_eq!(hash160(b"abc"), hash160(b"abc"));
        assert_ne!(sha256d(b"abc"), sha256d(b"abd"));
    }
}
