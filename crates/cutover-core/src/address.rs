// Human-facing address codec.
//
// An address binds {network, script template version, PQ algorithm, payload
// hash} into a Bech32m string. The codec is convenience only: consensus
// never decodes addresses, scripts are already committed in outputs.
//
// Decode is strict: wrong network prefix, bad checksum, unknown algorithm
// tag, or a payload length that does not match the version all yield a
// single error value — never a partially-populated address.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use bech32::{FromBase32, ToBase32, Variant};
use cutover_crypto::{PqAlgorithm, PqPublicKey};

use crate::hashes;
use crate::script::Script;

/// Network an address belongs to; selects the human-readable prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Network {
    Mainnet,
    Testnet,
    Regtest,
}

impl Network {
    pub fn hrp(&self) -> &'static str {
        match self {
            Network::Mainnet => "qcm",
            Network::Testnet => "tqcm",
            Network::Regtest => "rqcm",
        }
    }
}

/// Script template an address expands to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum AddressVersion {
    /// PQ pay-to-pubkey-hash; 20-byte payload.
    PqPubkeyHash = 0,
    /// PQ pay-to-script-hash; 32-byte payload.
    PqScriptHash = 1,
    /// Witness v0; 20- or 32-byte payload.
    WitnessV0 = 2,
    /// Witness v1 (future); 32-byte payload.
    WitnessV1 = 3,
}

impl AddressVersion {
    fn from_byte(b: u8) -> Option<AddressVersion> {
        Some(match b {
            0 => AddressVersion::PqPubkeyHash,
            1 => AddressVersion::PqScriptHash,
            2 => AddressVersion::WitnessV0,
            3 => AddressVersion::WitnessV1,
            _ => return None,
        })
    }

    /// Whether `len` is a legal payload length for this version. Exact
    /// match required; a mismatch is invalid, never "valid with padding".
    fn payload_len_ok(&self, len: usize) -> bool {
        match self {
            AddressVersion::PqPubkeyHash => len == 20,
            AddressVersion::PqScriptHash => len == 32,
            AddressVersion::WitnessV0 => len == 20 || len == 32,
            AddressVersion::WitnessV1 => len == 32,
        }
    }
}

/// The single "invalid" sentinel for every decode failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("not a valid bech32m string")]
    Malformed,
    #[error("wrong network prefix: expected {expected}, got {actual}")]
    WrongNetwork { expected: String, actual: String },
    #[error("unknown address version byte 0x{0:02x}")]
    UnknownVersion(u8),
    #[error("unknown algorithm tag 0x{0:02x}")]
    UnknownAlgorithm(u8),
    #[error("payload length {len} does not match address version")]
    PayloadLength { len: usize },
}

/// A decoded, validated address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    network: Network,
    version: AddressVersion,
    algorithm: PqAlgorithm,
    payload: Vec<u8>,
}

impl Address {
    pub fn new(
        network: Network,
        version: AddressVersion,
        algorithm: PqAlgorithm,
        payload: Vec<u8>,
    ) -> Result<Address, AddressError> {
        if !algorithm.is_supported() {
            return Err(AddressError::UnknownAlgorithm(0));
        }
        if !version.payload_len_ok(payload.len()) {
            return Err(AddressError::PayloadLength {
                len: payload.len(),
            });
        }
        Ok(Address {
            network,
            version,
            algorithm,
            payload,
        })
    }

    /// Key-hash address for a PQ public key.
    pub fn from_pq_pubkey(network: Network, pubkey: &PqPublicKey) -> Address {
        let hash = hashes::hash160(&pubkey.serialize());
        // hash160 output always satisfies the 20-byte rule.
        Address {
            network,
            version: AddressVersion::PqPubkeyHash,
            algorithm: pubkey.algorithm(),
            payload: hash.to_vec(),
        }
    }

    /// Script-hash address for an arbitrary redeem script.
    pub fn from_script_hash(
        network: Network,
        algorithm: PqAlgorithm,
        script: &Script,
    ) -> Result<Address, AddressError> {
        let hash = hashes::sha256d(script.as_bytes());
        Address::new(network, AddressVersion::PqScriptHash, algorithm, hash.to_vec())
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn version(&self) -> AddressVersion {
        self.version
    }

    pub fn algorithm(&self) -> PqAlgorithm {
        self.algorithm
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Encode to the checksummed text form.
    pub fn encode(&self) -> String {
        let mut data = Vec::with_capacity(2 + self.payload.len());
        data.push(self.version as u8);
        // Construction guarantees a supported algorithm.
        data.push(self.algorithm.tag().unwrap_or(0));
        data.extend_from_slice(&self.payload);
        // 8-to-5 bit conversion plus BCH checksum. Infallible for a valid
        // lowercase HRP.
        bech32::encode(self.network.hrp(), data.to_base32(), Variant::Bech32m)
            .expect("static hrp is valid")
    }

    /// Decode and fully validate a text address for the expected network.
    pub fn decode(s: &str, expected: Network) -> Result<Address, AddressError> {
        let (hrp, data, variant) = bech32::decode(s).map_err(|_| AddressError::Malformed)?;
        if variant != Variant::Bech32m {
            return Err(AddressError::Malformed);
        }
        if hrp != expected.hrp() {
            return Err(AddressError::WrongNetwork {
                expected: expected.hrp().to_string(),
                actual: hrp,
            });
        }
        let bytes = Vec::<u8>::from_base32(&data).map_err(|_| AddressError::Malformed)?;
        if bytes.len() < 2 {
            return Err(AddressError::Malformed);
        }
        let version =
            AddressVersion::from_byte(bytes[0]).ok_or(AddressError::UnknownVersion(bytes[0]))?;
        let algorithm = PqAlgorithm::from_tag(bytes[1]);
        if !algorithm.is_supported() {
            return Err(AddressError::UnknownAlgorithm(bytes[1]));
        }
        let payload = bytes[2..].to_vec();
        Address::new(expected, version, algorithm, payload)
    }

    /// Expand to the canonical locking script. Pure and total over valid
    /// addresses.
    pub fn script(&self) -> Script {
        match self.version {
            AddressVersion::PqPubkeyHash => {
                let mut h = [0u8; 20];
                h.copy_from_slice(&self.payload);
                Script::pq_p2pkh(&h)
            }
            AddressVersion::PqScriptHash => {
                let mut h = [0u8; 32];
                h.copy_from_slice(&self.payload);
                Script::pq_p2sh(&h)
            }
            AddressVersion::WitnessV0 => Script::witness_program(0, &self.payload),
            AddressVersion::WitnessV1 => Script::witness_program(1, &self.payload),
        }
    }
}
