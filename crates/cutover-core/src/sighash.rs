// Transaction signature digest.
//
// One digest function serves both signature regimes: during the dual-sig
// grace phase the legacy half and the PQ half of a spend sign the *same*
// digest. The preimage is domain-tagged so a signature over it can never be
// replayed as a signature over any other ledger message.
//
// The committed fields mirror the amount-committing style of modern sighash
// schemes: prevouts, sequences, the spent outpoint, script code, amount,
// outputs (mode-dependent) and locktime.

use serde::{Deserialize, Serialize};

use crate::hashes;
use crate::transaction::{write_var_bytes, Transaction};

/// Domain-separation tag for transaction signature digests.
const SIGHASH_DOMAIN_TAG: &[u8] = b"cutover/sighash/v1";

const ANYONE_CAN_PAY_FLAG: u8 = 0x80;

/// Which outputs a signature commits to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SighashMode {
    /// Commit to all outputs.
    All,
    /// Commit to no outputs.
    None,
    /// Commit to the output at the signing input's index.
    Single,
}

/// Full sighash selector: a mode plus the anyone-can-pay flag that restricts
/// the committed inputs to the one being signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SighashType {
    pub mode: SighashMode,
    pub anyone_can_pay: bool,
}

impl SighashType {
    pub const ALL: SighashType = SighashType {
        mode: SighashMode::All,
        anyone_can_pay: false,
    };

    pub fn to_byte(self) -> u8 {
        let base = match self.mode {
            SighashMode::All => 0x01,
            SighashMode::None => 0x02,
            SighashMode::Single => 0x03,
        };
        if self.anyone_can_pay {
            base | ANYONE_CAN_PAY_FLAG
        } else {
            base
        }
    }

    /// Parse a sighash byte. Unknown base values are `None`: a malformed
    /// selector makes the carrying signature fail verification, it is never
    /// coerced to a default.
    pub fn from_byte(b: u8) -> Option<SighashType> {
        let anyone_can_pay = b & ANYONE_CAN_PAY_FLAG != 0;
        let mode = match b & !ANYONE_CAN_PAY_FLAG {
            0x01 => SighashMode::All,
            0x02 => SighashMode::None,
            0x03 => SighashMode::Single,
            _ => return None,
        };
        Some(SighashType {
            mode,
            anyone_can_pay,
        })
    }
}

/// Compute the digest a signature on `input_index` must cover.
///
/// `script_code` is the locking script being satisfied and `amount` the value
/// of the spent output. Pure over its arguments; every conforming node
/// produces the same 32 bytes.
pub fn signature_digest(
    tx: &Transaction,
    input_index: usize,
    script_code: &[u8],
    amount: u64,
    sighash: SighashType,
) -> [u8; 32] {
    let zero = [0u8; 32];

    let hash_prevouts = if sighash.anyone_can_pay {
        zero
    } else {
        let mut buf = Vec::new();
        for input in &tx.inputs {
            input.prevout.consensus_encode(&mut buf);
        }
        hashes::sha256d(&buf)
    };

    let hash_sequences = if sighash.anyone_can_pay || sighash.mode != SighashMode::All {
        zero
    } else {
        let mut buf = Vec::new();
        for input in &tx.inputs {
            buf.extend_from_slice(&input.sequence.to_le_bytes());
        }
        hashes::sha256d(&buf)
    };

    let hash_outputs = match sighash.mode {
        SighashMode::All => {
            let mut buf = Vec::new();
            for output in &tx.outputs {
                output.consensus_encode(&mut buf);
            }
            hashes::sha256d(&buf)
        }
        SighashMode::Single => match tx.outputs.get(input_index) {
            Some(output) => {
                let mut buf = Vec::new();
                output.consensus_encode(&mut buf);
                hashes::sha256d(&buf)
            }
            // SINGLE with no matching output commits to nothing, it does not
            // abort: determinism over convenience.
            None => zero,
        },
        SighashMode::None => zero,
    };

    // An index past the inputs commits to zeroed per-input fields, the same
    // way SINGLE past the outputs commits to nothing. Callers validating a
    // transaction bound-check first; this keeps the function total.
    let (prevout_bytes, sequence) = match tx.inputs.get(input_index) {
        Some(input) => {
            let mut buf = Vec::new();
            input.prevout.consensus_encode(&mut buf);
            (buf, input.sequence)
        }
        None => (vec![0u8; 36], 0),
    };

    let mut preimage = Vec::new();
    write_var_bytes(&mut preimage, SIGHASH_DOMAIN_TAG);
    preimage.extend_from_slice(&tx.version.to_le_bytes());
    preimage.extend_from_slice(&hash_prevouts);
    preimage.extend_from_slice(&hash_sequences);
    preimage.extend_from_slice(&prevout_bytes);
    write_var_bytes(&mut preimage, script_code);
    preimage.extend_from_slice(&amount.to_le_bytes());
    preimage.extend_from_slice(&sequence.to_le_bytes());
    preimage.extend_from_slice(&hash_outputs);
    preimage.extend_from_slice(&tx.lock_time.to_le_bytes());
    preimage.push(sighash.to_byte());

    hashes::sha256d(&preimage)
}
