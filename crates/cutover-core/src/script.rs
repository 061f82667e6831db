// Locking-script representation and the PQ opcode extension.
//
// The two PQ opcodes occupy 0xba and 0xbb, values the legacy opcode space
// never allocated. A validator without this extension treats them as
// invalid/reserved, so legacy nodes cannot accidentally accept a PQ script
// as a no-op.

use serde::{Deserialize, Serialize};

use cutover_crypto::LegacyFingerprint;

use crate::hashes;

/// Opcodes the cut-over engine evaluates. The numeric values of the legacy
/// subset match the host scripting language; the PQ pair is newly allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Opcode {
    PushData1 = 0x4c,
    PushData2 = 0x4d,
    Dup = 0x76,
    Equal = 0x87,
    EqualVerify = 0x88,
    Hash160 = 0xa9,
    Hash256 = 0xaa,
    CheckSig = 0xac,
    /// Pop a PQ signature and public key, push the verification result.
    PqCheckSig = 0xba,
    /// Like [`Opcode::PqCheckSig`] but fails the script if verification fails.
    PqCheckSigVerify = 0xbb,
}

impl Opcode {
    pub fn from_byte(b: u8) -> Option<Opcode> {
        Some(match b {
            0x4c => Opcode::PushData1,
            0x4d => Opcode::PushData2,
            0x76 => Opcode::Dup,
            0x87 => Opcode::Equal,
            0x88 => Opcode::EqualVerify,
            0xa9 => Opcode::Hash160,
            0xaa => Opcode::Hash256,
            0xac => Opcode::CheckSig,
            0xba => Opcode::PqCheckSig,
            0xbb => Opcode::PqCheckSigVerify,
            _ => return None,
        })
    }
}

/// A single decoded script instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    Push(Vec<u8>),
    Op(Opcode),
}

/// Classification of a locking script against the known templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptClass {
    /// Legacy pay-to-pubkey-hash: no PQ branch reachable. These outputs are
    /// the sweep engine's candidate pool.
    LegacyPubkeyHash(LegacyFingerprint),
    /// PQ pay-to-pubkey-hash (DUP HASH160 <20> EQUALVERIFY PQCHECKSIG).
    PqPubkeyHash([u8; 20]),
    /// PQ pay-to-script-hash (HASH256 <32> EQUAL).
    PqScriptHash([u8; 32]),
    /// Anything else. Never swept, never dual-sig gated.
    NonStandard,
}

/// A serialized script: raw bytes with push-data framing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Script(Vec<u8>);

impl Script {
    pub fn new() -> Script {
        Script(Vec::new())
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Script {
        Script(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn push_op(mut self, op: Opcode) -> Script {
        self.0.push(op as u8);
        self
    }

    /// Push a data element with minimal framing. PQ keys and signatures can
    /// run to a few kilobytes, hence the PUSHDATA2 arm.
    pub fn push_slice(mut self, data: &[u8]) -> Script {
        match data.len() {
            0..=75 => self.0.push(data.len() as u8),
            76..=255 => {
                self.0.push(Opcode::PushData1 as u8);
                self.0.push(data.len() as u8);
            }
            _ => {
                self.0.push(Opcode::PushData2 as u8);
                self.0.extend_from_slice(&(data.len() as u16).to_le_bytes());
            }
        }
        self.0.extend_from_slice(data);
        self
    }

    /// Decode the script into instructions. `None` on any malformed framing
    /// (truncated push, unknown opcode): callers treat that as a definite
    /// invalid script, not a partial one.
    pub fn instructions(&self) -> Option<Vec<Instruction>> {
        let mut out = Vec::new();
        let bytes = &self.0;
        let mut i = 0usize;
        while i < bytes.len() {
            let b = bytes[i];
            i += 1;
            match b {
                1..=75 => {
                    let len = b as usize;
                    let data = bytes.get(i..i + len)?;
                    out.push(Instruction::Push(data.to_vec()));
                    i += len;
                }
                0x4c => {
                    let len = *bytes.get(i)? as usize;
                    i += 1;
                    let data = bytes.get(i..i + len)?;
                    out.push(Instruction::Push(data.to_vec()));
                    i += len;
                }
                0x4d => {
                    let lo = *bytes.get(i)? as usize;
                    let hi = *bytes.get(i + 1)? as usize;
                    i += 2;
                    let len = lo | (hi << 8);
                    let data = bytes.get(i..i + len)?;
                    out.push(Instruction::Push(data.to_vec()));
                    i += len;
                }
                _ => out.push(Instruction::Op(Opcode::from_byte(b)?)),
            }
        }
        Some(out)
    }

    // -------- templates --------

    /// Legacy P2PKH: DUP HASH160 <fingerprint> EQUALVERIFY CHECKSIG.
    pub fn legacy_p2pkh(fingerprint: &LegacyFingerprint) -> Script {
        Script::new()
            .push_op(Opcode::Dup)
            .push_op(Opcode::Hash160)
            .push_slice(fingerprint.as_bytes())
            .push_op(Opcode::EqualVerify)
            .push_op(Opcode::CheckSig)
    }

    /// PQ P2PKH: DUP HASH160 <hash20> EQUALVERIFY PQCHECKSIG.
    pub fn pq_p2pkh(pubkey_hash: &[u8; 20]) -> Script {
        Script::new()
            .push_op(Opcode::Dup)
            .push_op(Opcode::Hash160)
            .push_slice(pubkey_hash)
            .push_op(Opcode::EqualVerify)
            .push_op(Opcode::PqCheckSig)
    }

    /// PQ P2SH: HASH256 <hash32> EQUAL.
    pub fn pq_p2sh(script_hash: &[u8; 32]) -> Script {
        Script::new()
            .push_op(Opcode::Hash256)
            .push_slice(script_hash)
            .push_op(Opcode::Equal)
    }

    /// Witness program: version marker push followed by the program push.
    pub fn witness_program(version: u8, program: &[u8]) -> Script {
        Script::new().push_slice(&[version]).push_slice(program)
    }

    /// Hash of a serialized PQ public key for P2PQPKH outputs.
    pub fn pq_pubkey_hash(pubkey: &cutover_crypto::PqPublicKey) -> [u8; 20] {
        hashes::hash160(&pubkey.serialize())
    }

    /// Match this script against the known templates.
    pub fn classify(&self) -> ScriptClass {
        let Some(ins) = self.instructions() else {
            return ScriptClass::NonStandard;
        };
        match ins.as_slice() {
            [Instruction::Op(Opcode::Dup), Instruction::Op(Opcode::Hash160), Instruction::Push(h), Instruction::Op(Opcode::EqualVerify), Instruction::Op(Opcode::CheckSig)] => {
                match LegacyFingerprint::from_slice(h) {
                    Some(fp) => ScriptClass::LegacyPubkeyHash(fp),
                    None => ScriptClass::NonStandard,
                }
            }
            [Instruction::Op(Opcode::Dup), Instruction::Op(Opcode::Hash160), Instruction::Push(h), Instruction::Op(Opcode::EqualVerify), Instruction::Op(Opcode::PqCheckSig)] => {
                match <[u8; 20]>::try_from(h.as_slice()) {
                    Ok(h20) => ScriptClass::PqPubkeyHash(h20),
                    Err(_) => ScriptClass::NonStandard,
                }
            }
            [Instruction::Op(Opcode::Hash256), Instruction::Push(h), Instruction::Op(Opcode::Equal)] => {
                match <[u8; 32]>::try_from(h.as_slice()) {
                    Ok(h32) => ScriptClass::PqScriptHash(h32),
                    Err(_) => ScriptClass::NonStandard,
                }
            }
            _ => ScriptClass::NonStandard,
        }
    }

    /// True when the controlling script has no PQ branch at all.
    pub fn is_legacy_only(&self) -> bool {
        matches!(self.classify(), ScriptClass::LegacyPubkeyHash(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(seed: u8) -> LegacyFingerprint {
        LegacyFingerprint([seed; 20])
    }

    #[test]
    fn legacy_template_classifies() {
        let s = Script::legacy_p2pkh(&fp(7));
        assert_eq!(s.classify(), ScriptClass::LegacyPubkeyHash(fp(7)));
        assert!(s.is_legacy_only());
    }

    #[test]
    fn pq_pubkey_hash_template_classifies() {
        let s = Script::pq_p2pkh(&[3u8; 20]);
        assert_eq!(s.classify(), ScriptClass::PqPubkeyHash([3u8; 20]));
        assert!(!s.is_legacy_only());
    }

    #[test]
    fn pq_script_hash_template_classifies() {
        let s = Script::pq_p2sh(&[9u8; 32]);
        assert_eq!(s.classify(), ScriptClass::PqScriptHash([9u8; 32]));
    }

    #[test]
    fn large_push_uses_pushdata2_and_round_trips() {
        let blob = vec![0xabu8; 3000];
        let s = Script::new().push_slice(&blob);
        let ins = s.instructions().unwrap();
        assert_eq!(ins, vec![Instruction::Push(blob)]);
    }

    #[test]
    fn truncated_push_is_invalid() {
        let s = Script::from_bytes(vec![10, 1, 2]); // push of 10 with 2 bytes
        assert!(s.instructions().is_none());
        assert_eq!(s.classify(), ScriptClass::NonStandard);
    }

    #[test]
    fn unknown_opcode_is_invalid() {
        let s = Script::from_bytes(vec![0xfe]);
        assert!(s.instructions().is_none());
    }

    #[test]
    fn opcode_byte_round_trip() {
        for op in [
            Opcode::PushData1,
            Opcode::PushData2,
            Opcode::Dup,
            Opcode::Equal,
            Opcode::EqualVerify,
            Opcode::Hash160,
            Opcode::Hash256,
            Opcode::CheckSig,
            Opcode::PqCheckSig,
            Opcode::PqCheckSigVerify,
        ] {
            assert_eq!(Opcode::from_byte(op as u8), Some(op));
        }
        assert_eq!(Opcode::from_byte(0x00), None);
        assert_eq!(Opcode::from_byte(0xff), None);
    }
}
