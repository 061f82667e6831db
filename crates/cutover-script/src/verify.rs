// Input verification: script execution plus the phase-gated dual-signature
// rules.
//
// Two layers cooperate here. The lower layer is a deterministic stack
// machine over the locking script, where a malformed candidate signature is
// simply a false verification result — execution continues so every
// implementation agrees. The upper layer is the dual-mode gate: for an
// output whose fingerprint has an accepted migration record, the phase
// decides which signatures the spend must carry, independent of what the
// committed legacy script alone would demand.

use std::collections::BTreeSet;

use log::debug;

use cutover_consensus::Phase;
use cutover_core::script::{Instruction, Opcode, Script, ScriptClass};
use cutover_core::sighash::{signature_digest, SighashType};
use cutover_core::transaction::{OutPoint, Transaction};
use cutover_core::hashes;
use cutover_crypto::{verify as pq_verify, LegacyFingerprint, LegacyVerifier, PqPublicKey, PqSignature};
use cutover_state::RegistryView;

use crate::sigdata::split_sighash;
use crate::verdict::{RejectReason, Verdict};

/// Everything needed to judge one input. The registry view and swept set
/// are point-in-time snapshots; contexts for different transactions can be
/// evaluated from different threads without shared mutable state.
pub struct VerifyContext<'a, V: LegacyVerifier> {
    pub tx: &'a Transaction,
    pub input_index: usize,
    /// Locking script of the output being spent.
    pub spent_script: &'a Script,
    /// Value of the output being spent.
    pub amount: u64,
    pub phase: Phase,
    pub registry: &'a RegistryView,
    /// Outpoints consumed by an executed sweep.
    pub swept: &'a BTreeSet<OutPoint>,
    pub legacy: &'a V,
}

/// Judge one input. Never panics, never returns Indeterminate.
pub fn verify_input<V: LegacyVerifier>(ctx: &VerifyContext<'_, V>) -> Verdict {
    let Some(input) = ctx.tx.inputs.get(ctx.input_index) else {
        return Verdict::Reject(RejectReason::MalformedScript);
    };
    if ctx.swept.contains(&input.prevout) {
        return Verdict::Reject(RejectReason::AlreadySwept);
    }

    let Some(pushes) = unlock_pushes(&input.script_sig) else {
        return Verdict::Reject(RejectReason::MalformedScript);
    };

    // The dual-mode gate applies to registered legacy-only outputs once the
    // grace phase begins.
    if let ScriptClass::LegacyPubkeyHash(fp) = ctx.spent_script.classify() {
        if ctx.phase >= Phase::GraceDualSig {
            if let Some(registered) = ctx.registry.lookup(&fp) {
                return if ctx.phase == Phase::GraceDualSig {
                    verify_dual(ctx, &fp, registered, &pushes)
                } else {
                    verify_pq_only(ctx, registered, &pushes)
                };
            }
        }
    }

    execute(ctx, pushes)
}

/// Script signatures are data carriers: push instructions only.
fn unlock_pushes(script_sig: &Script) -> Option<Vec<Vec<u8>>> {
    let mut pushes = Vec::new();
    for ins in script_sig.instructions()? {
        match ins {
            Instruction::Push(data) => pushes.push(data),
            Instruction::Op(_) => return None,
        }
    }
    Some(pushes)
}

/// GRACE_DUAL_SIG rule for a registered output: both a valid legacy
/// signature and a valid PQ signature by the registered key, over the same
/// digest. Either alone is insufficient.
fn verify_dual<V: LegacyVerifier>(
    ctx: &VerifyContext<'_, V>,
    fp: &LegacyFingerprint,
    registered: &PqPublicKey,
    pushes: &[Vec<u8>],
) -> Verdict {
    let (legacy_pair, pq_pair) = match pushes {
        [sig, pk, pq_sig, pq_pk] => ((sig, pk), (pq_sig, pq_pk)),
        [_sig, pk] => {
            // A two-element unlock is one half or the other; a parseable PQ
            // key identifies which half is present.
            return if PqPublicKey::deserialize(pk).is_ok() {
                debug!("dual-sig gate: PQ half only for {fp}");
                Verdict::Reject(RejectReason::MissingLegacySig)
            } else {
                debug!("dual-sig gate: legacy half only for {fp}");
                Verdict::Reject(RejectReason::MissingPqSig)
            };
        }
        _ => return Verdict::Reject(RejectReason::MalformedScript),
    };

    // Legacy half.
    let (legacy_sig_el, legacy_pk) = legacy_pair;
    if LegacyFingerprint::of_pubkey(legacy_pk) != *fp {
        return Verdict::Reject(RejectReason::BadLegacySig);
    }
    let Some((legacy_sig, legacy_sighash)) = split_sighash(legacy_sig_el) else {
        return Verdict::Reject(RejectReason::BadLegacySig);
    };
    let digest = input_digest(ctx, legacy_sighash);
    if !ctx.legacy.verify(legacy_sig, &digest, legacy_pk) {
        return Verdict::Reject(RejectReason::BadLegacySig);
    }

    // PQ half, over the same digest.
    let (pq_sig_el, pq_pk_el) = pq_pair;
    match check_pq_element(ctx, registered, pq_sig_el, pq_pk_el, Some(legacy_sighash)) {
        Ok(()) => Verdict::Accept,
        Err(reason) => Verdict::Reject(reason),
    }
}

/// PQ_ONLY rule for a registered output: only a valid PQ signature by the
/// registered key matters; a legacy signature neither helps nor harms.
fn verify_pq_only<V: LegacyVerifier>(
    ctx: &VerifyContext<'_, V>,
    registered: &PqPublicKey,
    pushes: &[Vec<u8>],
) -> Verdict {
    let [.., pq_sig_el, pq_pk_el] = pushes else {
        return Verdict::Reject(RejectReason::MissingPqSig);
    };
    if PqPublicKey::deserialize(pq_pk_el).is_err() {
        return Verdict::Reject(RejectReason::MissingPqSig);
    }
    match check_pq_element(ctx, registered, pq_sig_el, pq_pk_el, None) {
        Ok(()) => Verdict::Accept,
        Err(reason) => Verdict::Reject(reason),
    }
}

/// Validate a (signature, key) element pair against the registered key.
/// `required_sighash` pins the selector for the dual-sig case.
fn check_pq_element<V: LegacyVerifier>(
    ctx: &VerifyContext<'_, V>,
    registered: &PqPublicKey,
    sig_el: &[u8],
    pk_el: &[u8],
    required_sighash: Option<SighashType>,
) -> Result<(), RejectReason> {
    let pk = PqPublicKey::deserialize(pk_el).map_err(|_| RejectReason::BadPqSig)?;
    if pk != *registered {
        return Err(RejectReason::WrongPqKey);
    }
    let (sig_bytes, sighash) = split_sighash(sig_el).ok_or(RejectReason::BadPqSig)?;
    let sig = PqSignature::deserialize(sig_bytes).map_err(|_| RejectReason::BadPqSig)?;
    if sig.algorithm() != pk.algorithm() {
        return Err(RejectReason::AlgorithmMismatch);
    }
    if let Some(required) = required_sighash {
        if sighash != required {
            return Err(RejectReason::SighashMismatch);
        }
    }
    let digest = input_digest(ctx, sighash);
    if !pq_verify(&sig, &digest, &pk) {
        return Err(RejectReason::BadPqSig);
    }
    Ok(())
}

fn input_digest<V: LegacyVerifier>(ctx: &VerifyContext<'_, V>, sighash: SighashType) -> [u8; 32] {
    signature_digest(
        ctx.tx,
        ctx.input_index,
        ctx.spent_script.as_bytes(),
        ctx.amount,
        sighash,
    )
}

/// Plain stack-machine execution for everything the gate does not cover.
fn execute<V: LegacyVerifier>(ctx: &VerifyContext<'_, V>, pushes: Vec<Vec<u8>>) -> Verdict {
    let Some(instructions) = ctx.spent_script.instructions() else {
        return Verdict::Reject(RejectReason::MalformedScript);
    };

    let mut stack: Vec<Vec<u8>> = pushes;
    // Failure attribution for the final verdict.
    let mut legacy_failed = false;
    let mut pq_failed = false;
    let mut phase_blocked = false;

    for ins in instructions {
        match ins {
            Instruction::Push(data) => stack.push(data),
            Instruction::Op(op) => match op {
                Opcode::Dup => {
                    let Some(top) = stack.last().cloned() else {
                        return Verdict::Reject(RejectReason::MalformedScript);
                    };
                    stack.push(top);
                }
                Opcode::Hash160 => {
                    let Some(top) = stack.pop() else {
                        return Verdict::Reject(RejectReason::MalformedScript);
                    };
                    stack.push(hashes::hash160(&top).to_vec());
                }
                Opcode::Hash256 => {
                    let Some(top) = stack.pop() else {
                        return Verdict::Reject(RejectReason::MalformedScript);
                    };
                    stack.push(hashes::sha256d(&top).to_vec());
                }
                Opcode::Equal | Opcode::EqualVerify => {
                    let (Some(a), Some(b)) = (stack.pop(), stack.pop()) else {
                        return Verdict::Reject(RejectReason::MalformedScript);
                    };
                    let eq = a == b;
                    if op == Opcode::Equal {
                        stack.push(bool_element(eq));
                    } else if !eq {
                        return Verdict::Reject(RejectReason::EvalFalse);
                    }
                }
                Opcode::CheckSig => {
                    let (Some(pk), Some(sig)) = (stack.pop(), stack.pop()) else {
                        return Verdict::Reject(RejectReason::MalformedScript);
                    };
                    let ok = check_legacy_candidate(ctx, &sig, &pk);
                    legacy_failed |= !ok;
                    stack.push(bool_element(ok));
                }
                Opcode::PqCheckSig | Opcode::PqCheckSigVerify => {
                    let (Some(pk), Some(sig)) = (stack.pop(), stack.pop()) else {
                        return Verdict::Reject(RejectReason::MalformedScript);
                    };
                    // Defined but unsatisfiable before activation.
                    let ok = if ctx.phase == Phase::PreActivation {
                        phase_blocked = true;
                        false
                    } else {
                        check_pq_candidate(ctx, &sig, &pk)
                    };
                    pq_failed |= !ok;
                    if op == Opcode::PqCheckSig {
                        stack.push(bool_element(ok));
                    } else if !ok {
                        return Verdict::Reject(if phase_blocked {
                            RejectReason::PhaseViolation
                        } else {
                            RejectReason::BadPqSig
                        });
                    }
                }
                // Push framing opcodes never reach instruction position.
                Opcode::PushData1 | Opcode::PushData2 => {
                    return Verdict::Reject(RejectReason::MalformedScript)
                }
            },
        }
    }

    match stack.last() {
        Some(top) if truthy(top) => Verdict::Accept,
        _ => Verdict::Reject(if phase_blocked {
            RejectReason::PhaseViolation
        } else if legacy_failed {
            RejectReason::BadLegacySig
        } else if pq_failed {
            RejectReason::BadPqSig
        } else {
            RejectReason::EvalFalse
        }),
    }
}

/// OP_CHECKSIG semantics: malformed candidates are false, not errors.
fn check_legacy_candidate<V: LegacyVerifier>(
    ctx: &VerifyContext<'_, V>,
    sig_el: &[u8],
    pk_el: &[u8],
) -> bool {
    let Some((sig, sighash)) = split_sighash(sig_el) else {
        return false;
    };
    let digest = input_digest(ctx, sighash);
    ctx.legacy.verify(sig, &digest, pk_el)
}

/// OP_PQCHECKSIG semantics: malformed candidates are false, not errors.
fn check_pq_candidate<V: LegacyVerifier>(
    ctx: &VerifyContext<'_, V>,
    sig_el: &[u8],
    pk_el: &[u8],
) -> bool {
    let Ok(pk) = PqPublicKey::deserialize(pk_el) else {
        return false;
    };
    let Some((sig_bytes, sighash)) = split_sighash(sig_el) else {
        return false;
    };
    let Ok(sig) = PqSignature::deserialize(sig_bytes) else {
        return false;
    };
    let digest = input_digest(ctx, sighash);
    pq_verify(&sig, &digest, &pk)
}

fn bool_element(b: bool) -> Vec<u8> {
    if b {
        vec![1]
    } else {
        Vec::new()
    }
}

fn truthy(element: &[u8]) -> bool {
    element.iter().any(|&b| b != 0)
}
