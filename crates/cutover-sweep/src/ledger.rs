// Custodial ledger: who was swept, for how much, and whether they have
// reclaimed. Allocations are keyed by the original output's fingerprint;
// the reclamation right follows that key, not possession of the custodial
// funds.

use std::collections::{BTreeMap, BTreeSet};

use log::info;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use cutover_consensus::PhaseSchedule;
use cutover_core::transaction::OutPoint;
use cutover_crypto::{verify as pq_verify, LegacyFingerprint, LegacyVerifier, PqSignature};
use cutover_state::RegistryView;

use crate::plan::SweepSet;

/// Domain tag for reclaim proof digests.
pub const RECLAIM_DOMAIN_TAG: &[u8] = b"cutover/reclaim/v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum ReclaimError {
    #[error("reclaim window is not open")]
    WindowClosed,
    #[error("no custodial allocation for this fingerprint")]
    UnknownFingerprint,
    #[error("allocation already reclaimed")]
    AlreadyReclaimed,
    #[error("claimant key does not match the swept output")]
    WrongKey,
    #[error("fingerprint has no registered PQ successor")]
    NoRegisteredSuccessor,
    #[error("ownership proof signature invalid")]
    BadProof,
}

/// Custodial balance owed to one original owner. Multiple swept outputs
/// under the same fingerprint aggregate into one allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustodialAllocation {
    pub fingerprint: LegacyFingerprint,
    pub value: u64,
    pub outpoints: Vec<OutPoint>,
    pub reclaimed: bool,
}

/// Proof of ownership for a reclaim: either a fresh signature by the
/// original legacy key, or one by the PQ successor the registry recorded
/// for this fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReclaimProof {
    Legacy { pubkey: Vec<u8>, signature: Vec<u8> },
    PqSuccessor { signature: PqSignature },
}

/// A granted reclaim: the custodial value the host must pay out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReclaimAuthorization {
    pub fingerprint: LegacyFingerprint,
    pub value: u64,
    pub outpoints: Vec<OutPoint>,
}

/// Post-sweep state: allocations plus the consumed-outpoint set the
/// verifier uses to reject spends of swept outputs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepLedger {
    allocations: BTreeMap<LegacyFingerprint, CustodialAllocation>,
    swept: BTreeSet<OutPoint>,
}

impl SweepLedger {
    pub fn new() -> SweepLedger {
        SweepLedger::default()
    }

    /// Absorb an executed sweep. Outpoints already recorded are skipped, so
    /// absorbing the same set twice changes nothing.
    pub fn record_sweep(&mut self, set: &SweepSet) {
        for alloc in &set.allocations {
            if !self.swept.insert(alloc.outpoint) {
                continue;
            }
            let entry = self
                .allocations
                .entry(alloc.fingerprint)
                .or_insert_with(|| CustodialAllocation {
                    fingerprint: alloc.fingerprint,
                    value: 0,
                    outpoints: Vec::new(),
                    reclaimed: false,
                });
            entry.value += alloc.value;
            entry.outpoints.push(alloc.outpoint);
        }
        info!(
            "sweep ledger: {} allocations over {} outpoints",
            self.allocations.len(),
            self.swept.len()
        );
    }

    pub fn swept_outpoints(&self) -> &BTreeSet<OutPoint> {
        &self.swept
    }

    pub fn allocation(&self, fingerprint: &LegacyFingerprint) -> Option<&CustodialAllocation> {
        self.allocations.get(fingerprint)
    }

    /// The 32-byte digest a reclaim proof must sign: a domain tag bound to
    /// the fingerprint being reclaimed.
    pub fn reclaim_digest(fingerprint: &LegacyFingerprint) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(RECLAIM_DOMAIN_TAG);
        hasher.update(fingerprint.as_bytes());
        let first = hasher.finalize();
        let second = Sha256::digest(first);
        let mut out = [0u8; 32];
        out.copy_from_slice(&second);
        out
    }

    /// Authorize a reclaim of the allocation under `fingerprint`. Valid only
    /// while the schedule's reclaim window is open at `height`, at most once
    /// per allocation.
    pub fn authorize_reclaim<V: LegacyVerifier>(
        &mut self,
        fingerprint: &LegacyFingerprint,
        proof: &ReclaimProof,
        registry: &RegistryView,
        verifier: &V,
        schedule: &PhaseSchedule,
        height: u64,
    ) -> Result<ReclaimAuthorization, ReclaimError> {
        if !schedule.reclaim_open(height) {
            return Err(ReclaimError::WindowClosed);
        }
        let Some(alloc) = self.allocations.get(fingerprint) else {
            return Err(ReclaimError::UnknownFingerprint);
        };
        if alloc.reclaimed {
            return Err(ReclaimError::AlreadyReclaimed);
        }

        let digest = SweepLedger::reclaim_digest(fingerprint);
        match proof {
            ReclaimProof::Legacy { pubkey, signature } => {
                if LegacyFingerprint::of_pubkey(pubkey) != *fingerprint {
                    return Err(ReclaimError::WrongKey);
                }
                if !verifier.verify(signature, &digest, pubkey) {
                    return Err(ReclaimError::BadProof);
                }
            }
            ReclaimProof::PqSuccessor { signature } => {
                let Some(successor) = registry.lookup(fingerprint) else {
                    return Err(ReclaimError::NoRegisteredSuccessor);
                };
                if !pq_verify(signature, &digest, successor) {
                    return Err(ReclaimError::BadProof);
                }
            }
        }

        let alloc = self
            .allocations
            .get_mut(fingerprint)
            .ok_or(ReclaimError::UnknownFingerprint)?;
        alloc.reclaimed = true;
        info!("reclaim authorized for {fingerprint}: {} units", alloc.value);
        Ok(ReclaimAuthorization {
            fingerprint: *fingerprint,
            value: alloc.value,
            outpoints: alloc.outpoints.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cutover_consensus::{PhaseParams, PhaseSchedule};
    use cutover_crypto::{generate_keypair, sign, PqAlgorithm, Secp256k1Verifier};
    use cutover_state::{
        MigrationRegistry, RegistrationEvent, RegistrationOutcome, RotationPolicy,
    };

    use crate::plan::SweepAllocation;

    fn schedule_in_window() -> (PhaseSchedule, u64) {
        let schedule = PhaseSchedule::restore(
            PhaseParams {
                grace_blocks: 100,
                sweep_blocks: 300,
                reclaim_window_blocks: 10_000,
            },
            Some(1000),
            Some(1350),
        )
        .unwrap();
        (schedule, 1400)
    }

    fn swept_ledger(fingerprint: LegacyFingerprint) -> SweepLedger {
        let mut ledger = SweepLedger::new();
        ledger.record_sweep(&SweepSet {
            snapshot_height: 1300,
            transactions: Vec::new(),
            allocations: vec![
                SweepAllocation {
                    fingerprint,
                    outpoint: OutPoint::new([1; 32], 0),
                    value: 7_000,
                },
                SweepAllocation {
                    fingerprint,
                    outpoint: OutPoint::new([1; 32], 1),
                    value: 3_000,
                },
            ],
        });
        ledger
    }

    #[test]
    fn allocations_aggregate_by_fingerprint_and_recording_is_idempotent() {
        let fingerprint = LegacyFingerprint([9; 20]);
        let mut ledger = swept_ledger(fingerprint);
        let alloc = ledger.allocation(&fingerprint).unwrap();
        assert_eq!(alloc.value, 10_000);
        assert_eq!(alloc.outpoints.len(), 2);

        // Absorbing the same allocations again changes nothing.
        let before = ledger.clone();
        let replay = swept_ledger(fingerprint);
        ledger.record_sweep(&SweepSet {
            snapshot_height: 1300,
            transactions: Vec::new(),
            allocations: vec![SweepAllocation {
                fingerprint,
                outpoint: OutPoint::new([1; 32], 0),
                value: 7_000,
            }],
        });
        assert_eq!(
            ledger.allocation(&fingerprint),
            before.allocation(&fingerprint)
        );
        assert_eq!(
            replay.allocation(&fingerprint),
            before.allocation(&fingerprint)
        );
    }

    #[test]
    fn legacy_proof_reclaims_once() {
        let verifier = Secp256k1Verifier::new();
        let (sk, pubkey) = verifier.generate_keypair(&mut rand::thread_rng());
        let fingerprint = LegacyFingerprint::of_pubkey(&pubkey);
        let mut ledger = swept_ledger(fingerprint);
        let registry =
            MigrationRegistry::new(Secp256k1Verifier::new(), RotationPolicy::Closed).view();
        let (schedule, height) = schedule_in_window();

        let signature = verifier
            .sign_digest(&sk, &SweepLedger::reclaim_digest(&fingerprint))
            .unwrap();
        let proof = ReclaimProof::Legacy {
            pubkey: pubkey.clone(),
            signature,
        };
        let auth = ledger
            .authorize_reclaim(&fingerprint, &proof, &registry, &verifier, &schedule, height)
            .unwrap();
        assert_eq!(auth.value, 10_000);

        assert_eq!(
            ledger.authorize_reclaim(
                &fingerprint,
                &proof,
                &registry,
                &verifier,
                &schedule,
                height
            ),
            Err(ReclaimError::AlreadyReclaimed)
        );
    }

    #[test]
    fn registered_pq_successor_may_reclaim() {
        let verifier = Secp256k1Verifier::new();
        let (sk, pubkey) = verifier.generate_keypair(&mut rand::thread_rng());
        let fingerprint = LegacyFingerprint::of_pubkey(&pubkey);
        let (pq_sk, pq_pk) = generate_keypair(PqAlgorithm::Falcon512).unwrap();

        let registry = MigrationRegistry::new(Secp256k1Verifier::new(), RotationPolicy::Closed);
        let proof_sig = verifier
            .sign_digest(&sk, &RegistrationEvent::proof_digest(&fingerprint, &pq_pk))
            .unwrap();
        assert_eq!(
            registry.register(RegistrationEvent {
                fingerprint,
                pq_public_key: pq_pk,
                legacy_pubkey: pubkey,
                proof_sig,
                height: 1100,
            }),
            RegistrationOutcome::Accepted
        );
        registry.commit_block(1100);

        let mut ledger = swept_ledger(fingerprint);
        let (schedule, height) = schedule_in_window();
        let signature = sign(&pq_sk, &SweepLedger::reclaim_digest(&fingerprint)).unwrap();
        let auth = ledger
            .authorize_reclaim(
                &fingerprint,
                &ReclaimProof::PqSuccessor { signature },
                &registry.view(),
                &verifier,
                &schedule,
                height,
            )
            .unwrap();
        assert_eq!(auth.value, 10_000);
    }

    #[test]
    fn wrong_key_and_bad_signature_rejected() {
        let verifier = Secp256k1Verifier::new();
        let (sk, pubkey) = verifier.generate_keypair(&mut rand::thread_rng());
        let (_, other_pubkey) = verifier.generate_keypair(&mut rand::thread_rng());
        let fingerprint = LegacyFingerprint::of_pubkey(&pubkey);
        let mut ledger = swept_ledger(fingerprint);
        let registry =
            MigrationRegistry::new(Secp256k1Verifier::new(), RotationPolicy::Closed).view();
        let (schedule, height) = schedule_in_window();

        let signature = verifier
            .sign_digest(&sk, &SweepLedger::reclaim_digest(&fingerprint))
            .unwrap();
        assert_eq!(
            ledger.authorize_reclaim(
                &fingerprint,
                &ReclaimProof::Legacy {
                    pubkey: other_pubkey,
                    signature: signature.clone(),
                },
                &registry,
                &verifier,
                &schedule,
                height
            ),
            Err(ReclaimError::WrongKey)
        );

        let mut tampered = signature;
        tampered[0] ^= 0x01;
        assert_eq!(
            ledger.authorize_reclaim(
                &fingerprint,
                &ReclaimProof::Legacy {
                    pubkey: pubkey.clone(),
                    signature: tampered,
                },
                &registry,
                &verifier,
                &schedule,
                height
            ),
            Err(ReclaimError::BadProof)
        );
        assert!(!ledger.allocation(&fingerprint).unwrap().reclaimed);
    }

    #[test]
    fn reclaim_rejected_outside_window() {
        let verifier = Secp256k1Verifier::new();
        let (sk, pubkey) = verifier.generate_keypair(&mut rand::thread_rng());
        let fingerprint = LegacyFingerprint::of_pubkey(&pubkey);
        let mut ledger = swept_ledger(fingerprint);
        let registry =
            MigrationRegistry::new(Secp256k1Verifier::new(), RotationPolicy::Closed).view();
        let (schedule, _) = schedule_in_window();

        let signature = verifier
            .sign_digest(&sk, &SweepLedger::reclaim_digest(&fingerprint))
            .unwrap();
        let proof = ReclaimProof::Legacy { pubkey, signature };

        // Before the sweep completes and after the window expires.
        for height in [1200, 1350 + 10_000 + 1] {
            assert_eq!(
                ledger.authorize_reclaim(
                    &fingerprint,
                    &proof,
                    &registry,
                    &verifier,
                    &schedule,
                    height
                ),
                Err(ReclaimError::WindowClosed)
            );
        }
    }

    #[test]
    fn unswept_fingerprint_cannot_reclaim() {
        let verifier = Secp256k1Verifier::new();
        let registry =
            MigrationRegistry::new(Secp256k1Verifier::new(), RotationPolicy::Closed).view();
        let (schedule, height) = schedule_in_window();
        let mut ledger = swept_ledger(LegacyFingerprint([9; 20]));
        let stranger = LegacyFingerprint([8; 20]);
        assert_eq!(
            ledger.authorize_reclaim(
                &stranger,
                &ReclaimProof::Legacy {
                    pubkey: vec![2; 33],
                    signature: vec![0; 64],
                },
                &registry,
                &verifier,
                &schedule,
                height
            ),
            Err(ReclaimError::UnknownFingerprint)
        );
    }
}
