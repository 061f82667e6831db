// Emergency activation signal.
//
// Activation is a one-time, authenticated external event: an n-of-m council
// of post-quantum keys attests to {proof reference, declared activation
// height}. The engine accepts at most one signal; malformed or
// unauthenticated signals are ignored entirely and PreActivation holds.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use cutover_crypto::{verify, PqPublicKey, PqSignature};

use crate::phase::PhaseSchedule;

/// Domain-separation tag for council attestations.
const ACTIVATION_DOMAIN_TAG: &[u8] = b"cutover/activation/v1";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActivationError {
    #[error("activation height already fixed")]
    AlreadyActivated,
    #[error("declared activation height {declared} is not after current height {current}")]
    HeightInPast { declared: u64, current: u64 },
    #[error("council authority has sunset at height {sunset}")]
    CouncilSunset { sunset: u64 },
    #[error("insufficient council approvals: {valid} of {threshold} required")]
    InsufficientApprovals { valid: usize, threshold: usize },
    #[error("approval from a key outside the council")]
    UnknownApprover,
    #[error("duplicate approval from the same council member")]
    DuplicateApprover,
}

/// The emergency council: member keys and the approval threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouncilSpec {
    pub members: Vec<PqPublicKey>,
    pub threshold: usize,
    /// Height after which the council can no longer activate.
    pub sunset_height: u64,
}

/// An activation message as received from the governance collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivationSignal {
    /// Reference to the published evidence justifying activation.
    pub proof_reference: [u8; 32],
    pub declared_activation_height: u64,
    /// Council approvals: (member key, signature over the canonical message).
    pub approvals: Vec<(PqPublicKey, PqSignature)>,
}

impl ActivationSignal {
    /// The canonical byte message every approval must sign.
    pub fn signing_message(proof_reference: &[u8; 32], declared_height: u64) -> Vec<u8> {
        let mut msg = Vec::with_capacity(ACTIVATION_DOMAIN_TAG.len() + 40);
        msg.extend_from_slice(ACTIVATION_DOMAIN_TAG);
        msg.extend_from_slice(proof_reference);
        msg.extend_from_slice(&declared_height.to_le_bytes());
        msg
    }

    /// Authenticate this signal against the council. Counts only valid
    /// signatures from distinct council members.
    pub fn authenticate(
        &self,
        council: &CouncilSpec,
        current_height: u64,
    ) -> Result<(), ActivationError> {
        if current_height >= council.sunset_height {
            return Err(ActivationError::CouncilSunset {
                sunset: council.sunset_height,
            });
        }
        if self.declared_activation_height <= current_height {
            return Err(ActivationError::HeightInPast {
                declared: self.declared_activation_height,
                current: current_height,
            });
        }
        let message =
            Self::signing_message(&self.proof_reference, self.declared_activation_height);
        let mut seen: Vec<&PqPublicKey> = Vec::new();
        let mut valid = 0usize;
        for (key, sig) in &self.approvals {
            if !council.members.contains(key) {
                return Err(ActivationError::UnknownApprover);
            }
            if seen.contains(&key) {
                return Err(ActivationError::DuplicateApprover);
            }
            seen.push(key);
            if verify(sig, &message, key) {
                valid += 1;
            }
        }
        if valid < council.threshold {
            return Err(ActivationError::InsufficientApprovals {
                valid,
                threshold: council.threshold,
            });
        }
        Ok(())
    }
}

/// Accept an activation signal into the schedule, at most once.
///
/// A rejected signal leaves the schedule untouched — the phase stays
/// PreActivation, which is exactly the "ignored entirely" failure mode the
/// error taxonomy requires for unauthenticated configuration.
pub fn accept_activation(
    schedule: &mut PhaseSchedule,
    signal: &ActivationSignal,
    council: &CouncilSpec,
    current_height: u64,
) -> Result<(), ActivationError> {
    if schedule.activation_height().is_some() {
        warn!("ignoring activation signal: height already fixed");
        return Err(ActivationError::AlreadyActivated);
    }
    signal.authenticate(council, current_height)?;
    // authenticate() passed and no height is set, so this records.
    schedule.set_activation_height(signal.declared_activation_height);
    info!(
        "cut-over activation accepted: height {}",
        signal.declared_activation_height
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::{Phase, PhaseParams};
    use cutover_crypto::{generate_keypair, sign, PqAlgorithm, PqSecretKey};

    struct Council {
        spec: CouncilSpec,
        secrets: Vec<PqSecretKey>,
    }

    fn council(n: usize, threshold: usize) -> Council {
        let mut members = Vec::new();
        let mut secrets = Vec::new();
        for _ in 0..n {
            let (sk, pk) = generate_keypair(PqAlgorithm::Falcon512).unwrap();
            members.push(pk);
            secrets.push(sk);
        }
        Council {
            spec: CouncilSpec {
                members,
                threshold,
                sunset_height: 52_560,
            },
            secrets,
        }
    }

    fn signal(c: &Council, signers: &[usize], declared: u64) -> ActivationSignal {
        let proof_reference = [0xccu8; 32];
        let message = ActivationSignal::signing_message(&proof_reference, declared);
        let approvals = signers
            .iter()
            .map(|&i| {
                (
                    c.spec.members[i].clone(),
                    sign(&c.secrets[i], &message).unwrap(),
                )
            })
            .collect();
        ActivationSignal {
            proof_reference,
            declared_activation_height: declared,
            approvals,
        }
    }

    fn schedule() -> PhaseSchedule {
        PhaseSchedule::new(PhaseParams {
            grace_blocks: 100,
            sweep_blocks: 300,
            reclaim_window_blocks: 1000,
        })
        .unwrap()
    }

    #[test]
    fn threshold_signal_activates_once() {
        let c = council(3, 2);
        let mut s = schedule();
        accept_activation(&mut s, &signal(&c, &[0, 2], 1000), &c.spec, 500).unwrap();
        assert_eq!(s.activation_height(), Some(1000));
        assert_eq!(s.phase_at(1000), Phase::GraceDualSig);

        // Second signal is ignored even if valid.
        let err = accept_activation(&mut s, &signal(&c, &[0, 1], 2000), &c.spec, 600).unwrap_err();
        assert_eq!(err, ActivationError::AlreadyActivated);
        assert_eq!(s.activation_height(), Some(1000));
    }

    #[test]
    fn below_threshold_is_ignored() {
        let c = council(3, 2);
        let mut s = schedule();
        let err = accept_activation(&mut s, &signal(&c, &[1], 1000), &c.spec, 500).unwrap_err();
        assert!(matches!(err, ActivationError::InsufficientApprovals { .. }));
        assert_eq!(s.phase_at(5000), Phase::PreActivation);
    }

    #[test]
    fn forged_approval_does_not_count() {
        let c = council(2, 2);
        let mut sig = signal(&c, &[0, 1], 1000);
        // Replace one approval's signature with one over a different height.
        let other = ActivationSignal::signing_message(&sig.proof_reference, 9999);
        sig.approvals[1].1 = sign(&c.secrets[1], &other).unwrap();
        let mut s = schedule();
        let err = accept_activation(&mut s, &sig, &c.spec, 500).unwrap_err();
        assert!(matches!(err, ActivationError::InsufficientApprovals { .. }));
    }

    #[test]
    fn non_member_approver_rejected() {
        let c = council(2, 1);
        let outsider = council(1, 1);
        let mut sig = signal(&outsider, &[0], 1000);
        sig.approvals[0].0 = outsider.spec.members[0].clone();
        let mut s = schedule();
        assert_eq!(
            accept_activation(&mut s, &sig, &c.spec, 500).unwrap_err(),
            ActivationError::UnknownApprover
        );
    }

    #[test]
    fn duplicate_approver_rejected() {
        let c = council(2, 2);
        let mut sig = signal(&c, &[0], 1000);
        sig.approvals.push(sig.approvals[0].clone());
        let mut s = schedule();
        assert_eq!(
            accept_activation(&mut s, &sig, &c.spec, 500).unwrap_err(),
            ActivationError::DuplicateApprover
        );
    }

    #[test]
    fn past_height_and_sunset_rejected() {
        let c = council(1, 1);
        let mut s = schedule();
        assert!(matches!(
            accept_activation(&mut s, &signal(&c, &[0], 400), &c.spec, 500).unwrap_err(),
            ActivationError::HeightInPast { .. }
        ));
        assert!(matches!(
            accept_activation(&mut s, &signal(&c, &[0], 60_000), &c.spec, 52_560).unwrap_err(),
            ActivationError::CouncilSunset { .. }
        ));
    }
}
