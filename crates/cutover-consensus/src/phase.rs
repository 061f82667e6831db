// Cut-over phase state machine.
//
// SAFETY INVARIANTS:
// 1. The phase is DERIVED, never stored: a pure function of the activation
//    height, the configured durations, the sweep completion height, and the
//    query height. Any node recomputes the same phase from chain data alone.
// 2. The lifecycle is monotonic and one-directional; no phase is re-entered
//    once exited. ReclaimWindow is terminal — after its expiry the phase
//    name does not change, but reclaim authorization closes.
// 3. Until an authenticated activation signal fixes the activation height,
//    PreActivation holds unconditionally.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Consensus phase of the signature transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// No activation signal accepted yet, or before the activation height.
    PreActivation,
    /// Registered outputs require both a legacy and a PQ signature.
    GraceDualSig,
    /// Registered outputs require a PQ signature; legacy-only spends fail.
    PqOnly,
    /// Unmigrated legacy-only outputs are eligible for the custodial sweep.
    SweepEligible,
    /// The sweep transaction set has been finalized and included.
    SweepComplete,
    /// Original owners may reclaim swept funds by ownership proof.
    ReclaimWindow,
}

/// Configured durations, in blocks, relative to the activation height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseParams {
    /// Length of the dual-signature grace phase.
    pub grace_blocks: u64,
    /// Offset from activation at which sweep eligibility begins. Must be
    /// greater than `grace_blocks`.
    pub sweep_blocks: u64,
    /// Length of the reclamation window after sweep completion.
    pub reclaim_window_blocks: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PhaseError {
    #[error("sweep_blocks must exceed grace_blocks")]
    BadDurations,
    #[error("sweep completion recorded at {completed} before eligibility at {eligible}")]
    SweepBeforeEligibility { completed: u64, eligible: u64 },
    #[error("sweep completion already recorded")]
    SweepAlreadyComplete,
    #[error("sweep completion requires an activation height")]
    NotActivated,
}

/// Derivation inputs for the phase function. The two optional heights are
/// facts read from the chain (the accepted activation signal and the block
/// containing the sweep set), not mutable engine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseSchedule {
    params: PhaseParams,
    activation_height: Option<u64>,
    sweep_completed_height: Option<u64>,
}

impl PhaseSchedule {
    pub fn new(params: PhaseParams) -> Result<PhaseSchedule, PhaseError> {
        if params.sweep_blocks <= params.grace_blocks {
            return Err(PhaseError::BadDurations);
        }
        Ok(PhaseSchedule {
            params,
            activation_height: None,
            sweep_completed_height: None,
        })
    }

    /// Rebuild a schedule from persisted chain facts, for a node coming
    /// back up after the activation (and possibly the sweep) happened.
    pub fn restore(
        params: PhaseParams,
        activation_height: Option<u64>,
        sweep_completed_height: Option<u64>,
    ) -> Result<PhaseSchedule, PhaseError> {
        let mut schedule = PhaseSchedule::new(params)?;
        if let Some(activation) = activation_height {
            schedule.set_activation_height(activation);
        }
        if let Some(completed) = sweep_completed_height {
            schedule.record_sweep_complete(completed)?;
        }
        Ok(schedule)
    }

    pub fn params(&self) -> PhaseParams {
        self.params
    }

    pub fn activation_height(&self) -> Option<u64> {
        self.activation_height
    }

    pub fn sweep_completed_height(&self) -> Option<u64> {
        self.sweep_completed_height
    }

    /// Fix the activation height. Idempotence is the caller's concern via
    /// [`crate::activation`]; this only records an already-authenticated
    /// fact and does so at most once.
    pub(crate) fn set_activation_height(&mut self, height: u64) -> bool {
        if self.activation_height.is_some() {
            return false;
        }
        self.activation_height = Some(height);
        true
    }

    /// First height at which the sweep may run, if activated.
    pub fn sweep_eligibility_height(&self) -> Option<u64> {
        self.activation_height
            .map(|a| a + self.params.sweep_blocks)
    }

    /// Record the height of the block that finalized the sweep set.
    pub fn record_sweep_complete(&mut self, height: u64) -> Result<(), PhaseError> {
        let eligible = self
            .sweep_eligibility_height()
            .ok_or(PhaseError::NotActivated)?;
        if self.sweep_completed_height.is_some() {
            return Err(PhaseError::SweepAlreadyComplete);
        }
        if height < eligible {
            return Err(PhaseError::SweepBeforeEligibility {
                completed: height,
                eligible,
            });
        }
        self.sweep_completed_height = Some(height);
        Ok(())
    }

    /// The phase at `height`. Pure; no interior mutation.
    pub fn phase_at(&self, height: u64) -> Phase {
        let Some(activation) = self.activation_height else {
            return Phase::PreActivation;
        };
        if height < activation {
            return Phase::PreActivation;
        }
        if height < activation + self.params.grace_blocks {
            return Phase::GraceDualSig;
        }
        if height < activation + self.params.sweep_blocks {
            return Phase::PqOnly;
        }
        match self.sweep_completed_height {
            None => Phase::SweepEligible,
            Some(completed) if height < completed => Phase::SweepEligible,
            Some(completed) if height == completed => Phase::SweepComplete,
            Some(_) => Phase::ReclaimWindow,
        }
    }

    /// Whether a reclaim submitted at `height` is still inside the window.
    pub fn reclaim_open(&self, height: u64) -> bool {
        match self.sweep_completed_height {
            Some(completed) => {
                height > completed && height <= completed + self.params.reclaim_window_blocks
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn schedule() -> PhaseSchedule {
        let mut s = PhaseSchedule::new(PhaseParams {
            grace_blocks: 100,
            sweep_blocks: 300,
            reclaim_window_blocks: 1000,
        })
        .unwrap();
        assert!(s.set_activation_height(1000));
        s
    }

    #[test]
    fn unactivated_is_always_pre_activation() {
        let s = PhaseSchedule::new(PhaseParams {
            grace_blocks: 10,
            sweep_blocks: 20,
            reclaim_window_blocks: 30,
        })
        .unwrap();
        for h in [0, 1_000, 10_000_000] {
            assert_eq!(s.phase_at(h), Phase::PreActivation);
        }
    }

    #[test]
    fn phase_boundaries() {
        let mut s = schedule();
        assert_eq!(s.phase_at(999), Phase::PreActivation);
        assert_eq!(s.phase_at(1000), Phase::GraceDualSig);
        assert_eq!(s.phase_at(1099), Phase::GraceDualSig);
        assert_eq!(s.phase_at(1100), Phase::PqOnly);
        assert_eq!(s.phase_at(1299), Phase::PqOnly);
        assert_eq!(s.phase_at(1300), Phase::SweepEligible);

        s.record_sweep_complete(1310).unwrap();
        assert_eq!(s.phase_at(1305), Phase::SweepEligible);
        assert_eq!(s.phase_at(1310), Phase::SweepComplete);
        assert_eq!(s.phase_at(1311), Phase::ReclaimWindow);
        assert_eq!(s.phase_at(1_000_000), Phase::ReclaimWindow);
    }

    #[test]
    fn activation_height_fixes_once() {
        let mut s = schedule();
        assert!(!s.set_activation_height(2000));
        assert_eq!(s.activation_height(), Some(1000));
    }

    #[test]
    fn sweep_completion_checks() {
        let mut s = schedule();
        assert_eq!(
            s.record_sweep_complete(1299).unwrap_err(),
            PhaseError::SweepBeforeEligibility {
                completed: 1299,
                eligible: 1300
            }
        );
        s.record_sweep_complete(1300).unwrap();
        assert_eq!(
            s.record_sweep_complete(1301).unwrap_err(),
            PhaseError::SweepAlreadyComplete
        );
    }

    #[test]
    fn reclaim_window_bounds() {
        let mut s = schedule();
        assert!(!s.reclaim_open(1400));
        s.record_sweep_complete(1300).unwrap();
        assert!(!s.reclaim_open(1300)); // completion block itself
        assert!(s.reclaim_open(1301));
        assert!(s.reclaim_open(2300));
        assert!(!s.reclaim_open(2301)); // expired
    }

    #[test]
    fn durations_must_order() {
        assert_eq!(
            PhaseSchedule::new(PhaseParams {
                grace_blocks: 300,
                sweep_blocks: 300,
                reclaim_window_blocks: 10,
            })
            .unwrap_err(),
            PhaseError::BadDurations
        );
    }

    proptest! {
        /// phase(h) is monotonically non-decreasing in h and single-valued.
        #[test]
        fn phase_is_monotone_in_height(completed_offset in 0u64..500, heights in proptest::collection::vec(0u64..5000, 50)) {
            let mut s = schedule();
            s.record_sweep_complete(1300 + completed_offset).unwrap();
            let mut sorted = heights;
            sorted.sort_unstable();
            let phases: Vec<Phase> = sorted.iter().map(|&h| s.phase_at(h)).collect();
            for pair in phases.windows(2) {
                prop_assert!(pair[0] <= pair[1]);
            }
            for &h in &sorted {
                prop_assert_eq!(s.phase_at(h), s.phase_at(h));
            }
        }
    }
}
