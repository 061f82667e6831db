// Sweep planning: a pure function from (snapshot, registry view) to a
// fully-specified transaction set. No clocks, no randomness, no iteration
// order left to a hash map.

use std::collections::BTreeSet;

use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use cutover_core::script::{Script, ScriptClass};
use cutover_core::transaction::{OutPoint, Transaction, TxIn, TxOut};
use cutover_crypto::LegacyFingerprint;
use cutover_state::RegistryView;

use crate::snapshot::UtxoSnapshot;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SweepError {
    #[error("max_inputs_per_tx must be nonzero")]
    ZeroInputLimit,
    #[error("custodial script is empty")]
    EmptyCustodialScript,
}

/// Planning parameters. The custodial script is the jointly-controlled
/// pool script; its multi-party composition is decided outside the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepParams {
    pub custodial_script: Script,
    pub max_inputs_per_tx: usize,
    /// Flat fee per sweep transaction.
    pub base_fee: u64,
    /// Marginal fee per consumed input.
    pub fee_per_input: u64,
}

/// One swept output, remembered by the fingerprint that controlled it.
/// Reclamation rights attach to this record, not to possession of the
/// custodial funds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepAllocation {
    pub fingerprint: LegacyFingerprint,
    pub outpoint: OutPoint,
    pub value: u64,
}

/// The complete planned sweep. Two nodes with the same inputs produce the
/// same `SweepSet` byte for byte.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepSet {
    pub snapshot_height: u64,
    pub transactions: Vec<Transaction>,
    pub allocations: Vec<SweepAllocation>,
}

impl SweepSet {
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Outpoints this sweep consumes, for the verifier's already-swept set
    /// and for the ledger.
    pub fn swept_outpoints(&self) -> BTreeSet<OutPoint> {
        self.transactions
            .iter()
            .flat_map(|tx| tx.inputs.iter().map(|input| input.prevout))
            .collect()
    }

    pub fn total_swept_value(&self) -> u64 {
        self.allocations.iter().map(|a| a.value).sum()
    }
}

/// Plan the sweep over `snapshot`. Candidates are unspent outputs whose
/// script is the legacy key-hash template and whose fingerprint has no
/// accepted migration record in `registry`. Outpoints in `already_swept`
/// are skipped, which makes re-running after completion a no-op.
///
/// Candidates are taken in outpoint order and grouped into transactions of
/// at most `max_inputs_per_tx` inputs, each paying its chunk's value minus
/// fee to the custodial script. A chunk whose value does not exceed its
/// fee is left unswept; those outputs stay spendable by their owners.
pub fn compute_sweep<S: UtxoSnapshot>(
    snapshot: &S,
    registry: &RegistryView,
    already_swept: &BTreeSet<OutPoint>,
    params: &SweepParams,
) -> Result<SweepSet, SweepError> {
    if params.max_inputs_per_tx == 0 {
        return Err(SweepError::ZeroInputLimit);
    }
    if params.custodial_script.is_empty() {
        return Err(SweepError::EmptyCustodialScript);
    }

    let mut candidates: Vec<(OutPoint, LegacyFingerprint, u64)> = Vec::new();
    for entry in snapshot.entries() {
        if already_swept.contains(&entry.outpoint) {
            continue;
        }
        let ScriptClass::LegacyPubkeyHash(fingerprint) = entry.script_pubkey.classify() else {
            continue;
        };
        if registry.is_registered(&fingerprint) {
            continue;
        }
        candidates.push((entry.outpoint, fingerprint, entry.value));
    }
    // Snapshot order is outpoint order, but do not rely on the impl.
    candidates.sort_by_key(|(outpoint, _, _)| *outpoint);

    let mut transactions = Vec::new();
    let mut allocations = Vec::new();
    for chunk in candidates.chunks(params.max_inputs_per_tx) {
        // Overflowing fee or value arithmetic marks the chunk unsweepable,
        // same as dust. Checked math keeps hostile params from wrapping in
        // release builds.
        let fee = params
            .fee_per_input
            .checked_mul(chunk.len() as u64)
            .and_then(|marginal| marginal.checked_add(params.base_fee));
        let total = chunk
            .iter()
            .try_fold(0u64, |acc, (_, _, value)| acc.checked_add(*value));
        let (Some(fee), Some(total)) = (fee, total) else {
            continue;
        };
        if total <= fee {
            continue;
        }
        transactions.push(Transaction {
            version: 1,
            inputs: chunk
                .iter()
                .map(|(outpoint, _, _)| TxIn::new(*outpoint))
                .collect(),
            outputs: vec![TxOut {
                value: total - fee,
                script_pubkey: params.custodial_script.clone(),
            }],
            lock_time: 0,
        });
        for (outpoint, fingerprint, value) in chunk {
            allocations.push(SweepAllocation {
                fingerprint: *fingerprint,
                outpoint: *outpoint,
                value: *value,
            });
        }
    }

    info!(
        "sweep plan at height {}: {} transactions over {} outputs",
        snapshot.height(),
        transactions.len(),
        allocations.len()
    );
    Ok(SweepSet {
        snapshot_height: snapshot.height(),
        transactions,
        allocations,
    })
}
