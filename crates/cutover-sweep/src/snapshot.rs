// UTXO snapshot seam. The host ledger's storage supplies the view; the
// sweep planner only needs an enumerable (outpoint, script, value) set as
// of a fixed height.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use cutover_core::script::Script;
use cutover_core::transaction::OutPoint;

/// One unspent output as the sweep planner sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoEntry {
    pub outpoint: OutPoint,
    pub script_pubkey: Script,
    pub value: u64,
}

/// Point-in-time view of the unspent set. Implementations must enumerate
/// in outpoint order; the planner's determinism depends on it.
pub trait UtxoSnapshot {
    /// Height the view was taken at.
    fn height(&self) -> u64;

    fn entries(&self) -> Box<dyn Iterator<Item = UtxoEntry> + '_>;
}

/// In-memory snapshot backed by an ordered map. Used by tests and by hosts
/// that materialize the view before handing it over.
#[derive(Debug, Clone, Default)]
pub struct MemoryUtxoSnapshot {
    height: u64,
    utxos: BTreeMap<OutPoint, (Script, u64)>,
}

impl MemoryUtxoSnapshot {
    pub fn new(height: u64) -> MemoryUtxoSnapshot {
        MemoryUtxoSnapshot {
            height,
            utxos: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, outpoint: OutPoint, script_pubkey: Script, value: u64) {
        self.utxos.insert(outpoint, (script_pubkey, value));
    }

    pub fn len(&self) -> usize {
        self.utxos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.utxos.is_empty()
    }
}

impl UtxoSnapshot for MemoryUtxoSnapshot {
    fn height(&self) -> u64 {
        self.height
    }

    fn entries(&self) -> Box<dyn Iterator<Item = UtxoEntry> + '_> {
        Box::new(self.utxos.iter().map(|(outpoint, (script, value))| UtxoEntry {
            outpoint: *outpoint,
            script_pubkey: script.clone(),
            value: *value,
        }))
    }
}
