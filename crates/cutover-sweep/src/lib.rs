//! White-knight sweep: custodial relocation of unmigrated legacy funds.
//!
//! The sweep is a consensus computation, not a background job. Given the
//! same UTXO snapshot and the same committed registry view, every
//! conforming node derives byte-identical sweep transactions. The ledger
//! half then tracks custodial allocations by the original fingerprint so
//! owners can reclaim during the reclaim window.

pub mod ledger;
pub mod plan;
pub mod snapshot;

pub use ledger::{
    CustodialAllocation, ReclaimAuthorization, ReclaimError, ReclaimProof, SweepLedger,
    RECLAIM_DOMAIN_TAG,
};
pub use plan::{compute_sweep, SweepAllocation, SweepError, SweepParams, SweepSet};
pub use snapshot::{MemoryUtxoSnapshot, UtxoEntry, UtxoSnapshot};
