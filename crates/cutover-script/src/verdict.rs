use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a spend was rejected. Consensus-path rejection is deterministic:
/// same input, same reason, on every conforming node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum RejectReason {
    #[error("missing legacy signature")]
    MissingLegacySig,
    #[error("missing PQ signature")]
    MissingPqSig,
    #[error("signature and key algorithm mismatch")]
    AlgorithmMismatch,
    #[error("operation not permitted in the current phase")]
    PhaseViolation,
    #[error("legacy signature invalid")]
    BadLegacySig,
    #[error("PQ signature invalid")]
    BadPqSig,
    #[error("PQ key does not match the registered key")]
    WrongPqKey,
    #[error("dual signatures cover different sighash modes")]
    SighashMismatch,
    #[error("malformed script")]
    MalformedScript,
    #[error("script evaluated to false")]
    EvalFalse,
    #[error("output already swept")]
    AlreadySwept,
}

/// Two-state validation result for consensus-path components. The
/// registry's Indeterminate answer never reaches here: by the time a spend
/// is validated the registry view is committed and definite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Accept,
    Reject(RejectReason),
}

impl Verdict {
    pub fn is_accept(&self) -> bool {
        matches!(self, Verdict::Accept)
    }
}
