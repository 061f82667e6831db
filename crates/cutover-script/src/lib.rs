pub mod sigdata;
pub mod verdict;
pub mod verify;

pub use sigdata::{attach_sighash, split_sighash};
pub use verdict::{RejectReason, Verdict};
pub use verify::{verify_input, VerifyContext};
