//! Quantum cut-over engine: coordinated transition of a UTXO ledger from a
//! pre-quantum signature scheme to post-quantum schemes.
//!
//! The workspace splits the engine along its seams:
//!
//! - [`cutover_crypto`] — PQ signature schemes, legacy secp256k1, key
//!   fingerprints.
//! - [`cutover_core`] — scripts, transactions, sighash, bech32m addresses.
//! - [`cutover_consensus`] — the phase state machine, activation signal,
//!   chain parameters.
//! - [`cutover_state`] — the migration registry over an ordered event log.
//! - [`cutover_script`] — input verification with the phase-gated
//!   dual-signature rules.
//! - [`cutover_sweep`] — deterministic custodial sweep planning and the
//!   reclaim ledger.

pub use cutover_consensus::{ChainParams, Phase, PhaseParams, PhaseSchedule};
pub use cutover_core::{Address, Network, OutPoint, Script, SighashType, Transaction};
pub use cutover_crypto::{LegacyFingerprint, PqAlgorithm, PqPublicKey, Secp256k1Verifier};
pub use cutover_script::{verify_input, RejectReason, Verdict, VerifyContext};
pub use cutover_state::{MigrationRegistry, RegistrationEvent, RegistryView, RotationPolicy};
pub use cutover_sweep::{compute_sweep, SweepLedger, SweepParams, SweepSet, UtxoSnapshot};
