pub mod activation;
pub mod params;
pub mod phase;

pub use activation::{accept_activation, ActivationError, ActivationSignal, CouncilSpec};
pub use params::ChainParams;
pub use phase::{Phase, PhaseParams, PhaseSchedule};
