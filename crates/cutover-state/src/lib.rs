pub mod log_store;
pub mod registry;

pub use log_store::{decode_log, encode_log, LogError};
pub use registry::{
    MigrationRecord, MigrationRegistry, RegistrationEvent, RegistrationOutcome, RegistryAnswer,
    RegistryReject, RegistryView, RotationPolicy, MIGRATION_DOMAIN_TAG,
};
