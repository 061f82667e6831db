// Registration log persistence and incremental sync framing.
//
// The log is the unit of durability and node-to-node sync: an ordered
// sequence of registration events that reconstructs the registry
// deterministically via replay. Encoding is bincode over the serde derives.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::registry::RegistrationEvent;

const LOG_MAGIC: &[u8; 4] = b"CMRL";
const LOG_VERSION: u16 = 1;

#[derive(Debug, Error)]
pub enum LogError {
    #[error("bad log magic")]
    BadMagic,
    #[error("unsupported log version {0}")]
    UnsupportedVersion(u16),
    #[error("log decode failed: {0}")]
    Decode(#[from] bincode::Error),
    #[error("events out of order: height {prev} followed by {next}")]
    OutOfOrder { prev: u64, next: u64 },
}

#[derive(Serialize, Deserialize)]
struct LogFile {
    version: u16,
    events: Vec<RegistrationEvent>,
}

/// Serialize an event log. Events must be height-ordered; ordering is the
/// replay contract, so it is enforced at the boundary rather than trusted.
pub fn encode_log(events: &[RegistrationEvent]) -> Result<Vec<u8>, LogError> {
    check_order(events)?;
    let mut out = Vec::with_capacity(8 + events.len() * 64);
    out.extend_from_slice(LOG_MAGIC);
    let body = bincode::serialize(&LogFile {
        version: LOG_VERSION,
        events: events.to_vec(),
    })?;
    out.extend_from_slice(&body);
    Ok(out)
}

/// Decode and order-check an event log.
pub fn decode_log(data: &[u8]) -> Result<Vec<RegistrationEvent>, LogError> {
    let body = data
        .strip_prefix(LOG_MAGIC.as_slice())
        .ok_or(LogError::BadMagic)?;
    let file: LogFile = bincode::deserialize(body)?;
    if file.version != LOG_VERSION {
        return Err(LogError::UnsupportedVersion(file.version));
    }
    check_order(&file.events)?;
    Ok(file.events)
}

fn check_order(events: &[RegistrationEvent]) -> Result<(), LogError> {
    for pair in events.windows(2) {
        if pair[1].height < pair[0].height {
            return Err(LogError::OutOfOrder {
                prev: pair[0].height,
                next: pair[1].height,
            });
        }
    }
    Ok(())
}
