// Per-network cut-over parameters.
//
// Economic and proof-of-work parameters live with the host chain; only the
// transition schedule and network identity matter here. Durations assume
// ten-minute blocks on mainnet.

use serde::Serialize;

use crate::phase::PhaseParams;

/// Network identity plus the transition schedule for that network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainParams {
    pub name: &'static str,
    /// Address prefix for this network.
    pub hrp: &'static str,
    /// Wire magic distinguishing this network's messages.
    pub magic: [u8; 4],
    pub phase: PhaseParams,
    /// Absolute height after which the emergency council can no longer
    /// activate the cut-over.
    pub council_sunset_height: u64,
}

impl ChainParams {
    pub fn mainnet() -> ChainParams {
        ChainParams {
            name: "main",
            hrp: "qcm",
            magic: [0x51, 0x43, 0x4d, 0x00],
            phase: PhaseParams {
                grace_blocks: 4_320,       // 30 days
                sweep_blocks: 25_920,      // 180 days
                reclaim_window_blocks: 210_240, // 4 years
            },
            council_sunset_height: 52_560, // 1 year
        }
    }

    pub fn testnet() -> ChainParams {
        ChainParams {
            name: "test",
            hrp: "tqcm",
            magic: [0x51, 0x43, 0x4d, 0x01],
            phase: PhaseParams {
                grace_blocks: 144,   // 1 day
                sweep_blocks: 1_008, // 1 week
                reclaim_window_blocks: 4_032,
            },
            council_sunset_height: 2_016, // 2 weeks
        }
    }

    pub fn regtest() -> ChainParams {
        ChainParams {
            name: "regtest",
            hrp: "rqcm",
            magic: [0x51, 0x43, 0x4d, 0x02],
            phase: PhaseParams {
                grace_blocks: 10,
                sweep_blocks: 50,
                reclaim_window_blocks: 100,
            },
            council_sunset_height: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::PhaseSchedule;

    #[test]
    fn all_networks_have_valid_schedules() {
        for params in [
            ChainParams::mainnet(),
            ChainParams::testnet(),
            ChainParams::regtest(),
        ] {
            assert!(PhaseSchedule::new(params.phase).is_ok(), "{}", params.name);
        }
    }

    #[test]
    fn network_identities_are_distinct() {
        let (m, t, r) = (
            ChainParams::mainnet(),
            ChainParams::testnet(),
            ChainParams::regtest(),
        );
        assert_ne!(m.magic, t.magic);
        assert_ne!(t.magic, r.magic);
        assert_ne!(m.hrp, t.hrp);
        assert_ne!(t.hrp, r.hrp);
    }

    #[test]
    fn mainnet_grace_precedes_sweep() {
        let p = ChainParams::mainnet().phase;
        assert!(p.grace_blocks < p.sweep_blocks);
    }
}
