use std::time::{Duration, SystemTime, UNIX_EPOCH};

use alloy_primitives::B256;
use lh_types::ChainSpec;

use crate::{utils::utcnow_dur, ChainConfig};

/// Slot clock and signing domain derived from the chain config.
#[derive(Debug, Clone)]
pub struct ChainInfo {
    pub genesis_time: u64,
    pub seconds_in_slot: u64,
    pub builder_domain: B256,
}

impl ChainInfo {
    pub fn new(config: &ChainConfig) -> Self {
        let mut spec = ChainSpec::mainnet();
        spec.genesis_fork_version = config.genesis_fork_version.0;
        spec.seconds_per_slot = config.seconds_in_slot;
        let builder_domain = spec.get_builder_domain();

        Self { genesis_time: config.genesis_time, seconds_in_slot: config.seconds_in_slot, builder_domain }
    }

    pub fn slot_duration(&self) -> Duration {
        Duration::from_secs(self.seconds_in_slot)
    }

    /// Wall clock start of `slot`, as a duration since UNIX_EPOCH.
    pub fn slot_start(&self, slot: u64) -> Duration {
        Duration::from_secs(self.genesis_time + slot * self.seconds_in_slot)
    }

    /// Current slot, zero before genesis.
    pub fn current_slot(&self) -> u64 {
        let now = utcnow_dur().as_secs();
        now.saturating_sub(self.genesis_time) / self.seconds_in_slot.max(1)
    }

    /// Window for bids on `proposal_slot`. Bids are requested as soon as the proposal slot
    /// starts, so the window is the slot before it.
    pub fn submission_window(&self, proposal_slot: u64, offset: Duration) -> SubmissionWindow {
        let slot_end = self.slot_start(proposal_slot);
        SubmissionWindow {
            slot_start: slot_end.saturating_sub(self.slot_duration()),
            slot_end,
            offset,
        }
    }
}

/// Time budget of the slot preceding a proposal: a bid must be out by `slot_end - offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmissionWindow {
    pub slot_start: Duration,
    pub slot_end: Duration,
    pub offset: Duration,
}

impl SubmissionWindow {
    /// Deadline as a duration since UNIX_EPOCH.
    pub fn deadline(&self) -> Duration {
        self.slot_end.saturating_sub(self.offset)
    }

    pub fn deadline_time(&self) -> SystemTime {
        UNIX_EPOCH + self.deadline()
    }

    /// Time left until the deadline measured from `now` (since UNIX_EPOCH), zero once passed.
    pub fn remaining_at(&self, now: Duration) -> Duration {
        self.deadline().saturating_sub(now)
    }

    pub fn remaining(&self) -> Duration {
        self.remaining_at(utcnow_dur())
    }

    pub fn is_open_at(&self, now: Duration) -> bool {
        !self.remaining_at(now).is_zero()
    }
}
