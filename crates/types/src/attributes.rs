use alloy_primitives::{Address, B256};

use crate::{BlsPublicKeyBytes, Withdrawal};

/// Per-slot build parameters. One value drives at most one assembly cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct PayloadAttributes {
    pub slot: u64,
    pub parent_hash: B256,
    /// Number of the block being built, i.e. parent number + 1.
    pub block_number: u64,
    pub proposer_pubkey: BlsPublicKeyBytes,
    pub fee_recipient: Address,
    pub prev_randao: B256,
    pub timestamp: u64,
    /// Proposer preferred gas limit, when known.
    pub gas_limit: Option<u64>,
    pub withdrawals: Vec<Withdrawal>,
}

impl PayloadAttributes {
    pub fn gas_limit_or(&self, gas_ceil: u64) -> u64 {
        self.gas_limit.unwrap_or(gas_ceil)
    }
}
