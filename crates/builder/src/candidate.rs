use std::sync::Arc;

use alloy_primitives::{Address, Bytes, B256, U256};
use crucible_common::AlgoType;
use crucible_types::{Bundle, PayloadAttributes, Withdrawal};

use crate::algorithms::BlockSelection;

/// Best arrangement produced by one algorithm for one slot, not yet sealed.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateBlock {
    pub parent_hash: B256,
    pub fee_recipient: Address,
    pub prev_randao: B256,
    pub block_number: u64,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub timestamp: u64,
    pub withdrawals: Vec<Withdrawal>,
    /// Transactions of all included bundles, in inclusion order.
    pub transactions: Vec<Bytes>,
    pub bundles: Vec<Arc<Bundle>>,
    pub value: U256,
    pub algo: AlgoType,
}

impl CandidateBlock {
    pub fn new(
        attrs: &PayloadAttributes,
        gas_limit: u64,
        selection: BlockSelection,
        algo: AlgoType,
    ) -> Self {
        let value = selection.value();
        let bundles: Vec<_> = selection.bundles.into_iter().map(|sim| sim.bundle).collect();
        let transactions = bundles.iter().flat_map(|b| b.txs.iter().cloned()).collect();

        Self {
            parent_hash: attrs.parent_hash,
            fee_recipient: attrs.fee_recipient,
            prev_randao: attrs.prev_randao,
            block_number: attrs.block_number,
            gas_limit,
            gas_used: selection.gas_used,
            timestamp: attrs.timestamp,
            withdrawals: attrs.withdrawals.clone(),
            transactions,
            bundles,
            value,
            algo,
        }
    }

    pub fn num_bundles(&self) -> usize {
        self.bundles.len()
    }
}
