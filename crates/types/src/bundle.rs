use std::sync::Arc;

use alloy_primitives::{keccak256, Bytes, B256, I256};

/// Ordered group of transactions that must execute atomically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    pub hash: B256,
    pub txs: Vec<Bytes>,
    /// Indices of transactions that are allowed to revert.
    pub reverting_tx_indices: Vec<usize>,
    /// When set, the bundle may only land in this block.
    pub block_number: Option<u64>,
}

impl Bundle {
    pub fn new(txs: Vec<Bytes>, reverting_tx_indices: Vec<usize>, block_number: Option<u64>) -> Self {
        let hash = Self::compute_hash(&txs);
        Self { hash, txs, reverting_tx_indices, block_number }
    }

    fn compute_hash(txs: &[Bytes]) -> B256 {
        let mut buf = Vec::with_capacity(txs.len() * 32);
        for tx in txs {
            buf.extend_from_slice(keccak256(tx).as_slice());
        }
        keccak256(buf)
    }

    pub fn is_revertible(&self, index: usize) -> bool {
        self.reverting_tx_indices.contains(&index)
    }

    pub fn targets(&self, block_number: u64) -> bool {
        self.block_number.is_none_or(|n| n == block_number)
    }

    /// Copy of this bundle with the transaction at `index` removed and revert indices shifted.
    pub fn without_tx(&self, index: usize) -> Bundle {
        let txs = self
            .txs
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .map(|(_, tx)| tx.clone())
            .collect();
        let reverting_tx_indices = self
            .reverting_tx_indices
            .iter()
            .filter(|i| **i != index)
            .map(|i| if *i > index { i - 1 } else { *i })
            .collect();

        Bundle::new(txs, reverting_tx_indices, self.block_number)
    }
}

/// Result of running a bundle against a specific snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedBundle {
    pub bundle: Arc<Bundle>,
    pub gas_used: u64,
    /// Net value paid to the fee recipient, may be negative.
    pub profit: I256,
    pub success: bool,
    pub revert_reason: Option<String>,
    /// Index of the first transaction that failed, when `success` is false.
    pub failed_tx: Option<usize>,
}

impl SimulatedBundle {
    pub fn is_profitable(&self) -> bool {
        self.success && self.profit > I256::ZERO
    }
}
