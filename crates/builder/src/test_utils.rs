use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use alloy_primitives::{keccak256, Address, Bytes, B256, I256};
use async_trait::async_trait;
use crucible_types::{
    BlsPublicKeyBytes, Bundle, ExecutableData, PayloadAttributes, SignedBidSubmission,
    SimulatedBundle, Transaction, Transactions,
};
use parking_lot::Mutex;

use crate::{
    candidate::CandidateBlock,
    error::SimulationError,
    traits::{
        BlockSubmitter, BundleSimulator, PayloadSealer, SimulationOutcome, Snapshot,
        SnapshotProvider,
    },
};

pub fn tx(tag: u8) -> Bytes {
    Bytes::from(vec![0x02, tag, tag, tag])
}

pub fn bundle(tags: &[u8]) -> Bundle {
    Bundle::new(tags.iter().map(|t| tx(*t)).collect(), vec![], None)
}

pub fn revertible_bundle(tags: &[u8], reverting: &[usize]) -> Bundle {
    Bundle::new(tags.iter().map(|t| tx(*t)).collect(), reverting.to_vec(), None)
}

pub fn attrs(slot: u64) -> PayloadAttributes {
    PayloadAttributes {
        slot,
        parent_hash: B256::repeat_byte(0xaa),
        block_number: 100 + slot,
        proposer_pubkey: BlsPublicKeyBytes::empty(),
        fee_recipient: Address::repeat_byte(0x11),
        prev_randao: B256::repeat_byte(0x22),
        timestamp: 1_700_000_000 + slot * 12,
        gas_limit: None,
        withdrawals: vec![],
    }
}

/// Chain state as the list of transactions executed on top of the parent.
#[derive(Debug, Clone, PartialEq)]
pub struct MockSnapshot {
    pub parent_hash: B256,
    pub applied: Vec<Bytes>,
}

impl MockSnapshot {
    pub fn new(parent_hash: B256) -> Self {
        Self { parent_hash, applied: vec![] }
    }
}

impl Snapshot for MockSnapshot {
    fn parent_hash(&self) -> B256 {
        self.parent_hash
    }
}

#[derive(Debug, Clone, Default)]
pub struct TxSpec {
    pub gas: u64,
    pub profit: i64,
    pub fails: bool,
    /// Transactions that cannot share a block with this one, e.g. same sender and nonce.
    pub conflicts: Vec<Bytes>,
}

impl TxSpec {
    pub fn new(gas: u64, profit: i64) -> Self {
        Self { gas, profit, ..Default::default() }
    }

    pub fn failing(mut self) -> Self {
        self.fails = true;
        self
    }

    pub fn conflicts_with(mut self, tx: Bytes) -> Self {
        self.conflicts.push(tx);
        self
    }
}

/// Deterministic engine: each transaction has fixed gas and profit, fails when marked so,
/// when executed twice or when a conflicting transaction already ran.
#[derive(Debug, Default)]
pub struct MockEngine {
    specs: Mutex<HashMap<Bytes, TxSpec>>,
    engine_failures: Mutex<HashSet<Bytes>>,
    delay: Mutex<Option<Duration>>,
    snapshots: AtomicUsize,
    simulations: AtomicUsize,
    seals: AtomicUsize,
}

impl MockEngine {
    pub fn set(&self, tx: Bytes, spec: TxSpec) {
        self.specs.lock().insert(tx, spec);
    }

    pub fn fail_engine_on(&self, tx: Bytes) {
        self.engine_failures.lock().insert(tx);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn snapshots_taken(&self) -> usize {
        self.snapshots.load(Ordering::Relaxed)
    }

    pub fn simulations(&self) -> usize {
        self.simulations.load(Ordering::Relaxed)
    }

    pub fn seals(&self) -> usize {
        self.seals.load(Ordering::Relaxed)
    }

    /// Applies `bundles` in order and reports whether every one of them succeeds.
    pub fn replay(&self, base: &MockSnapshot, bundles: &[Arc<Bundle>]) -> bool {
        let mut state = base.clone();
        for bundle in bundles {
            let outcome = self.execute(&state, bundle.clone());
            if !outcome.simulated.success {
                return false;
            }
            state = outcome.post_state;
        }
        true
    }

    fn conflicts(&self, specs: &HashMap<Bytes, TxSpec>, applied: &[Bytes], tx: &Bytes) -> bool {
        let own = specs.get(tx).map(|s| s.conflicts.as_slice()).unwrap_or_default();
        applied.iter().any(|prev| {
            prev == tx ||
                own.contains(prev) ||
                specs.get(prev).is_some_and(|s| s.conflicts.contains(tx))
        })
    }

    fn execute(&self, snapshot: &MockSnapshot, bundle: Arc<Bundle>) -> SimulationOutcome<MockSnapshot> {
        let specs = self.specs.lock();
        let mut applied = snapshot.applied.clone();
        let mut gas_used = 0;
        let mut profit = 0i64;
        let mut failed_tx = None;

        for (i, tx) in bundle.txs.iter().enumerate() {
            let spec = specs.get(tx).cloned().unwrap_or_else(|| TxSpec::new(21_000, 0).failing());
            let fails = spec.fails || self.conflicts(&specs, &applied, tx);
            gas_used += spec.gas;

            if fails {
                failed_tx.get_or_insert(i);
                if !bundle.is_revertible(i) {
                    let simulated = SimulatedBundle {
                        bundle,
                        gas_used,
                        profit: I256::ZERO,
                        success: false,
                        revert_reason: Some("execution reverted".to_string()),
                        failed_tx,
                    };
                    return SimulationOutcome { simulated, post_state: snapshot.clone() };
                }
            } else {
                profit += spec.profit;
            }
            applied.push(tx.clone());
        }

        let simulated = SimulatedBundle {
            bundle,
            gas_used,
            profit: I256::try_from(profit).unwrap(),
            success: true,
            revert_reason: None,
            failed_tx,
        };
        SimulationOutcome {
            simulated,
            post_state: MockSnapshot { parent_hash: snapshot.parent_hash, applied },
        }
    }
}

#[async_trait]
impl SnapshotProvider<MockSnapshot> for MockEngine {
    async fn snapshot_at(&self, attrs: &PayloadAttributes) -> Result<MockSnapshot, SimulationError> {
        self.snapshots.fetch_add(1, Ordering::Relaxed);
        Ok(MockSnapshot::new(attrs.parent_hash))
    }
}

#[async_trait]
impl BundleSimulator<MockSnapshot> for MockEngine {
    async fn simulate(
        &self,
        snapshot: &MockSnapshot,
        bundle: Arc<Bundle>,
    ) -> Result<SimulationOutcome<MockSnapshot>, SimulationError> {
        self.simulations.fetch_add(1, Ordering::Relaxed);
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let engine_failures = self.engine_failures.lock().clone();
        if bundle.txs.iter().any(|tx| engine_failures.contains(tx)) {
            return Err(SimulationError::Engine("mock failure".to_string()));
        }

        Ok(self.execute(snapshot, bundle))
    }
}

#[async_trait]
impl PayloadSealer for MockEngine {
    async fn seal(
        &self,
        attrs: &PayloadAttributes,
        block: &CandidateBlock,
    ) -> Result<ExecutableData, SimulationError> {
        self.seals.fetch_add(1, Ordering::Relaxed);

        let txs = block
            .transactions
            .iter()
            .map(|tx| Transaction::try_new(tx.clone()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|len| SimulationError::Engine(format!("tx too long: {len}")))?;
        let transactions = Transactions::new(txs)
            .map_err(|e| SimulationError::Engine(format!("too many txs: {e:?}")))?;

        let mut preimage = attrs.parent_hash.to_vec();
        preimage.extend_from_slice(&block.block_number.to_be_bytes());
        for tx in &block.transactions {
            preimage.extend_from_slice(tx);
        }

        Ok(ExecutableData {
            parent_hash: block.parent_hash,
            fee_recipient: block.fee_recipient,
            prev_randao: block.prev_randao,
            block_number: block.block_number,
            gas_limit: block.gas_limit,
            gas_used: block.gas_used,
            timestamp: block.timestamp,
            block_hash: keccak256(preimage),
            transactions,
            ..Default::default()
        })
    }
}

#[derive(Debug, thiserror::Error)]
#[error("mock submitter rejected the bid")]
pub struct MockSubmitError;

/// Records every submission it receives.
#[derive(Debug, Default)]
pub struct RecordingSubmitter {
    pub submissions: Mutex<Vec<Arc<SignedBidSubmission>>>,
    pub fail: bool,
}

impl RecordingSubmitter {
    pub fn slots(&self) -> Vec<u64> {
        self.submissions.lock().iter().map(|s| s.slot()).collect()
    }
}

#[async_trait]
impl BlockSubmitter for RecordingSubmitter {
    type Error = MockSubmitError;

    async fn submit_block(&self, submission: Arc<SignedBidSubmission>) -> Result<(), Self::Error> {
        self.submissions.lock().push(submission);
        if self.fail {
            return Err(MockSubmitError);
        }
        Ok(())
    }
}

pub struct TestApi;

impl crate::traits::BuilderApi for TestApi {
    type Snapshot = MockSnapshot;
    type Engine = MockEngine;
    type BundleSource = crate::pool::BundlePool;
    type Submitter = RecordingSubmitter;
}
