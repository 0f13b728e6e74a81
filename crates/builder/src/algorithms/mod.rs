//! Bundle selection strategies. Every strategy fills a [`BlockState`] on top of a snapshot and
//! never mutates the snapshot it was given; inclusion produces a new post-state.

mod greedy;
mod greedy_buckets;
mod mev_geth;
mod multi_snap;

use std::sync::Arc;

use alloy_primitives::{B256, I256, U256};
use crucible_common::{metrics::AlgoMetrics, AlgoType, BuilderConfig};
use crucible_types::{Bundle, PayloadAttributes, SimulatedBundle};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::{
    error::SimulationError,
    traits::{BundleSimulator, Engine, SimulationOutcome, Snapshot},
};

/// Smallest amount of gas any transaction consumes. Blocks with less room left are full.
pub const MIN_TX_GAS: u64 = 21_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlgoSettings {
    /// Cap on included bundles, 0 means unlimited.
    pub max_merged_bundles: usize,
    pub price_cutoff_percent: u64,
    pub discard_revertible_tx_on_err: bool,
    pub multi_snap_workers: usize,
}

impl AlgoSettings {
    pub fn from_config(config: &BuilderConfig) -> Self {
        Self {
            max_merged_bundles: config.max_merged_bundles,
            price_cutoff_percent: config.price_cutoff_percent,
            discard_revertible_tx_on_err: config.discard_revertible_tx_on_err,
            multi_snap_workers: config.multi_snap_workers,
        }
    }
}

impl Default for AlgoSettings {
    fn default() -> Self {
        Self {
            max_merged_bundles: 3,
            price_cutoff_percent: 50,
            discard_revertible_tx_on_err: false,
            multi_snap_workers: 4,
        }
    }
}

/// Bundles chosen so far by one algorithm, in inclusion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockSelection {
    pub bundles: Vec<SimulatedBundle>,
    pub gas_used: u64,
    pub profit: I256,
}

impl BlockSelection {
    /// Total profit, a negative sum is worth nothing.
    pub fn value(&self) -> U256 {
        if self.profit.is_negative() {
            U256::ZERO
        } else {
            self.profit.into_raw()
        }
    }

    /// An empty selection is never worth sealing.
    pub fn is_viable(&self) -> bool {
        !self.bundles.is_empty()
    }

    pub fn contains(&self, hash: &B256) -> bool {
        self.bundles.iter().any(|sim| sim.bundle.hash == *hash)
    }
}

/// Running block: the latest post-state plus what has been included to reach it.
#[derive(Debug, Clone)]
pub struct BlockState<S> {
    pub state: S,
    pub selection: BlockSelection,
    gas_limit: u64,
    max_bundles: usize,
}

impl<S: Snapshot> BlockState<S> {
    pub fn new(state: S, gas_limit: u64, max_bundles: usize) -> Self {
        Self { state, selection: BlockSelection::default(), gas_limit, max_bundles }
    }

    pub fn remaining_gas(&self) -> u64 {
        self.gas_limit.saturating_sub(self.selection.gas_used)
    }

    pub fn fits(&self, sim: &SimulatedBundle) -> bool {
        sim.gas_used <= self.remaining_gas()
    }

    pub fn is_full(&self) -> bool {
        self.remaining_gas() < MIN_TX_GAS ||
            (self.max_bundles > 0 && self.selection.bundles.len() >= self.max_bundles)
    }

    pub fn contains(&self, hash: &B256) -> bool {
        self.selection.contains(hash)
    }

    fn include(&mut self, outcome: SimulationOutcome<S>) {
        let SimulationOutcome { simulated, post_state } = outcome;
        self.selection.gas_used += simulated.gas_used;
        self.selection.profit += simulated.profit;
        self.selection.bundles.push(simulated);
        self.state = post_state;
    }
}

/// Everything an algorithm run needs besides its bundles and starting state.
pub struct AlgoContext<'a, E> {
    pub algo: AlgoType,
    pub engine: &'a E,
    pub attrs: &'a PayloadAttributes,
    pub settings: &'a AlgoSettings,
    pub gas_limit: u64,
    /// Latest usable selection, read by the assembler if the run misses its deadline.
    pub partial: &'a watch::Sender<BlockSelection>,
}

impl<E> AlgoContext<'_, E> {
    /// Simulates `bundle` on `state`, dropping revertible failing transactions when configured.
    /// Engine failures are logged and yield `None` so the bundle is skipped.
    async fn simulate<S>(&self, state: &S, bundle: Arc<Bundle>) -> Option<SimulationOutcome<S>>
    where
        S: Snapshot,
        E: BundleSimulator<S>,
    {
        let mut bundle = bundle;
        loop {
            let outcome = match self.engine.simulate(state, bundle.clone()).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(algo = %self.algo, bundle = %bundle.hash, %err, "engine failed to simulate bundle");
                    AlgoMetrics::simulation(false);
                    return None;
                }
            };
            AlgoMetrics::simulation(outcome.simulated.success);

            if !self.settings.discard_revertible_tx_on_err {
                return Some(outcome);
            }

            match outcome.simulated.failed_tx {
                Some(index) if bundle.is_revertible(index) && bundle.txs.len() > 1 => {
                    debug!(algo = %self.algo, bundle = %bundle.hash, index, "discarding reverted tx");
                    bundle = Arc::new(bundle.without_tx(index));
                }
                _ => return Some(outcome),
            }
        }
    }

    fn include<S: Snapshot>(&self, block: &mut BlockState<S>, outcome: SimulationOutcome<S>) {
        block.include(outcome);
        let selection = &block.selection;
        self.partial.send_if_modified(|current| {
            let better = selection.value() > current.value() ||
                (!current.is_viable() && selection.is_viable());
            if better {
                *current = selection.clone();
            }
            better
        });
    }
}

/// Runs `ctx.algo` over `bundles` starting from `base`.
pub async fn run_algorithm<S, E>(
    ctx: &AlgoContext<'_, E>,
    base: S,
    bundles: Vec<Arc<Bundle>>,
) -> Result<BlockSelection, SimulationError>
where
    S: Snapshot,
    E: Engine<S>,
{
    let block = BlockState::new(base, ctx.gas_limit, ctx.settings.max_merged_bundles);
    let block = match ctx.algo {
        AlgoType::MevGeth => mev_geth::fill(ctx, block, bundles).await,
        AlgoType::Greedy => greedy::fill(ctx, block, bundles).await,
        AlgoType::GreedyBuckets => greedy_buckets::fill(ctx, block, bundles).await,
        AlgoType::GreedyMultiSnap => {
            multi_snap::fill(ctx, block, bundles, multi_snap::Inner::Greedy).await?
        }
        AlgoType::GreedyBucketsMultiSnap => {
            multi_snap::fill(ctx, block, bundles, multi_snap::Inner::Buckets).await?
        }
    };

    debug!(
        algo = %ctx.algo,
        bundles = block.selection.bundles.len(),
        gas_used = block.selection.gas_used,
        value = %block.selection.value(),
        "algorithm finished",
    );
    Ok(block.selection)
}
