use std::{marker::PhantomData, sync::Arc};

use crucible_common::{metrics::AlgoMetrics, task, AlgoType};
use crucible_types::{Bundle, PayloadAttributes};
use futures::future::join_all;
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{timeout_at, Instant},
};
use tracing::{error, info, warn};

use crate::{
    algorithms::{run_algorithm, AlgoContext, AlgoSettings, BlockSelection},
    candidate::CandidateBlock,
    error::{AlgoError, AssemblyError},
    traits::{Engine, Snapshot},
};

/// Result of one algorithm, complete or cut off at the deadline.
#[derive(Debug, Clone)]
struct VariantResult {
    /// Position in the configured algorithm list.
    order: usize,
    algo: AlgoType,
    selection: BlockSelection,
    finished_at: Instant,
}

/// Runs every configured algorithm against its own snapshot and keeps the most valuable block.
pub struct BlockAssembler<S, E> {
    engine: Arc<E>,
    algorithms: Vec<AlgoType>,
    settings: AlgoSettings,
    gas_ceil: u64,
    _snapshot: PhantomData<fn() -> S>,
}

impl<S: Snapshot, E: Engine<S>> BlockAssembler<S, E> {
    pub fn new(
        engine: Arc<E>,
        algorithms: Vec<AlgoType>,
        settings: AlgoSettings,
        gas_ceil: u64,
    ) -> Self {
        Self { engine, algorithms, settings, gas_ceil, _snapshot: PhantomData }
    }

    pub fn algorithms(&self) -> &[AlgoType] {
        &self.algorithms
    }

    /// Assembles a block for `attrs` out of `bundles`. Algorithms still running at `deadline`
    /// are left to finish in the background, their latest partial selection competes instead.
    #[tracing::instrument(skip_all, fields(slot = attrs.slot, block_number = attrs.block_number))]
    pub async fn assemble(
        &self,
        attrs: &PayloadAttributes,
        bundles: Vec<Arc<Bundle>>,
        deadline: Instant,
    ) -> Result<CandidateBlock, AssemblyError> {
        let gas_limit = attrs.gas_limit_or(self.gas_ceil);
        let shared_attrs = Arc::new(attrs.clone());

        let runs = self.algorithms.iter().enumerate().map(|(order, &algo)| {
            let (partial_tx, partial_rx) = watch::channel(BlockSelection::default());
            let handle = task::spawn(
                file!(),
                line!(),
                run_variant::<S, E>(
                    algo,
                    self.engine.clone(),
                    shared_attrs.clone(),
                    self.settings.clone(),
                    gas_limit,
                    bundles.clone(),
                    partial_tx,
                ),
            );
            await_variant(order, algo, handle, partial_rx, deadline)
        });
        let results = join_all(runs).await;

        let Some(best) = pick_best(results.into_iter().flatten(), gas_limit) else {
            warn!(num_bundles = bundles.len(), "no algorithm produced a viable block");
            return Err(AssemblyError::NoViableBlock);
        };

        info!(
            algo = %best.algo,
            value = %best.selection.value(),
            gas_used = best.selection.gas_used,
            num_bundles = best.selection.bundles.len(),
            "selected block",
        );
        Ok(CandidateBlock::new(attrs, gas_limit, best.selection, best.algo))
    }
}

async fn run_variant<S, E>(
    algo: AlgoType,
    engine: Arc<E>,
    attrs: Arc<PayloadAttributes>,
    settings: AlgoSettings,
    gas_limit: u64,
    bundles: Vec<Arc<Bundle>>,
    partial: watch::Sender<BlockSelection>,
) -> Result<(BlockSelection, Instant), AlgoError>
where
    S: Snapshot,
    E: Engine<S>,
{
    let _timer = AlgoMetrics::timer(algo.as_str());

    let snapshot: S =
        engine.snapshot_at(&attrs).await.map_err(|source| AlgoError::Engine { algo, source })?;

    let ctx = AlgoContext {
        algo,
        engine: engine.as_ref(),
        attrs: &attrs,
        settings: &settings,
        gas_limit,
        partial: &partial,
    };
    let selection = run_algorithm(&ctx, snapshot, bundles)
        .await
        .map_err(|source| AlgoError::Engine { algo, source })?;

    Ok((selection, Instant::now()))
}

async fn await_variant(
    order: usize,
    algo: AlgoType,
    handle: JoinHandle<Result<(BlockSelection, Instant), AlgoError>>,
    partial: watch::Receiver<BlockSelection>,
    deadline: Instant,
) -> Option<VariantResult> {
    match timeout_at(deadline, handle).await {
        Ok(Ok(Ok((selection, finished_at)))) => {
            AlgoMetrics::result(algo.as_str(), "completed");
            Some(VariantResult { order, algo, selection, finished_at })
        }
        Ok(Ok(Err(err))) => {
            warn!(%algo, %err, "algorithm failed");
            AlgoMetrics::result(algo.as_str(), "failed");
            None
        }
        Ok(Err(err)) => {
            error!(%algo, %err, "algorithm task failed");
            AlgoMetrics::result(algo.as_str(), "failed");
            None
        }
        Err(_) => {
            let selection = partial.borrow().clone();
            warn!(%algo, num_bundles = selection.bundles.len(), "algorithm missed the deadline");
            AlgoMetrics::result(algo.as_str(), "timeout");
            Some(VariantResult { order, algo, selection, finished_at: Instant::now() })
        }
    }
}

/// Highest value wins, then earliest completion, then configuration order.
fn pick_best(
    results: impl IntoIterator<Item = VariantResult>,
    gas_limit: u64,
) -> Option<VariantResult> {
    results
        .into_iter()
        .filter(|r| r.selection.is_viable() && r.selection.gas_used <= gas_limit)
        .min_by(|a, b| {
            b.selection
                .value()
                .cmp(&a.selection.value())
                .then(a.finished_at.cmp(&b.finished_at))
                .then(a.order.cmp(&b.order))
        })
}
