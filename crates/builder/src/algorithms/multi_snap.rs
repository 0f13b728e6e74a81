use std::sync::Arc;

use crucible_types::Bundle;
use futures::future::{join_all, try_join_all};
use tracing::debug;

use super::{greedy, greedy_buckets, AlgoContext, BlockState};
use crate::{
    error::SimulationError,
    price::EffectivePrice,
    traits::{Engine, Snapshot},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Inner {
    Greedy,
    Buckets,
}

/// Runs the inner algorithm on several fresh snapshots at once, each worker seeded with a
/// different top ranked bundle. The best result is then topped up with bundles the other
/// workers found that it does not already contain.
pub(super) async fn fill<S, E>(
    ctx: &AlgoContext<'_, E>,
    block: BlockState<S>,
    bundles: Vec<Arc<Bundle>>,
    inner: Inner,
) -> Result<BlockState<S>, SimulationError>
where
    S: Snapshot,
    E: Engine<S>,
{
    let initial =
        join_all(bundles.iter().map(|bundle| ctx.simulate(&block.state, bundle.clone()))).await;

    let mut ranked: Vec<(usize, EffectivePrice)> = initial
        .iter()
        .enumerate()
        .filter_map(|(i, outcome)| {
            let sim = &outcome.as_ref()?.simulated;
            (sim.is_profitable() && block.fits(sim)).then(|| (i, EffectivePrice::of(sim)))
        })
        .collect();
    ranked.sort_by(|(_, a), (_, b)| b.cmp(a));

    let workers = ctx.settings.multi_snap_workers.max(1).min(ranked.len());
    if workers == 0 {
        return Ok(block);
    }

    let snapshots = try_join_all((0..workers).map(|_| ctx.engine.snapshot_at(ctx.attrs))).await?;
    debug!(algo = %ctx.algo, workers, "running multi snapshot workers");

    let runs = snapshots
        .into_iter()
        .zip(&ranked)
        .map(|(snapshot, (seed, _))| run_worker(ctx, snapshot, &bundles, *seed, inner));
    let mut results = join_all(runs).await;
    // stable, so the lower seed rank wins ties
    results.sort_by(|a, b| b.selection.value().cmp(&a.selection.value()));

    let mut results = results.into_iter();
    let Some(mut best) = results.next() else { return Ok(block) };

    for other in results {
        for sim in other.selection.bundles {
            if best.is_full() {
                break;
            }
            if best.contains(&sim.bundle.hash) {
                continue;
            }
            let Some(outcome) = ctx.simulate(&best.state, sim.bundle).await else { continue };
            if outcome.simulated.is_profitable() && best.fits(&outcome.simulated) {
                ctx.include(&mut best, outcome);
            }
        }
    }

    Ok(best)
}

async fn run_worker<S, E>(
    ctx: &AlgoContext<'_, E>,
    snapshot: S,
    bundles: &[Arc<Bundle>],
    seed: usize,
    inner: Inner,
) -> BlockState<S>
where
    S: Snapshot,
    E: Engine<S>,
{
    let mut block = BlockState::new(snapshot, ctx.gas_limit, ctx.settings.max_merged_bundles);

    if let Some(outcome) = ctx.simulate(&block.state, bundles[seed].clone()).await {
        if outcome.simulated.is_profitable() && block.fits(&outcome.simulated) {
            ctx.include(&mut block, outcome);
        }
    }

    let rest: Vec<_> =
        bundles.iter().enumerate().filter(|(i, _)| *i != seed).map(|(_, b)| b.clone()).collect();

    match inner {
        Inner::Greedy => greedy::fill(ctx, block, rest).await,
        Inner::Buckets => greedy_buckets::fill(ctx, block, rest).await,
    }
}
