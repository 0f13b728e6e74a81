use std::sync::Arc;

use crucible_types::{Bundle, SimulatedBundle};
use futures::future::join_all;
use tracing::debug;

use super::{AlgoContext, BlockState};
use crate::{
    price::EffectivePrice,
    traits::{Engine, Snapshot},
};

/// Ranks bundles on the starting state, then walks price buckets from the top. A bucket holds
/// every bundle priced within `price_cutoff_percent` of its first (most expensive) member. Inside
/// a bucket bundles go by profit and are re-simulated on the running state just before inclusion.
/// A bundle whose new price falls below the bucket cutoff goes back to the remaining candidates
/// at that price and competes in a lower bucket.
pub(super) async fn fill<S, E>(
    ctx: &AlgoContext<'_, E>,
    mut block: BlockState<S>,
    bundles: Vec<Arc<Bundle>>,
) -> BlockState<S>
where
    S: Snapshot,
    E: Engine<S>,
{
    let initial =
        join_all(bundles.iter().map(|bundle| ctx.simulate(&block.state, bundle.clone()))).await;

    // best price first
    let mut candidates: Vec<(Arc<Bundle>, SimulatedBundle)> = bundles
        .into_iter()
        .zip(initial)
        .filter_map(|(bundle, outcome)| {
            let sim = outcome?.simulated;
            (sim.is_profitable() && block.fits(&sim)).then_some((bundle, sim))
        })
        .collect();
    candidates.sort_by(|(_, a), (_, b)| EffectivePrice::of(b).cmp(&EffectivePrice::of(a)));

    let keep_percent = 100 - ctx.settings.price_cutoff_percent.min(100);

    while !candidates.is_empty() && !block.is_full() {
        let reference = EffectivePrice::of(&candidates[0].1);
        let len = candidates
            .iter()
            .take_while(|(_, sim)| EffectivePrice::of(sim).is_within(&reference, keep_percent))
            .count()
            .max(1);

        let mut bucket: Vec<_> = candidates.drain(..len).collect();
        bucket.sort_by(|(_, a), (_, b)| b.profit.cmp(&a.profit));

        for (bundle, _) in bucket {
            if block.is_full() {
                break;
            }
            let Some(outcome) = ctx.simulate(&block.state, bundle.clone()).await else { continue };
            if !outcome.simulated.is_profitable() || !block.fits(&outcome.simulated) {
                continue;
            }

            let price = EffectivePrice::of(&outcome.simulated);
            if !price.is_within(&reference, keep_percent) {
                debug!(algo = %ctx.algo, bundle = %bundle.hash, "bundle price fell below bucket cutoff");
                let at = candidates.partition_point(|(_, sim)| EffectivePrice::of(sim) >= price);
                candidates.insert(at, (bundle, outcome.simulated));
                continue;
            }

            ctx.include(&mut block, outcome);
        }
    }

    block
}
