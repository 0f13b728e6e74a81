use std::sync::Arc;

use alloy_primitives::I256;
use crucible_types::Bundle;
use futures::future::join_all;

use super::{AlgoContext, BlockState};
use crate::{
    price::EffectivePrice,
    traits::{Engine, Snapshot},
};

/// Each round re-simulates every remaining bundle on the running state and includes the one
/// with the best effective price. Failing or oversized bundles are dropped for good, bundles
/// that are merely unprofitable stay around since later state may change that.
pub(super) async fn fill<S, E>(
    ctx: &AlgoContext<'_, E>,
    mut block: BlockState<S>,
    bundles: Vec<Arc<Bundle>>,
) -> BlockState<S>
where
    S: Snapshot,
    E: Engine<S>,
{
    let mut remaining = bundles;

    while !remaining.is_empty() && !block.is_full() {
        let outcomes =
            join_all(remaining.iter().map(|bundle| ctx.simulate(&block.state, bundle.clone()))).await;

        let mut kept = Vec::with_capacity(remaining.len());
        for (bundle, outcome) in remaining.into_iter().zip(outcomes) {
            match outcome {
                Some(outcome) if outcome.simulated.success && block.fits(&outcome.simulated) => {
                    kept.push((bundle, outcome))
                }
                _ => {}
            }
        }

        // first index wins ties
        let mut best: Option<(usize, EffectivePrice)> = None;
        for (i, (_, outcome)) in kept.iter().enumerate() {
            if outcome.simulated.profit <= I256::ZERO {
                continue;
            }
            let price = EffectivePrice::of(&outcome.simulated);
            if best.is_none_or(|(_, best_price)| price > best_price) {
                best = Some((i, price));
            }
        }

        let Some((index, _)) = best else { break };
        let (_, outcome) = kept.remove(index);
        ctx.include(&mut block, outcome);

        remaining = kept.into_iter().map(|(bundle, _)| bundle).collect();
    }

    block
}
