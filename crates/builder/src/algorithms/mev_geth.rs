use std::sync::Arc;

use crucible_types::Bundle;
use tracing::trace;

use super::{AlgoContext, BlockState};
use crate::traits::{Engine, Snapshot};

/// Baseline: bundles are tried once each, in the order they were supplied.
pub(super) async fn fill<S, E>(
    ctx: &AlgoContext<'_, E>,
    mut block: BlockState<S>,
    bundles: Vec<Arc<Bundle>>,
) -> BlockState<S>
where
    S: Snapshot,
    E: Engine<S>,
{
    for bundle in bundles {
        if block.is_full() {
            break;
        }

        let Some(outcome) = ctx.simulate(&block.state, bundle).await else { continue };
        if !outcome.simulated.success {
            trace!(bundle = %outcome.simulated.bundle.hash, reason = ?outcome.simulated.revert_reason, "dropping failed bundle");
            continue;
        }
        if !block.fits(&outcome.simulated) {
            continue;
        }

        ctx.include(&mut block, outcome);
    }

    block
}
