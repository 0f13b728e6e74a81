use std::sync::Arc;

use crucible_beacon::BeaconFeed;
use crucible_builder::BlockSubmitter;
use crucible_types::SignedBidSubmission;
use futures::future::join_all;
use tracing::warn;

use crate::{error::RelayError, gateway::RelayGateway, remote::RemoteRelay};

/// Fans a submission out to a primary relay and any number of remote secondaries. Only the
/// primary's result is reported.
pub struct RelayAggregator<B> {
    primary: Box<RelayGateway<B>>,
    secondaries: Vec<RemoteRelay>,
}

impl<B: BeaconFeed> RelayAggregator<B> {
    pub fn new(primary: RelayGateway<B>, secondaries: Vec<RemoteRelay>) -> Self {
        Self { primary: Box::new(primary), secondaries }
    }

    pub fn primary(&self) -> &RelayGateway<B> {
        &self.primary
    }

    pub fn secondaries(&self) -> &[RemoteRelay] {
        &self.secondaries
    }

    pub async fn submit_block(&self, submission: Arc<SignedBidSubmission>) -> Result<(), RelayError> {
        let secondaries = join_all(self.secondaries.iter().map(|relay| {
            let submission = submission.clone();
            async move {
                if let Err(err) = relay.submit_block(&submission).await {
                    warn!(
                        relay = relay.name(),
                        slot = submission.slot(),
                        %err,
                        "secondary relay submission failed"
                    );
                }
            }
        }));

        let (primary, _) = tokio::join!(self.primary.submit_block(submission.clone()), secondaries);
        primary
    }
}
