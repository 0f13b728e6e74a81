use std::sync::Arc;

use async_trait::async_trait;
use crucible_beacon::BeaconFeed;
use crucible_builder::BlockSubmitter;
use crucible_common::{BuilderConfig, ChainInfo, ConfigError, SigningContext};
use crucible_types::SignedBidSubmission;
use reqwest::Client;
use tracing::info;

use crate::{
    aggregator::RelayAggregator, error::RelayError, local::LocalRelay, remote::RemoteRelay,
};

/// Where signed blocks go.
pub enum RelayGateway<B> {
    Local(Arc<LocalRelay<B>>),
    Remote(RemoteRelay),
    Aggregator(RelayAggregator<B>),
}

/// Relays registered for one builder. `local` is set whenever the local relay is enabled, even
/// when a remote relay is primary, so its HTTP surface can still be served.
pub struct RelaySetup<B> {
    pub gateway: RelayGateway<B>,
    pub local: Option<Arc<LocalRelay<B>>>,
}

impl<B: BeaconFeed> RelayGateway<B> {
    pub fn from_config(
        config: &BuilderConfig,
        http: Client,
        beacon: B,
        chain_info: Arc<ChainInfo>,
    ) -> Result<RelaySetup<B>, ConfigError> {
        let local = if config.enable_local_relay {
            let signing = Arc::new(SigningContext::new(config.relay_keypair()?, chain_info));
            Some(Arc::new(LocalRelay::new(beacon, signing, config.enable_validator_checks)))
        } else {
            None
        };

        let timeout = config.relay_request_timeout();
        let primary = match (config.remote_relay()?, &local) {
            (Some(endpoint), _) => {
                info!(
                    endpoint = %endpoint.endpoint,
                    ssz = endpoint.ssz_enabled,
                    gzip = endpoint.gzip_enabled,
                    "using remote relay"
                );
                RelayGateway::Remote(RemoteRelay::new(
                    http.clone(),
                    endpoint,
                    config.enable_cancellations,
                    timeout,
                ))
            }
            (None, Some(local)) => {
                info!(pubkey = ?local.pubkey(), "using local relay");
                RelayGateway::Local(local.clone())
            }
            (None, None) => return Err(ConfigError::NoRelay),
        };

        let secondaries: Vec<_> = config
            .secondary_relays()?
            .into_iter()
            .map(|endpoint| {
                info!(endpoint = %endpoint.endpoint, "using secondary relay");
                RemoteRelay::new(http.clone(), endpoint, config.enable_cancellations, timeout)
            })
            .collect();

        let gateway = if secondaries.is_empty() {
            primary
        } else {
            RelayGateway::Aggregator(RelayAggregator::new(primary, secondaries))
        };

        Ok(RelaySetup { gateway, local })
    }
}

#[async_trait]
impl<B: BeaconFeed> BlockSubmitter for RelayGateway<B> {
    type Error = RelayError;

    async fn submit_block(&self, submission: Arc<SignedBidSubmission>) -> Result<(), RelayError> {
        match self {
            RelayGateway::Local(relay) => relay.submit_block(&submission),
            RelayGateway::Remote(relay) => relay.submit_block(&submission).await,
            RelayGateway::Aggregator(relay) => relay.submit_block(submission).await,
        }
    }
}
