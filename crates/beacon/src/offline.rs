use async_trait::async_trait;
use crucible_types::{BlsPublicKeyBytes, PayloadAttributes};
use tokio::sync::mpsc::Sender;

use crate::{error::BeaconClientError, traits::BeaconFeed};

/// Feed used when no beacon node is configured: knows no validators and never triggers a build.
#[derive(Debug, Clone, Copy, Default)]
pub struct NilBeaconClient;

#[async_trait]
impl BeaconFeed for NilBeaconClient {
    fn is_validator(&self, _pubkey: &BlsPublicKeyBytes) -> bool {
        false
    }

    async fn proposer_for_slot(
        &self,
        _slot: u64,
    ) -> Result<Option<BlsPublicKeyBytes>, BeaconClientError> {
        Ok(None)
    }

    async fn subscribe_payload_attributes(&self, chan: Sender<PayloadAttributes>) {
        // keep the channel open so consumers idle instead of shutting down
        chan.closed().await;
    }
}

/// Feed that accepts every validator and reports one fixed proposer.
#[derive(Debug, Clone)]
pub struct FixedValidatorBeaconClient {
    pub pubkey: BlsPublicKeyBytes,
}

impl FixedValidatorBeaconClient {
    pub fn new(pubkey: BlsPublicKeyBytes) -> Self {
        Self { pubkey }
    }
}

#[async_trait]
impl BeaconFeed for FixedValidatorBeaconClient {
    fn is_validator(&self, _pubkey: &BlsPublicKeyBytes) -> bool {
        true
    }

    async fn proposer_for_slot(
        &self,
        _slot: u64,
    ) -> Result<Option<BlsPublicKeyBytes>, BeaconClientError> {
        Ok(Some(self.pubkey.clone()))
    }

    async fn subscribe_payload_attributes(&self, chan: Sender<PayloadAttributes>) {
        chan.closed().await;
    }
}
