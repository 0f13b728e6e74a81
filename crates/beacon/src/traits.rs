use async_trait::async_trait;
use auto_impl::auto_impl;
use crucible_types::{BlsPublicKeyBytes, PayloadAttributes};
use tokio::sync::mpsc::Sender;

use crate::error::BeaconClientError;

/// Source of slot-boundary build triggers and proposer identity.
#[async_trait]
#[auto_impl(Arc)]
pub trait BeaconFeed: Send + Sync + 'static {
    fn is_validator(&self, pubkey: &BlsPublicKeyBytes) -> bool;

    /// Proposer of `slot`, `None` when unknown.
    async fn proposer_for_slot(
        &self,
        slot: u64,
    ) -> Result<Option<BlsPublicKeyBytes>, BeaconClientError>;

    /// Streams payload attributes into `chan` until the receiver is dropped.
    async fn subscribe_payload_attributes(&self, chan: Sender<PayloadAttributes>);
}
