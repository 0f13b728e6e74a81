use std::sync::Arc;

use alloy_primitives::B256;
use axum::{extract::Path, http::StatusCode, response::IntoResponse, Extension, Json};
use crucible_beacon::BeaconFeed;
use crucible_types::{
    BlsPublicKeyBytes, SignedBlindedBeaconBlock, SignedValidatorRegistration, VersionedResponse,
};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{error::LocalRelayError, LocalRelay};

#[derive(Debug, Deserialize)]
pub struct GetHeaderParams {
    pub slot: u64,
    pub parent_hash: B256,
    pub pubkey: BlsPublicKeyBytes,
}

impl<B: BeaconFeed> LocalRelay<B> {
    pub async fn status(
        Extension(_relay): Extension<Arc<LocalRelay<B>>>,
    ) -> Result<impl IntoResponse, LocalRelayError> {
        Ok(StatusCode::OK)
    }

    /// Registers a batch of validators. The first invalid entry fails the request, entries
    /// before it stay registered.
    ///
    /// Implements this API: <https://ethereum.github.io/builder-specs/#/Builder/registerValidator>
    #[tracing::instrument(skip_all, err)]
    pub async fn register_validators(
        Extension(relay): Extension<Arc<LocalRelay<B>>>,
        Json(registrations): Json<Vec<SignedValidatorRegistration>>,
    ) -> Result<StatusCode, LocalRelayError> {
        if registrations.is_empty() {
            return Err(LocalRelayError::EmptyRequest);
        }

        for registration in &registrations {
            if let Err(err) = relay.register_validator(registration) {
                warn!(pubkey = ?registration.pubkey(), %err, "rejected validator registration");
                return Err(err);
            }
        }

        info!(count = registrations.len(), "registered validators");
        Ok(StatusCode::OK)
    }

    /// Returns the best bid for the slot and parent, signed by the relay key.
    ///
    /// Implements this API: <https://ethereum.github.io/builder-specs/#/Builder/getHeader>
    #[tracing::instrument(skip_all)]
    pub async fn get_header(
        Extension(relay): Extension<Arc<LocalRelay<B>>>,
        Path(params): Path<GetHeaderParams>,
    ) -> Result<impl IntoResponse, LocalRelayError> {
        let bid = relay.best_header(params.slot, params.parent_hash, &params.pubkey)?;

        debug!(
            slot = params.slot,
            block_hash = %bid.message.header.block_hash,
            value = %bid.message.value,
            "serving header"
        );
        Ok(Json(VersionedResponse::new(bid)))
    }

    /// Reveals the payload committed to by a signed blinded block.
    ///
    /// Implements this API: <https://ethereum.github.io/builder-specs/#/Builder/submitBlindedBlock>
    #[tracing::instrument(skip_all)]
    pub async fn get_payload(
        Extension(relay): Extension<Arc<LocalRelay<B>>>,
        Json(block): Json<SignedBlindedBeaconBlock>,
    ) -> Result<impl IntoResponse, LocalRelayError> {
        let block_hash = block.message.body.execution_payload_header.block_hash;
        let payload = relay.payload(block_hash)?;

        info!(slot = block.message.slot, %block_hash, "payload delivered");
        Ok(Json(VersionedResponse::new(payload)))
    }
}

pub async fn index() -> &'static str {
    "crucible local relay\n"
}
