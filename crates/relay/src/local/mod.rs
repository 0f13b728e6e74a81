mod api;
pub mod error;
mod router;

use std::{collections::HashMap, sync::Arc};

use alloy_primitives::{B256, U256};
use crucible_beacon::BeaconFeed;
use crucible_common::{utils::utcnow_sec, SigningContext};
use crucible_types::{
    BlsPublicKeyBytes, BuilderBid, ExecutableData, SignedBidSubmission, SignedBuilderBid,
    SignedValidatorRegistration, ValidatorRegistration,
};
use parking_lot::RwLock;
use tracing::debug;

pub use self::{error::LocalRelayError, router::*};
use crate::error::RelayError;

pub const PATH_BUILDER_API: &str = "/eth/v1/builder";
pub const PATH_STATUS: &str = "/status";
pub const PATH_REGISTER_VALIDATORS: &str = "/validators";
pub const PATH_GET_HEADER: &str = "/header/{slot}/{parent_hash}/{pubkey}";
pub const PATH_GET_PAYLOAD: &str = "/blinded_blocks";

/// Registrations may be signed slightly ahead of our clock.
pub const MAX_REGISTRATION_DRIFT_SECS: u64 = 10;

#[derive(Debug, Clone)]
struct BestBid {
    slot: u64,
    parent_hash: B256,
    block_hash: B256,
    value: U256,
    signed_bid: SignedBuilderBid,
    payload: ExecutableData,
}

/// In-process relay serving the proposer side of the builder API from the best submitted block.
pub struct LocalRelay<B> {
    beacon: B,
    signing: Arc<SigningContext>,
    enable_validator_checks: bool,
    best_bid: RwLock<Option<BestBid>>,
    registrations: RwLock<HashMap<BlsPublicKeyBytes, ValidatorRegistration>>,
}

impl<B: BeaconFeed> LocalRelay<B> {
    /// `signing` holds the relay key, bids served to proposers are signed with it.
    pub fn new(beacon: B, signing: Arc<SigningContext>, enable_validator_checks: bool) -> Self {
        Self {
            beacon,
            signing,
            enable_validator_checks,
            best_bid: RwLock::new(None),
            registrations: RwLock::new(HashMap::new()),
        }
    }

    pub fn pubkey(&self) -> &BlsPublicKeyBytes {
        self.signing.pubkey()
    }

    /// Keeps the submission if it is for a newer slot or outbids the current one.
    pub fn submit_block(&self, submission: &SignedBidSubmission) -> Result<(), RelayError> {
        let mut best = self.best_bid.write();

        if let Some(current) = best.as_ref() {
            if submission.slot() < current.slot {
                return Err(RelayError::PastSlot {
                    slot: submission.slot(),
                    best_slot: current.slot,
                });
            }
            if submission.slot() == current.slot && submission.value() <= current.value {
                debug!(
                    slot = submission.slot(),
                    value = %submission.value(),
                    best = %current.value,
                    "submission does not beat the best bid"
                );
                return Ok(());
            }
        }

        let message = BuilderBid {
            header: submission.execution_payload.to_header(),
            value: submission.value(),
            pubkey: self.signing.pubkey().clone(),
        };
        let signature = self.signing.sign_builder_message(&message).into();

        *best = Some(BestBid {
            slot: submission.slot(),
            parent_hash: submission.message.parent_hash,
            block_hash: submission.block_hash(),
            value: submission.value(),
            signed_bid: SignedBuilderBid { message, signature },
            payload: submission.execution_payload.clone(),
        });

        debug!(slot = submission.slot(), block_hash = %submission.block_hash(), "new best bid");
        Ok(())
    }

    /// Validates and stores one registration.
    pub fn register_validator(
        &self,
        registration: &SignedValidatorRegistration,
    ) -> Result<(), LocalRelayError> {
        let timestamp = registration.message.timestamp;
        if timestamp > utcnow_sec() + MAX_REGISTRATION_DRIFT_SECS {
            return Err(LocalRelayError::TimestampTooFarInFuture { timestamp });
        }

        registration.verify_signature(self.signing.builder_domain())?;

        if self.enable_validator_checks && !self.beacon.is_validator(registration.pubkey()) {
            return Err(LocalRelayError::UnknownValidator(registration.pubkey().clone()));
        }

        self.registrations
            .write()
            .insert(registration.pubkey().clone(), registration.message.clone());
        Ok(())
    }

    pub fn is_registered(&self, pubkey: &BlsPublicKeyBytes) -> bool {
        self.registrations.read().contains_key(pubkey)
    }

    pub fn best_header(
        &self,
        slot: u64,
        parent_hash: B256,
        pubkey: &BlsPublicKeyBytes,
    ) -> Result<SignedBuilderBid, LocalRelayError> {
        if self.enable_validator_checks && !self.is_registered(pubkey) {
            return Err(LocalRelayError::ValidatorNotRegistered(pubkey.clone()));
        }

        let best = self.best_bid.read();
        let bid = best
            .as_ref()
            .filter(|bid| bid.slot == slot && bid.parent_hash == parent_hash)
            .ok_or(LocalRelayError::NoBidPrepared)?;

        if bid.value.is_zero() {
            return Err(LocalRelayError::BidValueZero);
        }

        Ok(bid.signed_bid.clone())
    }

    pub fn payload(&self, block_hash: B256) -> Result<ExecutableData, LocalRelayError> {
        self.best_bid
            .read()
            .as_ref()
            .filter(|bid| bid.block_hash == block_hash)
            .map(|bid| bid.payload.clone())
            .ok_or(LocalRelayError::UnknownBlock(block_hash))
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::Address;
    use crucible_beacon::{FixedValidatorBeaconClient, NilBeaconClient};
    use crucible_types::{verify_signed_message, BlsKeypair};

    use super::*;
    use crate::test_utils::{registration, signed_submission, signing};

    #[test]
    fn test_best_bid_replacement() {
        let builder = signing();
        let relay = LocalRelay::new(NilBeaconClient, signing(), false);
        let pubkey = BlsPublicKeyBytes::empty();

        let first = signed_submission(&builder, 10, 100, B256::repeat_byte(1));
        relay.submit_block(&first).unwrap();

        // lower value for the same slot is ignored
        let lower = signed_submission(&builder, 10, 50, B256::repeat_byte(2));
        relay.submit_block(&lower).unwrap();
        assert!(relay.payload(B256::repeat_byte(2)).is_err());
        assert_eq!(relay.payload(B256::repeat_byte(1)).unwrap(), first.execution_payload);

        let higher = signed_submission(&builder, 10, 150, B256::repeat_byte(3));
        relay.submit_block(&higher).unwrap();
        let bid = relay.best_header(10, first.message.parent_hash, &pubkey).unwrap();
        assert_eq!(bid.message.value, U256::from(150));
        assert_eq!(bid.message.header.block_hash, B256::repeat_byte(3));

        // newer slot replaces regardless of value
        let newer = signed_submission(&builder, 11, 1, B256::repeat_byte(4));
        relay.submit_block(&newer).unwrap();
        assert!(matches!(
            relay.best_header(10, first.message.parent_hash, &pubkey),
            Err(LocalRelayError::NoBidPrepared)
        ));

        assert!(matches!(
            relay.submit_block(&first),
            Err(RelayError::PastSlot { slot: 10, best_slot: 11 })
        ));
    }

    #[test]
    fn test_header_signed_by_relay_key() {
        let builder = signing();
        let relay_signing = signing();
        let relay = LocalRelay::new(NilBeaconClient, relay_signing.clone(), false);

        let submission = signed_submission(&builder, 3, 1_000, B256::repeat_byte(7));
        relay.submit_block(&submission).unwrap();

        let bid = relay
            .best_header(3, submission.message.parent_hash, &BlsPublicKeyBytes::empty())
            .unwrap();
        assert_eq!(&bid.message.pubkey, relay_signing.pubkey());
        assert!(verify_signed_message(
            &bid.message,
            &bid.signature,
            relay_signing.pubkey(),
            relay_signing.builder_domain()
        )
        .is_ok());
    }

    #[test]
    fn test_zero_value_and_parent_mismatch() {
        let builder = signing();
        let relay = LocalRelay::new(NilBeaconClient, signing(), false);
        let pubkey = BlsPublicKeyBytes::empty();

        let submission = signed_submission(&builder, 5, 0, B256::repeat_byte(1));
        relay.submit_block(&submission).unwrap();

        assert!(matches!(
            relay.best_header(5, submission.message.parent_hash, &pubkey),
            Err(LocalRelayError::BidValueZero)
        ));
        assert!(matches!(
            relay.best_header(5, B256::repeat_byte(0xee), &pubkey),
            Err(LocalRelayError::NoBidPrepared)
        ));
    }

    #[test]
    fn test_register_validator() {
        let relay_signing = signing();
        let relay = LocalRelay::new(NilBeaconClient, relay_signing.clone(), false);
        let keypair = BlsKeypair::random();

        let valid = registration(&keypair, relay_signing.builder_domain(), utcnow_sec());
        relay.register_validator(&valid).unwrap();
        assert!(relay.is_registered(&keypair.pk.compress()));

        let future = registration(&keypair, relay_signing.builder_domain(), utcnow_sec() + 60);
        assert!(matches!(
            relay.register_validator(&future),
            Err(LocalRelayError::TimestampTooFarInFuture { .. })
        ));

        let mut tampered = registration(&keypair, relay_signing.builder_domain(), utcnow_sec());
        tampered.message.fee_recipient = Address::repeat_byte(0xff);
        assert!(matches!(
            relay.register_validator(&tampered),
            Err(LocalRelayError::InvalidSignature(_))
        ));
    }

    #[test]
    fn test_validator_checks() {
        let relay_signing = signing();
        let keypair = BlsKeypair::random();
        let reg = registration(&keypair, relay_signing.builder_domain(), utcnow_sec());

        let unknown = LocalRelay::new(NilBeaconClient, relay_signing.clone(), true);
        assert!(matches!(
            unknown.register_validator(&reg),
            Err(LocalRelayError::UnknownValidator(_))
        ));

        let known = LocalRelay::new(
            FixedValidatorBeaconClient::new(keypair.pk.compress()),
            relay_signing.clone(),
            true,
        );
        let builder = signing();
        let submission = signed_submission(&builder, 8, 10, B256::repeat_byte(1));
        known.submit_block(&submission).unwrap();

        assert!(matches!(
            known.best_header(8, submission.message.parent_hash, &keypair.pk.compress()),
            Err(LocalRelayError::ValidatorNotRegistered(_))
        ));

        known.register_validator(&reg).unwrap();
        assert!(known.best_header(8, submission.message.parent_hash, &keypair.pk.compress()).is_ok());
    }
}
