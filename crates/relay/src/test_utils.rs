use std::sync::Arc;

use alloy_primitives::{Address, FixedBytes, B256, U256};
use crucible_common::{ChainConfig, ChainInfo, SigningContext};
use crucible_types::{
    BidTrace, BlsKeypair, BlsPublicKeyBytes, ExecutableData, SignedBidSubmission, SignedRoot,
    SignedValidatorRegistration, ValidatorRegistration,
};

pub fn chain_info() -> Arc<ChainInfo> {
    Arc::new(ChainInfo::new(&ChainConfig {
        genesis_time: 0,
        seconds_in_slot: 12,
        genesis_fork_version: FixedBytes::ZERO,
    }))
}

pub fn signing() -> Arc<SigningContext> {
    Arc::new(SigningContext::new(BlsKeypair::random(), chain_info()))
}

pub fn signed_submission(
    signing: &SigningContext,
    slot: u64,
    value: u64,
    block_hash: B256,
) -> SignedBidSubmission {
    let execution_payload = ExecutableData {
        parent_hash: B256::repeat_byte(0xaa),
        block_number: 100 + slot,
        gas_limit: 30_000_000,
        gas_used: 21_000,
        timestamp: slot * 12,
        block_hash,
        ..Default::default()
    };

    let message = BidTrace {
        slot,
        parent_hash: execution_payload.parent_hash,
        block_hash,
        builder_pubkey: signing.pubkey().clone(),
        proposer_pubkey: BlsPublicKeyBytes::empty(),
        proposer_fee_recipient: Address::repeat_byte(0x11),
        gas_limit: execution_payload.gas_limit,
        gas_used: execution_payload.gas_used,
        value: U256::from(value),
    };
    let signature = signing.sign_builder_message(&message).into();

    SignedBidSubmission { message, execution_payload, signature }
}

pub fn submission(slot: u64, value: u64) -> SignedBidSubmission {
    signed_submission(&signing(), slot, value, B256::repeat_byte(0xbb))
}

pub fn registration(
    keypair: &BlsKeypair,
    domain: B256,
    timestamp: u64,
) -> SignedValidatorRegistration {
    let message = ValidatorRegistration {
        fee_recipient: Address::repeat_byte(0x22),
        gas_limit: 30_000_000,
        timestamp,
        pubkey: keypair.pk.compress(),
    };
    let signature = keypair.sk.sign(message.signing_root(domain)).into();

    SignedValidatorRegistration { message, signature }
}
