use alloy_primitives::{Address, B256, U256};
use lh_types::SignedRoot;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use tree_hash_derive::TreeHash;

use crate::{
    bls::verify_signed_message, error::SigError, BlsPublicKeyBytes, BlsSignatureBytes,
    ExecutableData, ExecutionPayloadHeader,
};

pub const CONSENSUS_VERSION: &str = "bellatrix";

/// Bid metadata signed by the builder key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct BidTrace {
    #[serde(with = "serde_utils::quoted_u64")]
    pub slot: u64,
    pub parent_hash: B256,
    pub block_hash: B256,
    pub builder_pubkey: BlsPublicKeyBytes,
    pub proposer_pubkey: BlsPublicKeyBytes,
    pub proposer_fee_recipient: Address,
    #[serde(with = "serde_utils::quoted_u64")]
    pub gas_limit: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    pub gas_used: u64,
    #[serde(with = "serde_utils::quoted_u256")]
    pub value: U256,
}

impl SignedRoot for BidTrace {}

/// A signed bid together with the payload it commits to. Never mutated after signing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct SignedBidSubmission {
    pub message: BidTrace,
    pub execution_payload: ExecutableData,
    pub signature: BlsSignatureBytes,
}

impl SignedBidSubmission {
    pub fn slot(&self) -> u64 {
        self.message.slot
    }

    pub fn block_hash(&self) -> B256 {
        self.message.block_hash
    }

    pub fn value(&self) -> U256 {
        self.message.value
    }

    pub fn verify_signature(&self, builder_domain: B256) -> Result<(), SigError> {
        verify_signed_message(
            &self.message,
            &self.signature,
            &self.message.builder_pubkey,
            builder_domain,
        )
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct BuilderBid {
    pub header: ExecutionPayloadHeader,
    #[serde(with = "serde_utils::quoted_u256")]
    pub value: U256,
    pub pubkey: BlsPublicKeyBytes,
}

impl SignedRoot for BuilderBid {}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize, Encode)]
pub struct SignedBuilderBid {
    pub message: BuilderBid,
    pub signature: BlsSignatureBytes,
}

/// `{version, data}` envelope used by builder-API responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionedResponse<T> {
    pub version: String,
    pub data: T,
}

impl<T> VersionedResponse<T> {
    pub fn new(data: T) -> Self {
        Self { version: CONSENSUS_VERSION.to_string(), data }
    }
}

/// The parts of a signed blinded beacon block needed to reveal a payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedBlindedBeaconBlock {
    pub message: BlindedBeaconBlock,
    pub signature: BlsSignatureBytes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlindedBeaconBlock {
    #[serde(with = "serde_utils::quoted_u64")]
    pub slot: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    pub proposer_index: u64,
    pub parent_root: B256,
    pub state_root: B256,
    pub body: BlindedBeaconBlockBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlindedBeaconBlockBody {
    pub execution_payload_header: ExecutionPayloadHeader,
}
