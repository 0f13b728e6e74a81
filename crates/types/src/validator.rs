use alloy_primitives::{Address, B256};
use lh_types::SignedRoot;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use tree_hash_derive::TreeHash;

use crate::{bls::verify_signed_message, error::SigError, BlsPublicKeyBytes, BlsSignatureBytes};

/// Validator registration, for use in interacting with servers implementing the builder API.
#[derive(PartialEq, Debug, Serialize, Deserialize, Clone, Encode, Decode)]
pub struct SignedValidatorRegistration {
    pub message: ValidatorRegistration,
    pub signature: BlsSignatureBytes,
}

#[derive(PartialEq, Debug, Serialize, Deserialize, Clone, Encode, Decode, TreeHash)]
pub struct ValidatorRegistration {
    pub fee_recipient: Address,
    #[serde(with = "serde_utils::quoted_u64")]
    pub gas_limit: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    pub timestamp: u64,
    pub pubkey: BlsPublicKeyBytes,
}

impl SignedRoot for ValidatorRegistration {}

impl SignedValidatorRegistration {
    pub fn pubkey(&self) -> &BlsPublicKeyBytes {
        &self.message.pubkey
    }

    pub fn verify_signature(&self, builder_domain: B256) -> Result<(), SigError> {
        verify_signed_message(&self.message, &self.signature, &self.message.pubkey, builder_domain)
    }
}
