use std::sync::Arc;

use alloy_primitives::B256;
use crucible_types::{BlsKeypair, BlsPublicKeyBytes, BlsSignature, SignedRoot};

use crate::chain_info::ChainInfo;

/// Key and domain used to sign builder-API messages.
#[derive(Clone)]
pub struct SigningContext {
    pub keypair: BlsKeypair,
    pub pubkey: BlsPublicKeyBytes,
    pub chain_info: Arc<ChainInfo>,
}

impl SigningContext {
    pub fn new(keypair: BlsKeypair, chain_info: Arc<ChainInfo>) -> Self {
        Self { pubkey: keypair.pk.compress(), keypair, chain_info }
    }

    pub fn pubkey(&self) -> &BlsPublicKeyBytes {
        &self.pubkey
    }

    pub fn builder_domain(&self) -> B256 {
        self.chain_info.builder_domain
    }

    pub fn sign_builder_message(&self, msg: &impl SignedRoot) -> BlsSignature {
        let root = msg.signing_root(self.builder_domain());
        self.sign(root)
    }

    pub fn sign(&self, message: B256) -> BlsSignature {
        self.keypair.sk.sign(message)
    }
}
