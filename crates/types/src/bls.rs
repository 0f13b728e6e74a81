use alloy_primitives::B256;
use lh_types::SignedRoot;

use crate::error::SigError;

pub type BlsPublicKey = lh_bls::PublicKey;
pub type BlsPublicKeyBytes = lh_bls::PublicKeyBytes;
pub type BlsSecretKey = lh_bls::SecretKey;
pub type BlsSignature = lh_bls::Signature;
pub type BlsSignatureBytes = lh_bls::SignatureBytes;
pub type BlsKeypair = lh_bls::Keypair;

/// Parses a `0x`-prefixed hex BLS secret key into a keypair.
pub fn keypair_from_hex(secret_key: &str) -> Result<BlsKeypair, SigError> {
    let bytes = alloy_primitives::hex::decode(secret_key.trim())
        .map_err(|_| SigError::InvalidSecretKeyBytes)?;
    let sk = BlsSecretKey::deserialize(&bytes).map_err(|_| SigError::InvalidSecretKeyBytes)?;
    let pk = sk.public_key();
    Ok(BlsKeypair::from_components(pk, sk))
}

/// Verifies `signature` over the signing root of `msg` in `domain`.
pub fn verify_signed_message<T: SignedRoot>(
    msg: &T,
    signature: &BlsSignatureBytes,
    pubkey: &BlsPublicKeyBytes,
    domain: B256,
) -> Result<(), SigError> {
    let pubkey = pubkey.decompress().map_err(|_| SigError::InvalidBlsPubkeyBytes)?;
    let signature = signature.decompress().map_err(|_| SigError::InvalidBlsSignatureBytes)?;

    let root = msg.signing_root(domain);
    if signature.verify(&pubkey, root) {
        Ok(())
    } else {
        Err(SigError::InvalidBlsSignature)
    }
}
