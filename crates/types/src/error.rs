#[derive(Debug, thiserror::Error)]
pub enum SigError {
    #[error("invalid secret key bytes")]
    InvalidSecretKeyBytes,

    #[error("invalid signature bytes")]
    InvalidBlsSignatureBytes,

    #[error("invalid pubkey bytes")]
    InvalidBlsPubkeyBytes,

    #[error("invalid signature")]
    InvalidBlsSignature,
}

/// Failures translating a peer builder payload into an [`crate::ExecutableData`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadDecodeError {
    #[error("invalid hex in field {field}: {reason}")]
    InvalidHex { field: &'static str, reason: String },

    #[error("invalid logs bloom length: {0}, expected 256")]
    InvalidBloomLength(usize),

    #[error("transaction {index} too long: {len} bytes")]
    TransactionTooLong { index: usize, len: usize },

    #[error("too many transactions: {0}")]
    TooManyTransactions(usize),

    #[error("too many withdrawals: {0}")]
    TooManyWithdrawals(usize),
}

pub type SszError = ssz_types::Error;
