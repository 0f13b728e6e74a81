use alloy_primitives::B256;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use crucible_types::{BlsPublicKeyBytes, SigError};

#[derive(Debug, thiserror::Error)]
pub enum LocalRelayError {
    #[error("request contains no registrations")]
    EmptyRequest,

    #[error("registration timestamp {timestamp} is too far in the future")]
    TimestampTooFarInFuture { timestamp: u64 },

    #[error("invalid registration signature: {0}")]
    InvalidSignature(#[from] SigError),

    #[error("unknown validator {0:?}")]
    UnknownValidator(BlsPublicKeyBytes),

    #[error("validator {0:?} is not registered")]
    ValidatorNotRegistered(BlsPublicKeyBytes),

    #[error("no bid prepared for request")]
    NoBidPrepared,

    #[error("bid has value 0")]
    BidValueZero,

    #[error("unknown block {0}")]
    UnknownBlock(B256),
}

impl IntoResponse for LocalRelayError {
    fn into_response(self) -> Response {
        match self {
            LocalRelayError::NoBidPrepared | LocalRelayError::BidValueZero => {
                StatusCode::NO_CONTENT.into_response()
            }
            LocalRelayError::EmptyRequest |
            LocalRelayError::TimestampTooFarInFuture { .. } |
            LocalRelayError::InvalidSignature(_) |
            LocalRelayError::UnknownValidator(_) |
            LocalRelayError::ValidatorNotRegistered(_) |
            LocalRelayError::UnknownBlock(_) => {
                (StatusCode::BAD_REQUEST, self.to_string()).into_response()
            }
        }
    }
}
