use crucible_types::PayloadDecodeError;
use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("relay returned status {status}: {body}")]
    UnexpectedStatus { status: StatusCode, body: String },

    #[error("too many requests")]
    TooManyRequests,

    #[error("failed to encode submission: {0}")]
    Encoding(String),

    #[error("submission for slot {slot} is older than the current best bid for slot {best_slot}")]
    PastSlot { slot: u64, best_slot: u64 },
}

#[derive(Debug, thiserror::Error)]
pub enum BuilderClientError {
    #[error("hostname must include port, separated by one colon, like example.com:3500")]
    InvalidHost(String),

    #[error("GET {path} returned status {status}: {body}")]
    UnexpectedStatus { status: StatusCode, path: String, body: String },

    #[error("failed to decode response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to translate payload: {0}")]
    Decode(#[from] PayloadDecodeError),

    #[error("reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
}
