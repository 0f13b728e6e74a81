use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum BeaconClientError {
    #[error("request failed: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("invalid beacon url: {0}")]
    Url(#[from] url::ParseError),

    #[error("beacon api error: {0}")]
    Api(#[from] ApiError),

    #[error("no beacon node available")]
    Unavailable,

    #[error("event receiver dropped")]
    ChannelClosed,
}

/// Error body returned by the beacon node API.
#[derive(Serialize, Deserialize, Debug, Clone, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ApiError {
    pub code: u16,
    pub message: String,
}
