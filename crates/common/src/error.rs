use crucible_types::SigError;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("incorrect builder API secret key provided: {0}")]
    InvalidBuilderKey(SigError),

    #[error("incorrect relay secret key provided: {0}")]
    InvalidRelayKey(SigError),

    #[error("local relay enabled but no relay secret key provided")]
    MissingRelayKey,

    #[error("neither local nor remote relay specified")]
    NoRelay,

    #[error("empty relay endpoint")]
    EmptyRelayEndpoint,

    #[error("invalid relay url {endpoint}: {reason}")]
    InvalidRelayUrl { endpoint: String, reason: String },

    #[error("submission offset {offset_ms}ms must be between 0 and {max_ms}ms")]
    SubmissionOffsetOutOfRange { offset_ms: i64, max_ms: u64 },

    #[error("seconds in slot must be positive")]
    ZeroSecondsInSlot,

    #[error("rate limit duration must be positive")]
    ZeroRateLimitDuration,

    #[error("rate limit burst must be positive")]
    ZeroRateLimitBurst,

    #[error("unknown algorithm type: {0}")]
    UnknownAlgorithm(String),

    #[error("price cutoff percent must be at most 100, got {0}")]
    PriceCutoffOutOfRange(u64),

    #[error("multi snapshot worker count must be positive")]
    ZeroMultiSnapWorkers,
}
