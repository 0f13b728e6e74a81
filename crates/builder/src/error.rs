use crucible_common::AlgoType;

/// Failure of the execution engine itself, as opposed to a bundle that fails to execute.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SimulationError {
    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("engine error: {0}")]
    Engine(String),

    #[error("unknown parent block {0}")]
    UnknownParent(alloy_primitives::B256),

    #[error("failed to decode engine response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for SimulationError {
    fn from(err: reqwest::Error) -> Self {
        SimulationError::Rpc(err.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AssemblyError {
    #[error("no viable block before deadline")]
    NoViableBlock,
}

/// Failure of a single algorithm run. Other algorithms of the same cycle are unaffected.
#[derive(Debug, thiserror::Error)]
pub enum AlgoError {
    #[error("{algo}: {source}")]
    Engine { algo: AlgoType, source: SimulationError },
}

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Assembly(#[from] AssemblyError),

    #[error("failed to seal block: {0}")]
    Seal(SimulationError),

    #[error("bid signature check failed: {0}")]
    Signature(#[from] crucible_types::SigError),

    #[error("submission deadline passed")]
    DeadlinePassed,

    #[error("superseded by a newer slot")]
    Cancelled,

    #[error("submission failed: {0}")]
    Submission(String),
}
