pub mod algorithms;
pub mod assembler;
pub mod candidate;
pub mod control;
pub mod error;
pub mod limiter;
pub mod pool;
pub mod price;
pub mod rpc_engine;
pub mod scheduler;
pub mod traits;

#[cfg(test)]
mod test_utils;

pub use algorithms::{AlgoSettings, BlockSelection};
pub use assembler::BlockAssembler;
pub use candidate::CandidateBlock;
pub use control::{run_sync_monitor, ControlLoop, ControlMessage, SyncEvent, SyncProbe, Worker};
pub use error::*;
pub use limiter::RateLimiter;
pub use pool::BundlePool;
pub use rpc_engine::{RpcEngine, RpcSnapshot};
pub use scheduler::{CycleOutcome, Scheduler, SchedulerState};
pub use traits::*;
