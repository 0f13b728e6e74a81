pub mod algo;
pub mod chain_info;
pub mod config;
pub mod error;
pub mod metrics;
pub mod relay_endpoint;
pub mod signing;
pub mod task;
pub mod utils;

pub use algo::*;
pub use chain_info::*;
pub use config::*;
pub use error::*;
pub use relay_endpoint::*;
pub use signing::*;
