pub mod aggregator;
pub mod builder_client;
pub mod encoding;
pub mod error;
pub mod gateway;
pub mod local;
pub mod remote;

#[cfg(test)]
mod test_utils;

pub use aggregator::RelayAggregator;
pub use builder_client::BuilderClient;
pub use error::*;
pub use gateway::{RelayGateway, RelaySetup};
pub use local::{LocalRelay, LocalRelayError};
pub use remote::RemoteRelay;
