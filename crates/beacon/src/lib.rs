pub mod beacon_client;
pub mod error;
pub mod multi_beacon_client;
pub mod offline;
pub mod traits;
pub mod types;

pub use beacon_client::BeaconClient;
pub use error::*;
pub use multi_beacon_client::MultiBeaconClient;
pub use offline::{FixedValidatorBeaconClient, NilBeaconClient};
pub use traits::BeaconFeed;
