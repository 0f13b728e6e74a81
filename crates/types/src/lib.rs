mod attributes;
mod bid;
mod bls;
mod bundle;
mod error;
mod fields;
mod payload;
mod peer;
mod utils;
mod validator;

pub use attributes::*;
pub use bid::*;
pub use bls::*;
pub use bundle::*;
pub use error::*;
pub use fields::*;
pub use lh_types::SignedRoot;
pub use payload::*;
pub use peer::*;
pub use validator::*;
