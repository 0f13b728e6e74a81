pub mod api;
pub mod chain;

pub use api::*;
pub use chain::*;
