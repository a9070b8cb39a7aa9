pub mod actors;
pub mod errors;
pub mod identity;
pub mod logger;
pub mod models;

pub use errors::{RelayError, RelayResult};
pub use identity::Caller;
