pub mod auth;
pub mod copier;
pub mod execution;
pub mod fanout;
pub mod feed;
pub mod keygen;
pub mod license_registry;
pub mod liveness;
pub mod mentor_directory;
pub mod relay;
pub mod signal_log;
pub mod student_registry;

pub use auth::{Authenticator, Credentials};
pub use copier::TradeCopier;
pub use execution::{DryRunBackend, ExecutionBackend, HttpExecutionBackend};
pub use fanout::{FeedMessage, Subscription};
pub use relay::Relay;
