pub mod agent;
pub mod config;
pub mod error;
pub mod metrics;
pub mod providers;
pub mod routing;
pub mod server;
pub mod services;
pub mod types;

pub use agent::Agent;
pub use error::{ErrorKind, MythiqError, ServiceError};
pub type Result<T> = std::result::Result<T, MythiqError>;
