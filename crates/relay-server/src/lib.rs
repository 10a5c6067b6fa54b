pub mod config;
pub mod connection;
pub mod coordinator;
pub mod error;
pub mod protocol;
pub mod server;

pub use config::{CoordinatorPolicy, MissingIdentityPolicy, ServerConfig};
pub use coordinator::{EventOutcome, SessionCoordinator};
pub use error::RelayError;
pub use server::{build_router, start, AppState, ServerHandle};
