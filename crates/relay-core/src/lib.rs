pub mod errors;
pub mod events;
pub mod handle;
pub mod identity;
pub mod ids;
pub mod mock;
pub mod registry;

pub use errors::SendError;
pub use events::OutboundEvent;
pub use handle::ConnectionHandle;
pub use identity::{AuthFieldExtractor, Credentials, Identity, IdentityExtractor};
pub use ids::ConnectionId;
pub use registry::ConnectionRegistry;
