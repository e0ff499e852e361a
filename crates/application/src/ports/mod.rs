//! Port definitions (interfaces)
//!
//! Ports define the boundaries between the application core and external systems.
//! Each port is a trait that can be implemented by adapters in the infrastructure layer.

mod auth_backend;
mod clock;
mod notifier;
mod storage;
mod transport;

pub use auth_backend::AuthBackend;
pub use clock::Clock;
pub use notifier::NotificationSink;
pub use storage::{KeyValueStorage, StorageError};
pub use transport::{HttpTransport, TransportError};
