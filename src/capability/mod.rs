//! Backend capabilities
//!
//! The wire-level collaborators each storage backend is built on.

pub mod memory;
pub mod object_store;
pub mod opendal_store;
pub mod relay;

pub use memory::MemoryObjectStore;
pub use object_store::ObjectStore;
pub use opendal_store::OpendalStore;
pub use relay::{HttpRelay, RelayEndpoint, RelayTransport};
