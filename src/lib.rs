//! Uniform storage over a local directory tree, a native S3 bucket and an S3
//! bucket behind an HTTP relay.

pub mod backend;
pub mod capability;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod path;

pub use backend::{
    LocalDisk, NativeObjectStore, RelayObjectStore, StorageBackend, StorageKind, ValueStorage,
};
pub use client::open;
pub use config::StorageConfig;
pub use error::StorageError;
