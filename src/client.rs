//! Client façade
//!
//! Builds the backend selected by a [`StorageConfig`].

use log::info;

use crate::backend::{LocalDisk, NativeObjectStore, RelayObjectStore, StorageBackend};
use crate::capability::{HttpRelay, OpendalStore};
use crate::config::{BackendKind, StorageConfig};
use crate::error::StorageError;

/// Opens the configured backend.
///
/// A disk or native backend that failed to initialize is still returned;
/// check [`StorageBackend::initialized`]. A relay that cannot be reached is
/// an error.
pub fn open(config: &StorageConfig) -> Result<Box<dyn StorageBackend>, StorageError> {
    config.validate()?;

    match config.backend {
        BackendKind::Disk => {
            let disk = config
                .disk
                .as_ref()
                .ok_or_else(|| StorageError::Config("missing [disk] section".into()))?;
            info!("Opening disk storage at {}", disk.root_path);
            Ok(Box::new(LocalDisk::new(&disk.root_path)))
        }
        BackendKind::S3 => {
            let s3 = config
                .s3
                .as_ref()
                .ok_or_else(|| StorageError::Config("missing [s3] section".into()))?;
            info!("Opening S3 storage {} on {}", s3.bucket, s3.endpoint());
            let store = OpendalStore::s3(s3)?;
            Ok(Box::new(NativeObjectStore::new(store, &s3.root_path)))
        }
        BackendKind::Relay => {
            let relay = config
                .relay
                .as_ref()
                .ok_or_else(|| StorageError::Config("missing [relay] section".into()))?;
            info!("Opening relay storage on {}", relay.url);
            let transport = HttpRelay::new(&relay.url)?;
            let store = RelayObjectStore::connect(transport, &relay.secret_key, &relay.root_path)?;
            Ok(Box::new(store))
        }
    }
}
