//! S3 object store on OpenDAL
//!
//! Drives an async OpenDAL operator from the synchronous [`ObjectStore`]
//! surface through an owned current-thread tokio runtime.

use std::future::Future;

use opendal::Operator;
use opendal::layers::LoggingLayer;
use opendal::services::S3;
use tokio::runtime::{Builder, Runtime};

use crate::capability::object_store::ObjectStore;
use crate::config::{AddressingStyle, S3Config};
use crate::error::StorageError;

/// [`ObjectStore`] backed by an OpenDAL operator.
pub struct OpendalStore {
    operator: Operator,
    runtime: Runtime,
}

impl OpendalStore {
    /// Builds an S3 (or S3-compatible) store from configuration.
    pub fn s3(config: &S3Config) -> Result<Self, StorageError> {
        let mut builder = S3::default()
            .root("/")
            .bucket(&config.bucket)
            .region(&config.region)
            .endpoint(&config.endpoint())
            .access_key_id(&config.access_key)
            .secret_access_key(&config.secret_key);

        if config.addressing_style == AddressingStyle::VirtualHost {
            builder = builder.enable_virtual_host_style();
        }

        let operator = Operator::new(builder)
            .map_err(|e| StorageError::Initialization(e.to_string()))?
            .layer(LoggingLayer::default())
            .finish();

        Self::from_operator(operator)
    }

    /// Wraps an already configured operator.
    pub fn from_operator(operator: Operator) -> Result<Self, StorageError> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| StorageError::Initialization(format!("runtime: {}", e)))?;
        Ok(Self { operator, runtime })
    }

    fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}

impl ObjectStore for OpendalStore {
    fn check(&self) -> Result<(), StorageError> {
        self.block_on(async { self.operator.check().await })
            .map_err(|e| StorageError::Initialization(format!("bucket not reachable: {}", e)))
    }

    fn exists(&self, key: &str) -> Result<bool, StorageError> {
        if key.is_empty() {
            return Ok(true);
        }
        Ok(self.block_on(async { self.operator.exists(key).await })?)
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let path = if prefix.is_empty() { "/" } else { prefix };
        let entries =
            self.block_on(async { self.operator.list_with(path).recursive(true).await })?;

        Ok(entries
            .iter()
            .map(|entry| entry.path().trim_start_matches('/').to_string())
            .filter(|key| !key.is_empty() && key.starts_with(prefix))
            .collect())
    }

    fn size(&self, key: &str) -> Result<u64, StorageError> {
        let metadata = self.block_on(async { self.operator.stat(key).await })?;
        Ok(metadata.content_length())
    }

    fn put(&self, key: &str, data: Vec<u8>) -> Result<(), StorageError> {
        // OpenDAL refuses plain writes to paths ending in '/'.
        if key.ends_with('/') {
            return Ok(self.block_on(async { self.operator.create_dir(key).await })?);
        }
        self.block_on(async { self.operator.write(key, data).await })
            .map(|_| ())
            .map_err(StorageError::from)
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let buffer = self.block_on(async { self.operator.read(key).await })?;
        Ok(buffer.to_vec())
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        Ok(self.block_on(async { self.operator.delete(key).await })?)
    }

    fn copy(&self, from: &str, to: &str) -> Result<(), StorageError> {
        Ok(self.block_on(async { self.operator.copy(from, to).await })?)
    }
}
