//! Relay transport
//!
//! HTTP relay service that performs object-store work on behalf of the
//! client. One endpoint per logical operation; requests carry a
//! form-encoded body.

use log::debug;
use reqwest::blocking::{Client, multipart};

use crate::error::StorageError;

/// Relay endpoints, one per operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayEndpoint {
    Exists,
    List,
    MakeDir,
    Upload,
    Download,
    Remove,
    Size,
    Rename,
    Move,
    Copy,
}

impl RelayEndpoint {
    /// Path of the endpoint relative to the relay base URL.
    pub fn path(self) -> &'static str {
        match self {
            RelayEndpoint::Exists => "exists/",
            RelayEndpoint::List => "ls/",
            RelayEndpoint::MakeDir => "mkdir/",
            RelayEndpoint::Upload => "upload/",
            RelayEndpoint::Download => "download/",
            RelayEndpoint::Remove => "rm/",
            RelayEndpoint::Size => "size/",
            RelayEndpoint::Rename => "rename/",
            RelayEndpoint::Move => "mv/",
            RelayEndpoint::Copy => "cp/",
        }
    }
}

/// Request channel to a relay service.
pub trait RelayTransport {
    /// Reachability probe against the base URL; returns the response body.
    fn probe(&self) -> Result<String, StorageError>;

    /// Posts `form` (and an optional file part) to `endpoint`; returns the raw
    /// response body.
    fn call(
        &self,
        endpoint: RelayEndpoint,
        form: &[(&str, &str)],
        file: Option<Vec<u8>>,
    ) -> Result<Vec<u8>, StorageError>;
}

/// [`RelayTransport`] over blocking HTTP.
pub struct HttpRelay {
    client: Client,
    base_url: String,
}

impl HttpRelay {
    pub fn new(url: &str) -> Result<Self, StorageError> {
        if url.is_empty() {
            return Err(StorageError::Initialization("relay url is empty".into()));
        }
        let base_url = if url.ends_with('/') {
            url.to_string()
        } else {
            format!("{}/", url)
        };
        let client = Client::builder()
            .build()
            .map_err(|e| StorageError::Initialization(e.to_string()))?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl RelayTransport for HttpRelay {
    fn probe(&self) -> Result<String, StorageError> {
        let body = self.client.get(&self.base_url).send()?.text()?;
        Ok(body)
    }

    fn call(
        &self,
        endpoint: RelayEndpoint,
        form: &[(&str, &str)],
        file: Option<Vec<u8>>,
    ) -> Result<Vec<u8>, StorageError> {
        let url = format!("{}{}", self.base_url, endpoint.path());
        debug!("relay POST {}", url);

        let request = match file {
            Some(data) => {
                let mut parts = multipart::Form::new();
                for (name, value) in form {
                    parts = parts.text(name.to_string(), value.to_string());
                }
                let part = multipart::Part::bytes(data).file_name("file");
                self.client.post(&url).multipart(parts.part("file", part))
            }
            None => self.client.post(&url).form(form),
        };

        let body = request.send()?.bytes()?;
        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_paths() {
        assert_eq!(RelayEndpoint::List.path(), "ls/");
        assert_eq!(RelayEndpoint::Remove.path(), "rm/");
        assert_eq!(RelayEndpoint::Move.path(), "mv/");
        assert_eq!(RelayEndpoint::Copy.path(), "cp/");
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let relay = HttpRelay::new("http://127.0.0.1:9000/api").unwrap();
        assert_eq!(relay.base_url(), "http://127.0.0.1:9000/api/");
        assert!(HttpRelay::new("").is_err());
    }
}
