//! Shared helpers for the integration tests

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use stowage::StorageError;
use stowage::capability::{MemoryObjectStore, ObjectStore, RelayEndpoint, RelayTransport};

pub const SECRET: &str = "testing";

const CALL_OK: &[u8] = b"OK!";

/// Writes `content` to `name` inside `dir` and returns the full path.
pub fn local_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

/// Relay service emulated in process on top of a [`MemoryObjectStore`].
///
/// Answers like the real relay: `OK!` for mutations, `True`/`False` for
/// existence, `{"ls": [...]}` for listings and raw bytes for downloads.
pub struct FakeRelay {
    pub store: MemoryObjectStore,
    pub probe_answer: String,
    /// Endpoint answered with `OK!` without touching the store.
    pub skipped: Option<RelayEndpoint>,
}

impl FakeRelay {
    pub fn new() -> Self {
        Self {
            store: MemoryObjectStore::new(),
            probe_answer: "200".to_string(),
            skipped: None,
        }
    }

    pub fn unreachable() -> Self {
        Self {
            store: MemoryObjectStore::new(),
            probe_answer: "502 Bad Gateway".to_string(),
            skipped: None,
        }
    }

    /// A relay that reports success on `endpoint` but never performs it.
    pub fn skipping(endpoint: RelayEndpoint) -> Self {
        Self {
            skipped: Some(endpoint),
            ..Self::new()
        }
    }

    fn keys_below(&self, key: &str) -> Result<Vec<String>, StorageError> {
        if key.ends_with('/') {
            self.store.list(key)
        } else {
            Ok(vec![key.to_string()])
        }
    }

    fn transfer(&self, key_old: &str, key_new: &str, delete: bool) -> Result<(), StorageError> {
        for from in self.keys_below(key_old)? {
            let rest = &from[key_old.len()..];
            self.store.copy(&from, &format!("{}{}", key_new, rest))?;
        }
        if delete {
            for from in self.keys_below(key_old)? {
                self.store.delete(&from)?;
            }
        }
        Ok(())
    }
}

fn field<'a>(form: &'a [(&str, &str)], name: &str) -> Result<&'a str, StorageError> {
    form.iter()
        .find(|(k, _)| *k == name)
        .map(|(_, v)| *v)
        .ok_or_else(|| StorageError::Transport(format!("missing form field {}", name)))
}

impl RelayTransport for FakeRelay {
    fn probe(&self) -> Result<String, StorageError> {
        Ok(self.probe_answer.clone())
    }

    fn call(
        &self,
        endpoint: RelayEndpoint,
        form: &[(&str, &str)],
        file: Option<Vec<u8>>,
    ) -> Result<Vec<u8>, StorageError> {
        if field(form, "secret_key")? != SECRET {
            return Ok(b"Unauthorized".to_vec());
        }
        if self.skipped == Some(endpoint) {
            return Ok(CALL_OK.to_vec());
        }

        match endpoint {
            RelayEndpoint::Exists => {
                let answer = if self.store.exists(field(form, "key")?)? {
                    "True"
                } else {
                    "False"
                };
                Ok(answer.as_bytes().to_vec())
            }
            RelayEndpoint::List => {
                let prefix = field(form, "key")?;
                // one entry per key, so directories show up repeatedly
                let names: Vec<String> = self
                    .store
                    .list(prefix)?
                    .iter()
                    .filter_map(|key| key[prefix.len()..].split_inclusive('/').next())
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect();
                Ok(serde_json::json!({ "ls": names }).to_string().into_bytes())
            }
            RelayEndpoint::MakeDir => {
                self.store.put(field(form, "key")?, Vec::new())?;
                Ok(CALL_OK.to_vec())
            }
            RelayEndpoint::Upload => {
                let data = file.ok_or_else(|| StorageError::Transport("no file part".into()))?;
                self.store.put(field(form, "key")?, data)?;
                Ok(CALL_OK.to_vec())
            }
            RelayEndpoint::Download => self.store.get(field(form, "key")?),
            RelayEndpoint::Remove => {
                for key in self.keys_below(field(form, "key")?)? {
                    self.store.delete(&key)?;
                }
                Ok(CALL_OK.to_vec())
            }
            RelayEndpoint::Size => {
                let mut total = 0;
                for key in self.keys_below(field(form, "key")?)? {
                    total += self.store.size(&key)?;
                }
                Ok(total.to_string().into_bytes())
            }
            RelayEndpoint::Rename | RelayEndpoint::Move => {
                self.transfer(field(form, "key_old")?, field(form, "key_new")?, true)?;
                Ok(CALL_OK.to_vec())
            }
            RelayEndpoint::Copy => {
                self.transfer(field(form, "key_old")?, field(form, "key_new")?, false)?;
                Ok(CALL_OK.to_vec())
            }
        }
    }
}
