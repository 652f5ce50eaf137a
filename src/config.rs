//! Configuration management for storage backends
//!
//! Selects a backend and carries its connection parameters. Values come from
//! a profile file under `config/` with environment overrides, and are always
//! handed to constructors explicitly.

use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

use crate::error::StorageError;

/// Environment variable naming the configuration profile.
pub const PROFILE_VAR: &str = "STOWAGE_ENV";

const DEFAULT_PROFILE: &str = "development";
const ENV_PREFIX: &str = "STOWAGE";

/// Which backend variant the client façade builds.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Disk,
    S3,
    Relay,
}

/// S3 bucket addressing.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AddressingStyle {
    #[default]
    Path,
    VirtualHost,
}

/// Complete storage configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub backend: BackendKind,
    pub disk: Option<DiskConfig>,
    pub s3: Option<S3Config>,
    pub relay: Option<RelayConfig>,
}

/// Local filesystem backend
#[derive(Debug, Deserialize, Clone)]
pub struct DiskConfig {
    /// Existing absolute directory all paths are confined to
    pub root_path: String,
}

/// Native S3 backend
#[derive(Debug, Deserialize, Clone)]
pub struct S3Config {
    pub host: String,
    pub port: u16,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub addressing_style: AddressingStyle,
    /// Use TLS for the endpoint
    #[serde(default)]
    pub secure: bool,
    #[serde(default = "default_root")]
    pub root_path: String,
}

/// Relay-backed S3 backend
#[derive(Debug, Deserialize, Clone)]
pub struct RelayConfig {
    pub url: String,
    pub secret_key: String,
    #[serde(default = "default_root")]
    pub root_path: String,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_root() -> String {
    "/".to_string()
}

impl StorageConfig {
    /// Load `config/default` then the active profile's file, with
    /// `STOWAGE__...` environment overrides on top.
    pub fn load() -> Result<Self, StorageError> {
        let profile = std::env::var(PROFILE_VAR).unwrap_or_else(|_| DEFAULT_PROFILE.to_string());
        Self::load_profile(Path::new("config"), &profile)
    }

    /// Load a named profile from `dir`.
    pub fn load_profile(dir: &Path, profile: &str) -> Result<Self, StorageError> {
        let settings = Config::builder()
            .add_source(File::from(dir.join("default")).required(false))
            .add_source(File::from(dir.join(profile)).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        let config: StorageConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load a single configuration file, with environment overrides.
    pub fn from_file(path: &Path) -> Result<Self, StorageError> {
        let settings = Config::builder()
            .add_source(File::from(path))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        let config: StorageConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validation for all configuration values
    pub fn validate(&self) -> Result<(), StorageError> {
        match self.backend {
            BackendKind::Disk => {
                let disk = self.disk.as_ref().ok_or_else(|| missing_section("disk"))?;
                check_root(&disk.root_path)?;
            }
            BackendKind::S3 => {
                let s3 = self.s3.as_ref().ok_or_else(|| missing_section("s3"))?;
                if s3.port == 0 {
                    return Err(StorageError::Config("s3.port cannot be 0".into()));
                }
                if s3.host.is_empty() {
                    return Err(StorageError::Config("s3.host cannot be empty".into()));
                }
                if s3.bucket.is_empty() {
                    return Err(StorageError::Config("s3.bucket cannot be empty".into()));
                }
                check_root(&s3.root_path)?;
            }
            BackendKind::Relay => {
                let relay = self.relay.as_ref().ok_or_else(|| missing_section("relay"))?;
                if relay.url.is_empty() {
                    return Err(StorageError::Config("relay.url cannot be empty".into()));
                }
                check_root(&relay.root_path)?;
            }
        }
        Ok(())
    }
}

impl S3Config {
    /// Endpoint URL built from host, port and the transport-security flag.
    pub fn endpoint(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }
}

fn missing_section(name: &str) -> StorageError {
    StorageError::Config(format!("backend '{}' selected but [{}] section is missing", name, name))
}

fn check_root(root: &str) -> Result<(), StorageError> {
    if !root.starts_with('/') {
        return Err(StorageError::Config(format!(
            "root_path should start with /: {:?}",
            root
        )));
    }
    Ok(())
}
