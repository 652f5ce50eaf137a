//! Stowage - Entry Point
//!
//! Opens the configured backend and runs one read-only query against it:
//! `stowage <type|pwd|ls|exists|size> [path]`.

use log::{error, info};
use std::process::ExitCode;

use stowage::logging::init_logging;
use stowage::{StorageBackend, StorageConfig, StorageError};

fn run(op: &str, path: &str) -> Result<String, StorageError> {
    let config = StorageConfig::load()?;
    let storage: Box<dyn StorageBackend> = stowage::open(&config)?;
    if !storage.initialized() {
        return Err(StorageError::NotReady);
    }

    match op {
        "type" => Ok(storage.get_type()?.to_string()),
        "pwd" => storage.pwd(),
        "ls" => Ok(storage.list(path)?.join("\n")),
        "exists" => Ok(storage.exists(path)?.to_string()),
        "size" => Ok(storage.size(path)?.to_string()),
        other => Err(StorageError::Config(format!("unknown command: {}", other))),
    }
}

fn main() -> ExitCode {
    init_logging();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let op = args.first().map(String::as_str).unwrap_or("pwd");
    let path = args.get(1).map(String::as_str).unwrap_or("");

    info!("Running {} {}", op, path);
    match run(op, path) {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{} failed: {}", op, e);
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
