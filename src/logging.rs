//! Logging setup
//!
//! Diagnostics go through the `log` facade; `env_logger` picks the filter up
//! from `RUST_LOG`.

/// Installs `env_logger` as the global logger.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .format_timestamp_millis()
        .try_init();
}
