//! Logging setup.
//!
//! Everything logs through the `log` facade; `env_logger` is wired up here.

mod init;

pub use init::{init_logging, LoggingConfig, DEFAULT_FILTER};
