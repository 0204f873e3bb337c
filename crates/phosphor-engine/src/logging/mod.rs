//! Logger initialization.
//!
//! Everything else in the workspace logs through the `log` facade only.

mod init;

pub use init::{LoggingConfig, init_logging};
