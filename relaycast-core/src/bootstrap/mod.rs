//! Bootstrap helpers for the relaycast server
//!
//! Configuration discovery and validation run before logging exists, so
//! progress is reported on stderr.

pub mod config;

pub use config::load_config;
