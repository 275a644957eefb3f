//! Core types for relaycast: configuration, logging, errors, the stream
//! data model and the publisher stream key registry.

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod service;

pub use config::Config;
pub use error::{Error, Result};
pub use models::{redact, Destination, Privacy, StreamKey, StreamOptions, StreamRecord};
pub use service::StreamKeyRegistry;
