// Stream relay registry, relay engine adapters and relay worker supervision

pub mod api;
pub mod error;
pub mod livestream;
pub mod relay;

pub use api::{CreateStreamReport, CreateStreamRequest, DeleteStreamReport, SimulcastService};
pub use error::{EngineError, Result, StreamError};
pub use livestream::{FfmpegLauncher, RelayWorkerSupervisor, WorkerLauncher};
pub use relay::{build_engine, RelayEngine, StreamRelayRegistry};
