// Local relay workers, one per (stream, destination) unit

pub mod ffmpeg;
pub mod supervisor;

pub use ffmpeg::{ffmpeg_args, FfmpegLauncher};
pub use supervisor::{
    stream_key_of, unit_id, RelayWorkerSupervisor, WorkerInfo, WorkerLauncher, WorkerSpec, WorkerState,
};
