// Service facade used by the HTTP layer

pub mod simulcast;

pub use simulcast::{CreateStreamReport, CreateStreamRequest, DeleteStreamReport, SimulcastService, SweepReport};
