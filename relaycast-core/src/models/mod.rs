pub mod stream;

pub use stream::{redact, Destination, Privacy, StreamKey, StreamOptions, StreamRecord, DEFAULT_SCHEDULE_LEAD};
