pub mod stream_key;

pub use stream_key::{is_well_formed_key, StreamKeyRegistry, STREAM_KEY_BYTES, STREAM_KEY_LEN};
