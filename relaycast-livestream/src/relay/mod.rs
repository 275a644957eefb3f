// Relay engine adapters and the stream relay registry
pub mod declarative;
pub mod engine;
pub mod imperative;
pub mod registry;
#[cfg(any(test, feature = "test-util"))]
pub mod mock_engine;

pub use declarative::DeclarativeEngine;
pub use engine::{build_engine, RelayEngine, RelaySnapshot};
pub use imperative::ImperativeEngine;
pub use registry::StreamRelayRegistry;

#[cfg(any(test, feature = "test-util"))]
pub use mock_engine::{EngineCall, MockRelayEngine};
