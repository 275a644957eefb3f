//! Third-party live platform integrations and the concurrent fanout that
//! provisions one broadcast per requested platform.

pub mod credentials;
pub mod error;
pub mod fanout;
pub mod integration;
pub mod platform;
pub mod registry;
pub mod twitch;
pub mod youtube;

pub use credentials::{ChainedCredentialProvider, CredentialProvider, FileCredentialProvider, StaticCredentialProvider};
pub use error::{FanoutError, PlatformError};
pub use fanout::{FanoutOutcome, PlatformFanout, PlatformResult, ProvisionedDestination};
pub use integration::{BroadcastResponse, PlatformIntegration};
pub use platform::Platform;
pub use registry::IntegrationRegistry;
