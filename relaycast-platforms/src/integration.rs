use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use relaycast_core::StreamOptions;

use crate::error::PlatformError;
use crate::platform::Platform;

/// What a platform hands back after provisioning a broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastResponse {
    pub broadcast_id: String,
    pub watch_url: String,
    /// Credential to append to the platform's ingest prefix.
    pub stream_key: String,
}

/// Creates remote broadcasts on one platform.
#[async_trait]
pub trait PlatformIntegration: Send + Sync {
    fn platform(&self) -> Platform;

    /// Provision a broadcast ready to receive an RTMP push.
    async fn create_broadcast(
        &self,
        credential: &str,
        options: &StreamOptions,
    ) -> Result<BroadcastResponse, PlatformError>;
}
