//! YouTube Live integration
//!
//! A broadcast is provisioned in three calls: insert the broadcast, insert
//! an RTMP live stream, then bind the two. The live stream's ingestion
//! stream name is the key relayed to `rtmp://a.rtmp.youtube.com/live2/`.

pub mod client;
pub mod types;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use std::time::Duration;
use tracing::{debug, info};

use relaycast_core::config::YoutubeConfig;
use relaycast_core::StreamOptions;

pub use client::YoutubeClient;

use crate::error::PlatformError;
use crate::integration::{BroadcastResponse, PlatformIntegration};
use crate::platform::Platform;

pub struct YoutubeIntegration {
    client: YoutubeClient,
}

impl YoutubeIntegration {
    pub fn new(config: &YoutubeConfig, timeout: Duration) -> Result<Self, PlatformError> {
        Ok(Self {
            client: YoutubeClient::new(&config.api_base_url, timeout)?,
        })
    }
}

#[async_trait]
impl PlatformIntegration for YoutubeIntegration {
    fn platform(&self) -> Platform {
        Platform::Youtube
    }

    async fn create_broadcast(
        &self,
        credential: &str,
        options: &StreamOptions,
    ) -> Result<BroadcastResponse, PlatformError> {
        let start = options
            .effective_start_time(Utc::now())
            .to_rfc3339_opts(SecondsFormat::Secs, true);

        let broadcast = self
            .client
            .insert_broadcast(
                credential,
                &options.title,
                &options.description,
                options.privacy.as_str(),
                &start,
            )
            .await?;
        let broadcast_id = broadcast
            .id
            .ok_or_else(|| PlatformError::Parse("liveBroadcasts.insert returned no id".to_string()))?;
        debug!(broadcast_id = %broadcast_id, scheduled_start = %start, "YouTube broadcast created");

        let stream = self.client.insert_stream(credential).await?;
        let stream_id = stream
            .id
            .ok_or_else(|| PlatformError::Parse("liveStreams.insert returned no id".to_string()))?;
        let stream_key = stream
            .cdn
            .and_then(|cdn| cdn.ingestion_info)
            .map(|info| info.stream_name)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| PlatformError::Parse("liveStreams.insert returned no ingestion stream name".to_string()))?;

        self.client.bind(credential, &broadcast_id, &stream_id).await?;

        info!(broadcast_id = %broadcast_id, stream_id = %stream_id, "YouTube broadcast bound to live stream");

        Ok(BroadcastResponse {
            watch_url: format!("https://youtube.com/watch?v={broadcast_id}"),
            broadcast_id,
            stream_key,
        })
    }
}
