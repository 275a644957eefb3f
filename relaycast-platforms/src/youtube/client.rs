//! YouTube Data API v3 HTTP client

use std::time::Duration;

use reqwest::Client;

use super::types::{
    CdnSettings, ErrorEnvelope, LiveBroadcast, LiveBroadcastContentDetails, LiveBroadcastSnippet,
    LiveBroadcastStatus, LiveStream, LiveStreamSnippet,
};
use crate::error::{json_with_limit, PlatformError};

const LIVE_STREAM_TITLE: &str = "relaycast ingest";

pub struct YoutubeClient {
    base_url: String,
    client: Client,
}

impl YoutubeClient {
    /// `base_url` is the API root, e.g. `https://www.googleapis.com/youtube/v3`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, PlatformError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// `liveBroadcasts.insert`
    pub async fn insert_broadcast(
        &self,
        token: &str,
        title: &str,
        description: &str,
        privacy: &str,
        scheduled_start_time: &str,
    ) -> Result<LiveBroadcast, PlatformError> {
        let body = LiveBroadcast {
            id: None,
            snippet: Some(LiveBroadcastSnippet {
                title: title.to_string(),
                description: description.to_string(),
                scheduled_start_time: scheduled_start_time.to_string(),
            }),
            status: Some(LiveBroadcastStatus {
                privacy_status: privacy.to_string(),
                self_declared_made_for_kids: false,
            }),
            content_details: Some(LiveBroadcastContentDetails {
                enable_auto_start: true,
                enable_auto_stop: true,
            }),
        };

        let response = self
            .client
            .post(format!("{}/liveBroadcasts", self.base_url))
            .bearer_auth(token)
            .query(&[("part", "snippet,status,contentDetails")])
            .json(&body)
            .send()
            .await?;

        json_with_limit(api_response(response).await?).await
    }

    /// `liveStreams.insert` with an RTMP ingest of variable resolution and frame rate.
    pub async fn insert_stream(&self, token: &str) -> Result<LiveStream, PlatformError> {
        let body = LiveStream {
            id: None,
            snippet: Some(LiveStreamSnippet {
                title: LIVE_STREAM_TITLE.to_string(),
            }),
            cdn: Some(CdnSettings {
                frame_rate: Some("variable".to_string()),
                ingestion_type: Some("rtmp".to_string()),
                resolution: Some("variable".to_string()),
                ingestion_info: None,
            }),
        };

        let response = self
            .client
            .post(format!("{}/liveStreams", self.base_url))
            .bearer_auth(token)
            .query(&[("part", "snippet,cdn")])
            .json(&body)
            .send()
            .await?;

        json_with_limit(api_response(response).await?).await
    }

    /// `liveBroadcasts.bind`
    pub async fn bind(&self, token: &str, broadcast_id: &str, stream_id: &str) -> Result<(), PlatformError> {
        let response = self
            .client
            .post(format!("{}/liveBroadcasts/bind", self.base_url))
            .bearer_auth(token)
            .query(&[("id", broadcast_id), ("part", "id"), ("streamId", stream_id)])
            .send()
            .await?;

        api_response(response).await?;
        Ok(())
    }
}

/// Turn a non-success response into an API error carrying Google's message
/// when the body has one.
async fn api_response(response: reqwest::Response) -> Result<reqwest::Response, PlatformError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().to_string();
    let body = response.bytes().await.unwrap_or_default();
    match serde_json::from_slice::<ErrorEnvelope>(&body) {
        Ok(envelope) if !envelope.error.message.is_empty() => Err(PlatformError::Api(format!(
            "youtube returned {}: {}",
            status.as_u16(),
            envelope.error.message
        ))),
        _ => Err(PlatformError::Http { status, url }),
    }
}
