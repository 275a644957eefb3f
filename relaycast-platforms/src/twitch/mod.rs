//! Twitch integration
//!
//! Twitch has no per-broadcast provisioning: the channel's persistent stream
//! key is fetched and the channel title is updated to the stream's title.

pub mod client;
pub mod types;

use async_trait::async_trait;
use std::time::Duration;
use tracing::info;

use relaycast_core::config::TwitchConfig;
use relaycast_core::StreamOptions;

pub use client::TwitchClient;

use crate::error::PlatformError;
use crate::integration::{BroadcastResponse, PlatformIntegration};
use crate::platform::Platform;

pub struct TwitchIntegration {
    client: TwitchClient,
}

impl TwitchIntegration {
    pub fn new(config: &TwitchConfig, timeout: Duration) -> Result<Self, PlatformError> {
        Ok(Self {
            client: TwitchClient::new(&config.api_base_url, &config.client_id, timeout)?,
        })
    }
}

#[async_trait]
impl PlatformIntegration for TwitchIntegration {
    fn platform(&self) -> Platform {
        Platform::Twitch
    }

    async fn create_broadcast(
        &self,
        credential: &str,
        options: &StreamOptions,
    ) -> Result<BroadcastResponse, PlatformError> {
        let user = self.client.current_user(credential).await?;
        self.client.set_title(credential, &user.id, &options.title).await?;
        let stream_key = self.client.stream_key(credential, &user.id).await?;

        info!(broadcaster_id = %user.id, login = %user.login, "Twitch channel prepared");

        Ok(BroadcastResponse {
            watch_url: format!("https://twitch.tv/{}", user.login),
            broadcast_id: user.id,
            stream_key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn integration(server: &MockServer) -> TwitchIntegration {
        let config = TwitchConfig {
            enabled: true,
            api_base_url: server.uri(),
            client_id: "client-123".to_string(),
        };
        TwitchIntegration::new(&config, Duration::from_secs(5)).unwrap()
    }

    fn options() -> StreamOptions {
        StreamOptions {
            title: "Friday night".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_broadcast() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/users"))
            .and(header("client-id", "client-123"))
            .and(header("authorization", "Bearer tw-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{ "id": "141981764", "login": "streamer", "display_name": "Streamer" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("PATCH"))
            .and(path("/channels"))
            .and(query_param("broadcaster_id", "141981764"))
            .and(body_json(json!({ "title": "Friday night" })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/streams/key"))
            .and(query_param("broadcaster_id", "141981764"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{ "stream_key": "live_141981764_abc" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = integration(&server)
            .create_broadcast("tw-token", &options())
            .await
            .unwrap();

        assert_eq!(response.broadcast_id, "141981764");
        assert_eq!(response.stream_key, "live_141981764_abc");
        assert_eq!(response.watch_url, "https://twitch.tv/streamer");
    }

    #[tokio::test]
    async fn test_invalid_token() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/users"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": "Unauthorized", "status": 401, "message": "Invalid OAuth token"
            })))
            .mount(&server)
            .await;

        let err = integration(&server)
            .create_broadcast("expired", &options())
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::Api(ref m) if m.contains("Invalid OAuth token")));
    }

    #[tokio::test]
    async fn test_token_without_user() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/users"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
            .mount(&server)
            .await;

        let err = integration(&server)
            .create_broadcast("tw-token", &options())
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::Api(_)));
    }
}
