//! Twitch Helix HTTP client

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;

use super::types::{DataEnvelope, ErrorBody, ModifyChannel, StreamKeyEntry, User};
use crate::error::{json_with_limit, PlatformError};

const CLIENT_ID_HEADER: &str = "client-id";

pub struct TwitchClient {
    base_url: String,
    client_id: String,
    client: Client,
}

impl TwitchClient {
    pub fn new(
        base_url: impl Into<String>,
        client_id: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, PlatformError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client_id: client_id.into(),
            client,
        })
    }

    fn build_headers(&self, token: &str) -> Result<HeaderMap, PlatformError> {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}"))?);
        headers.insert(CLIENT_ID_HEADER, HeaderValue::from_str(&self.client_id)?);
        Ok(headers)
    }

    /// The user the token belongs to.
    pub async fn current_user(&self, token: &str) -> Result<User, PlatformError> {
        let response = self
            .client
            .get(format!("{}/users", self.base_url))
            .headers(self.build_headers(token)?)
            .send()
            .await?;

        let envelope: DataEnvelope<User> = json_with_limit(api_response(response).await?).await?;
        envelope
            .data
            .into_iter()
            .next()
            .ok_or_else(|| PlatformError::Api("token is not associated with a user".to_string()))
    }

    pub async fn set_title(&self, token: &str, broadcaster_id: &str, title: &str) -> Result<(), PlatformError> {
        let response = self
            .client
            .patch(format!("{}/channels", self.base_url))
            .headers(self.build_headers(token)?)
            .query(&[("broadcaster_id", broadcaster_id)])
            .json(&ModifyChannel { title })
            .send()
            .await?;

        api_response(response).await?;
        Ok(())
    }

    pub async fn stream_key(&self, token: &str, broadcaster_id: &str) -> Result<String, PlatformError> {
        let response = self
            .client
            .get(format!("{}/streams/key", self.base_url))
            .headers(self.build_headers(token)?)
            .query(&[("broadcaster_id", broadcaster_id)])
            .send()
            .await?;

        let envelope: DataEnvelope<StreamKeyEntry> = json_with_limit(api_response(response).await?).await?;
        envelope
            .data
            .into_iter()
            .next()
            .map(|entry| entry.stream_key)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| PlatformError::Parse("streams/key returned no stream key".to_string()))
    }
}

async fn api_response(response: reqwest::Response) -> Result<reqwest::Response, PlatformError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().to_string();
    let body = response.bytes().await.unwrap_or_default();
    match serde_json::from_slice::<ErrorBody>(&body) {
        Ok(err) if !err.message.is_empty() => Err(PlatformError::Api(format!(
            "twitch returned {} {}: {}",
            status.as_u16(),
            err.error,
            err.message
        ))),
        _ => Err(PlatformError::Http { status, url }),
    }
}
