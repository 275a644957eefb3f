//! Platform access credentials
//!
//! Fanout asks a [`CredentialProvider`] for a platform's access token right
//! before calling that platform. How tokens are obtained in the first place
//! (OAuth consent flows, refresh) happens outside this crate; providers here
//! only hand out tokens that already exist.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use relaycast_core::config::CredentialsConfig;

use crate::error::PlatformError;
use crate::platform::Platform;

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Access token for `platform`.
    async fn credential(&self, platform: Platform) -> Result<String, PlatformError>;
}

/// Tokens supplied directly in configuration.
#[derive(Default)]
pub struct StaticCredentialProvider {
    tokens: HashMap<String, String>,
}

impl StaticCredentialProvider {
    /// Keys are platform names, matched case-insensitively.
    #[must_use]
    pub fn new(tokens: HashMap<String, String>) -> Self {
        Self {
            tokens: tokens
                .into_iter()
                .map(|(platform, token)| (platform.to_ascii_lowercase(), token))
                .collect(),
        }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentialProvider {
    async fn credential(&self, platform: Platform) -> Result<String, PlatformError> {
        self.tokens
            .get(platform.as_str())
            .filter(|token| !token.is_empty())
            .cloned()
            .ok_or_else(|| PlatformError::Credential(format!("no static token configured for {platform}")))
    }
}

/// Tokens read from `{token_dir}/{platform}.token` on every request, so an
/// external refresher can rotate them in place.
pub struct FileCredentialProvider {
    token_dir: PathBuf,
}

impl FileCredentialProvider {
    #[must_use]
    pub fn new(token_dir: impl Into<PathBuf>) -> Self {
        Self {
            token_dir: token_dir.into(),
        }
    }

    fn token_path(&self, platform: Platform) -> PathBuf {
        self.token_dir.join(format!("{platform}.token"))
    }
}

#[async_trait]
impl CredentialProvider for FileCredentialProvider {
    async fn credential(&self, platform: Platform) -> Result<String, PlatformError> {
        let path = self.token_path(platform);
        let contents = tokio::fs::read_to_string(&path).await.map_err(|e| {
            PlatformError::Credential(format!("failed to read {}: {e}", path.display()))
        })?;

        let token = contents.trim();
        if token.is_empty() {
            return Err(PlatformError::Credential(format!("{} is empty", path.display())));
        }
        Ok(token.to_string())
    }
}

/// Tries each provider in order; the first token found wins.
pub struct ChainedCredentialProvider {
    providers: Vec<Arc<dyn CredentialProvider>>,
}

impl ChainedCredentialProvider {
    #[must_use]
    pub fn new(providers: Vec<Arc<dyn CredentialProvider>>) -> Self {
        Self { providers }
    }
}

#[async_trait]
impl CredentialProvider for ChainedCredentialProvider {
    async fn credential(&self, platform: Platform) -> Result<String, PlatformError> {
        let mut reasons = Vec::with_capacity(self.providers.len());
        for provider in &self.providers {
            match provider.credential(platform).await {
                Ok(token) => return Ok(token),
                Err(e) => reasons.push(e.to_string()),
            }
        }

        if reasons.is_empty() {
            return Err(PlatformError::Credential(format!(
                "no credential source configured for {platform}"
            )));
        }
        Err(PlatformError::Credential(reasons.join("; ")))
    }
}

/// Build the provider chain described by configuration: static tokens first,
/// then the token directory when one is set.
#[must_use]
pub fn from_config(config: &CredentialsConfig) -> Arc<dyn CredentialProvider> {
    let mut providers: Vec<Arc<dyn CredentialProvider>> =
        vec![Arc::new(StaticCredentialProvider::new(config.static_tokens.clone()))];
    if let Some(dir) = &config.token_dir {
        providers.push(Arc::new(FileCredentialProvider::new(dir)));
    }
    Arc::new(ChainedCredentialProvider::new(providers))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_provider() {
        let provider = StaticCredentialProvider::new(HashMap::from([
            ("YouTube".to_string(), "yt-token".to_string()),
            ("twitch".to_string(), String::new()),
        ]));

        assert_eq!(provider.credential(Platform::Youtube).await.unwrap(), "yt-token");
        assert!(matches!(
            provider.credential(Platform::Twitch).await,
            Err(PlatformError::Credential(_))
        ));
        assert!(provider.credential(Platform::Facebook).await.is_err());
    }

    #[tokio::test]
    async fn test_file_provider_reads_and_trims() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("youtube.token"), "ya29.token\n").unwrap();
        std::fs::write(dir.path().join("twitch.token"), "  \n").unwrap();

        let provider = FileCredentialProvider::new(dir.path());
        assert_eq!(provider.credential(Platform::Youtube).await.unwrap(), "ya29.token");

        let err = provider.credential(Platform::Twitch).await.unwrap_err();
        assert!(err.to_string().contains("is empty"));

        let err = provider.credential(Platform::Facebook).await.unwrap_err();
        assert!(err.to_string().contains("facebook.token"));
    }

    #[tokio::test]
    async fn test_chain_prefers_static_tokens() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("youtube.token"), "from-file").unwrap();
        std::fs::write(dir.path().join("twitch.token"), "twitch-file").unwrap();

        let config = CredentialsConfig {
            token_dir: Some(dir.path().to_string_lossy().into_owned()),
            static_tokens: HashMap::from([("youtube".to_string(), "from-config".to_string())]),
        };
        let provider = from_config(&config);

        assert_eq!(provider.credential(Platform::Youtube).await.unwrap(), "from-config");
        assert_eq!(provider.credential(Platform::Twitch).await.unwrap(), "twitch-file");

        let err = provider.credential(Platform::Facebook).await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("no static token"));
        assert!(message.contains("facebook.token"));
    }

    #[tokio::test]
    async fn test_empty_chain() {
        let provider = ChainedCredentialProvider::new(Vec::new());
        let err = provider.credential(Platform::Youtube).await.unwrap_err();
        assert!(err.to_string().contains("no credential source"));
    }
}
