//! Integration registry
//!
//! Factory-based: each platform with an integration registers a factory,
//! and the registry instantiates the ones enabled in configuration.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use relaycast_core::config::PlatformsConfig;

use crate::error::PlatformError;
use crate::integration::PlatformIntegration;
use crate::platform::Platform;
use crate::twitch::TwitchIntegration;
use crate::youtube::YoutubeIntegration;

/// Builds an integration from platform configuration and a request timeout.
pub type IntegrationFactory =
    Box<dyn Fn(&PlatformsConfig, Duration) -> Result<Arc<dyn PlatformIntegration>, PlatformError> + Send + Sync>;

pub struct IntegrationRegistry {
    factories: HashMap<Platform, IntegrationFactory>,
    integrations: HashMap<Platform, Arc<dyn PlatformIntegration>>,
}

impl IntegrationRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
            integrations: HashMap::new(),
        }
    }

    /// Registry with factories for every integration this crate ships.
    #[must_use]
    pub fn with_builtin_factories() -> Self {
        let mut registry = Self::new();
        registry.register_factory(Platform::Youtube, Box::new(youtube_factory));
        registry.register_factory(Platform::Twitch, Box::new(twitch_factory));
        registry
    }

    /// Instantiate every enabled platform that has a factory.
    pub fn from_config(config: &PlatformsConfig, timeout: Duration) -> Result<Self, PlatformError> {
        let mut registry = Self::with_builtin_factories();
        for platform in Platform::ALL {
            if is_enabled(platform, config) {
                registry.create_instance(platform, config, timeout)?;
            }
        }
        Ok(registry)
    }

    pub fn register_factory(&mut self, platform: Platform, factory: IntegrationFactory) {
        self.factories.insert(platform, factory);
    }

    pub fn create_instance(
        &mut self,
        platform: Platform,
        config: &PlatformsConfig,
        timeout: Duration,
    ) -> Result<(), PlatformError> {
        let factory = self
            .factories
            .get(&platform)
            .ok_or_else(|| PlatformError::NotInitialized(platform.to_string()))?;

        let integration = factory(config, timeout)?;
        self.integrations.insert(platform, integration);
        info!(platform = %platform, "Platform integration initialized");
        Ok(())
    }

    /// Register a ready-made integration, replacing any previous one for its platform.
    pub fn register(&mut self, integration: Arc<dyn PlatformIntegration>) {
        self.integrations.insert(integration.platform(), integration);
    }

    /// Resolve a requested platform name.
    ///
    /// Unknown names are `Unsupported`; known platforms without a live
    /// integration are `NotInitialized`.
    pub fn get(&self, name: &str) -> Result<Arc<dyn PlatformIntegration>, PlatformError> {
        let platform: Platform = name.parse()?;
        self.integrations
            .get(&platform)
            .cloned()
            .ok_or_else(|| PlatformError::NotInitialized(platform.to_string()))
    }

    /// Platforms with a live integration, in a stable order.
    #[must_use]
    pub fn platforms(&self) -> Vec<Platform> {
        let mut platforms: Vec<_> = self.integrations.keys().copied().collect();
        platforms.sort();
        platforms
    }
}

impl Default for IntegrationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn youtube_factory(
    config: &PlatformsConfig,
    timeout: Duration,
) -> Result<Arc<dyn PlatformIntegration>, PlatformError> {
    Ok(Arc::new(YoutubeIntegration::new(&config.youtube, timeout)?))
}

fn twitch_factory(
    config: &PlatformsConfig,
    timeout: Duration,
) -> Result<Arc<dyn PlatformIntegration>, PlatformError> {
    Ok(Arc::new(TwitchIntegration::new(&config.twitch, timeout)?))
}

fn is_enabled(platform: Platform, config: &PlatformsConfig) -> bool {
    match platform {
        Platform::Youtube => config.youtube.enabled,
        Platform::Twitch => config.twitch.enabled,
        Platform::Facebook => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use relaycast_core::StreamOptions;

    use crate::integration::BroadcastResponse;

    struct StubIntegration(Platform);

    #[async_trait]
    impl PlatformIntegration for StubIntegration {
        fn platform(&self) -> Platform {
            self.0
        }

        async fn create_broadcast(
            &self,
            _credential: &str,
            _options: &StreamOptions,
        ) -> Result<BroadcastResponse, PlatformError> {
            Ok(BroadcastResponse {
                broadcast_id: "id".to_string(),
                watch_url: String::new(),
                stream_key: "key".to_string(),
            })
        }
    }

    #[test]
    fn test_from_config_builds_enabled_platforms() {
        let mut config = PlatformsConfig::default();
        config.twitch.enabled = true;
        config.twitch.client_id = "abc".to_string();

        let registry = IntegrationRegistry::from_config(&config, Duration::from_secs(5)).unwrap();
        assert_eq!(registry.platforms(), vec![Platform::Youtube, Platform::Twitch]);
    }

    #[test]
    fn test_disabled_platform_is_not_initialized() {
        let mut config = PlatformsConfig::default();
        config.youtube.enabled = false;

        let registry = IntegrationRegistry::from_config(&config, Duration::from_secs(5)).unwrap();
        assert!(matches!(registry.get("youtube"), Err(PlatformError::NotInitialized(_))));
    }

    #[test]
    fn test_get_resolves_names() {
        let mut registry = IntegrationRegistry::new();
        registry.register(Arc::new(StubIntegration(Platform::Youtube)));

        assert_eq!(registry.get("YouTube").unwrap().platform(), Platform::Youtube);
        assert!(matches!(registry.get("facebook"), Err(PlatformError::NotInitialized(_))));
        assert!(matches!(registry.get("vimeo"), Err(PlatformError::Unsupported(_))));
    }

    #[test]
    fn test_create_instance_without_factory() {
        let mut registry = IntegrationRegistry::with_builtin_factories();
        let err = registry
            .create_instance(Platform::Facebook, &PlatformsConfig::default(), Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, PlatformError::NotInitialized(_)));
    }
}
