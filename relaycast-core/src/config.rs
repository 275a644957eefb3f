use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub rtmp: RtmpConfig,
    pub engine: EngineConfig,
    pub fanout: FanoutConfig,
    pub platforms: PlatformsConfig,
    pub credentials: CredentialsConfig,
    pub workers: WorkersConfig,
    pub sweep: SweepConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub http_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            http_port: 8080,
        }
    }
}

/// Public-facing ingest and playback addresses of the relay engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RtmpConfig {
    pub public_host: String,
    pub port: u16,
    pub app: String,
    pub hls_base_url: String,
}

impl Default for RtmpConfig {
    fn default() -> Self {
        Self {
            public_host: "localhost".to_string(),
            port: 1935,
            app: "live".to_string(),
            hls_base_url: "http://localhost:8081/hls".to_string(),
        }
    }
}

impl RtmpConfig {
    /// Publisher-facing RTMP ingest URL for a stream key.
    #[must_use]
    pub fn ingest_url(&self, key: &str) -> String {
        format!(
            "rtmp://{}:{}/{}/{}",
            self.public_host, self.port, self.app, key
        )
    }

    /// HLS playback URL for a stream key.
    #[must_use]
    pub fn hls_url(&self, key: &str) -> String {
        format!("{}/{}.m3u8", self.hls_base_url.trim_end_matches('/'), key)
    }

    /// Loopback URL local relay workers pull the ingested stream from.
    #[must_use]
    pub fn local_input_url(&self, key: &str) -> String {
        format!("rtmp://127.0.0.1:{}/{}/{}", self.port, self.app, key)
    }
}

/// How the external relay engine is driven.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineStrategy {
    /// Regenerate a full configuration document and signal a reload.
    #[default]
    Declarative,
    /// Issue per-stream calls against the engine's control API.
    Imperative,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub strategy: EngineStrategy,
    /// Upper bound for a reload command or a control-plane request.
    pub timeout_seconds: u64,
    /// Optional status endpoint probed by health checks.
    pub status_url: Option<String>,
    pub declarative: DeclarativeEngineConfig,
    pub imperative: ImperativeEngineConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            strategy: EngineStrategy::Declarative,
            timeout_seconds: 5,
            status_url: Some("http://localhost:1985/api/v1/versions".to_string()),
            declarative: DeclarativeEngineConfig::default(),
            imperative: ImperativeEngineConfig::default(),
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeclarativeEngineConfig {
    pub config_path: String,
    pub reload_program: String,
    pub reload_args: Vec<String>,
}

impl Default for DeclarativeEngineConfig {
    fn default() -> Self {
        Self {
            config_path: "./data/relay-streams.json".to_string(),
            reload_program: "srs".to_string(),
            reload_args: vec!["-s".to_string(), "reload".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImperativeEngineConfig {
    pub api_url: String,
}

impl Default for ImperativeEngineConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:1985".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FanoutConfig {
    /// Per-platform ceiling for credential lookup plus broadcast creation.
    pub platform_timeout_seconds: u64,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            platform_timeout_seconds: 30,
        }
    }
}

impl FanoutConfig {
    #[must_use]
    pub const fn platform_timeout(&self) -> Duration {
        Duration::from_secs(self.platform_timeout_seconds)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformsConfig {
    pub youtube: YoutubeConfig,
    pub twitch: TwitchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct YoutubeConfig {
    pub enabled: bool,
    pub api_base_url: String,
}

impl Default for YoutubeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_base_url: "https://www.googleapis.com/youtube/v3".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TwitchConfig {
    pub enabled: bool,
    pub api_base_url: String,
    pub client_id: String,
}

impl Default for TwitchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_base_url: "https://api.twitch.tv/helix".to_string(),
            client_id: String::new(),
        }
    }
}

/// Where platform access tokens come from.
///
/// Static tokens take precedence over token files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    /// Directory holding one `{platform}.token` file per platform.
    pub token_dir: Option<String>,
    pub static_tokens: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkersConfig {
    pub enabled: bool,
    pub ffmpeg_path: String,
    /// Platforms whose destinations need a local relay worker.
    pub platforms: Vec<String>,
    pub grace_period_seconds: u64,
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ffmpeg_path: "ffmpeg".to_string(),
            platforms: Vec::new(),
            grace_period_seconds: 5,
        }
    }
}

impl WorkersConfig {
    #[must_use]
    pub const fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_seconds)
    }

    /// Whether destinations for `platform` get a supervised worker.
    #[must_use]
    pub fn wants(&self, platform: &str) -> bool {
        self.enabled && self.platforms.iter().any(|p| p.eq_ignore_ascii_case(platform))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Zero disables the consistency sweep.
    pub interval_seconds: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self { interval_seconds: 30 }
    }
}

impl SweepConfig {
    #[must_use]
    pub const fn interval(&self) -> Option<Duration> {
        if self.interval_seconds == 0 {
            None
        } else {
            Some(Duration::from_secs(self.interval_seconds))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "pretty"
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_path: None,
        }
    }
}

impl Config {
    /// Load configuration from an optional file layered with environment variables
    ///
    /// Environment variables use the `RELAYCAST` prefix and `__` between
    /// nested keys, e.g. `RELAYCAST_ENGINE__STRATEGY=imperative`.
    pub fn load(config_file: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_file {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("RELAYCAST")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("workers.platforms")
                .with_list_parse_key("engine.declarative.reload_args")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Load from environment variables only (for Docker/K8s)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        Self::load(Some(path))
    }

    /// Check the configuration for problems that would only surface at runtime.
    ///
    /// Every problem is reported, not just the first one.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.server.http_port == 0 {
            errors.push("server.http_port must be non-zero".to_string());
        }
        if self.rtmp.port == 0 {
            errors.push("rtmp.port must be non-zero".to_string());
        }
        if self.rtmp.app.trim().is_empty() || self.rtmp.app.contains('/') {
            errors.push(format!("rtmp.app must be a single path segment, got {:?}", self.rtmp.app));
        }
        if url::Url::parse(&self.rtmp.hls_base_url).is_err() {
            errors.push(format!("rtmp.hls_base_url is not a valid URL: {}", self.rtmp.hls_base_url));
        }

        if self.engine.timeout_seconds == 0 {
            errors.push("engine.timeout_seconds must be greater than zero".to_string());
        }
        if let Some(status_url) = &self.engine.status_url {
            if url::Url::parse(status_url).is_err() {
                errors.push(format!("engine.status_url is not a valid URL: {status_url}"));
            }
        }
        match self.engine.strategy {
            EngineStrategy::Declarative => {
                if self.engine.declarative.config_path.trim().is_empty() {
                    errors.push("engine.declarative.config_path is required for the declarative strategy".to_string());
                }
                if self.engine.declarative.reload_program.trim().is_empty() {
                    errors.push("engine.declarative.reload_program is required for the declarative strategy".to_string());
                }
            }
            EngineStrategy::Imperative => {
                if url::Url::parse(&self.engine.imperative.api_url).is_err() {
                    errors.push(format!(
                        "engine.imperative.api_url is not a valid URL: {}",
                        self.engine.imperative.api_url
                    ));
                }
            }
        }

        if self.fanout.platform_timeout_seconds == 0 {
            errors.push("fanout.platform_timeout_seconds must be greater than zero".to_string());
        }

        if self.platforms.youtube.enabled && url::Url::parse(&self.platforms.youtube.api_base_url).is_err() {
            errors.push(format!(
                "platforms.youtube.api_base_url is not a valid URL: {}",
                self.platforms.youtube.api_base_url
            ));
        }
        if self.platforms.twitch.enabled {
            if self.platforms.twitch.client_id.trim().is_empty() {
                errors.push("platforms.twitch.client_id is required when twitch is enabled".to_string());
            }
            if url::Url::parse(&self.platforms.twitch.api_base_url).is_err() {
                errors.push(format!(
                    "platforms.twitch.api_base_url is not a valid URL: {}",
                    self.platforms.twitch.api_base_url
                ));
            }
        }

        if self.workers.enabled && self.workers.ffmpeg_path.trim().is_empty() {
            errors.push("workers.ffmpeg_path is required when workers are enabled".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    #[must_use]
    pub fn http_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.http_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.engine.strategy, EngineStrategy::Declarative);
        assert_eq!(config.engine.timeout_seconds, 5);
        assert_eq!(config.fanout.platform_timeout_seconds, 30);
        assert_eq!(config.workers.grace_period_seconds, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_http_address() {
        let config = Config::default();
        assert_eq!(config.http_address(), "0.0.0.0:8080");
    }

    #[test]
    fn test_stream_urls() {
        let config = Config::default();
        assert_eq!(config.rtmp.ingest_url("k1"), "rtmp://localhost:1935/live/k1");
        assert_eq!(config.rtmp.hls_url("k1"), "http://localhost:8081/hls/k1.m3u8");
        assert_eq!(config.rtmp.local_input_url("k1"), "rtmp://127.0.0.1:1935/live/k1");
    }

    #[test]
    fn test_validate_collects_every_problem() {
        let mut config = Config::default();
        config.engine.timeout_seconds = 0;
        config.engine.declarative.config_path = String::new();
        config.fanout.platform_timeout_seconds = 0;
        config.platforms.twitch.enabled = true;

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.iter().any(|e| e.contains("client_id")));
    }

    #[test]
    fn test_validate_imperative_url() {
        let mut config = Config::default();
        config.engine.strategy = EngineStrategy::Imperative;
        config.engine.imperative.api_url = "not a url".to_string();
        let errors = config.validate().unwrap_err();
        assert!(errors[0].contains("engine.imperative.api_url"));
    }

    #[test]
    fn test_sweep_interval_zero_disables() {
        let sweep = SweepConfig { interval_seconds: 0 };
        assert!(sweep.interval().is_none());
        assert_eq!(SweepConfig::default().interval(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_workers_wants_is_case_insensitive() {
        let workers = WorkersConfig {
            enabled: true,
            platforms: vec!["Facebook".to_string()],
            ..Default::default()
        };
        assert!(workers.wants("facebook"));
        assert!(!workers.wants("youtube"));

        let disabled = WorkersConfig {
            platforms: vec!["facebook".to_string()],
            ..Default::default()
        };
        assert!(!disabled.wants("facebook"));
    }

    #[test]
    fn test_load_from_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "rtmp:\n  public_host: live.example.com\nengine:\n  strategy: imperative\n  imperative:\n    api_url: http://engine:1985\nworkers:\n  enabled: true\n  platforms: [facebook]"
        )
        .unwrap();

        let config = Config::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.rtmp.public_host, "live.example.com");
        assert_eq!(config.rtmp.app, "live");
        assert_eq!(config.engine.strategy, EngineStrategy::Imperative);
        assert_eq!(config.engine.imperative.api_url, "http://engine:1985");
        assert!(config.workers.wants("facebook"));
        assert!(config.validate().is_ok());
    }
}
