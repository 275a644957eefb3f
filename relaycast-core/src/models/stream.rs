use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lead time applied when a broadcast has no usable scheduled start.
pub const DEFAULT_SCHEDULE_LEAD: Duration = Duration::minutes(1);

/// Publisher credential for a single inbound live stream.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamKey {
    pub value: String,
    pub owner_id: String,
    pub issued_at: DateTime<Utc>,
    pub revoked: bool,
}

impl fmt::Debug for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamKey")
            .field("value", &redact(&self.value))
            .field("owner_id", &self.owner_id)
            .field("issued_at", &self.issued_at)
            .field("revoked", &self.revoked)
            .finish()
    }
}

/// One egress target a stream is relayed to.
///
/// `url` is the platform's fixed ingest prefix and `stream_key` the credential
/// the platform handed out for this broadcast; the relay target is their
/// concatenation.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Destination {
    pub platform: String,
    pub url: String,
    pub stream_key: String,
}

impl Destination {
    #[must_use]
    pub fn new(platform: impl Into<String>, url: impl Into<String>, stream_key: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            url: url.into(),
            stream_key: stream_key.into(),
        }
    }

    /// Full RTMP(S) target: ingest prefix followed by the platform stream key.
    #[must_use]
    pub fn output_url(&self) -> String {
        format!("{}{}", self.url, self.stream_key)
    }
}

impl fmt::Debug for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Destination")
            .field("platform", &self.platform)
            .field("url", &self.url)
            .field("stream_key", &redact(&self.stream_key))
            .finish()
    }
}

/// The relay registry's entry for an active stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamRecord {
    pub key: String,
    /// In platform request order. Never reordered or deduplicated.
    pub destinations: Vec<Destination>,
    pub created_at: DateTime<Utc>,
}

impl StreamRecord {
    #[must_use]
    pub fn new(key: impl Into<String>, destinations: Vec<Destination>) -> Self {
        Self {
            key: key.into(),
            destinations,
            created_at: Utc::now(),
        }
    }
}

/// Broadcast visibility requested from the platforms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Privacy {
    #[default]
    Public,
    Unlisted,
    Private,
}

impl Privacy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Unlisted => "unlisted",
            Self::Private => "private",
        }
    }
}

/// Stream metadata forwarded to every platform during fanout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamOptions {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub privacy: Privacy,
    #[serde(default)]
    pub scheduled_start: Option<DateTime<Utc>>,
}

impl StreamOptions {
    /// Start time to announce to a platform.
    ///
    /// Absent or already-past schedule times become `now + 1 minute`.
    #[must_use]
    pub fn effective_start_time(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self.scheduled_start {
            Some(at) if at >= now => at,
            _ => now + DEFAULT_SCHEDULE_LEAD,
        }
    }
}

/// Shorten a secret for logs: the first four characters followed by an ellipsis.
#[must_use]
pub fn redact(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    if visible.len() == secret.len() {
        "…".to_string()
    } else {
        format!("{visible}…")
    }
}
