use std::fmt;
use std::str::FromStr;

use crate::error::PlatformError;

/// A third-party live platform a stream can be relayed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Platform {
    Youtube,
    Twitch,
    Facebook,
}

impl Platform {
    pub const ALL: [Self; 3] = [Self::Youtube, Self::Twitch, Self::Facebook];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Youtube => "youtube",
            Self::Twitch => "twitch",
            Self::Facebook => "facebook",
        }
    }

    /// Fixed RTMP(S) ingest prefix; the broadcast's stream key is appended to it.
    #[must_use]
    pub const fn ingest_base_url(self) -> &'static str {
        match self {
            Self::Youtube => "rtmp://a.rtmp.youtube.com/live2/",
            Self::Twitch => "rtmp://live.twitch.tv/app/",
            Self::Facebook => "rtmps://live-api-s.facebook.com:443/rtmp/",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = PlatformError;

    /// Case-insensitive; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == normalized)
            .ok_or(PlatformError::Unsupported(normalized))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("YouTube".parse::<Platform>().unwrap(), Platform::Youtube);
        assert_eq!(" twitch ".parse::<Platform>().unwrap(), Platform::Twitch);
        assert_eq!("FACEBOOK".parse::<Platform>().unwrap(), Platform::Facebook);
    }

    #[test]
    fn test_parse_unknown() {
        let err = "MySpace".parse::<Platform>().unwrap_err();
        assert!(matches!(err, PlatformError::Unsupported(name) if name == "myspace"));
    }

    #[test]
    fn test_ingest_base_urls() {
        assert_eq!(Platform::Youtube.ingest_base_url(), "rtmp://a.rtmp.youtube.com/live2/");
        assert_eq!(Platform::Twitch.ingest_base_url(), "rtmp://live.twitch.tv/app/");
        assert_eq!(
            Platform::Facebook.ingest_base_url(),
            "rtmps://live-api-s.facebook.com:443/rtmp/"
        );
    }
}
