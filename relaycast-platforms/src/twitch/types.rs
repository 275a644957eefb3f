//! Twitch Helix wire types

use serde::{Deserialize, Serialize};

/// Helix wraps every list result in `{"data": [...]}`.
#[derive(Debug, Deserialize)]
pub struct DataEnvelope<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: String,
    pub login: String,
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamKeyEntry {
    pub stream_key: String,
}

#[derive(Debug, Serialize)]
pub struct ModifyChannel<'a> {
    pub title: &'a str,
}

/// `{"error": "Unauthorized", "status": 401, "message": "Invalid OAuth token"}`
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub message: String,
}
