use std::fmt;

use serde::{Deserialize, Deserializer, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::error::ApiError;

/// Raw decoded body of an API call. The top level must be a JSON object.
pub type ApiResponse = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    GetVersion,
    GetSnatched,
    GetWanted,
    GetStats,
    GetJobs,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GetVersion => "getVersion",
            Self::GetSnatched => "getSnatched",
            Self::GetWanted => "getWanted",
            Self::GetStats => "getStats",
            Self::GetJobs => "getJobs",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VersionInfo {
    #[serde(default, deserialize_with = "lenient")]
    pub current_version: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub latest_version: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub install_type: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub commits_behind: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SnatchedResponse {
    #[serde(default, deserialize_with = "lenient")]
    pub snatched: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WantedResponse {
    #[serde(default, deserialize_with = "lenient")]
    pub books: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatsResponse {
    #[serde(default, deserialize_with = "lenient")]
    pub stats: Option<LibraryStats>,
}

/// Aggregate counters reported by `getStats`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LibraryStats {
    #[serde(default, deserialize_with = "lenient")]
    pub total_books: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub total_authors: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub total_series: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub have: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub read: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub to_read: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub skipped: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub open: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub processed_downloads: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub failed_downloads: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobsResponse {
    #[serde(default, deserialize_with = "lenient")]
    pub jobs: Option<Vec<Value>>,
}

/// Decodes a raw response into one of the typed schemas above.
pub fn decode_response<T: DeserializeOwned>(
    command: Command,
    response: ApiResponse,
) -> Result<T, ApiError> {
    serde_json::from_value(Value::Object(response))
        .map_err(|source| ApiError::Decode { command, source })
}

// A value of the wrong JSON type becomes `None` rather than an error.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}
