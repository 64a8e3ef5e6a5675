use thiserror::Error;

use crate::types::Command;

/// Failure of a single API request.
///
/// Messages never contain the request URL, so the API key cannot leak into
/// logs through an error value.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid api url for {command}: {source}")]
    InvalidUrl {
        command: Command,
        #[source]
        source: url::ParseError,
    },
    #[error("{command} request failed: {source}")]
    Transport {
        command: Command,
        #[source]
        source: reqwest::Error,
    },
    #[error("{command} returned unexpected status {status}")]
    Status { command: Command, status: u16 },
    #[error("failed to read {command} response body: {source}")]
    BodyRead {
        command: Command,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to decode {command} response: {source}")]
    Decode {
        command: Command,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to build http client: {source}")]
    ClientBuild {
        #[source]
        source: reqwest::Error,
    },
}

impl ApiError {
    /// Short machine-friendly name of the failure class.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidUrl { .. } => "invalid_url",
            Self::Transport { .. } => "transport",
            Self::Status { .. } => "status",
            Self::BodyRead { .. } => "body_read",
            Self::Decode { .. } => "decode",
            Self::ClientBuild { .. } => "client_build",
        }
    }
}
