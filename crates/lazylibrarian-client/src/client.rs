use std::{fmt, time::Duration};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::{
    error::ApiError,
    types::{ApiResponse, Command, decode_response},
};

/// Where and how to reach the LazyLibrarian instance. Fixed at startup.
#[derive(Clone)]
pub struct TargetConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl TargetConfig {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl fmt::Debug for TargetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Read-only access to the LazyLibrarian API.
#[async_trait]
pub trait LibraryApi: Send + Sync {
    async fn request(
        &self,
        command: Command,
        extra_params: &[(&str, &str)],
    ) -> Result<ApiResponse, ApiError>;
}

/// Issues `command` and decodes the body into a typed schema.
pub async fn fetch<T: DeserializeOwned>(
    api: &dyn LibraryApi,
    command: Command,
    extra_params: &[(&str, &str)],
) -> Result<T, ApiError> {
    let response = api.request(command, extra_params).await?;
    decode_response(command, response)
}

#[derive(Clone)]
pub struct ApiClient {
    target: TargetConfig,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(target: TargetConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(target.timeout)
            .build()
            .map_err(|source| ApiError::ClientBuild { source })?;

        Ok(Self { target, client })
    }

    pub fn target(&self) -> &TargetConfig {
        &self.target
    }

    fn request_url(&self, command: Command, extra_params: &[(&str, &str)]) -> Result<Url, ApiError> {
        let mut url = Url::parse(&self.target.base_url)
            .map_err(|source| ApiError::InvalidUrl { command, source })?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("cmd", command.as_str());
            query.append_pair("apikey", &self.target.api_key);
            for (key, value) in extra_params {
                query.append_pair(key, value);
            }
        }

        Ok(url)
    }
}

#[async_trait]
impl LibraryApi for ApiClient {
    async fn request(
        &self,
        command: Command,
        extra_params: &[(&str, &str)],
    ) -> Result<ApiResponse, ApiError> {
        let url = self.request_url(command, extra_params)?;
        debug!(%command, "querying lazylibrarian api");

        // `without_url` keeps the api key out of error messages.
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| ApiError::Transport {
                command,
                source: err.without_url(),
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ApiError::Status {
                command,
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|err| ApiError::BodyRead {
            command,
            source: err.without_url(),
        })?;

        serde_json::from_slice::<ApiResponse>(&body)
            .map_err(|source| ApiError::Decode { command, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base_url: &str) -> ApiClient {
        ApiClient::new(TargetConfig::new(base_url, "s3cret")).unwrap()
    }

    #[test]
    fn request_url_carries_command_key_and_extras() {
        let url = client("http://books.local:5299/api")
            .request_url(Command::GetWanted, &[("limit", "10")])
            .unwrap();

        assert_eq!(url.path(), "/api");
        let pairs = url.query_pairs().into_owned().collect::<Vec<_>>();
        assert_eq!(
            pairs,
            vec![
                ("cmd".to_string(), "getWanted".to_string()),
                ("apikey".to_string(), "s3cret".to_string()),
                ("limit".to_string(), "10".to_string()),
            ]
        );
    }

    #[test]
    fn unparsable_base_url_is_invalid_url() {
        let err = client("not a url")
            .request_url(Command::GetVersion, &[])
            .unwrap_err();

        assert_eq!(err.kind(), "invalid_url");
        assert!(err.to_string().contains("getVersion"));
    }

    #[test]
    fn debug_output_hides_api_key() {
        let rendered = format!("{:?}", TargetConfig::new("http://localhost", "s3cret"));
        assert!(!rendered.contains("s3cret"));
    }
}
