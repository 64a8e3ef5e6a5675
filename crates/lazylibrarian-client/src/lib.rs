//! HTTP client for the LazyLibrarian API.
//!
//! Every call is a `GET` against the configured base URL carrying `cmd` and
//! `apikey` query parameters. Responses are JSON objects whose fields are
//! decoded leniently: a field that is missing or has an unexpected type is
//! reported as `None` instead of failing the whole response.

pub mod client;
pub mod error;
pub mod types;

pub use client::{ApiClient, LibraryApi, TargetConfig, fetch};
pub use error::ApiError;
pub use types::{
    ApiResponse, Command, JobsResponse, LibraryStats, SnatchedResponse, StatsResponse,
    VersionInfo, WantedResponse, decode_response,
};
