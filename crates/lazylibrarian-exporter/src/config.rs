use std::time::Duration;

use clap::{Parser, ValueEnum};
use lazylibrarian_client::TargetConfig;
use lazylibrarian_common::error::{ExporterError, Result};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(
    name = "lazylibrarian_exporter",
    version,
    about = "Prometheus exporter for LazyLibrarian"
)]
pub struct Cli {
    /// Address to listen on for telemetry; `:port` binds every interface
    #[arg(
        long = "web.listen-address",
        env = "LAZYLIBRARIAN_EXPORTER_LISTEN_ADDRESS",
        default_value = ":9733"
    )]
    pub listen_address: String,

    /// Path under which to expose metrics
    #[arg(
        long = "web.telemetry-path",
        env = "LAZYLIBRARIAN_EXPORTER_TELEMETRY_PATH",
        default_value = "/metrics"
    )]
    pub telemetry_path: String,

    /// Base URL of the LazyLibrarian API, e.g. http://localhost:5299/api
    #[arg(long = "lazylibrarian.url", env = "LAZYLIBRARIAN_URL")]
    pub url: Option<String>,

    /// LazyLibrarian API key
    #[arg(
        long = "lazylibrarian.api-key",
        env = "LAZYLIBRARIAN_API_KEY",
        hide_env_values = true
    )]
    pub api_key: Option<String>,

    /// Timeout for each request to LazyLibrarian (e.g. 500ms, 5s, 1m30s)
    #[arg(
        long = "lazylibrarian.timeout",
        env = "LAZYLIBRARIAN_TIMEOUT",
        default_value = "5s",
        value_parser = parse_duration
    )]
    pub timeout: Duration,

    #[arg(
        long = "log.format",
        env = "LAZYLIBRARIAN_EXPORTER_LOG_FORMAT",
        value_enum,
        default_value_t = LogFormat::Text
    )]
    pub log_format: LogFormat,
}

/// Validated startup configuration.
#[derive(Debug, Clone)]
pub struct ExporterConfig {
    pub listen_address: String,
    pub metrics_path: String,
    pub target: TargetConfig,
}

impl ExporterConfig {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let url = required(cli.url.as_deref(), "--lazylibrarian.url")?;
        let api_key = required(cli.api_key.as_deref(), "--lazylibrarian.api-key")?;
        validate_base_url(url)?;
        validate_metrics_path(&cli.telemetry_path)?;

        if cli.timeout.is_zero() {
            return Err(ExporterError::InvalidArgument(
                "--lazylibrarian.timeout must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            listen_address: normalize_listen_address(&cli.listen_address),
            metrics_path: cli.telemetry_path.clone(),
            target: TargetConfig::new(url, api_key).with_timeout(cli.timeout),
        })
    }
}

fn required<'a>(value: Option<&'a str>, flag: &str) -> Result<&'a str> {
    match value.map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(ExporterError::InvalidArgument(format!("{flag} is required"))),
    }
}

fn validate_base_url(value: &str) -> Result<()> {
    let url = Url::parse(value).map_err(|err| {
        ExporterError::InvalidArgument(format!("invalid --lazylibrarian.url {value:?}: {err}"))
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ExporterError::InvalidArgument(format!(
            "--lazylibrarian.url must use http or https, got {}",
            url.scheme()
        )));
    }

    Ok(())
}

fn validate_metrics_path(path: &str) -> Result<()> {
    if !path.starts_with('/') || path == "/" {
        return Err(ExporterError::InvalidArgument(format!(
            "--web.telemetry-path must start with '/' and must not be '/', got {path:?}"
        )));
    }

    // axum treats these as captures or wildcards and refuses them as literals.
    let has_capture = path.contains(['{', '}'])
        || path
            .split('/')
            .any(|segment| segment.starts_with(':') || segment.starts_with('*'));
    if has_capture {
        return Err(ExporterError::InvalidArgument(format!(
            "--web.telemetry-path must be a literal path without ':', '*', '{{' or '}}' captures, got {path:?}"
        )));
    }

    Ok(())
}

fn normalize_listen_address(address: &str) -> String {
    if address.starts_with(':') {
        format!("0.0.0.0{address}")
    } else {
        address.to_string()
    }
}

/// Parses a humantime duration such as `1m30s`, or a bare number of seconds.
pub fn parse_duration(value: &str) -> std::result::Result<Duration, humantime::DurationError> {
    let value = value.trim();
    match value.parse::<u64>() {
        Ok(seconds) => Ok(Duration::from_secs(seconds)),
        Err(_) => humantime::parse_duration(value),
    }
}
