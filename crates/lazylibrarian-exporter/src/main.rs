mod config;

use std::sync::Arc;

use clap::Parser;
use lazylibrarian_client::ApiClient;
use lazylibrarian_metrics::{ExporterState, exporter_router};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{Cli, ExporterConfig, LogFormat};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let config = ExporterConfig::from_cli(&cli)?;
    info!(
        target_url = %config.target.base_url,
        timeout = ?config.target.timeout,
        metrics_path = %config.metrics_path,
        "starting lazylibrarian exporter"
    );

    let client = ApiClient::new(config.target.clone())?;
    let state = Arc::new(ExporterState::new(Arc::new(client), config.metrics_path.clone())?);
    let app = exporter_router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_address).await?;
    info!(address = %config.listen_address, "lazylibrarian exporter listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutdown complete");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(env_filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl-c, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
