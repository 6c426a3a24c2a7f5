use std::path::PathBuf;
use std::sync::Arc;
use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

mod camera_resolver;
mod config;
mod errors;
mod handlers;
mod nvr;
mod recording;
mod recording_files;
mod utils;

#[cfg(test)]
mod testing;

use camera_resolver::CameraResolver;
use config::Config;
use nvr::qvr_pro::QvrProConnector;
use nvr::NvrConnector;
use recording::RecordingManager;

#[derive(Parser, Debug)]
#[command(name = "qvr-recording-proxy")]
#[command(about = "HTTP facade for fetching and saving QVR Pro recordings")]
#[command(version)]
struct Cli {
    /// Path to the JSON options file
    #[arg(short, long, default_value = config::DEFAULT_OPTIONS_PATH)]
    options: PathBuf,

    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = 5000)]
    port: u16,

    /// Allowed CORS origin, `*` for any
    #[arg(long)]
    cors_allow_origin: Option<String>,
}

/// State handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub connector: Arc<dyn NvrConnector>,
    pub recordings: RecordingManager,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "qvr_recording_proxy=debug,info".into()),
        )
        .init();

    let cli = Cli::parse();

    let config = Config::load(&cli.options).unwrap_or_else(|e| {
        warn!("Could not load {}: {}, using default configuration", cli.options.display(), e);
        Config::default()
    });

    info!(
        recording_dir = %config.recording_dir.display(),
        camera = ?config.camera_guid,
        nvr = ?config.nvr,
        "Configuration loaded"
    );

    let connector = QvrProConnector::new(config.nvr.clone())
        .map_err(|e| anyhow::anyhow!("Failed to build QVR Pro client: {}", e))?;

    let state = AppState {
        connector: Arc::new(connector),
        recordings: RecordingManager::new(
            config.recording_dir.clone(),
            CameraResolver::new(config.camera_guid.clone()),
        ),
    };

    let app = handlers::build_router(state).layer(cors_layer(cli.cors_allow_origin.as_deref()));

    let addr = format!("{}:{}", cli.host, cli.port);
    start_http_server(app, &addr).await
}

fn cors_layer(origin: Option<&str>) -> tower_http::cors::CorsLayer {
    match origin {
        None | Some("*") => tower_http::cors::CorsLayer::permissive(),
        Some(origin) => match origin.parse::<axum::http::HeaderValue>() {
            Ok(origin_header) => tower_http::cors::CorsLayer::new()
                .allow_origin(origin_header)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
            Err(_) => {
                warn!("Invalid CORS origin '{}', falling back to permissive", origin);
                tower_http::cors::CorsLayer::permissive()
            }
        },
    }
}

async fn start_http_server(app: axum::Router, addr: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("HTTP server listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
