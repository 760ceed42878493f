use std::sync::Arc;

use axum::serve;
use dotenv::dotenv;
use router::create_router_with_state;
use settings::{Settings, StartupError};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};
use utils::{binary::resolve_ytdlp, launcher::YtDlpLauncher};

mod router;
mod routes;
mod settings;
mod state;
mod utils;

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    // Initialize environment
    dotenv().ok();

    // Initialize logging with timestamps and target info
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("tubegate=debug,tower_http=debug")),
        )
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    info!("Starting tubegate server");
    debug!("Loading settings from environment");

    let settings = Settings::from_env().map_err(|e| {
        error!("Failed to load settings: {}", e);
        StartupError::Config(e)
    })?;
    debug!("Loaded settings: {:?}", settings);

    let ytdlp = resolve_ytdlp(&settings);
    let launcher = Arc::new(YtDlpLauncher::new(ytdlp));

    debug!("Configuring CORS");
    let cors_layer = settings.cors_layer();

    info!("Creating router and configuring middleware");
    let app = create_router_with_state(launcher, settings.downloads_dir.clone())
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", settings.port);
    info!("Starting server on {}", addr);
    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        error!("Failed to bind {}: {}", addr, e);
        StartupError::Io(e)
    })?;

    info!("Downloader service listening on port {}", settings.port);
    match serve(listener, app).await {
        Ok(_) => info!("Server shutdown gracefully"),
        Err(e) => error!("Server error: {}", e),
    }

    Ok(())
}
