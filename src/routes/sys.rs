use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;
use tracing::{debug, error};

use crate::utils::yt_downloader::{DownloadGateway, GatewayError};

#[derive(Serialize)]
pub struct HealthResponse {
    ok: bool,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { ok: true })
}

#[derive(Serialize)]
pub struct VersionResponse {
    ok: bool,
    version: String,
    command: String,
}

pub async fn version(
    State(gateway): State<Arc<DownloadGateway>>,
) -> Result<Json<VersionResponse>, GatewayError> {
    let version = gateway.version().await.map_err(|e| {
        error!("yt-dlp version check failed: {}", e);
        e
    })?;
    debug!("yt-dlp version {}", version);

    Ok(Json(VersionResponse {
        ok: true,
        version,
        command: gateway.command(),
    }))
}
