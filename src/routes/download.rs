use std::sync::Arc;

use axum::{
    body::Body,
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::utils::{
    filename::DEFAULT_FILENAME,
    yt_downloader::{validate_url, DownloadGateway, GatewayError},
};

#[derive(Deserialize)]
pub struct DownloadQuery {
    url: Option<String>,
}

static FALLBACK_ATTACHMENT: Lazy<HeaderValue> = Lazy::new(|| {
    HeaderValue::from_str(&format!("attachment; filename=\"{}\"", DEFAULT_FILENAME)).unwrap()
});

fn attachment(filename: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename)).unwrap_or_else(|_| {
        warn!("filename {:?} is not a valid header value, using fallback", filename);
        FALLBACK_ATTACHMENT.clone()
    })
}

pub async fn stream_download(
    State(gateway): State<Arc<DownloadGateway>>,
    query: Result<Query<DownloadQuery>, QueryRejection>,
) -> Result<Response, GatewayError> {
    let span = info_span!("download", request_id = %Uuid::new_v4());
    start_stream(&gateway, query).instrument(span).await
}

async fn start_stream(
    gateway: &DownloadGateway,
    query: Result<Query<DownloadQuery>, QueryRejection>,
) -> Result<Response, GatewayError> {
    // Repeated or malformed `url` params count as no usable url
    let Query(query) = query.map_err(|e| {
        warn!("rejecting download query: {}", e);
        GatewayError::InvalidInput("Missing YouTube URL.".to_string())
    })?;

    let url = validate_url(query.url.as_deref())?;
    info!("received download request for {}", url);

    let download = gateway.stream_download(&url).await?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/octet-stream")),
            (header::CONTENT_DISPOSITION, attachment(&download.filename)),
            (header::CACHE_CONTROL, HeaderValue::from_static("no-store")),
        ],
        Body::from_stream(download.body),
    )
        .into_response())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveResponse {
    ok: bool,
    output_dir: String,
    log: String,
}

pub async fn save_download(
    State(gateway): State<Arc<DownloadGateway>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<SaveResponse>, GatewayError> {
    let span = info_span!("save", request_id = %Uuid::new_v4());
    save(&gateway, payload).instrument(span).await
}

async fn save(
    gateway: &DownloadGateway,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<SaveResponse>, GatewayError> {
    let Json(payload) = payload.map_err(|e| {
        warn!("rejecting save request: {}", e);
        GatewayError::InvalidInput("Invalid JSON payload.".to_string())
    })?;

    let url = validate_url(payload.get("url").and_then(Value::as_str))?;
    info!("received save request for {}", url);

    let saved = gateway.save_to_disk(&url).await?;

    Ok(Json(SaveResponse {
        ok: true,
        output_dir: saved.output_dir.display().to_string(),
        log: saved.log,
    }))
}
