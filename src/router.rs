use std::{path::PathBuf, sync::Arc};

use axum::{routing::get, Router};

use crate::routes::download::{save_download, stream_download};
use crate::routes::sys::{health, version};
use crate::state::AppState;
use crate::utils::launcher::ToolLauncher;
use crate::utils::yt_downloader::DownloadGateway;

pub fn create_router_with_state(
    launcher: Arc<dyn ToolLauncher>,
    downloads_dir: impl Into<PathBuf>,
) -> Router {
    let gateway = Arc::new(DownloadGateway::new(launcher, downloads_dir));
    let app_state = AppState::new(gateway);

    Router::new()
        .route("/health", get(health))
        .route("/version", get(version))
        .route("/download", get(stream_download).post(save_download))
        .with_state(app_state)
}
