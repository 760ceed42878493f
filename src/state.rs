use std::sync::Arc;

use axum::extract::FromRef;

use crate::utils::yt_downloader::DownloadGateway;

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<DownloadGateway>,
}

impl AppState {
    pub fn new(gateway: Arc<DownloadGateway>) -> Self {
        AppState { gateway }
    }
}

impl FromRef<AppState> for Arc<DownloadGateway> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.gateway.clone()
    }
}
