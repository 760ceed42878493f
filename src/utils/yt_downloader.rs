use std::{ffi::OsString, io, path::PathBuf, sync::Arc};

use axum::body::Bytes;
use futures_util::{stream, stream::BoxStream, StreamExt};
use thiserror::Error;
use tokio::{io::AsyncReadExt, task::JoinHandle};
use tokio_util::io::ReaderStream;
use tracing::{debug, error, info, warn, Instrument, Span};
use url::Url;

use super::{
    diagnostic_log::DiagnosticLog,
    filename::{sanitize_filename, DEFAULT_FILENAME},
    launcher::{ProcessGuard, ToolLauncher, ToolReader},
};

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("yt-dlp was not found. Set YTDLP_PATH or use the bundled binary.")]
    ToolNotFound,
    #[error("{0}")]
    ToolExecution(String),
    #[error("Unable to resolve filename: {0}")]
    FilenameResolution(String),
}

impl GatewayError {
    fn from_spawn(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => {
                error!("yt-dlp could not be started: {}", err);
                GatewayError::ToolNotFound
            }
            _ => GatewayError::ToolExecution(err.to_string()),
        }
    }
}

/// Checks that `raw` is present and parses as an absolute URL.
pub fn validate_url(raw: Option<&str>) -> Result<String, GatewayError> {
    let url = raw.map(str::trim).unwrap_or_default();
    if url.is_empty() {
        return Err(GatewayError::InvalidInput("Missing YouTube URL.".to_string()));
    }

    Url::parse(url).map_err(|e| {
        debug!("rejecting url {:?}: {}", url, e);
        GatewayError::InvalidInput("Invalid URL format.".to_string())
    })?;

    Ok(url.to_string())
}

#[derive(Debug)]
pub struct SavedDownload {
    pub output_dir: PathBuf,
    pub log: String,
}

pub struct VideoDownload {
    pub filename: String,
    pub body: BoxStream<'static, io::Result<Bytes>>,
}

struct Captured {
    stdout: DiagnosticLog,
    stderr: DiagnosticLog,
    exit_code: Option<i32>,
}

async fn drain(mut reader: ToolReader) -> io::Result<DiagnosticLog> {
    let mut log = DiagnosticLog::default();
    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        log.push_bytes(&buf[..n]);
    }
    log.finish();
    Ok(log)
}

async fn collect_log(task: JoinHandle<io::Result<DiagnosticLog>>) -> DiagnosticLog {
    match task.await {
        Ok(Ok(log)) => log,
        Ok(Err(e)) => {
            warn!("failed reading yt-dlp stderr: {}", e);
            DiagnosticLog::default()
        }
        Err(e) => {
            warn!("stderr reader task failed: {}", e);
            DiagnosticLog::default()
        }
    }
}

/// Runs yt-dlp on behalf of HTTP requests, one process per call.
pub struct DownloadGateway {
    launcher: Arc<dyn ToolLauncher>,
    downloads_dir: PathBuf,
}

impl DownloadGateway {
    pub fn new(launcher: Arc<dyn ToolLauncher>, downloads_dir: impl Into<PathBuf>) -> Self {
        DownloadGateway {
            launcher,
            downloads_dir: downloads_dir.into(),
        }
    }

    pub fn command(&self) -> String {
        self.launcher.command()
    }

    fn spawn(&self, args: Vec<OsString>) -> Result<(ToolReader, ToolReader, ProcessGuard), GatewayError> {
        let spawned = self.launcher.spawn(&args).map_err(GatewayError::from_spawn)?;
        Ok((spawned.stdout, spawned.stderr, ProcessGuard::new(spawned.handle)))
    }

    async fn run_to_completion(&self, args: Vec<OsString>) -> Result<Captured, GatewayError> {
        let (stdout, stderr, mut guard) = self.spawn(args)?;

        let (stdout, stderr) = tokio::try_join!(drain(stdout), drain(stderr))
            .map_err(|e| GatewayError::ToolExecution(e.to_string()))?;
        let exit_code = guard
            .wait()
            .await
            .map_err(|e| GatewayError::ToolExecution(e.to_string()))?;

        debug!("yt-dlp exited with {:?}", exit_code);
        Ok(Captured {
            stdout,
            stderr,
            exit_code,
        })
    }

    pub async fn version(&self) -> Result<String, GatewayError> {
        let captured = self.run_to_completion(vec!["--version".into()]).await?;

        if captured.exit_code != Some(0) {
            return Err(GatewayError::ToolExecution(
                captured.stderr.message_or("Unable to run yt-dlp."),
            ));
        }

        Ok(captured.stdout.as_str().trim().to_string())
    }

    /// Asks yt-dlp what it would name the file, without downloading it.
    pub async fn resolve_filename(&self, url: &str) -> Result<String, GatewayError> {
        let args = vec![
            "--no-playlist".into(),
            "--print".into(),
            "filename".into(),
            "-o".into(),
            "%(title)s.%(ext)s".into(),
            "--".into(),
            url.into(),
        ];

        let captured = self.run_to_completion(args).await?;
        let printed = captured.stdout.as_str().trim();

        if captured.exit_code != Some(0) || printed.is_empty() {
            return Err(GatewayError::FilenameResolution(
                captured.stderr.message_or("Unable to resolve filename."),
            ));
        }

        Ok(sanitize_filename(printed))
    }

    /// Starts yt-dlp writing the video to stdout and hands back a stream of
    /// its output.
    ///
    /// Returns once the first chunk has arrived, so a tool failure that
    /// happens before any output still surfaces as an error. Dropping the
    /// returned body kills the process.
    pub async fn stream_download(&self, url: &str) -> Result<VideoDownload, GatewayError> {
        let url = validate_url(Some(url))?;

        let filename = match self.resolve_filename(&url).await {
            Ok(filename) => filename,
            Err(e) => {
                warn!("Unable to resolve filename, continuing with fallback: {}", e);
                DEFAULT_FILENAME.to_string()
            }
        };
        info!("streaming {} as {:?}", url, filename);

        let args = vec![
            "--no-playlist".into(),
            "-f".into(),
            "best".into(),
            "-o".into(),
            "-".into(),
            "--".into(),
            url.into(),
        ];
        let (stdout, stderr, mut guard) = self.spawn(args)?;
        let stderr_task = tokio::spawn(drain(stderr));
        let mut chunks = ReaderStream::new(stdout);

        let first = match chunks.next().await {
            Some(Ok(first)) => first,
            Some(Err(e)) => {
                error!("failed reading yt-dlp output: {}", e);
                return Err(GatewayError::ToolExecution(e.to_string()));
            }
            None => {
                let log = collect_log(stderr_task).await;
                let exit_code = guard
                    .wait()
                    .await
                    .map_err(|e| GatewayError::ToolExecution(e.to_string()))?;

                if exit_code != Some(0) {
                    warn!("yt-dlp exited with {:?} before producing output", exit_code);
                    return Err(GatewayError::ToolExecution(log.message_or("Download failed.")));
                }

                info!("yt-dlp finished without producing output");
                return Ok(VideoDownload {
                    filename,
                    body: stream::empty().boxed(),
                });
            }
        };

        let relay = Relay {
            chunks,
            guard,
            stderr: Some(stderr_task),
            pending: Some(first),
            sent: 0,
            span: Span::current(),
        };

        let body = stream::unfold(Some(relay), |state| async move {
            let relay = state?;
            let span = relay.span.clone();
            relay.next_chunk().instrument(span).await
        })
        .boxed();

        Ok(VideoDownload { filename, body })
    }

    /// Downloads into the configured directory instead of streaming.
    pub async fn save_to_disk(&self, url: &str) -> Result<SavedDownload, GatewayError> {
        let url = validate_url(Some(url))?;

        tokio::fs::create_dir_all(&self.downloads_dir).await.map_err(|e| {
            error!(
                "Failed to create downloads directory {}: {}",
                self.downloads_dir.display(),
                e
            );
            GatewayError::ToolExecution(format!("Unable to create downloads directory: {}", e))
        })?;
        let output_dir = tokio::fs::canonicalize(&self.downloads_dir)
            .await
            .unwrap_or_else(|_| self.downloads_dir.clone());

        info!("saving {} into {}", url, output_dir.display());

        let args = vec![
            "--no-playlist".into(),
            "-o".into(),
            output_dir.join("%(title)s.%(ext)s").into_os_string(),
            "--".into(),
            url.into(),
        ];
        let captured = self.run_to_completion(args).await?;

        if captured.exit_code != Some(0) {
            return Err(GatewayError::ToolExecution(
                captured.stderr.message_or("Download failed."),
            ));
        }

        Ok(SavedDownload {
            output_dir,
            log: captured.stdout.as_str().trim().to_string(),
        })
    }
}

/// Per-request state behind a streaming body. Dropping it mid-stream drops
/// the guard, which kills the process.
struct Relay {
    chunks: ReaderStream<ToolReader>,
    guard: ProcessGuard,
    stderr: Option<JoinHandle<io::Result<DiagnosticLog>>>,
    pending: Option<Bytes>,
    sent: u64,
    span: Span,
}

impl Relay {
    async fn next_chunk(mut self) -> Option<(io::Result<Bytes>, Option<Relay>)> {
        let next = match self.pending.take() {
            Some(chunk) => Some(Ok(chunk)),
            None => self.chunks.next().await,
        };

        match next {
            Some(Ok(chunk)) => {
                self.sent += chunk.len() as u64;
                Some((Ok(chunk), Some(self)))
            }
            Some(Err(e)) => {
                warn!("aborting stream after {} bytes: {}", self.sent, e);
                Some((Err(e), None))
            }
            None => {
                self.finish().await;
                None
            }
        }
    }

    async fn finish(mut self) {
        let log = match self.stderr.take() {
            Some(task) => collect_log(task).await,
            None => DiagnosticLog::default(),
        };
        if !log.is_empty() {
            debug!("captured {} characters of yt-dlp diagnostics", log.len());
        }

        match self.guard.wait().await {
            Ok(Some(0)) => info!("download complete, {} bytes sent", self.sent),
            // Headers are long gone, the client just sees a short file
            Ok(code) => warn!(
                "yt-dlp exited with {:?} after {} bytes were sent: {}",
                code,
                self.sent,
                log.message_or("no diagnostics")
            ),
            Err(e) => error!("failed waiting on yt-dlp: {}", e),
        }
    }
}
