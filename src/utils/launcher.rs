use std::{
    ffi::OsString,
    io,
    path::PathBuf,
    process::Stdio,
};

use async_trait::async_trait;
use tokio::{io::AsyncRead, process::Command};
use tracing::{debug, trace, warn};

pub type ToolReader = Box<dyn AsyncRead + Send + Unpin>;

/// Handle on a running tool process.
#[async_trait]
pub trait ToolHandle: Send {
    /// Waits for the process to exit. `None` means it was killed by a signal.
    async fn wait(&mut self) -> io::Result<Option<i32>>;

    /// Sends a forceful kill without waiting for the process to go away.
    fn start_kill(&mut self) -> io::Result<()>;
}

pub struct SpawnedTool {
    pub stdout: ToolReader,
    pub stderr: ToolReader,
    pub handle: Box<dyn ToolHandle>,
}

/// Starts the external video tool.
pub trait ToolLauncher: Send + Sync {
    fn spawn(&self, args: &[OsString]) -> io::Result<SpawnedTool>;

    /// How the tool is invoked, for display.
    fn command(&self) -> String;
}

pub struct YtDlpLauncher {
    program: PathBuf,
}

impl YtDlpLauncher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        YtDlpLauncher {
            program: program.into(),
        }
    }
}

impl ToolLauncher for YtDlpLauncher {
    fn spawn(&self, args: &[OsString]) -> io::Result<SpawnedTool> {
        debug!("spawning {} with args {:?}", self.program.display(), args);

        let mut command = Command::new(&self.program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(windows)]
        {
            const CREATE_NO_WINDOW: u32 = 0x0800_0000;
            command.creation_flags(CREATE_NO_WINDOW);
        }

        let mut child = command.spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "stdout was not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "stderr was not captured"))?;

        trace!("spawned child with pid {:?}", child.id());

        Ok(SpawnedTool {
            stdout: Box::new(stdout),
            stderr: Box::new(stderr),
            handle: Box::new(ChildHandle(child)),
        })
    }

    fn command(&self) -> String {
        self.program.display().to_string()
    }
}

struct ChildHandle(tokio::process::Child);

#[async_trait]
impl ToolHandle for ChildHandle {
    async fn wait(&mut self) -> io::Result<Option<i32>> {
        let status = self.0.wait().await?;
        Ok(status.code())
    }

    fn start_kill(&mut self) -> io::Result<()> {
        self.0.start_kill()
    }
}

/// Ties a process to the lifetime of whatever owns the guard.
///
/// If the guard is dropped before [`ProcessGuard::wait`] has reaped the
/// process, the process is killed exactly once.
pub struct ProcessGuard {
    handle: Box<dyn ToolHandle>,
    reaped: bool,
}

impl ProcessGuard {
    pub fn new(handle: Box<dyn ToolHandle>) -> Self {
        ProcessGuard {
            handle,
            reaped: false,
        }
    }

    pub async fn wait(&mut self) -> io::Result<Option<i32>> {
        let code = self.handle.wait().await?;
        self.reaped = true;
        Ok(code)
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        if self.reaped {
            return;
        }

        debug!("tool process abandoned before exit, killing it");
        if let Err(e) = self.handle.start_kill() {
            warn!("failed to kill tool process: {}", e);
        }
    }
}
