//! Supervision of the bot as a child process.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to stop bot process: {0}")]
    Kill(#[source] std::io::Error),
}

/// A restartable bot child process.
pub struct BotProcess {
    program: PathBuf,
    args: Vec<String>,
    stop_timeout: Duration,
    child: Mutex<Option<Child>>,
}

impl BotProcess {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>, stop_timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            stop_timeout,
            child: Mutex::new(None),
        }
    }

    /// This executable's `run` subcommand.
    pub fn current_exe(stop_timeout: Duration) -> std::io::Result<Self> {
        Ok(Self::new(
            std::env::current_exe()?,
            vec!["run".into()],
            stop_timeout,
        ))
    }

    pub async fn is_running(&self) -> bool {
        match self.child.lock().await.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// Spawn the process unless it is already running.
    ///
    /// Returns `false` when a live process was left in place.
    pub async fn start(&self) -> Result<bool, ProcessError> {
        let mut slot = self.child.lock().await;
        if let Some(child) = slot.as_mut() {
            if matches!(child.try_wait(), Ok(None)) {
                return Ok(false);
            }
        }

        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;
        info!(pid = ?child.id(), program = %self.program.display(), "Bot process started");
        *slot = Some(child);
        Ok(true)
    }

    /// Kill the process and wait for it to exit, up to the stop timeout.
    pub async fn stop(&self) -> Result<(), ProcessError> {
        let Some(mut child) = self.child.lock().await.take() else {
            return Ok(());
        };
        if !matches!(child.try_wait(), Ok(None)) {
            return Ok(());
        }

        child.start_kill().map_err(ProcessError::Kill)?;
        match tokio::time::timeout(self.stop_timeout, child.wait()).await {
            Ok(Ok(status)) => info!(%status, "Bot process stopped"),
            Ok(Err(e)) => return Err(ProcessError::Kill(e)),
            Err(_) => warn!(
                timeout_secs = self.stop_timeout.as_secs(),
                "Bot process did not exit in time"
            ),
        }
        Ok(())
    }

    /// Stop, pause for `grace`, then start again.
    pub async fn restart(&self, grace: Duration) -> Result<(), ProcessError> {
        self.stop().await?;
        tokio::time::sleep(grace).await;
        self.start().await?;
        Ok(())
    }
}
