//! Child process abstraction.
//!
//! The runner only needs two readable pipes and a future resolving to the
//! exit code, so tests can substitute in-memory children.

use std::io;
use std::process::Stdio;

use futures::future::BoxFuture;
use tokio::io::AsyncRead;
use tokio::process::Command;
use tracing::debug;

/// A spawned child with piped output.
pub struct ChildProcess {
    pub stdout: Box<dyn AsyncRead + Send + Unpin>,
    pub stderr: Box<dyn AsyncRead + Send + Unpin>,
    /// Resolves to the exit code, or `None` if the child was killed by a
    /// signal. Dropping it kills a still-running child.
    pub exit: BoxFuture<'static, io::Result<Option<i32>>>,
}

/// Spawns child processes.
pub trait ProcessLauncher: Send + Sync {
    /// Starts `argv[0]` with the remaining arguments.
    fn spawn(&self, argv: &[String]) -> io::Result<ChildProcess>;
}

/// Launcher backed by `tokio::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioLauncher;

impl ProcessLauncher for TokioLauncher {
    fn spawn(&self, argv: &[String]) -> io::Result<ChildProcess> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty command line"))?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        debug!("Spawned {} (pid {:?})", program, child.id());

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("stdout not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| io::Error::other("stderr not captured"))?;

        Ok(ChildProcess {
            stdout: Box::new(stdout),
            stderr: Box::new(stderr),
            exit: Box::pin(async move { child.wait().await.map(|status| status.code()) }),
        })
    }
}
