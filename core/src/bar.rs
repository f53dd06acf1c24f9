//! Delivery of [`BarCommand`]s to the status bar.

use crate::{BarCommand, SensorError};
use async_trait::async_trait;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time;

/// Anything that can receive bar commands.
///
/// Delivery is one-way: implementations report whether the command was
/// accepted but never return data from the bar.
#[async_trait]
pub trait BarClient: Send {
    /// Deliver a single command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command could not be handed to the bar.
    async fn send(&mut self, command: &BarCommand) -> Result<(), SensorError>;
}

/// Delivers commands by running the `sketchybar` executable.
#[derive(Debug, Clone)]
pub struct SketchyBar {
    program: PathBuf,
    timeout: Duration,
}

impl SketchyBar {
    /// Executable looked up on `PATH` when nothing else is configured.
    pub const DEFAULT_PROGRAM: &'static str = "sketchybar";

    /// Upper bound on a single delivery.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Create a client for a specific executable.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Set the delivery timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The executable this client runs.
    #[must_use]
    pub fn program(&self) -> &std::path::Path {
        &self.program
    }
}

impl Default for SketchyBar {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PROGRAM)
    }
}

#[async_trait]
impl BarClient for SketchyBar {
    async fn send(&mut self, command: &BarCommand) -> Result<(), SensorError> {
        let child = Command::new(&self.program)
            .args(command.args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                SensorError::delivery(
                    command,
                    format!("could not run {}: {}", self.program().display(), e),
                )
            })?;

        // Dropping the future on timeout drops the child, which kills it.
        let output = match time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => {
                return Err(SensorError::timeout(
                    self.timeout,
                    format!("delivering `{}`", command),
                ))
            }
        };

        if output.status.success() {
            tracing::trace!(event = command.event(), %command, "delivered");
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(SensorError::delivery(
                command,
                format!(
                    "{} exited with {}: {}",
                    self.program().display(),
                    output.status,
                    stderr.trim()
                ),
            ))
        }
    }
}

/// Writes each command in message form, one per line.
///
/// Used for `--print` mode and for piping into other tools.
#[derive(Debug)]
pub struct PrintBar<W> {
    out: W,
}

impl<W: Write + Send> PrintBar<W> {
    /// Wrap an arbitrary writer.
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Consume the client, returning the writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl PrintBar<io::Stdout> {
    /// Print to standard output.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

#[async_trait]
impl<W: Write + Send> BarClient for PrintBar<W> {
    async fn send(&mut self, command: &BarCommand) -> Result<(), SensorError> {
        writeln!(self.out, "{}", command)?;
        self.out.flush()?;
        Ok(())
    }
}
