//! # sketchysensor-rs-core
//!
//! Core library for the sketchysensor-rs event providers, shared plumbing for
//! feeding system statistics into SketchyBar.
//!
//! ## Features
//!
//! - **Bar protocol** - Typed `--add event` / `--trigger` commands
//! - **Delivery seam** - The [`BarClient`] trait with process and stdout implementations
//! - **Configuration** - Optional RON configuration file
//! - **Logging** - `tracing` subscriber setup shared by every provider binary
//! - **Error handling** - Comprehensive error types with context
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sketchysensor_rs_core::{BarClient, BarCommand, SketchyBar};
//!
//! # async fn demo() -> Result<(), sketchysensor_rs_core::SensorError> {
//! let mut bar = SketchyBar::default();
//! bar.send(&BarCommand::add_event("ram_update")).await?;
//! bar.send(&BarCommand::trigger("ram_update").with_var("used_percentage", 42)).await?;
//! # Ok(())
//! # }
//! ```

use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;

pub mod bar;
pub mod logging;

pub use bar::{BarClient, PrintBar, SketchyBar};

/// A single command understood by the SketchyBar CLI.
///
/// Providers only ever talk to the bar in one direction: an event is declared
/// once with [`BarCommand::AddEvent`], then fired repeatedly with
/// [`BarCommand::Trigger`], each time carrying a set of `key=value` variables.
///
/// # Examples
///
/// ```rust
/// use sketchysensor_rs_core::BarCommand;
///
/// let cmd = BarCommand::trigger("ram_update")
///     .with_var("used_percentage", 50)
///     .with_var("used_gb", "8.00");
///
/// assert_eq!(cmd.args(), vec!["--trigger", "ram_update", "used_percentage=50", "used_gb=8.00"]);
/// assert_eq!(cmd.to_string(), "--trigger 'ram_update' used_percentage='50' used_gb='8.00'");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BarCommand {
    /// Declare a custom event.
    AddEvent {
        /// Event identifier
        event: String,
    },
    /// Fire a previously declared event.
    Trigger {
        /// Event identifier
        event: String,
        /// Variables exported to the event's scripts, in insertion order
        vars: Vec<(String, String)>,
    },
}

impl BarCommand {
    /// Create an `--add event` command.
    #[must_use]
    pub fn add_event(event: impl Into<String>) -> Self {
        Self::AddEvent {
            event: event.into(),
        }
    }

    /// Create a `--trigger` command without variables.
    #[must_use]
    pub fn trigger(event: impl Into<String>) -> Self {
        Self::Trigger {
            event: event.into(),
            vars: Vec::new(),
        }
    }

    /// Attach a variable to a trigger command.
    ///
    /// Has no effect on [`BarCommand::AddEvent`].
    #[must_use]
    pub fn with_var(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        if let Self::Trigger { vars, .. } = &mut self {
            vars.push((key.into(), value.to_string()));
        }
        self
    }

    /// The event this command refers to.
    #[must_use]
    pub fn event(&self) -> &str {
        match self {
            Self::AddEvent { event } | Self::Trigger { event, .. } => event,
        }
    }

    /// Argument vector for the `sketchybar` executable.
    #[must_use]
    pub fn args(&self) -> Vec<String> {
        match self {
            Self::AddEvent { event } => vec!["--add".to_owned(), "event".to_owned(), event.clone()],
            Self::Trigger { event, vars } => {
                let mut args = Vec::with_capacity(vars.len() + 2);
                args.push("--trigger".to_owned());
                args.push(event.clone());
                args.extend(vars.iter().map(|(k, v)| format!("{}={}", k, v)));
                args
            }
        }
    }
}

impl fmt::Display for BarCommand {
    /// Renders the textual message form, with values single-quoted.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddEvent { event } => write!(f, "--add event '{}'", event),
            Self::Trigger { event, vars } => {
                write!(f, "--trigger '{}'", event)?;
                for (key, value) in vars {
                    write!(f, " {}='{}'", key, value)?;
                }
                Ok(())
            }
        }
    }
}

/// Configuration loaded from an explicitly supplied RON file.
///
/// Every field is optional in the file; missing fields fall back to the
/// defaults below.
///
/// ```ron
/// (
///     bar_command: "sketchybar",
///     delivery_timeout_ms: 5000,
///     log_level: "warn",
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Executable used to deliver commands to the bar
    pub bar_command: String,
    /// How long a single delivery may take before it is abandoned
    pub delivery_timeout_ms: u64,
    /// Log filter used when no `-v` flag is given
    pub log_level: Option<String>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            bar_command: SketchyBar::DEFAULT_PROGRAM.to_owned(),
            delivery_timeout_ms: 5000,
            log_level: None,
        }
    }
}

impl GlobalConfig {
    /// Load and validate configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> Result<Self, SensorError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_ron(&content)
    }

    /// Parse and validate configuration from RON text.
    pub fn from_ron(content: &str) -> Result<Self, SensorError> {
        let config: GlobalConfig = ron::from_str(content)
            .map_err(|e| SensorError::parse_with_source("Failed to parse config file", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Check field values that the deserializer cannot.
    pub fn validate(&self) -> Result<(), SensorError> {
        if self.bar_command.trim().is_empty() {
            return Err(SensorError::config("bar_command must not be empty"));
        }
        if self.delivery_timeout_ms == 0 {
            return Err(SensorError::config_with_value(
                "delivery_timeout_ms must be greater than zero",
                "0",
            ));
        }
        Ok(())
    }

    /// Delivery timeout as a [`Duration`].
    #[must_use]
    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.delivery_timeout_ms)
    }

    /// Apply a command line override for the bar executable.
    #[must_use]
    pub fn with_bar_command(mut self, bar_command: Option<String>) -> Self {
        if let Some(command) = bar_command {
            self.bar_command = command;
        }
        self
    }
}

/// Formatting helpers shared by providers.
pub mod format {
    /// Bytes in one gibibyte.
    pub const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

    /// Convert a byte count to gibibytes.
    #[must_use]
    pub fn bytes_to_gib(bytes: u64) -> f64 {
        bytes as f64 / GIB
    }

    /// Fixed two decimal rendering used in trigger variables.
    #[must_use]
    pub fn two_decimals(value: f64) -> String {
        format!("{:.2}", value)
    }

    /// Format bytes in human-readable form (B, KB, MB, GB, TB).
    #[must_use]
    pub fn bytes_to_human(bytes: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = bytes as f64;
        let mut unit = 0;

        while size >= 1024.0 && unit < UNITS.len() - 1 {
            size /= 1024.0;
            unit += 1;
        }

        if unit == 0 {
            format!("{}{}", bytes, UNITS[0])
        } else {
            format!("{:.1}{}", size, UNITS[unit])
        }
    }
}

/// Common error types for sensor operations.
#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    /// I/O error occurred while reading sensor data.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error parsing sensor data from text format.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of what failed to parse
        message: String,
        /// Optional source error for chaining
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration error (invalid settings, etc.).
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration issue
        message: String,
        /// The invalid configuration value if applicable
        value: Option<String>,
    },

    /// Sensor is not available on this system.
    #[error("Sensor unavailable: {reason}")]
    Unavailable {
        /// Reason why the sensor is unavailable
        reason: String,
        /// Whether this is a temporary or permanent condition
        is_temporary: bool,
    },

    /// A kernel or libc call reported failure.
    #[error("{call} failed with code {code}")]
    Os {
        /// Name of the failing call
        call: &'static str,
        /// Raw return or errno value
        code: i64,
    },

    /// The bar did not accept a command.
    #[error("Failed to deliver `{command}`: {message}")]
    Delivery {
        /// The command in message form
        command: String,
        /// What went wrong
        message: String,
    },

    /// Timeout occurred while talking to an external process.
    #[error("Timeout after {duration:?} while {operation}")]
    Timeout {
        /// How long the operation took before timing out
        duration: Duration,
        /// Description of what operation timed out
        operation: String,
    },
}

impl SensorError {
    /// Create a new parse error with a source error.
    pub fn parse_with_source<S: Into<String>, E>(message: S, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Parse {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a new configuration error.
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
            value: None,
        }
    }

    /// Create a new configuration error with the invalid value.
    pub fn config_with_value<S: Into<String>, V: Into<String>>(message: S, value: V) -> Self {
        Self::Config {
            message: message.into(),
            value: Some(value.into()),
        }
    }

    /// Create a new unavailable error.
    pub fn unavailable<S: Into<String>>(reason: S) -> Self {
        Self::Unavailable {
            reason: reason.into(),
            is_temporary: false,
        }
    }

    /// Create a new temporary unavailable error.
    pub fn temporarily_unavailable<S: Into<String>>(reason: S) -> Self {
        Self::Unavailable {
            reason: reason.into(),
            is_temporary: true,
        }
    }

    /// Create a new OS call error.
    pub fn os(call: &'static str, code: impl Into<i64>) -> Self {
        Self::Os {
            call,
            code: code.into(),
        }
    }

    /// Create a new delivery error.
    pub fn delivery<C: fmt::Display, S: Into<String>>(command: C, message: S) -> Self {
        Self::Delivery {
            command: command.to_string(),
            message: message.into(),
        }
    }

    /// Create a new timeout error.
    pub fn timeout<S: Into<String>>(duration: Duration, operation: S) -> Self {
        Self::Timeout {
            duration,
            operation: operation.into(),
        }
    }

    /// Check if this error represents a temporary condition.
    #[must_use]
    pub fn is_temporary(&self) -> bool {
        match self {
            Self::Unavailable { is_temporary, .. } => *is_temporary,
            Self::Timeout { .. } | Self::Delivery { .. } => true,
            Self::Io(err) => matches!(
                err.kind(),
                std::io::ErrorKind::Interrupted | std::io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }
}
