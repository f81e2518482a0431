//! Structured logging utilities for Strata
//!
//! All logs use structured fields for easy parsing and analysis.
//!
//! # Log Format Conventions
//!
//! - `operation`: The operation being performed (e.g., "context.build", "store.fetch")
//! - `status`: The result status ("success", "hit", "error")
//! - `app`: Application name
//! - `context_id`: Context content hash
//! - `stage`: Pipeline stage name
//!
//! # Examples
//!
//! ```rust,ignore
//! use tracing::info;
//!
//! info!(
//!     operation = "context.build",
//!     status = "success",
//!     app = "fraud",
//!     context_id = %ctx.id(),
//!     resource_count = ctx.resource_count(),
//!     "context built"
//! );
//! ```

use std::{fmt as std_fmt, io};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{
    fmt::{self, format::Writer},
    prelude::*,
    EnvFilter,
};

/// Custom formatter that shows "strata" instead of full module path
struct StrataFormatter {
    with_ansi: bool,
}

impl<S, N> FormatEvent<S, N> for StrataFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std_fmt::Result {
        let meta = event.metadata();

        write!(
            writer,
            "{} ",
            chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ")
        )?;

        if self.with_ansi {
            let level_style = match *meta.level() {
                tracing::Level::ERROR => "\x1b[31m", // Red
                tracing::Level::WARN => "\x1b[33m",  // Yellow
                tracing::Level::INFO => "\x1b[32m",  // Green
                tracing::Level::DEBUG => "\x1b[34m", // Blue
                tracing::Level::TRACE => "\x1b[35m", // Magenta
            };
            write!(writer, "{}{:5}(strata)\x1b[0m: ", level_style, meta.level())?;
        } else {
            write!(writer, "{:5}(strata): ", meta.level())?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

/// Log format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format (default for development)
    Pretty,
    /// Compact format (for CI/production)
    Compact,
    /// JSON format (for log aggregation systems)
    Json,
}

impl LogFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "compact" => Some(Self::Compact),
            "pretty" => Some(Self::Pretty),
            _ => None,
        }
    }

    /// Parse from environment variable (STRATA_LOG_FORMAT)
    pub fn from_env() -> Self {
        let value = std::env::var("STRATA_LOG_FORMAT").unwrap_or_default();
        Self::parse(&value).unwrap_or_else(|| {
            // Default: pretty for dev, compact for CI
            if std::env::var("CI").is_ok() {
                Self::Compact
            } else {
                Self::Pretty
            }
        })
    }
}

/// Initialize the global tracing subscriber
///
/// # Environment Variables
///
/// - `RUST_LOG`: Set log level (e.g., "debug", "info", "warn"), overrides `default_level`
/// - `STRATA_LOG_FORMAT`: Set format ("pretty", "compact", "json"), overrides `format`
/// - `CI`: If set, defaults to compact format
pub fn init(default_level: &str, format: Option<LogFormat>) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let format = match std::env::var("STRATA_LOG_FORMAT") {
        Ok(_) => LogFormat::from_env(),
        Err(_) => format.unwrap_or_else(LogFormat::from_env),
    };

    // try_init: tests and embedders may have installed a subscriber already
    let _ = match format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .event_format(StrataFormatter { with_ansi: true })
                    .with_writer(io::stderr),
            )
            .try_init(),
        LogFormat::Compact => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .event_format(StrataFormatter { with_ansi: false })
                    .with_writer(io::stderr),
            )
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_file(false)
                    .with_line_number(false)
                    .with_ansi(false)
                    .with_writer(io::stderr)
                    .json(),
            )
            .try_init(),
    };
}

/// Operation names for consistent logging
pub mod operations {
    pub const BUILD: &str = "context.build";
    pub const STAGE: &str = "context.stage";
    pub const VALIDATE: &str = "context.validate";
    pub const RESOLVE_VERSION: &str = "dataset_version.resolve";
    pub const FETCH: &str = "store.fetch";
    pub const PERSIST: &str = "store.persist";
    pub const WRITE_STATUS: &str = "store.write_status";
    pub const READ_STATUS: &str = "store.read_status";
    pub const LOAD_FILES: &str = "files.load";
}

/// Status values for consistent logging
pub mod status {
    pub const SUCCESS: &str = "success";
    pub const HIT: &str = "hit";
    pub const MISS: &str = "miss";
    pub const CREATED: &str = "created";
    pub const INVALIDATED: &str = "invalidated";
    pub const CONFLICT: &str = "conflict";
    pub const ERROR: &str = "error";
    pub const NOT_FOUND: &str = "not_found";
}
