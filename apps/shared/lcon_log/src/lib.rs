//! Centralized logging for the developer console applications
//!
//! Provides a custom formatter for tracing that:
//! - Formats thread IDs as #N instead of ThreadId(N)
//! - Extracts `runtime_type` and `source` fields to display script output as `lua::console`
//! - Strips the application prefix from targets for cleaner output
//! - Handles raw mode terminal output with proper `\r\n` line endings
//! - Filters external dependency logs based on the `LCON_LOGDEPS` environment variable
//!
//! # Environment Variables
//!
//! - `LCON_LOGDEPS`: Set to `1` to enable logging from external dependencies (mlua, tokio, ...).
//!   Default is `0` which only shows logs from the console crates.
//!
//! # Usage
//!
//! ```rust,ignore
//! use lcon_log::{init_logging, LogConfig};
//! use tracing::Level;
//!
//! // Console output only
//! let config: LogConfig = LogConfig::new("lcon_console::");
//! init_logging(config)?;
//!
//! // File only, while the terminal front-end owns stdout
//! let file = std::fs::File::create("lcon.log")?;
//! let config = LogConfig::new("lcon_console::")
//!     .with_log_file(file)
//!     .with_stdout(false)
//!     .with_level(Level::DEBUG);
//! init_logging(config)?;
//! ```

use std::fmt as std_fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::Level;
use tracing::field::Field;
use tracing_subscriber::field::Visit;
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_subscriber::fmt::{
    self, FmtContext, FormatEvent, FormatFields, MakeWriter, format::Writer,
};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

/// Crates whose logs pass the default filter.
const OWN_TARGETS: &[&str] = &[
    "lcon_console",
    "lcon_scripting",
    "lcon_schema",
    "lcon_log",
    "lua",
];

/// Global flag indicating whether terminal is in raw mode
static RAW_MODE_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Set the raw mode state for logging
///
/// When raw mode is active, the logger will use `\r\n` line endings
/// instead of just `\n` for proper terminal output.
pub fn set_raw_mode_active(active: bool) {
    RAW_MODE_ACTIVE.store(active, Ordering::Relaxed);
}

/// Check if the terminal is currently in raw mode
pub fn is_raw_mode_active() -> bool {
    RAW_MODE_ACTIVE.load(Ordering::Relaxed)
}

/// A writer that converts `\n` to `\r\n` for raw mode terminal output.
///
/// In raw mode, the terminal doesn't automatically convert newlines,
/// so we need to explicitly use carriage return + line feed.
pub struct RawModeWriter<W> {
    inner: W,
}

impl<W: Write> RawModeWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for RawModeWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !is_raw_mode_active() {
            return self.inner.write(buf);
        }

        let mut start = 0;
        for (i, &byte) in buf.iter().enumerate() {
            if byte == b'\n' {
                if i > start {
                    self.inner.write_all(&buf[start..i])?;
                }
                self.inner.write_all(b"\r\n")?;
                start = i + 1;
            }
        }
        if start < buf.len() {
            self.inner.write_all(&buf[start..])?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// A MakeWriter that wraps stdout with RawModeWriter
pub struct RawModeStdoutWriter;

impl<'a> MakeWriter<'a> for RawModeStdoutWriter {
    type Writer = RawModeWriter<io::Stdout>;

    fn make_writer(&'a self) -> Self::Writer {
        RawModeWriter::new(io::stdout())
    }
}

/// Field extractor for `runtime_type`, `source` and `message` fields
///
/// Script-originated events carry both `runtime_type` and `source`
/// and are printed as `lua::console: message`.
#[derive(Default)]
pub struct FieldExtractor {
    pub runtime_type: Option<String>,
    pub source: Option<String>,
    pub message: Option<String>,
}

impl FieldExtractor {
    fn store(&mut self, name: &str, value: String) {
        match name {
            "runtime_type" => self.runtime_type = Some(value),
            "source" => self.source = Some(value),
            "message" => self.message = Some(value),
            _ => {}
        }
    }
}

impl Visit for FieldExtractor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.store(field.name(), value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std_fmt::Debug) {
        self.store(
            field.name(),
            format!("{:?}", value).trim_matches('"').to_string(),
        );
    }
}

/// Custom event formatter
///
/// - Thread IDs displayed as #N instead of ThreadId(N)
/// - Script logs formatted as `lua::source: message`
/// - Configurable ANSI color support and target prefix stripping
pub struct CustomFormatter<T> {
    timer: T,
    ansi: bool,
    /// Prefix to strip from log targets (e.g., "lcon_console::")
    strip_prefix: Option<String>,
}

impl<T> CustomFormatter<T> {
    /// Create a new CustomFormatter
    ///
    /// # Arguments
    /// * `timer` - The time formatter to use
    /// * `ansi` - Whether to use ANSI color codes
    pub fn new(timer: T, ansi: bool) -> Self {
        Self {
            timer,
            ansi,
            strip_prefix: None,
        }
    }

    /// Set the prefix to strip from log targets
    pub fn with_strip_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.strip_prefix = Some(prefix.into());
        self
    }

    /// Target as it should be displayed, or `None` when it is the bare app name
    fn display_target<'t>(&self, target: &'t str) -> Option<&'t str> {
        let Some(prefix) = &self.strip_prefix else {
            return (!target.is_empty()).then_some(target);
        };
        let app_name = prefix.trim_end_matches("::");
        if target == app_name || target.is_empty() {
            return None;
        }
        Some(target.strip_prefix(prefix.as_str()).unwrap_or(target))
    }
}

impl<T: Clone> Clone for CustomFormatter<T> {
    fn clone(&self) -> Self {
        Self {
            timer: self.timer.clone(),
            ansi: self.ansi,
            strip_prefix: self.strip_prefix.clone(),
        }
    }
}

impl<S, N, T> FormatEvent<S, N> for CustomFormatter<T>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
    T: fmt::time::FormatTime,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std_fmt::Result {
        let metadata = event.metadata();

        let (dim_start, dim_end) = if self.ansi {
            ("\x1b[2m", "\x1b[0m")
        } else {
            ("", "")
        };
        let (level_color, level_str) = match *metadata.level() {
            Level::ERROR => (if self.ansi { "\x1b[31m" } else { "" }, "ERROR"),
            Level::WARN => (if self.ansi { "\x1b[33m" } else { "" }, " WARN"),
            Level::INFO => (if self.ansi { "\x1b[32m" } else { "" }, " INFO"),
            Level::DEBUG => (if self.ansi { "\x1b[34m" } else { "" }, "DEBUG"),
            Level::TRACE => (if self.ansi { "\x1b[35m" } else { "" }, "TRACE"),
        };
        let color_end = if self.ansi { "\x1b[0m" } else { "" };

        write!(writer, "{}", dim_start)?;
        self.timer.format_time(&mut writer)?;
        write!(writer, "{} ", dim_end)?;

        write!(writer, "{}{}{} ", level_color, level_str, color_end)?;

        let thread_id = format!("{:?}", std::thread::current().id());
        if let Some(num) = thread_id
            .strip_prefix("ThreadId(")
            .and_then(|s| s.strip_suffix(")"))
            .and_then(|s| s.parse::<u64>().ok())
        {
            write!(writer, "#{:03} ", num)?;
        }

        let mut extractor = FieldExtractor::default();
        event.record(&mut extractor);

        if let (Some(rt), Some(source)) = (&extractor.runtime_type, &extractor.source) {
            write!(writer, "{}{}::{}{}: ", dim_start, rt, source, dim_end)?;
            if let Some(msg) = &extractor.message {
                write!(writer, "{}", msg)?;
            }
        } else {
            if let Some(target) = self.display_target(metadata.target()) {
                write!(writer, "{}{}{}: ", dim_start, target, dim_end)?;
            }
            ctx.field_format().format_fields(writer.by_ref(), event)?;
        }

        writeln!(writer)
    }
}

/// Create a timer with custom format
///
/// Uses format: `[year]/[month]/[day] [hour]:[minute]:[second].[subsecond digits:4]`.
/// Falls back to UTC if the local offset cannot be determined.
pub fn create_custom_timer()
-> OffsetTime<&'static [time::format_description::BorrowedFormatItem<'static>]> {
    use time::macros::format_description;

    let format =
        format_description!("[year]/[month]/[day] [hour]:[minute]:[second].[subsecond digits:4]");
    let offset = time::UtcOffset::current_local_offset().unwrap_or(time::UtcOffset::UTC);
    OffsetTime::new(offset, format)
}

/// Check if dependency logging is enabled via `LCON_LOGDEPS`
pub fn is_dependency_logging_enabled() -> bool {
    std::env::var("LCON_LOGDEPS")
        .map(|v| v == "1")
        .unwrap_or(false)
}

/// Build the filter directive for the given level
///
/// Without dependency logging only our own crates (and script output,
/// logged under the `lua` target) are let through.
pub fn build_filter_directives(level: Level, log_deps: bool) -> String {
    let level_str = match level {
        Level::TRACE => "trace",
        Level::DEBUG => "debug",
        Level::INFO => "info",
        Level::WARN => "warn",
        Level::ERROR => "error",
    };

    if log_deps {
        return level_str.to_string();
    }

    let mut directives = String::from("off");
    for target in OWN_TARGETS {
        directives.push_str(&format!(",{}={}", target, level_str));
    }
    directives
}

/// Parse a level name as written in configuration files
///
/// Unknown names fall back to `INFO`.
pub fn parse_level(name: &str) -> Level {
    match name.trim().to_ascii_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Detect if ANSI colors should be used based on environment
///
/// Disables ANSI colors if stdout is not a TTY, `NO_COLOR` is set
/// (https://no-color.org/) or `TERM=dumb`.
pub fn should_use_ansi() -> bool {
    atty::is(atty::Stream::Stdout)
        && std::env::var("NO_COLOR").is_err()
        && std::env::var("TERM").map(|t| t != "dumb").unwrap_or(true)
}

/// Logging configuration
pub struct LogConfig<W: Write + Send + 'static = std::fs::File> {
    /// Prefix to strip from log targets (e.g., "lcon_console::")
    pub strip_prefix: String,
    /// Whether to use ANSI color codes (auto-detected if None)
    pub use_ansi: Option<bool>,
    /// Minimum log level
    pub level: Level,
    /// Optional file to write logs to
    pub log_file: Option<W>,
    /// Whether to write to stdout at all
    pub stdout: bool,
}

impl<W: Write + Send + 'static> LogConfig<W> {
    /// Create a new LogConfig with the given strip prefix
    pub fn new(strip_prefix: impl Into<String>) -> Self {
        Self {
            strip_prefix: strip_prefix.into(),
            use_ansi: None,
            level: Level::INFO,
            log_file: None,
            stdout: true,
        }
    }

    /// Set whether to use ANSI colors (default: auto-detect)
    pub fn with_ansi(mut self, use_ansi: bool) -> Self {
        self.use_ansi = Some(use_ansi);
        self
    }

    /// Set the minimum log level
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Set the log file
    pub fn with_log_file(mut self, file: W) -> Self {
        self.log_file = Some(file);
        self
    }

    /// Enable or disable the stdout layer
    ///
    /// The terminal front-end draws over stdout, so it logs to file only.
    pub fn with_stdout(mut self, stdout: bool) -> Self {
        self.stdout = stdout;
        self
    }
}

/// Initialize logging with the given configuration
///
/// # Environment Variables
///
/// * `LCON_LOGDEPS` - Set to `1` to enable logging from external dependencies.
/// * `RUST_LOG` - Can override the default filter directives
pub fn init_logging<W: Write + Send + 'static>(
    config: LogConfig<W>,
) -> Result<(), Box<dyn std::error::Error>> {
    use tracing_subscriber::EnvFilter;

    let timer = create_custom_timer();
    let use_ansi = config.use_ansi.unwrap_or_else(should_use_ansi);
    let filter_directives = build_filter_directives(config.level, is_dependency_logging_enabled());

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&filter_directives));

    let stdout_layer = config.stdout.then(|| {
        let formatter = CustomFormatter::new(timer.clone(), use_ansi)
            .with_strip_prefix(&config.strip_prefix);
        tracing_subscriber::fmt::layer()
            .event_format(formatter)
            .with_ansi(use_ansi)
            .with_writer(RawModeStdoutWriter)
    });

    let file_layer = config.log_file.map(|file| {
        let formatter = CustomFormatter::new(timer, false).with_strip_prefix(&config.strip_prefix);
        tracing_subscriber::fmt::layer()
            .event_format(formatter)
            .with_ansi(false)
            .with_writer(std::sync::Mutex::new(file))
    });

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .with(env_filter)
        .try_init()?;

    Ok(())
}

/// Initialize logging to stdout only
pub fn init_logging_simple(
    strip_prefix: impl Into<String>,
    level: Level,
) -> Result<(), Box<dyn std::error::Error>> {
    let config: LogConfig<std::fs::File> = LogConfig::new(strip_prefix).with_level(level);
    init_logging(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directives_without_deps() {
        let directives = build_filter_directives(Level::DEBUG, false);
        assert!(directives.starts_with("off,"));
        assert!(directives.contains("lcon_scripting=debug"));
        assert!(directives.contains("lua=debug"));
    }

    #[test]
    fn test_filter_directives_with_deps() {
        assert_eq!(build_filter_directives(Level::WARN, true), "warn");
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("DEBUG"), Level::DEBUG);
        assert_eq!(parse_level(" warning "), Level::WARN);
        assert_eq!(parse_level("nonsense"), Level::INFO);
    }

    #[test]
    fn test_display_target_strips_prefix() {
        let formatter = CustomFormatter::new((), false).with_strip_prefix("lcon_console::");
        assert_eq!(
            formatter.display_target("lcon_console::terminal"),
            Some("terminal")
        );
        assert_eq!(formatter.display_target("lcon_console"), None);
        assert_eq!(
            formatter.display_target("lcon_scripting::engine"),
            Some("lcon_scripting::engine")
        );
    }

    #[test]
    fn test_raw_mode_writer_translates_newlines() {
        set_raw_mode_active(true);
        let mut writer = RawModeWriter::new(Vec::new());
        writer.write_all(b"a\nb\n").unwrap();
        set_raw_mode_active(false);
        assert_eq!(writer.into_inner(), b"a\r\nb\r\n");
    }
}
