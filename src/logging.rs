//! Logging infrastructure - structured tracing across the interop layer
//!
//! Design: Uses `tracing` for structured, contextual logging with:
//! - Configurable level, overridable through `RUST_LOG`
//! - Zero-cost when disabled
//! - Console or non-blocking file output, human-readable or JSON
//!
//! Every event carries an `event = "..."` field so logs can be filtered by
//! operation regardless of message text.

use core::ffi::c_void;
use std::io;
use std::path::Path;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::{debug, error, info, trace, warn, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, writer::BoxMakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::config::{DispatchPolicy, FfiConfig, LogSettings};
use crate::error::FfiError;

/// Global logging state
static LOGGER_INITIALIZED: OnceCell<()> = OnceCell::new();

/// Flushes the file writer when dropped; held for the process lifetime
static FILE_GUARD: Mutex<Option<WorkerGuard>> = Mutex::new(None);

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Default log level
    pub level: Level,
    /// Log file path; console when `None`
    pub log_path: Option<String>,
    /// Enable JSON format (vs human-readable)
    pub json_format: bool,
    /// Show span events (enter/exit)
    pub show_spans: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            log_path: None,
            json_format: false,
            show_spans: false,
        }
    }
}

impl LogConfig {
    /// Create config from `TYPTHON_FFI_LOG_*` environment variables
    pub fn from_env() -> Self {
        Self::from_settings(&FfiConfig::from_env().log)
    }

    /// Create config from the `[log]` table of an `FfiConfig`
    pub fn from_settings(settings: &LogSettings) -> Self {
        Self {
            level: parse_level(&settings.level),
            log_path: settings.file.clone(),
            json_format: settings.json,
            show_spans: settings.spans,
        }
    }

    /// Create debug config (verbose logging)
    pub fn debug() -> Self {
        Self {
            level: Level::TRACE,
            show_spans: true,
            ..Self::default()
        }
    }
}

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Initialize logging with configuration from the environment
pub fn init() {
    init_with_config(LogConfig::from_env());
}

/// Initialize logging with custom configuration
///
/// Only the first call installs a subscriber. If another global subscriber
/// is already installed, that one is left in place.
pub fn init_with_config(config: LogConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "typthon_ffi={}",
                config.level.as_str().to_lowercase()
            ))
        });

        let span_events = if config.show_spans {
            FmtSpan::ENTER | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };

        let writer = match config.log_path.as_deref().and_then(file_writer) {
            Some((writer, guard)) => {
                *FILE_GUARD.lock() = Some(guard);
                BoxMakeWriter::new(writer)
            }
            None => BoxMakeWriter::new(io::stdout),
        };

        let layer = if config.json_format {
            fmt::layer()
                .json()
                .with_writer(writer)
                .with_span_events(span_events)
                .with_target(true)
                .with_filter(env_filter)
                .boxed()
        } else {
            fmt::layer()
                .with_writer(writer)
                .with_span_events(span_events)
                .with_target(true)
                .with_thread_ids(cfg!(debug_assertions))
                .with_line_number(cfg!(debug_assertions))
                .with_filter(env_filter)
                .boxed()
        };

        let _ = tracing_subscriber::registry().with(layer).try_init();
    });
}

fn file_writer(path: &str) -> Option<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    let path = Path::new(path);
    let file_name = path.file_name()?;
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let appender = tracing_appender::rolling::never(dir, file_name);
    Some(tracing_appender::non_blocking(appender))
}

/// Check if logging is initialized
pub fn is_initialized() -> bool {
    LOGGER_INITIALIZED.get().is_some()
}

// ============================================================================
// Interop logging functions
// ============================================================================

/// Log a descriptor entering the intern table
#[inline]
pub fn log_descriptor_interned(expr: &str, size: usize) {
    trace!(
        event = "descriptor_interned",
        expr = expr,
        size_bytes = size,
        "Type descriptor interned"
    );
}

/// Log call interface construction
pub fn log_interface_built(signature: &str, arity: usize) {
    debug!(
        event = "interface_built",
        signature = signature,
        arity = arity,
        "Call interface prepared"
    );
}

/// Log FFI function call
#[inline]
pub fn log_ffi_call(function: *const c_void, arg_count: usize) {
    debug!(
        event = "ffi_call",
        function = ?function,
        args = arg_count,
        "FFI function called"
    );
}

/// Log FFI function return
#[inline]
pub fn log_ffi_return(function: *const c_void) {
    trace!(
        event = "ffi_return",
        function = ?function,
        "FFI function returned"
    );
}

/// Log FFI error raised before or after a native call
pub fn log_ffi_error(function: *const c_void, err: &FfiError) {
    error!(
        event = "ffi_error",
        function = ?function,
        kind = err.kind(),
        error = %err,
        "FFI function error"
    );
}

/// Log a call-in whose host side failed; native code sees a zeroed return
pub fn log_dispatch_failure(callee: &str, err: &FfiError) {
    warn!(
        event = "dispatch_failure",
        callee = callee,
        kind = err.kind(),
        error = %err,
        "Host callable failed, returning zero"
    );
}

/// Log trampoline creation
pub fn log_trampoline_created(code: *const c_void, callee: &str, policy: DispatchPolicy) {
    info!(
        event = "trampoline_created",
        code = ?code,
        callee = callee,
        policy = %policy,
        "Trampoline created"
    );
}

/// Log trampoline release
pub fn log_trampoline_released(code: *const c_void) {
    debug!(
        event = "trampoline_released",
        code = ?code,
        "Trampoline released"
    );
}

/// Log shared library load
pub fn log_library_loaded(path: &str) {
    info!(event = "library_loaded", path = path, "Shared library loaded");
}
