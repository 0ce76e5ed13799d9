//! Structured-logging helpers (SPEC_FULL.md §10.2).
//!
//! Grounded on `starbreaker-parsers::logging`'s macro shape; this
//! module keeps the structural pattern (span-wrapped parse, dedicated
//! start/complete/error macros) without the teacher file's typos.

use std::sync::atomic::{AtomicBool, Ordering};

static TRACING_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initialise the default `tracing` subscriber. Safe to call multiple
/// times; only the first call takes effect. Intended to be called once
/// by the CLI entry point — library code never calls this itself.
pub fn init_default() {
    if TRACING_INITIALIZED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::Relaxed)
        .is_ok()
    {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("warn,meshstream=info"));

        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }
}

/// Log the start of a whole-file parse.
#[macro_export]
macro_rules! log_parse_start {
    ($format:expr, $path:expr) => {
        tracing::info!(format = %$format, path = %$path.display(), "starting parse");
    };
}

/// Log the completion of a whole-file parse.
#[macro_export]
macro_rules! log_parse_complete {
    ($format:expr, $duration:expr, $chunks:expr) => {
        tracing::info!(
            format = %$format,
            duration_ms = %$duration.as_millis(),
            chunks = %$chunks,
            "parse complete"
        );
    };
}

/// Log a fatal parse failure immediately before returning `Err`.
#[macro_export]
macro_rules! log_parse_error {
    ($format:expr, $error:expr) => {
        tracing::error!(format = %$format, error = %$error, "parse failed");
    };
}
