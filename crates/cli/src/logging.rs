//! Console and per-invocation file logging.

use std::fs::File;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

const MAX_VERBOSITY: u8 = 3;

/// Console level for the wigli crates at a given `-v` count.
fn console_directive(verbosity: u8) -> String {
    let level = match verbosity.min(MAX_VERBOSITY) {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    format!("warn,wigli={level}")
}

/// Log to stderr at the `-v` level (overridden by `RUST_LOG`) and to
/// `log_path` at debug level, without colour.
pub fn init(verbosity: u8, log_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(console_directive(verbosity)));
    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .with_filter(console_filter);

    let file = File::options()
        .create(true)
        .append(true)
        .open(log_path)
        .map_err(|e| format!("Failed to open log file {}: {e}", log_path.display()))?;
    let file_layer = fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_filter(EnvFilter::new("warn,wigli=debug"));

    tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .try_init()?;
    Ok(())
}
