//! Tracing bootstrap
//!
//! Installs a global `tracing-subscriber` with an [`EnvFilter`] read from
//! `RUST_LOG` (default `info`). Library code never calls this; binaries and
//! tests opt in.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

static TRACING_INITIALIZED: AtomicBool = AtomicBool::new(false);

const DEFAULT_FILTER: &str = "info";

/// Output format of the fmt layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Install the global subscriber.
///
/// Returns `true` if this call installed it. Later calls, and calls made
/// after another subscriber was set elsewhere, return `false` and change
/// nothing.
pub fn init_tracing(format: LogFormat) -> bool {
    if TRACING_INITIALIZED.swap(true, Ordering::SeqCst) {
        return false;
    }

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    let result = match format {
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_target(true).with_line_number(true))
            .try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .try_init(),
    };

    result.is_ok()
}
