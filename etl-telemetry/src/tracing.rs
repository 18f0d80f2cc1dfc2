use std::sync::Once;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable that turns on log output in tests.
const ENABLE_TRACING_ENV_NAME: &str = "ENABLE_TRACING";

/// Filter used when `RUST_LOG` is not set.
const DEFAULT_FILTER: &str = "info";

static INIT_TEST_TRACING: Once = Once::new();

/// Flushes buffered log lines when dropped.
///
/// Keep it alive for the lifetime of `main`, otherwise trailing lines may be lost.
#[must_use = "dropping the flusher stops the background log writer"]
pub struct LogFlusher {
    _guard: WorkerGuard,
}

/// Error returned when a global subscriber is already installed.
pub type TracingInitError = tracing_subscriber::util::TryInitError;

/// Installs the global subscriber for a binary.
///
/// Lines go to stdout through a non-blocking writer. The filter is taken from
/// `RUST_LOG`, defaulting to `info`.
pub fn init_tracing(app_name: &str) -> Result<LogFlusher, TracingInitError> {
    let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());

    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_writer(writer).with_target(false))
        .try_init()?;

    tracing::info!(app = app_name, "tracing initialized");

    Ok(LogFlusher { _guard: guard })
}

/// Installs a test subscriber once per process.
///
/// Output is only emitted when `ENABLE_TRACING` is set, which keeps test runs quiet by default.
pub fn init_test_tracing() {
    INIT_TEST_TRACING.call_once(|| {
        if std::env::var_os(ENABLE_TRACING_ENV_NAME).is_none() {
            return;
        }

        let _ = tracing_subscriber::registry()
            .with(env_filter())
            .with(fmt::layer().with_test_writer())
            .try_init();
    });
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}
