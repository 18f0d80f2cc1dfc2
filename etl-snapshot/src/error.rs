use std::backtrace::Backtrace;
use std::error::Error;
use std::fmt;

use etl::error::EtlError;

/// Returns whether terminal output should include backtraces.
fn should_render_backtrace() -> bool {
    matches!(
        std::env::var("RUST_BACKTRACE").as_deref(),
        Ok("1") | Ok("full")
    )
}

/// Result type for snapshot CLI operations.
pub type SnapshotResult<T> = Result<T, SnapshotError>;

/// Captured backtrace wrapper for the non-ETL variants.
pub struct CapturedBacktrace(Backtrace);

impl CapturedBacktrace {
    fn capture() -> Self {
        Self(Backtrace::capture())
    }
}

impl fmt::Debug for CapturedBacktrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error type for the snapshot CLI.
#[derive(Debug)]
pub enum SnapshotError {
    /// Pipeline, ingestion or export error.
    Etl(EtlError),
    /// Configuration loading or validation error.
    Config(Box<dyn Error + Send + Sync>, CapturedBacktrace),
    /// I/O error outside the pipeline, such as building the runtime.
    Io(std::io::Error, CapturedBacktrace),
}

impl SnapshotError {
    /// Returns a short category label for this error.
    pub fn category(&self) -> &'static str {
        match self {
            SnapshotError::Etl(_) => "pipeline error",
            SnapshotError::Config(_, _) => "configuration error",
            SnapshotError::Io(_, _) => "i/o error",
        }
    }

    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self {
            SnapshotError::Etl(err) => Some(err.backtrace()),
            SnapshotError::Config(_, cb) => Some(&cb.0),
            SnapshotError::Io(_, cb) => Some(&cb.0),
        }
    }

    /// Creates a configuration error from any error source.
    pub fn config<E: Error + Send + Sync + 'static>(err: E) -> Self {
        SnapshotError::Config(Box::new(err), CapturedBacktrace::capture())
    }

    /// Returns a user-oriented report for terminal output.
    pub fn render_report(&self) -> String {
        let mut out = String::new();
        out.push_str("snapshot failed\n");
        out.push_str(&format!("category: {}\n", self.category()));
        out.push_str(&format!("error: {self}\n"));

        let mut source = Error::source(self);
        let mut idx = 1usize;
        while let Some(err) = source {
            out.push_str(&format!("cause {idx}: {err}\n"));
            source = err.source();
            idx += 1;
        }

        if should_render_backtrace()
            && let Some(backtrace) = self.backtrace()
        {
            out.push_str("backtrace:\n");
            out.push_str(&backtrace.to_string());
            if !out.ends_with('\n') {
                out.push('\n');
            }
        }

        out
    }
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotError::Etl(err) => write!(f, "{err}"),
            SnapshotError::Config(source, _) => write!(f, "configuration error: {source}"),
            SnapshotError::Io(source, _) => write!(f, "i/o error: {source}"),
        }
    }
}

impl Error for SnapshotError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SnapshotError::Etl(err) => err.source(),
            SnapshotError::Config(source, _) => Some(source.as_ref()),
            SnapshotError::Io(source, _) => Some(source),
        }
    }
}

impl From<std::io::Error> for SnapshotError {
    fn from(err: std::io::Error) -> Self {
        SnapshotError::Io(err, CapturedBacktrace::capture())
    }
}

impl From<EtlError> for SnapshotError {
    fn from(err: EtlError) -> Self {
        SnapshotError::Etl(err)
    }
}
