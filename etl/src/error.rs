//! Error types and result definitions for snapshot pipeline operations.
//!
//! Every failure carries an [`ErrorKind`] for classification, a static description, an optional
//! dynamic detail naming the resource involved, the originating error and the callsite.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::panic::Location;
use std::sync::Arc;

/// Convenient result type for pipeline operations using [`EtlError`] as the error type.
pub type EtlResult<T> = Result<T, EtlError>;

/// Detailed payload stored for every [`EtlError`].
#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Main error type for pipeline operations.
///
/// The payload is boxed so that `EtlResult<T>` stays small on the happy path.
#[derive(Debug, Clone)]
pub struct EtlError {
    payload: Box<ErrorPayload>,
}

/// Categories of errors that can occur during a pipeline run.
///
/// None of them is retried automatically. A failed run is fixed and re-run by an operator.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Source Errors
    /// The operational store file or table does not exist or cannot be opened.
    SourceUnavailable,
    SourceQueryFailed,

    // Analytical Store Errors
    DestinationConnectionFailed,
    DestinationQueryFailed,
    /// The analytical store rejected a write or a commit.
    WriteFailure,

    // Data & Transformation Errors
    /// A staged value cannot be converted to the target column type.
    CoercionFailure,
    /// A table the current stage reads from has not been created yet.
    DependencyMissing,
    InvalidData,

    // Configuration & IO Errors
    ConfigError,
    IoError,

    // Runtime Errors
    BlockingTaskPanic,

    // Unknown / Uncategorized
    Unknown,
}

impl EtlError {
    /// Returns the [`ErrorKind`] of this error.
    pub fn kind(&self) -> ErrorKind {
        self.payload.kind
    }

    /// Returns the static description of this error.
    pub fn description(&self) -> &str {
        &self.payload.description
    }

    /// Returns the detailed error information if available.
    pub fn detail(&self) -> Option<&str> {
        self.payload.detail.as_deref()
    }

    /// Returns the captured backtrace for this error.
    pub fn backtrace(&self) -> &Backtrace {
        self.payload.backtrace.as_ref()
    }

    /// Returns the captured callsite location for this error.
    pub fn location(&self) -> &'static Location<'static> {
        self.payload.location
    }

    /// Attaches an originating [`error::Error`] to this error and returns the modified instance.
    ///
    /// The stored source is preserved across clones and exposed via [`error::Error::source`].
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        self.payload.source = Some(Arc::new(source));
        self
    }

    /// Creates an [`EtlError`] from its components.
    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        EtlError {
            payload: Box::new(ErrorPayload {
                kind,
                description,
                detail,
                source,
                location: Location::caller(),
                backtrace: Arc::new(Backtrace::capture()),
            }),
        }
    }

    /// Creates an [`EtlError`] wrapping `err` with its rendered message as detail.
    #[track_caller]
    fn from_source<E>(kind: ErrorKind, description: &'static str, err: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        let detail = err.to_string();
        EtlError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl PartialEq for EtlError {
    fn eq(&self, other: &EtlError) -> bool {
        self.payload.kind == other.payload.kind
    }
}

impl Hash for EtlError {
    /// Hashes the error using only its kind and static description.
    ///
    /// Location, detail, source and backtrace are excluded so that repeated occurrences of
    /// the same failure group together.
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.payload.kind.hash(state);
        self.payload.description.hash(state);
    }
}

impl fmt::Display for EtlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        let payload = &self.payload;
        let location = payload.location;
        write!(
            f,
            "[{:?}] {} @ {}:{}:{}",
            payload.kind,
            payload.description,
            location.file(),
            location.line(),
            location.column()
        )?;

        write_detail(payload.detail.as_deref(), f, 1)?;
        write_backtrace(payload.backtrace.as_ref(), f, 1)?;

        Ok(())
    }
}

impl error::Error for EtlError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.payload
            .source
            .as_ref()
            .map(|source| source as &(dyn error::Error + 'static))
    }
}

/// Writes the captured backtrace with indentation.
fn write_backtrace(
    backtrace: &Backtrace,
    f: &mut fmt::Formatter<'_>,
    indent: usize,
) -> fmt::Result {
    let indent_str = "  ".repeat(indent);

    let rendered_backtrace = format!("{backtrace}");
    if !rendered_backtrace.trim().is_empty() {
        write!(f, "\n{indent_str}Backtrace:")?;
        for line in rendered_backtrace.lines() {
            if line.trim().is_empty() {
                write!(f, "\n{indent_str}  ")?;
            } else {
                write!(f, "\n{indent_str}  {line}")?;
            }
        }
    }

    Ok(())
}

/// Writes the detail block with indentation.
fn write_detail(detail: Option<&str>, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
    if let Some(detail) = detail {
        let indent_str = "  ".repeat(indent);
        if detail.trim().is_empty() {
            write!(f, "\n{indent_str}Detail: <empty>")?;
        } else {
            write!(f, "\n{indent_str}Detail:")?;
            for line in detail.lines() {
                if line.trim().is_empty() {
                    write!(f, "\n{indent_str}  ")?;
                } else {
                    write!(f, "\n{indent_str}  {line}")?;
                }
            }
        }
    }

    Ok(())
}

/// Creates an [`EtlError`] from an error kind and static description.
impl From<(ErrorKind, &'static str)> for EtlError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> EtlError {
        EtlError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

/// Creates an [`EtlError`] from an error kind, static description, and dynamic detail.
impl<D> From<(ErrorKind, &'static str, D)> for EtlError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> EtlError {
        EtlError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

/// Converts [`std::io::Error`] to [`EtlError`] with [`ErrorKind::IoError`].
impl From<std::io::Error> for EtlError {
    #[track_caller]
    fn from(err: std::io::Error) -> EtlError {
        EtlError::from_source(ErrorKind::IoError, "I/O operation failed", err)
    }
}

/// Converts [`std::num::ParseFloatError`] to [`EtlError`] with [`ErrorKind::CoercionFailure`].
impl From<std::num::ParseFloatError> for EtlError {
    #[track_caller]
    fn from(err: std::num::ParseFloatError) -> EtlError {
        EtlError::from_source(ErrorKind::CoercionFailure, "Float parsing failed", err)
    }
}

/// Converts [`chrono::ParseError`] to [`EtlError`] with [`ErrorKind::CoercionFailure`].
impl From<chrono::ParseError> for EtlError {
    #[track_caller]
    fn from(err: chrono::ParseError) -> EtlError {
        EtlError::from_source(ErrorKind::CoercionFailure, "Date parsing failed", err)
    }
}

/// Converts [`csv::Error`] to [`EtlError`].
///
/// I/O failures map to [`ErrorKind::IoError`], everything else to [`ErrorKind::InvalidData`].
impl From<csv::Error> for EtlError {
    #[track_caller]
    fn from(err: csv::Error) -> EtlError {
        let (kind, description) = match err.kind() {
            csv::ErrorKind::Io(_) => (ErrorKind::IoError, "CSV I/O operation failed"),
            _ => (ErrorKind::InvalidData, "CSV parsing failed"),
        };

        EtlError::from_source(kind, description, err)
    }
}

/// Converts [`sqlx::Error`] to [`EtlError`] with the appropriate error kind.
///
/// Maps I/O errors to [`ErrorKind::IoError`], connection pool errors to
/// [`ErrorKind::SourceUnavailable`] and everything else to [`ErrorKind::SourceQueryFailed`].
impl From<sqlx::Error> for EtlError {
    #[track_caller]
    fn from(err: sqlx::Error) -> EtlError {
        let kind = match &err {
            sqlx::Error::Io(_) => ErrorKind::IoError,
            sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => ErrorKind::SourceUnavailable,
            _ => ErrorKind::SourceQueryFailed,
        };

        EtlError::from_source(kind, "Operational store operation failed", err)
    }
}

/// Converts [`duckdb::Error`] to [`EtlError`] with [`ErrorKind::DestinationQueryFailed`].
impl From<duckdb::Error> for EtlError {
    #[track_caller]
    fn from(err: duckdb::Error) -> EtlError {
        EtlError::from_source(
            ErrorKind::DestinationQueryFailed,
            "Analytical store operation failed",
            err,
        )
    }
}
