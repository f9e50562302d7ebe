use crate::object_store::BackendError;

/// Application-level errors for the proxy.
///
/// This enum wraps the error types that can occur during application startup
/// and runtime.
pub enum ApplicationError {
    /// I/O error (e.g., binding the listener).
    Io(std::io::Error),
    /// OpenTelemetry OTLP exporter build error.
    Otlp(opentelemetry_otlp::ExporterBuildError),
    /// The bucket could not be read during the startup check.
    Startup(ResolveError),
}

impl std::error::Error for ApplicationError {}

impl std::fmt::Display for ApplicationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            ApplicationError::Io(io_error) => write!(f, "IO error: {io_error:?}"),
            ApplicationError::Otlp(otlp_error) => write!(f, "Otlp error: {otlp_error:?}"),
            ApplicationError::Startup(resolve_error) => {
                write!(f, "unable to fetch object and verify bucket: {resolve_error}")
            }
        }
    }
}

impl std::fmt::Debug for ApplicationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self, f)
    }
}

impl From<std::io::Error> for ApplicationError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<opentelemetry_otlp::ExporterBuildError> for ApplicationError {
    fn from(value: opentelemetry_otlp::ExporterBuildError) -> Self {
        Self::Otlp(value)
    }
}

/// Why a key could not be resolved to bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// The key does not exist in the bucket.
    NotFound { key: String },
    /// Any other backend failure.
    Backend { key: String, source: BackendError },
}

impl ResolveError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ResolveError::NotFound { .. })
    }

    pub fn key(&self) -> &str {
        match self {
            ResolveError::NotFound { key } | ResolveError::Backend { key, .. } => key,
        }
    }
}

impl std::error::Error for ResolveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResolveError::NotFound { .. } => None,
            ResolveError::Backend { source, .. } => Some(source),
        }
    }
}

impl std::fmt::Display for ResolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolveError::NotFound { key } => write!(f, "object {key} not found"),
            ResolveError::Backend { key, source } => {
                write!(f, "unable to fetch object {key}: {source}")
            }
        }
    }
}

impl From<ResolveError> for ApplicationError {
    fn from(value: ResolveError) -> Self {
        Self::Startup(value)
    }
}
