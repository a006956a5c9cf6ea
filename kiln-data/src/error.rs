/// Driver-level errors reported by connection providers and row mappers.
///
/// These stay inside the data layer: the executor logs them and converts them
/// into an [`OperationError`](kiln_core::OperationError) before returning.
#[derive(Debug)]
pub enum DataError {
    /// The statement produced no row where one was expected.
    NotFound(String),
    /// An error raised by the database driver.
    Database(Box<dyn std::error::Error + Send + Sync>),
    /// The connection is alive but has no spare capacity right now (e.g. every
    /// pooled connection is checked out). Not a reason to replace the handle.
    Busy(String),
    /// Anything else (decoding, unsupported column type, closed handle, ...).
    Other(String),
}

impl DataError {
    /// Wrap any driver error.
    ///
    /// Used by backend crates (e.g. `kiln-data-sqlx`) to box their own errors.
    pub fn database(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        DataError::Database(Box::new(err))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DataError::NotFound(_))
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, DataError::Busy(_))
    }
}

impl std::fmt::Display for DataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataError::NotFound(msg) => write!(f, "Not found: {msg}"),
            DataError::Database(err) => write!(f, "Database error: {err}"),
            DataError::Busy(msg) => write!(f, "Busy: {msg}"),
            DataError::Other(msg) => write!(f, "Data error: {msg}"),
        }
    }
}

impl std::error::Error for DataError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DataError::Database(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}
