use http::StatusCode;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

/// Classification of every failure that crosses the Kiln boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The connection could not start a transaction.
    TransactionBeginFailed,
    /// A statement failed inside a transaction (a rollback was attempted).
    StatementFailed,
    /// No row matched, or an update touched zero rows.
    NotFound,
    /// A row mapper or scalar conversion failed.
    ScanFailed,
    /// Committing the transaction failed.
    CommitFailed,
    /// Rolling the transaction back failed.
    RollbackFailed,
    /// A read outside of a transaction failed.
    QueryExecutionFailed,
    /// The connection provider could not supply a healthy connection.
    ConnectionUnavailable,
    /// An outbound call failed at the transport level on every attempt.
    RetriesExhausted,
    /// An outbound call got a response whose status is not the success code.
    NonSuccessResponse,
    /// An outbound call got a response whose body could not be read.
    ResponseReadFailed,
    /// The caller supplied an invalid parameter.
    InvalidRequest,
}

impl ErrorKind {
    /// Status classification used when the failure carries none of its own.
    pub fn default_status(self) -> StatusCode {
        match self {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
            ErrorKind::ConnectionUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::TransactionBeginFailed => "transaction_begin_failed",
            ErrorKind::StatementFailed => "statement_failed",
            ErrorKind::NotFound => "not_found",
            ErrorKind::ScanFailed => "scan_failed",
            ErrorKind::CommitFailed => "commit_failed",
            ErrorKind::RollbackFailed => "rollback_failed",
            ErrorKind::QueryExecutionFailed => "query_execution_failed",
            ErrorKind::ConnectionUnavailable => "connection_unavailable",
            ErrorKind::RetriesExhausted => "retries_exhausted",
            ErrorKind::NonSuccessResponse => "non_success_response",
            ErrorKind::ResponseReadFailed => "response_read_failed",
            ErrorKind::InvalidRequest => "invalid_request",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The uniform `(status, message)` error returned by the executor and the
/// resilient caller. Driver and transport errors never escape as-is; they are
/// logged where they happen and converted into one of these.
///
/// `status` is a raw HTTP-style code. It is `0` when an outbound call never
/// obtained a status at all.
#[derive(Clone, PartialEq, Eq)]
pub struct OperationError {
    kind: ErrorKind,
    status: u16,
    message: String,
}

impl OperationError {
    /// Build an error with the kind's default status.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: kind.default_status().as_u16(),
            message: message.into(),
        }
    }

    /// Build an error carrying an explicit status (e.g. from a remote response).
    pub fn with_status(kind: ErrorKind, status: u16, message: impl Into<String>) -> Self {
        Self {
            kind,
            status,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// The status as a typed `StatusCode`, if it is a valid one.
    pub fn status_code(&self) -> Option<StatusCode> {
        StatusCode::from_u16(self.status).ok()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }

    pub fn begin_failed() -> Self {
        Self::new(ErrorKind::TransactionBeginFailed, "Failed to begin transaction")
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn scan_failed() -> Self {
        Self::new(ErrorKind::ScanFailed, "Failed to scan row")
    }

    pub fn query_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::QueryExecutionFailed, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRequest, message)
    }
}

impl std::fmt::Display for OperationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {}", self.kind, self.status, self.message)
    }
}

impl std::fmt::Debug for OperationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        <Self as std::fmt::Display>::fmt(self, f)
    }
}

impl std::error::Error for OperationError {}

/// Serialises as `{ "status_code": 404, "message": "..." }`.
impl Serialize for OperationError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("OperationError", 2)?;
        state.serialize_field("status_code", &self.status)?;
        state.serialize_field("message", &self.message)?;
        state.end()
    }
}
