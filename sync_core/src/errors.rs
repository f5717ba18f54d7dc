//! The error taxonomy, plus the plumbing to decide whether a failure is
//! retryable from the engine's point of view.
//!
//! One flat public enum per component boundary, `anyhow::Error` used for
//! everything upstream of that boundary.

use std::fmt;

/// A typed module-level failure, as returned by `SyncModule::push`/`pull`.
#[derive(Clone, Debug)]
pub struct ModuleFailure {
    pub retryable: bool,
    pub message: String,
}

impl ModuleFailure {
    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            retryable: true,
            message: message.into(),
        }
    }

    pub fn terminal(message: impl Into<String>) -> Self {
        Self {
            retryable: false,
            message: message.into(),
        }
    }
}

impl fmt::Display for ModuleFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ModuleFailure {}

/// Orthogonal to transport: every variant states its own retryability
/// rather than leaving it to the caller to infer from an HTTP status code
/// buried inside.
#[derive(Debug)]
pub enum SyncError {
    /// Credentials incomplete or absent. Never retried.
    ConfigurationMissing(String),
    /// DNS/TCP/TLS/read failure below the RPC protocol layer. Retryable at
    /// the queue level (never retried by the transport itself).
    TransportFailure(String),
    /// HTTP 429 or 5xx. Retryable.
    ServerError { status: u16, message: String },
    /// HTTP 403, or a response body matching one of the session-expired
    /// patterns. Handled in-band by the RPC client for idempotent methods;
    /// otherwise surfaces as retryable.
    SessionError(String),
    /// 2xx with an RPC-level fault in the body. Non-retryable by default;
    /// modules may reclassify specific messages as retryable.
    ProtocolFault(String),
    /// Bad input at the module boundary. Never retried.
    ValidationError(String),
    /// Job references a module id the registry doesn't know about. Terminal.
    UnknownModule(String),
    /// Anything else — wraps `anyhow::Error` for call sites that don't need
    /// a specific taxonomy member (DB errors, serialization errors, etc).
    Other(anyhow::Error),
}

impl SyncError {
    /// Whether the *queue* should schedule a retry for this error. This
    /// authority belongs solely to the engine — transports and the RPC
    /// client must never make this decision for themselves.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::ConfigurationMissing(_) => false,
            SyncError::TransportFailure(_) => true,
            SyncError::ServerError { .. } => true,
            SyncError::SessionError(_) => true,
            SyncError::ProtocolFault(_) => false,
            SyncError::ValidationError(_) => false,
            SyncError::UnknownModule(_) => false,
            SyncError::Other(_) => false,
        }
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::ConfigurationMissing(msg) => write!(f, "configuration missing: {msg}"),
            SyncError::TransportFailure(msg) => write!(f, "transport failure: {msg}"),
            SyncError::ServerError { status, message } => {
                write!(f, "server error ({status}): {message}")
            }
            SyncError::SessionError(msg) => write!(f, "session error: {msg}"),
            SyncError::ProtocolFault(msg) => write!(f, "protocol fault: {msg}"),
            SyncError::ValidationError(msg) => write!(f, "validation error: {msg}"),
            SyncError::UnknownModule(id) => write!(f, "unknown module: {id}"),
            SyncError::Other(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for SyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SyncError::Other(err) => err.source(),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for SyncError {
    fn from(err: anyhow::Error) -> Self {
        SyncError::Other(err)
    }
}

impl From<sea_orm::DbErr> for SyncError {
    fn from(err: sea_orm::DbErr) -> Self {
        SyncError::Other(anyhow::Error::new(err))
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
