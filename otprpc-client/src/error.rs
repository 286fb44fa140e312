//! Client error types.

use crate::reply::ErrorDetail;
use otprpc_protocol::{ErrorCode, ProtocolError, Term};
use std::io;
use thiserror::Error;

/// Transport errors raised by a connection or its provider.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("request timeout")]
    Timeout,

    #[error("no call awaiting a reply")]
    NoPendingCall,

    #[error("unexpected message: {0}")]
    UnexpectedMessage(String),

    #[error("node refused request: {code} - {message}")]
    ServerError { code: ErrorCode, message: String },
}

impl ClientError {
    /// Maps an I/O error, turning socket timeouts into `Timeout`.
    pub fn from_io(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => ClientError::Timeout,
            _ => ClientError::Io(e),
        }
    }

    /// Returns whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClientError::Io(_) | ClientError::Timeout | ClientError::ConnectionClosed
        )
    }
}

/// Errors converting between native values and terms.
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("integer {0} does not fit a 64-bit signed term")]
    IntegerOutOfRange(u64),

    #[error("float {0} has no JSON representation")]
    NonFiniteFloat(f64),
}

/// Errors from a connection-scoped RPC execution.
///
/// `Connection`, `RemoteRpc` and `BadRpc` are the typed kinds and reach the
/// caller untouched. Anything else raised while the connection is held ends up
/// in `Access` with the original cause attached.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("could not acquire connection: {0}")]
    Connection(#[source] ClientError),

    #[error("remote call returned error: {0}")]
    RemoteRpc(ErrorDetail),

    #[error("badrpc: {0}")]
    BadRpc(ErrorDetail),

    #[error("rpc access failed: {0}")]
    Access(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl RpcError {
    /// Wraps an arbitrary failure as `Access`.
    pub fn access(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        RpcError::Access(cause.into())
    }

    /// Returns true for the three typed kinds.
    pub fn is_typed(&self) -> bool {
        !matches!(self, RpcError::Access(_))
    }

    /// Returns the reply payload of a `RemoteRpc` or `BadRpc` error.
    pub fn payload(&self) -> Option<&ErrorDetail> {
        match self {
            RpcError::RemoteRpc(detail) | RpcError::BadRpc(detail) => Some(detail),
            _ => None,
        }
    }
}

impl From<ClientError> for RpcError {
    fn from(e: ClientError) -> Self {
        RpcError::access(e)
    }
}

impl From<ProtocolError> for RpcError {
    fn from(e: ProtocolError) -> Self {
        RpcError::access(e)
    }
}

impl From<ConversionError> for RpcError {
    fn from(e: ConversionError) -> Self {
        RpcError::access(e)
    }
}

impl From<io::Error> for RpcError {
    fn from(e: io::Error) -> Self {
        RpcError::access(e)
    }
}

/// Errors from broker administration calls.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error("unexpected reply from {module}:{function}: {reply}")]
    UnexpectedReply {
        module: &'static str,
        function: &'static str,
        reply: Term,
    },
}
