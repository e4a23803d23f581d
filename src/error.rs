use std::io;
use std::time::Duration;

/// Internal, codec-level failure: a malformed reply or a non-success reply
/// code. Never surfaced to callers directly — the engine re-wraps it into
/// [`TunnelError::Proxy`] before it crosses the public boundary.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ReplyError {
    pub message: String,
    pub error_code: Option<i64>,
}

impl ReplyError {
    pub fn new(message: impl Into<String>) -> Self {
        ReplyError {
            message: message.into(),
            error_code: None,
        }
    }

    pub fn with_code(message: impl Into<String>, error_code: i64) -> Self {
        ReplyError {
            message: message.into(),
            error_code: Some(error_code),
        }
    }
}

/// Errors surfaced by the public API of this crate.
///
/// Exactly one variant is produced per failed `connect`; on every path the
/// stream involved is guaranteed to already be closed by the time this
/// error reaches the caller.
#[derive(Debug, thiserror::Error)]
pub enum TunnelError {
    /// A transport error occurred while opening the base TCP connection to
    /// the proxy itself (step 1 of the engine's `connect`).
    #[error("could not connect to proxy {host}:{port}: {source}")]
    Connection {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// The deadline for the whole `connect` call elapsed.
    #[error("proxy connection timed out after {0:?}")]
    Timeout(Duration),

    /// The proxy negotiated the tunnel but refused it, or the reply it
    /// sent back was malformed. `error_code` mirrors the protocol-level
    /// failure code (`REP` for SOCKS5, `STATUS` for SOCKS4, HTTP status
    /// for CONNECT) when one exists.
    #[error("proxy error: {message}")]
    Proxy {
        message: String,
        error_code: Option<i64>,
    },

    /// A transport error occurred anywhere after the base stream to the
    /// proxy was already open (TLS handshake, codec I/O, destination TLS).
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<ReplyError> for TunnelError {
    fn from(e: ReplyError) -> Self {
        TunnelError::Proxy {
            message: e.message,
            error_code: e.error_code,
        }
    }
}

impl From<ConnectorError> for TunnelError {
    fn from(e: ConnectorError) -> Self {
        match e {
            ConnectorError::Io(io_err) => TunnelError::Io(io_err),
            ConnectorError::Reply(reply_err) => reply_err.into(),
        }
    }
}

/// Failure surfaced by a connector: either a transport fault (propagated
/// unchanged to the engine) or a [`ReplyError`] (re-wrapped by the engine
/// into [`TunnelError::Proxy`]).
#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Reply(#[from] ReplyError),
}

/// Failure raised by a [`crate::resolver::Resolver`] when it cannot
/// produce any address for a host under the requested family hint.
#[derive(Debug, thiserror::Error)]
#[error("could not resolve host {host}")]
pub struct ResolveError {
    pub host: String,
    #[source]
    pub source: Option<io::Error>,
}
