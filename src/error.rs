use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::endpoint::Endpoint;

pub type Result<T> = std::result::Result<T, FspError>;

#[derive(Debug, Error)]
pub enum FspError {
    #[error("malformed locator {0:?}: expected fsp://<domain>/<path>")]
    MalformedLocator(String),

    #[error("invalid nameserver address {0:?}: expected IP:PORT")]
    InvalidNameserver(String),

    #[error("nameserver {nameserver} did not reply within {timeout:?}")]
    NameserverTimeout {
        nameserver: SocketAddr,
        timeout: Duration,
    },

    #[error("nameserver {nameserver} is unreachable: {source}")]
    NameserverUnreachable {
        nameserver: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("malformed nameserver reply: {0:?}")]
    MalformedNameserverReply(String),

    #[error("name resolution failed: {0}")]
    ResolutionFailed(String),

    #[error("connection to {endpoint} failed: {source}")]
    ConnectionError {
        endpoint: Endpoint,
        #[source]
        source: io::Error,
    },

    #[error("no data from {endpoint} within {timeout:?}")]
    ReadTimeout {
        endpoint: Endpoint,
        timeout: Duration,
    },

    #[error("malformed response header: {0:?}")]
    MalformedResponseHeader(String),

    #[error("{path} was not received: {reason}")]
    NotReceived { path: String, reason: String },

    #[error("{path}: peer closed after {received} of {expected} bytes")]
    IncompleteTransfer {
        path: String,
        expected: u64,
        received: u64,
    },

    #[error("{name} is skipped: it would overwrite the index being read")]
    ReservedName { name: String },

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl FspError {
    /// Stable tag naming the kind of failure.
    pub fn code(&self) -> &'static str {
        match self {
            FspError::MalformedLocator(_) => "MALFORMED_LOCATOR",
            FspError::InvalidNameserver(_) => "INVALID_NAMESERVER",
            FspError::NameserverTimeout { .. } => "TIMEOUT",
            FspError::NameserverUnreachable { .. } => "NAMESERVER_UNREACHABLE",
            FspError::MalformedNameserverReply(_) => "MALFORMED_REPLY",
            FspError::ResolutionFailed(_) => "RESOLUTION_FAILED",
            FspError::ConnectionError { .. } => "CONNECTION_ERROR",
            FspError::ReadTimeout { .. } => "READ_TIMEOUT",
            FspError::MalformedResponseHeader(_) => "MALFORMED_HEADER",
            FspError::NotReceived { .. } => "NOT_RECEIVED",
            FspError::IncompleteTransfer { .. } => "INCOMPLETE_TRANSFER",
            FspError::ReservedName { .. } => "RESERVED_NAME",
            FspError::Io { .. } => "IO_ERROR",
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        FspError::Io {
            path: path.into(),
            source,
        }
    }
}

/// True for the error kinds a socket reports when its read timeout expires.
pub(crate) fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}
