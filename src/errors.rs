use std::{fmt, io, net::SocketAddr, path::PathBuf};
use thiserror::Error;

/// Failure while handling one request.
///
/// Every variant is answered with a regular HTTP response (an HTML page whose
/// banner repeats the status text). None of them reaches the accept loop.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorKind {
    /// The request line is malformed or names a method other than `GET`/`POST`.
    MethodNotImplemented,
    /// The requested file exists but its extension is not on the allow-list.
    ExtensionNotImplemented(String),
    /// API-shaped path with no registered route (carries the uppercased URI).
    ApiNotFound(String),
    /// A non-API path carried a query string (carries the decoded URI).
    ApiBadlyFormed(String),
    /// No such file under the content root (carries the resolved path).
    FileNotFound(String),
    /// The connection ended or stalled before a complete request arrived.
    ServerError,

    /// The header block or body exceeded [`ReqLimits`](crate::limits::ReqLimits).
    RequestTooLarge,
    /// The admission queue was full when the connection was accepted.
    ServiceUnavailable,
}

impl ErrorKind {
    /// Status text that follows `HTTP/1.1 ` in the response line.
    pub fn status_line(&self) -> String {
        match self {
            Self::MethodNotImplemented => "501 Request method not implemented".to_string(),
            Self::ExtensionNotImplemented(ext) => format!("501 Extension {ext} not implemented"),
            Self::ApiNotFound(uri) => format!("501 API {uri} not found"),
            Self::ApiBadlyFormed(uri) => {
                format!("501 API {uri} badly formed. Must start with 'API/'")
            }
            Self::FileNotFound(path) => format!("404 File {path} not found"),
            Self::ServerError => "500 Internal web-server error".to_string(),
            Self::RequestTooLarge => "413 Request too large".to_string(),
            Self::ServiceUnavailable => "503 Web-server busy".to_string(),
        }
    }

    /// Numeric part of the status line, for logging.
    pub const fn code(&self) -> u16 {
        match self {
            Self::MethodNotImplemented
            | Self::ExtensionNotImplemented(_)
            | Self::ApiNotFound(_)
            | Self::ApiBadlyFormed(_) => 501,
            Self::FileNotFound(_) => 404,
            Self::ServerError => 500,
            Self::RequestTooLarge => 413,
            Self::ServiceUnavailable => 503,
        }
    }
}

impl std::error::Error for ErrorKind {}
impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.status_line())
    }
}

/// Operator-facing failures: startup, configuration and listener I/O.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("content root {path:?} is unusable: {source}")]
    ContentRoot {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}
