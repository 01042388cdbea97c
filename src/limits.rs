//! Server limits and timeouts
//!
//! # Security-First Defaults
//!
//! The defaults are sized for a trusted, mostly-localhost audience (a browser
//! showing HUD pages next to the simulator) and still cap what a slow or
//! hostile client can make the server hold:
//! - Slowloris clients hit [`ConnLimits::socket_read_timeout`]
//! - Header flooding hits [`ReqLimits::header_block_size`] and [`ReqLimits::header_count`]
//! - Oversized POST parameters hit [`ReqLimits::body_size`]
//!
//! # Examples
//!
//! ```no_run
//! use hudserve::{limits::{ConnLimits, ServerLimits}, Routes, Server, ServerConfig};
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), hudserve::ServerError> {
//! Server::builder()
//!     .config(ServerConfig::default())
//!     .routes(Routes::new())
//!     .server_limits(ServerLimits {
//!         max_connections: 16,
//!         ..ServerLimits::default()
//!     })
//!     .connection_limits(ConnLimits {
//!         socket_read_timeout: Duration::from_secs(5),
//!         ..ConnLimits::default()
//!     })
//!     .build()?
//!     .start()
//!     .await
//! # }
//! ```

use std::time::Duration;

/// Controls accept-side concurrency and queueing.
///
/// # Connection management
/// ```text
///                            [------------]
///                            [ Tcp accept ]   (one accept outstanding)
///                            [------------]
///                                  ||
///                                  || TCP_STREAM
///                                  \/
/// [--------------]   Yes   /----------------\   No   [-------------]
/// [ Add to queue ] <====== | Room in queue? | =====> [ Sending 503 ]
/// [--------------]         \----------------/        [-------------]
///        ||
///        \==================\\          //====================\
///                            V          V                    ||
/// [---------]   Yes   /--------------------------\   No   [------]
/// [ Worker  ] <====== | Is there a free worker?  | =====> [ Wait ]
/// [---------]         \--------------------------/        [------]
/// ```
///
/// Each worker is a Tokio task created when the server starts. It takes one
/// connection at a time from the queue and runs it to completion
/// (read, parse, dispatch, write, close).
#[derive(Debug, Clone)]
pub struct ServerLimits {
    /// Number of connections processed concurrently (default: `32`).
    pub max_connections: usize,

    /// Accepted connections allowed to wait for a worker (default: `64`).
    ///
    /// Connections accepted while the queue is full are answered with
    /// `503 Web-server busy` and closed.
    pub max_pending_connections: usize,

    /// How idle workers wait for the queue (default: `Sleep(200 microseconds)`).
    pub wait_strategy: WaitStrategy,
}

impl Default for ServerLimits {
    fn default() -> Self {
        Self {
            max_connections: 32,
            max_pending_connections: 64,
            wait_strategy: WaitStrategy::Sleep(Duration::from_micros(200)),
        }
    }
}

/// Strategy for worker task waiting when no connections are available
#[derive(Debug, Clone)]
pub enum WaitStrategy {
    /// While waiting, uses [`tokio::task::yield_now()`]
    ///
    /// Lowest latency, but keeps a core busy while idle.
    Yield,

    /// While waiting, uses [`tokio::time::sleep()`]
    Sleep(Duration),
}

/// Per-connection timeouts.
#[derive(Debug, Clone)]
pub struct ConnLimits {
    /// Maximum wait for each read from the socket (default: `2 seconds`)
    ///
    /// A client that stops sending before the blank line that ends the header
    /// block is answered with `500 Internal web-server error` once this expires.
    pub socket_read_timeout: Duration,

    /// Maximum duration of the response write (default: `3 seconds`)
    pub socket_write_timeout: Duration,

    /// Upper bound on the whole read phase of one connection (default: `10 seconds`)
    ///
    /// A client trickling one byte per read timeout would otherwise keep a
    /// worker busy indefinitely.
    pub connection_lifetime: Duration,
}

impl Default for ConnLimits {
    #[inline(always)]
    fn default() -> Self {
        Self {
            socket_read_timeout: Duration::from_secs(2),
            socket_write_timeout: Duration::from_secs(3),
            connection_lifetime: Duration::from_secs(10),
        }
    }
}

/// Request size limits.
///
/// Each connection allocates one receive buffer of
/// [`buffer_size`](ReqLimits::buffer_size) bytes:
///
/// ```text
/// Total Buffer = Header block + Body
/// ```
///
/// Requests that do not fit are answered with `413 Request too large`.
#[derive(Debug, Clone)]
pub struct ReqLimits {
    /// Maximum size of the request line plus all header lines, including the
    /// terminating blank line (default: `8 KB`)
    pub header_block_size: usize,

    /// Maximum number of header lines (default: `32`)
    pub header_count: usize,

    /// Maximum POST body size (default: `4 KB`)
    ///
    /// API parameters are short `key=value` strings, so this stays small.
    pub body_size: usize,
}

impl Default for ReqLimits {
    fn default() -> Self {
        Self {
            header_block_size: 8 * 1024,
            header_count: 32,
            body_size: 4 * 1024,
        }
    }
}

impl ReqLimits {
    /// Size of the per-connection receive buffer.
    ///
    /// ```
    /// use hudserve::limits::ReqLimits;
    ///
    /// let limits = ReqLimits::default();
    /// assert_eq!(limits.buffer_size(), 12 * 1024);
    /// ```
    #[inline(always)]
    pub fn buffer_size(&self) -> usize {
        self.header_block_size + self.body_size
    }
}
