//! Construction-time configuration.
//!
//! [`ServerConfig`] is fixed for the lifetime of a [`Server`](crate::Server).
//! The binary fills it from the command line or the environment through
//! [`Cli`]:
//!
//! ```bash
//! hudserve --port 2150 --content ./content/web
//! HUDSERVE_PORT=2150 HUDSERVE_CONTENT=./content/web hudserve
//! ```

use crate::{
    errors::ServerError,
    limits::{ConnLimits, ServerLimits},
};
use clap::Parser;
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
    time::Duration,
};

/// Where and how the server listens, and what it serves.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Interface to bind.
    pub address: IpAddr,
    /// TCP port; `0` lets the OS pick one.
    pub port: u16,
    /// Length of the kernel's pending-connection queue.
    pub backlog: u32,
    /// Directory tree served for non-API requests.
    pub content_root: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 2150,
            backlog: 10,
            content_root: PathBuf::from("./content/web"),
        }
    }
}

impl ServerConfig {
    #[inline]
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }

    pub fn validate(&self) -> Result<(), ServerError> {
        if self.backlog == 0 {
            return Err(ServerError::Config("backlog must be >= 1".to_string()));
        }
        if self.content_root.as_os_str().is_empty() {
            return Err(ServerError::Config("content root must be set".to_string()));
        }
        Ok(())
    }
}

/// Command line of the `hudserve` binary.
#[derive(Debug, Clone, Parser)]
#[command(name = "hudserve")]
#[command(about = "Serves HUD web pages and JSON APIs over a minimal HTTP/1.1 server")]
#[command(version)]
pub struct Cli {
    /// Interface to bind
    #[arg(long, default_value = "127.0.0.1", env = "HUDSERVE_ADDRESS")]
    pub address: IpAddr,

    /// Port to listen on
    #[arg(short, long, default_value = "2150", env = "HUDSERVE_PORT")]
    pub port: u16,

    /// Pending-connection backlog
    #[arg(long, default_value = "10", env = "HUDSERVE_BACKLOG")]
    pub backlog: u32,

    /// Directory with the static web content
    #[arg(short, long, default_value = "./content/web", env = "HUDSERVE_CONTENT")]
    pub content: PathBuf,

    /// Connections processed concurrently
    #[arg(long, default_value = "32", env = "HUDSERVE_WORKERS")]
    pub workers: usize,

    /// Per-read timeout in milliseconds
    #[arg(long = "read-timeout-ms", default_value = "2000", env = "HUDSERVE_READ_TIMEOUT_MS")]
    pub read_timeout_ms: u64,

    /// Response write timeout in milliseconds
    #[arg(long = "write-timeout-ms", default_value = "3000", env = "HUDSERVE_WRITE_TIMEOUT_MS")]
    pub write_timeout_ms: u64,
}

impl Cli {
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            address: self.address,
            port: self.port,
            backlog: self.backlog,
            content_root: self.content.clone(),
        }
    }

    pub fn server_limits(&self) -> ServerLimits {
        ServerLimits {
            max_connections: self.workers.max(1),
            ..ServerLimits::default()
        }
    }

    pub fn connection_limits(&self) -> ConnLimits {
        ConnLimits {
            socket_read_timeout: Duration::from_millis(self.read_timeout_ms),
            socket_write_timeout: Duration::from_millis(self.write_timeout_ms),
            ..ConnLimits::default()
        }
    }
}
