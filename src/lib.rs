//! hudserve - minimal HTTP/1.1 server for HUD web pages and JSON APIs
//!
//! A small server meant to run next to a host application (typically a
//! simulator) and expose its state to a browser: static pages from a content
//! directory, and data through API routes that answer indented JSON.
//!
//! # Protocol
//!
//! - One request per connection, then the server closes (`Connection: close`)
//! - `GET` and `POST` only; anything else is `501 Request method not implemented`
//! - API routes have the form `/API/<NAME>/CALL_API`, matched in any case. The
//!   query string (`GET`) or the body (`POST`) is handed to the route as is
//! - Every other `GET` is served from the content root, restricted to the
//!   extensions listed in the [`ExtensionTable`]
//!
//! # Examples
//!
//! Serve pages and the sample API:
//! ```no_run
//! use hudserve::{Routes, Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), hudserve::ServerError> {
//!     Server::builder()
//!         .config(ServerConfig {
//!             content_root: "./content/web".into(),
//!             ..ServerConfig::default()
//!         })
//!         .routes(Routes::new().with_sample())
//!         .build()?
//!         .start()
//!         .await
//! }
//! ```
//! Expose HUD tables owned by the host:
//! ```no_run
//! use hudserve::{Routes, Server};
//!
//! fn table(page: u32) -> Vec<Vec<Option<String>>> {
//!     match page {
//!         0 => vec![vec![Some("Speed".into()), Some("80".into())]],
//!         _ => Vec::new(),
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), hudserve::ServerError> {
//!     // GET /API/HUD/CALL_API?key=0
//!     Server::builder()
//!         .routes(Routes::new().with_hud(table))
//!         .build()?
//!         .start()
//!         .await
//! }
//! ```

pub(crate) mod http {
    pub mod query;
    pub(crate) mod request;
    pub(crate) mod response;
    pub(crate) mod types;
}
pub(crate) mod files {
    pub(crate) mod extensions;
    pub(crate) mod resolver;
}
pub(crate) mod server {
    pub(crate) mod connection;
    pub(crate) mod dispatch;
    pub(crate) mod server_impl;
    pub(crate) mod socket;
}
pub mod api;
pub mod config;
pub(crate) mod errors;
pub mod limits;

pub use crate::{
    api::{
        hud::{HudPages, HudSource, HudTable},
        sample::{ApiSampleData, Embedded},
        ApiHandler, Routes,
    },
    config::{Cli, ServerConfig},
    errors::{ErrorKind, ServerError},
    files::{extensions::ExtensionTable, resolver::ContentRoot},
    http::{
        query,
        request::Request,
        response::{Body, Response, SERVER_NAME},
        types::{Header, Method},
    },
    server::server_impl::{Server, ServerBuilder, ServerHandle},
};
