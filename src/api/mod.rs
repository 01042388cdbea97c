//! API routes: `/API/<NAME>/CALL_API`.
//!
//! A route is a function from the raw parameter string (query string of a
//! `GET`, body of a `POST`) to a serializable payload. The server turns the
//! payload into an indented JSON document.
//!
//! # Examples
//! ```
//! use hudserve::Routes;
//! use serde::Serialize;
//!
//! #[derive(Serialize)]
//! struct Clock {
//!     time: String,
//! }
//!
//! let routes = Routes::new()
//!     .with_sample()
//!     .register("/API/CLOCK", |_params: &str| {
//!         Some(Clock { time: "12:00:00".to_string() })
//!     });
//!
//! assert!(routes.contains("/api/clock/CALL_API"));
//! assert!(routes.contains("/API/APISAMPLE"));
//! assert_eq!(routes.len(), 2);
//! ```

pub mod hud;
pub mod sample;

use serde::Serialize;
use std::{collections::HashMap, fmt};

pub(crate) const API_PREFIX: &str = "/API/";
pub(crate) const CALL_SUFFIX: &str = "/CALL_API";

/// Type-erased route: parameters in, JSON document out.
///
/// `None` means the route had nothing to say for these parameters.
pub type ApiHandler = Box<dyn Fn(&str) -> Option<Result<String, serde_json::Error>> + Send + Sync>;

/// Case-insensitive table of API routes.
///
/// Built once before the server starts and read-only afterwards.
#[derive(Default)]
pub struct Routes {
    handlers: HashMap<String, ApiHandler>,
}

impl Routes {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under `path`.
    ///
    /// `path` is matched case-insensitively and may be given with or without
    /// the `/CALL_API` suffix. A later registration of the same path replaces
    /// the earlier one.
    pub fn register<T, F>(mut self, path: &str, handler: F) -> Self
    where
        T: Serialize,
        F: Fn(&str) -> Option<T> + Send + Sync + 'static,
    {
        let handler: ApiHandler = Box::new(move |params: &str| {
            handler(params).map(|payload| serde_json::to_string_pretty(&payload))
        });

        self.handlers.insert(route_key(path), handler);
        self
    }

    /// Registers the fixed sample payload under `/API/APISAMPLE`.
    #[inline]
    pub fn with_sample(self) -> Self {
        self.register(sample::PATH, sample::api_sample)
    }

    /// Registers the HUD pages of `source` under `/API/HUD`.
    #[inline]
    pub fn with_hud<S: hud::HudSource + 'static>(self, source: S) -> Self {
        self.register(hud::PATH, move |params: &str| hud::api_hud(&source, params))
    }

    #[inline]
    pub fn contains(&self, path: &str) -> bool {
        self.handlers.contains_key(&route_key(path))
    }

    #[inline]
    pub(crate) fn get(&self, path: &str) -> Option<&ApiHandler> {
        self.handlers.get(&route_key(path))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for Routes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.handlers.keys().collect();
        keys.sort();
        f.debug_struct("Routes").field("paths", &keys).finish()
    }
}

/// Whether an uppercased request path has the `/API/<NAME>/CALL_API` shape.
#[inline]
pub(crate) fn is_api_call(upper_path: &str) -> bool {
    upper_path.starts_with(API_PREFIX) && upper_path.ends_with(CALL_SUFFIX)
}

/// Lookup key of a route: uppercase, leading `/`, no `/CALL_API` suffix.
pub(crate) fn route_key(path: &str) -> String {
    let upper = path.trim().to_ascii_uppercase();
    let key = upper.strip_suffix(CALL_SUFFIX).unwrap_or(&upper);

    match key.starts_with('/') {
        true => key.to_string(),
        false => format!("/{key}"),
    }
}
