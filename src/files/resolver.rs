use crate::{
    errors::{ErrorKind, ServerError},
    files::extensions::{extension_of, ExtensionTable},
    http::response::Response,
};
use std::{
    io,
    path::{Component, Path, PathBuf, MAIN_SEPARATOR_STR},
};

const INDEX_FILE: &str = "index.html";

/// Maps request paths to files under one directory.
///
/// Resolution of a path such as `/css/hud.css`:
/// ```text
/// [ lexical normalization ] -- ".." above the root --> 404
///           ||
/// [ root + path is a file? ] -- no, path ends in "/" --> retry with index.html
///           ||
/// [ extension in the table? ] -- no --> 501 Extension <EXT> not implemented
///           ||
/// [ file found? ] -- no --> 404
///           ||
/// [ canonical path inside the canonical root? ] -- no --> 404
///           ||
/// [ read the file ] --> 200 OK
/// ```
#[derive(Debug, Clone)]
pub struct ContentRoot {
    root: PathBuf,
    canonical: PathBuf,
    extensions: ExtensionTable,
}

impl ContentRoot {
    /// Opens `root`, which must be an existing directory.
    pub fn open<P: Into<PathBuf>>(root: P, extensions: ExtensionTable) -> Result<Self, ServerError> {
        let root = root.into();
        let content_root_err = |source| ServerError::ContentRoot {
            path: root.clone(),
            source,
        };

        let canonical = root.canonicalize().map_err(content_root_err)?;
        if !canonical.is_dir() {
            return Err(content_root_err(io::Error::new(
                io::ErrorKind::Other,
                "not a directory",
            )));
        }

        Ok(Self {
            root,
            canonical,
            extensions,
        })
    }

    #[inline(always)]
    pub fn path(&self) -> &Path {
        &self.root
    }

    #[inline(always)]
    pub fn extensions(&self) -> &ExtensionTable {
        &self.extensions
    }

    /// Serves the file behind `uri_path` (decoded, query already removed).
    pub async fn resolve(&self, uri_path: &str) -> Result<Response, ErrorKind> {
        let Some(relative) = normalize(uri_path) else {
            tracing::warn!(path = uri_path, "path escapes the content root");
            return Err(self.not_found(uri_path));
        };

        let mut candidate = self.canonical.join(&relative);
        let mut found = is_file(&candidate).await;

        if !found && uri_path.ends_with('/') {
            candidate.push(INDEX_FILE);
            found = is_file(&candidate).await;
        }

        // The allow-list applies to missing files too
        let extension = extension_of(&candidate);
        let Some(content_type) = self.extensions.content_type(&extension) else {
            return Err(ErrorKind::ExtensionNotImplemented(extension));
        };

        if !found {
            return Err(self.not_found(uri_path));
        }

        // Symlinks may still point outside
        let contained = tokio::fs::canonicalize(&candidate)
            .await
            .map(|real| real.starts_with(&self.canonical))
            .unwrap_or(false);
        if !contained {
            tracing::warn!(path = uri_path, "path escapes the content root");
            return Err(self.not_found(uri_path));
        }

        match tokio::fs::read(&candidate).await {
            Ok(bytes) => {
                tracing::debug!(path = %candidate.display(), len = bytes.len(), "file served");
                Ok(Response::file(content_type, bytes))
            }
            Err(e) => {
                tracing::error!(path = %candidate.display(), error = %e, "failed to read file");
                Err(ErrorKind::ServerError)
            }
        }
    }

    fn not_found(&self, uri_path: &str) -> ErrorKind {
        let host_path = uri_path.replace('/', MAIN_SEPARATOR_STR);
        let root = self.root.display().to_string();

        ErrorKind::FileNotFound(format!(
            "{}{host_path}",
            root.trim_end_matches(MAIN_SEPARATOR_STR)
        ))
    }
}

/// Lexical normalization of a request path into a root-relative path.
///
/// `.` and empty segments are dropped and `..` removes the previous segment.
/// Returns `None` when `..` would climb above the root.
fn normalize(uri_path: &str) -> Option<PathBuf> {
    let mut parts: Vec<&str> = Vec::new();

    for segment in uri_path.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            _ => parts.push(segment),
        }
    }

    let relative: PathBuf = parts.iter().collect();

    // A segment like "C:" must not turn the join into an absolute path
    match relative.components().all(|c| matches!(c, Component::Normal(_))) {
        true => Some(relative),
        false => None,
    }
}

#[inline]
async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}
