use std::{collections::HashMap, path::Path};

/// Allow-list of servable file extensions and their content types.
///
/// Keys are stored uppercase without the leading dot. A static file whose
/// extension is not in the table is refused even when it exists.
///
/// # Examples
/// ```
/// use hudserve::ExtensionTable;
///
/// let table = ExtensionTable::default().with("SVG", "image/svg+xml");
///
/// assert_eq!(table.content_type("html"), Some("text/html"));
/// assert_eq!(table.content_type(".Svg"), Some("image/svg+xml"));
/// assert_eq!(table.content_type("exe"), None);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionTable {
    types: HashMap<String, String>,
}

impl Default for ExtensionTable {
    fn default() -> Self {
        #[rustfmt::skip]
        let defaults = [
            ("HTM",  "text/html"),
            ("HTML", "text/html"),
            ("TXT",  "text/plain"),
            ("CSS",  "text/css"),
            ("XML",  "application/xml"),
            ("JS",   "application/javascript"),
            ("JSON", "application/json"),
            ("ICO",  "image/x-icon"),
            ("PNG",  "image/png"),
            ("GIF",  "image/gif"),
            ("JPG",  "image/jpg"),
            ("JPEG", "image/jpeg"),
        ];

        defaults
            .into_iter()
            .fold(Self::empty(), |table, (ext, mime)| table.with(ext, mime))
    }
}

impl ExtensionTable {
    /// A table that refuses every file.
    #[inline]
    pub fn empty() -> Self {
        Self {
            types: HashMap::new(),
        }
    }

    /// Adds (or replaces) one entry.
    pub fn with(mut self, extension: &str, content_type: &str) -> Self {
        self.types
            .insert(normalize(extension), content_type.to_string());
        self
    }

    /// Content type for `extension` (any case, leading dot optional).
    #[inline]
    pub fn content_type(&self, extension: &str) -> Option<&str> {
        self.types.get(&normalize(extension)).map(String::as_str)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// The extension of `path` in table form: uppercase, no dot. Empty when the
/// file name has no extension.
pub(crate) fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_uppercase())
        .unwrap_or_default()
}

#[inline]
fn normalize(extension: &str) -> String {
    extension.trim_start_matches('.').to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let table = ExtensionTable::default();

        #[rustfmt::skip]
        let cases = [
            ("htm",   Some("text/html")),
            ("HTML",  Some("text/html")),
            (".txt",  Some("text/plain")),
            ("css",   Some("text/css")),
            ("xml",   Some("application/xml")),
            ("js",    Some("application/javascript")),
            ("json",  Some("application/json")),
            ("ico",   Some("image/x-icon")),
            ("png",   Some("image/png")),
            ("gif",   Some("image/gif")),
            ("jpg",   Some("image/jpg")),
            ("jpeg",  Some("image/jpeg")),

            ("exe",   None),
            ("svg",   None),
            ("",      None),
        ];

        for (ext, expected) in cases {
            assert_eq!(table.content_type(ext), expected, "{ext}");
        }
        assert_eq!(table.len(), 12);
    }

    #[test]
    fn extend_and_replace() {
        let table = ExtensionTable::empty()
            .with("wasm", "application/wasm")
            .with(".WASM", "application/octet-stream");

        assert_eq!(table.len(), 1);
        assert_eq!(table.content_type("Wasm"), Some("application/octet-stream"));
        assert!(ExtensionTable::empty().is_empty());
    }

    #[test]
    fn path_extension() {
        #[rustfmt::skip]
        let cases = [
            ("index.html",        "HTML"),
            ("dir/style.Css",     "CSS"),
            ("archive.tar.gz",    "GZ"),
            ("README",            ""),
            ("dir.d/noext",       ""),
        ];

        for (path, expected) in cases {
            assert_eq!(extension_of(Path::new(path)), expected, "{path}");
        }
    }
}
