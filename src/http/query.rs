//! Parameter-string parser for API handlers.
//!
//! API handlers receive their parameters as one raw string: the query string
//! of a `GET` or the body of a `POST`. Handlers that use the usual
//! `key=value&key=value` form can split it with [`Query`].
//!
//! This is a helper for routes registered by the embedding application
//! (through [`Routes::register`](crate::Routes::register)). The server never
//! parses parameters itself, and the bundled HUD route keeps its own
//! `key=<page>` rule: everything after the first `=` is the page number,
//! whatever the key.

use memchr::memchr;
use std::{collections::HashMap, error, fmt};

/// Zero-copy `key=value&...` parser.
///
/// The parameter string has already been percent-decoded by the server, so
/// names and values are returned as-is.
///
/// # Examples
/// ```rust
/// use hudserve::query::Query;
/// use std::collections::HashMap;
///
/// // Parse into Vec (preserves order)
/// let vec_params: Vec<(&str, &str)> = Query::parse("key=2&mode", 10).unwrap();
/// assert_eq!(vec_params, [("key", "2"), ("mode", "")]);
///
/// // Parse into HashMap (last value wins)
/// let map: HashMap<&str, &str> = Query::parse("key=1&key=3", 10).unwrap();
/// assert_eq!(map.get("key"), Some(&"3"));
///
/// // Handle limits
/// let result = Query::parse::<Vec<(&str, &str)>>("a=1&b=2", 1);
/// assert!(result.is_err());
/// ```
pub struct Query;

impl Query {
    /// Parses a parameter string into a new collection.
    ///
    /// A leading `?` is skipped, so `?a=1` and `a=1` are equivalent.
    #[inline(always)]
    pub fn parse<'a, C: QueryCollector<'a>>(query: &'a str, limit: usize) -> Result<C, Error> {
        let mut result = C::with_capacity(limit);
        Self::parse_into(&mut result, query, limit)?;
        Ok(result)
    }

    /// Parses a parameter string, appending to an existing collection.
    ///
    /// ```
    /// use hudserve::query::Query;
    ///
    /// let mut collector = Vec::new();
    ///
    /// Query::parse_into(&mut collector, "a=1&b=2", 10).unwrap();
    /// Query::parse_into(&mut collector, "c=3", 10).unwrap();
    /// assert_eq!(collector.len(), 3);
    /// ```
    pub fn parse_into<'a, C: QueryCollector<'a>>(
        result: &mut C,
        query: &'a str,
        limit: usize,
    ) -> Result<(), Error> {
        let data = query.strip_prefix('?').unwrap_or(query);
        if data.is_empty() {
            return Err(Error::Empty);
        }

        let bytes = data.as_bytes();
        let mut start = 0;
        while start < bytes.len() {
            if result.length() >= limit {
                return Err(Error::OverLimit(limit));
            }

            let end = memchr(b'&', &bytes[start..])
                .map(|pos| start + pos)
                .unwrap_or(bytes.len());

            // '&' and '=' are ASCII, so every split point is a char boundary
            let split = memchr(b'=', &bytes[start..end]).map(|pos| start + pos);
            let (key, value) = match split {
                Some(split) => (&data[start..split], &data[split + 1..end]),
                None => (&data[start..end], ""),
            };

            result.add_param(key, value);
            start = end + 1;
        }

        Ok(())
    }

    /// Returns the value of the first `name` parameter.
    ///
    /// ```
    /// use hudserve::query::Query;
    ///
    /// assert_eq!(Query::first("page=1&key=3&key=4", "key"), Some("3"));
    /// assert_eq!(Query::first("page=1", "key"), None);
    /// ```
    pub fn first<'a>(query: &'a str, name: &str) -> Option<&'a str> {
        let mut params: Vec<(&str, &str)> = Vec::new();
        Self::parse_into(&mut params, query, usize::MAX).ok()?;
        params
            .into_iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
    }
}

/// A collection that can receive parsed parameters.
pub trait QueryCollector<'a>
where
    Self: Sized,
{
    fn add_param(&mut self, key: &'a str, value: &'a str);

    // `length` rather than `len` so clippy does not ask for `is_empty`
    fn length(&self) -> usize;

    fn with_capacity(capacity: usize) -> Self;
}

// Preserves parameter order
impl<'a> QueryCollector<'a> for Vec<(&'a str, &'a str)> {
    #[inline(always)]
    fn add_param(&mut self, key: &'a str, value: &'a str) {
        self.push((key, value));
    }

    #[inline(always)]
    fn length(&self) -> usize {
        self.len()
    }

    #[inline(always)]
    fn with_capacity(capacity: usize) -> Self {
        Vec::with_capacity(capacity.min(16))
    }
}

// Last value wins
impl<'a> QueryCollector<'a> for HashMap<&'a str, &'a str> {
    #[inline(always)]
    fn add_param(&mut self, key: &'a str, value: &'a str) {
        self.insert(key, value);
    }

    #[inline(always)]
    fn length(&self) -> usize {
        self.len()
    }

    #[inline(always)]
    fn with_capacity(capacity: usize) -> Self {
        HashMap::with_capacity(capacity.min(16))
    }
}

/// Errors produced by [`Query::parse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// More parameters than the given limit.
    OverLimit(usize),

    /// The string is empty or just `?`.
    Empty,
}

impl error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::OverLimit(limit) => {
                write!(f, "Parameter limit exceeded: limit={}", limit)
            }
            Error::Empty => {
                write!(f, "Parameter string is empty")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic() {
        let cases = ["a=1&b=2", "?a=1&b=2"];

        for line in cases {
            let params: Vec<(&str, &str)> = Query::parse(line, 8).unwrap();

            assert_eq!(params, [("a", "1"), ("b", "2")]);
        }
    }

    #[test]
    fn full() {
        let params: Vec<(&str, &str)> = Query::parse("flag&empty=&=val&&key=a=b", 10).unwrap();

        #[rustfmt::skip]
        assert_eq!(params, [
            ("flag",  ""),
            ("empty", ""),
            ("",      "val"),
            ("",      ""),
            ("key",   "a=b"),
        ]);
    }

    #[test]
    fn non_ascii() {
        let params: Vec<(&str, &str)> = Query::parse("name=Gare du Nord&città=Milano", 10).unwrap();

        assert_eq!(params, [("name", "Gare du Nord"), ("città", "Milano")]);
    }

    #[test]
    fn first_match() {
        assert_eq!(Query::first("key=0", "key"), Some("0"));
        assert_eq!(Query::first("key", "key"), Some(""));
        assert_eq!(Query::first("", "key"), None);
    }

    #[test]
    fn limit_error() {
        assert_eq!(
            Query::parse::<Vec<(&str, &str)>>("a&a", 1),
            Err(Error::OverLimit(1))
        );
    }

    #[test]
    fn empty_error() {
        for line in ["", "?"] {
            assert_eq!(Query::parse::<Vec<(&str, &str)>>(line, 10), Err(Error::Empty));
        }
    }
}
