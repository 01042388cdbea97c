//! HTTP response model and wire formatting.

use crate::errors::ErrorKind;
use std::borrow::Cow;

/// Value of the `Server` header and the banner of every error page.
pub const SERVER_NAME: &str = "hudserve";

const HTML_ERROR: &str = "text/html; charset=utf-8";

/// Response payload: either text or raw bytes, never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// Sent as UTF-8.
    Text(String),
    /// Sent verbatim (static files).
    Bytes(Vec<u8>),
}

impl Body {
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Body::Text(text) => text.as_bytes(),
            Body::Bytes(bytes) => bytes,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One complete response: status text, content type and body.
///
/// Every response is written the same way:
///
/// ```text
/// HTTP/1.1 [STATUS]\r\n
/// Server: hudserve\r\n
/// Content-Length: [LEN]\r\n
/// Connection: close\r\n
/// Content-Type: [TYPE]\r\n
/// Cache-Control: no-cache\r\n
/// \r\n
/// [BODY]
/// ```
///
/// # Examples
/// ```
/// use hudserve::{Body, Response};
///
/// let resp = Response::json("{}".to_string());
/// assert_eq!(resp.status(), "200 OK");
/// assert_eq!(resp.content_type(), "application/json");
/// assert_eq!(resp.body(), &Body::Text("{}".to_string()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: Cow<'static, str>,
    content_type: Cow<'static, str>,
    body: Body,
}

impl Response {
    pub const OK: &'static str = "200 OK";

    #[inline]
    pub fn new<S, C>(status: S, content_type: C, body: Body) -> Self
    where
        S: Into<Cow<'static, str>>,
        C: Into<Cow<'static, str>>,
    {
        Self {
            status: status.into(),
            content_type: content_type.into(),
            body,
        }
    }

    /// `200 OK` with a serialized JSON document.
    #[inline]
    pub fn json(document: String) -> Self {
        Self::new(Self::OK, "application/json", Body::Text(document))
    }

    /// `200 OK` with file contents.
    #[inline]
    pub fn file(content_type: &str, bytes: Vec<u8>) -> Self {
        Self::new(Self::OK, content_type.to_string(), Body::Bytes(bytes))
    }

    /// The HTML error page for `error`.
    ///
    /// ```
    /// use hudserve::{ErrorKind, Response};
    ///
    /// let resp = Response::error(&ErrorKind::ServerError);
    /// assert_eq!(resp.status(), "500 Internal web-server error");
    /// assert_eq!(resp.content_type(), "text/html; charset=utf-8");
    /// ```
    pub fn error(error: &ErrorKind) -> Self {
        let status = error.status_line();
        let page = format!(
            "<!doctype HTML><html><head>\
             <meta http-equiv=\"Content-Type\" content=\"text/html;charset=utf-8\">\
             </head><body><h1>{SERVER_NAME}</h1><div>{}</div></body></html>",
            escape_html(&status)
        );

        Self::new(status, HTML_ERROR, Body::Text(page))
    }

    #[inline(always)]
    pub fn status(&self) -> &str {
        &self.status
    }

    #[inline(always)]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    #[inline(always)]
    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Status code parsed back from the status text, for logging.
    #[inline]
    pub fn code(&self) -> u16 {
        self.status
            .split(' ')
            .next()
            .and_then(|code| code.parse().ok())
            .unwrap_or(0)
    }

    /// Appends the wire bytes of the response to `buffer`.
    pub fn write_to(&self, buffer: &mut Vec<u8>) {
        let body = self.body.as_bytes();
        buffer.reserve(160 + body.len());

        buffer.extend_from_slice(b"HTTP/1.1 ");
        // Decoded paths end up in status texts; keep them on one line
        buffer.extend(self.status.bytes().map(|b| match b.is_ascii_control() {
            true => b' ',
            false => b,
        }));
        buffer.extend_from_slice(b"\r\nServer: ");
        buffer.extend_from_slice(SERVER_NAME.as_bytes());
        buffer.extend_from_slice(b"\r\nContent-Length: ");
        buffer.extend_from_slice(body.len().to_string().as_bytes());
        buffer.extend_from_slice(b"\r\nConnection: close\r\nContent-Type: ");
        buffer.extend_from_slice(self.content_type.as_bytes());
        buffer.extend_from_slice(b"\r\nCache-Control: no-cache\r\n\r\n");
        buffer.extend_from_slice(body);
    }

    #[inline]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = Vec::new();
        self.write_to(&mut buffer);
        buffer
    }
}

// Status texts carry request paths, which are client-controlled
fn escape_html(src: &str) -> Cow<'_, str> {
    if !src.contains(['<', '>', '&', '"']) {
        return Cow::Borrowed(src);
    }

    let mut out = String::with_capacity(src.len() + 16);
    for ch in src.chars() {
        match ch {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    Cow::Owned(out)
}
