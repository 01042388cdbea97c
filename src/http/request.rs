use crate::{
    errors::ErrorKind,
    http::types::{self, Header, Method},
    limits::ReqLimits,
};
use memchr::{memchr, memchr_iter, memrchr};
use std::{io, ops::Range, time::Duration};
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    time::sleep,
};

/// A parsed HTTP request.
///
/// # Accepted input
///
/// #### General designations
/// - `SP`: ASCII space (0x20)
/// - `EOL`: `"\r\n"` or a bare `"\n"`
///
/// ## First line
///
/// Blank lines before the first line are skipped.
///
/// ```text
/// [METHOD] SP [URI] SP [VERSION] EOL
/// ```
///
/// - `[METHOD]`: the text before the first space; only `GET` and `POST` are
///   accepted, everything else is answered with
///   `501 Request method not implemented`.
/// - `[URI]`: everything from the first `/` to the last space. It is
///   percent-decoded before use (`+` is left alone).
/// - `[VERSION]`: not interpreted.
///
/// A first line without a space, without a `/`, or whose last space comes
/// before the first `/` counts as an unsupported method too.
///
/// ## Header
///
/// ```text
/// [NAME] ":" [VALUE] EOL
/// ```
///
/// Name and value are trimmed. Lines without a colon are logged and skipped.
/// When a name repeats (case-insensitively) the first value is kept.
///
/// ## Body
///
/// Only `POST` carries a body. With `Content-Length` the body is exactly that
/// many bytes; without it, whatever arrived together with the header block.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    method: Method,
    uri: String,

    headers: Vec<Header>,
    content_length: Option<usize>,

    body: Option<String>,
}

// Public API
impl Request {
    #[inline(always)]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// The percent-decoded URI, query included.
    #[inline(always)]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// The URI up to the first `?`.
    #[inline]
    pub fn path(&self) -> &str {
        match self.uri.split_once('?') {
            Some((path, _)) => path,
            None => &self.uri,
        }
    }

    /// The URI after the first `?`, if there is one (possibly empty).
    #[inline]
    pub fn query(&self) -> Option<&str> {
        self.uri.split_once('?').map(|(_, query)| query)
    }

    /// Returns the header value with case-insensitive name matching.
    /// Uses linear search.
    #[inline]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    /// Headers in the order they arrived.
    #[inline(always)]
    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    #[inline(always)]
    pub const fn content_length(&self) -> Option<usize> {
        self.content_length
    }

    /// The `POST` payload. Always `None` for `GET`.
    #[inline]
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }
}

// Parse first line
impl Request {
    #[inline]
    fn from_request_line(line: &[u8]) -> Result<Self, ErrorKind> {
        let method_end = memchr(b' ', line).ok_or(ErrorKind::MethodNotImplemented)?;
        let method = Method::from_bytes(&line[..method_end])?;

        let uri_start = memchr(b'/', line).ok_or(ErrorKind::MethodNotImplemented)?;
        let uri_end = memrchr(b' ', line)
            .filter(|&end| end > uri_start)
            .ok_or(ErrorKind::MethodNotImplemented)?;

        let decoded = urlencoding::decode_binary(&line[uri_start..uri_end]);

        Ok(Request {
            method,
            uri: to_text(&decoded),

            headers: Vec::new(),
            content_length: None,

            body: None,
        })
    }
}

// Parse headers
impl Request {
    #[inline]
    fn push_header_line(&mut self, line: &[u8]) {
        let Some(colon) = memchr(b':', line) else {
            tracing::warn!(line = %to_text(line), "header line without ':' skipped");
            return;
        };

        let name = to_text(types::trim_ascii(&line[..colon]));
        let value = to_text(types::trim_ascii(&line[colon + 1..]));

        if self.header(&name).is_some() {
            tracing::warn!(header = %name, "duplicate header ignored");
            return;
        }

        self.headers.push(Header { name, value });
    }

    #[inline]
    fn parse_content_length(&mut self, limits: &ReqLimits) -> Result<(), ErrorKind> {
        let Some(value) = self.header("Content-Length") else {
            return Ok(());
        };

        match (types::slice_to_usize(value.as_bytes()), self.method) {
            (Some(len), Method::Post) if len > limits.body_size => {
                tracing::warn!(len, limit = limits.body_size, "request body too large");
                Err(ErrorKind::RequestTooLarge)
            }
            (Some(len), _) => {
                self.content_length = Some(len);
                Ok(())
            }
            (None, Method::Post) => {
                tracing::warn!(value, "invalid Content-Length");
                Err(ErrorKind::ServerError)
            }
            (None, Method::Get) => Ok(()),
        }
    }
}

//

/// Outcome of one [`Parser::parse`] pass.
#[derive(Debug, PartialEq)]
pub(crate) enum Parsed {
    /// More bytes are needed.
    Partial,
    Complete(Request),
}

/// Incremental request parser over a fixed-size receive buffer.
///
/// Every read appends to the buffer and the parser looks at everything
/// received so far. Once the header block is complete its result is kept, so
/// later passes only wait for the rest of a `POST` body.
#[derive(Debug)]
pub(crate) struct Parser {
    len: usize,
    buffer: Box<[u8]>,

    // Request without its body, and where the body starts
    head: Option<(Request, usize)>,
}

impl Parser {
    #[inline(always)]
    pub(crate) fn new(limits: &ReqLimits) -> Self {
        let buffer = vec![0; limits.buffer_size()].into_boxed_slice();

        Parser {
            len: 0,
            buffer,
            head: None,
        }
    }

    #[inline]
    pub(crate) fn reset(&mut self) {
        self.len = 0;
        self.head = None;
    }

    #[inline(always)]
    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }
}

// Work with Buffer
impl Parser {
    /// Appends one read's worth of bytes to the buffer.
    ///
    /// Returns the number of bytes read; `0` means the peer closed its side.
    #[inline]
    pub(crate) async fn fill_buffer<S>(&mut self, stream: &mut S, time: Duration) -> io::Result<usize>
    where
        S: AsyncRead + Unpin,
    {
        tokio::select! {
            biased;

            read_result = stream.read(&mut self.buffer[self.len..]) => {
                let n = read_result?;
                self.len += n;
                Ok(n)
            }
            _ = sleep(time) => {
                Err(io::Error::new(io::ErrorKind::TimedOut, "read timeout"))
            },
        }
    }

    /// Examines everything received so far.
    ///
    /// A request that is still incomplete when the buffer is full is rejected
    /// with [`ErrorKind::RequestTooLarge`], so the caller never reads into a
    /// full buffer.
    pub(crate) fn parse(&mut self, limits: &ReqLimits) -> Result<Parsed, ErrorKind> {
        let head = match self.head.take() {
            Some(head) => Some(head),
            None => self.parse_head(limits)?,
        };

        let parsed = match head {
            None => Parsed::Partial,
            Some((request, _)) if request.method == Method::Get => Parsed::Complete(request),
            Some((mut request, body_start)) => match self.post_body(&request, body_start) {
                Some(body) => {
                    request.body = Some(body);
                    Parsed::Complete(request)
                }
                None => {
                    self.head = Some((request, body_start));
                    Parsed::Partial
                }
            },
        };

        if parsed == Parsed::Partial && self.len == self.buffer.len() {
            tracing::warn!(size = self.len, "request does not fit the receive buffer");
            return Err(ErrorKind::RequestTooLarge);
        }

        Ok(parsed)
    }

    fn parse_head(&self, limits: &ReqLimits) -> Result<Option<(Request, usize)>, ErrorKind> {
        let data = &self.buffer[..self.len];

        let mut request = None;
        let mut header_lines: Vec<Range<usize>> = Vec::new();
        let mut start = 0;

        for newline in memchr_iter(b'\n', data) {
            let end = match newline > start && data[newline - 1] == b'\r' {
                true => newline - 1,
                false => newline,
            };
            let next = newline + 1;

            if next > limits.header_block_size {
                tracing::warn!(limit = limits.header_block_size, "header block too large");
                return Err(ErrorKind::RequestTooLarge);
            }

            match request {
                // Blank lines before the request line
                None if start == end => {}
                None => request = Some(Request::from_request_line(&data[start..end])?),
                Some(mut request) if start == end => {
                    for line in header_lines {
                        request.push_header_line(&data[line]);
                    }
                    request.parse_content_length(limits)?;

                    return Ok(Some((request, next)));
                }
                Some(_) => {
                    if header_lines.len() >= limits.header_count {
                        tracing::warn!(limit = limits.header_count, "too many headers");
                        return Err(ErrorKind::RequestTooLarge);
                    }
                    header_lines.push(start..end);
                }
            }

            start = next;
        }

        if self.len > limits.header_block_size {
            tracing::warn!(limit = limits.header_block_size, "header block too large");
            return Err(ErrorKind::RequestTooLarge);
        }

        Ok(None)
    }

    #[inline]
    fn post_body(&self, request: &Request, start: usize) -> Option<String> {
        let available = &self.buffer[start..self.len];

        match request.content_length {
            Some(len) if available.len() < len => None,
            Some(len) => Some(to_text(&available[..len])),
            None => Some(to_text(available)),
        }
    }
}

#[inline]
fn to_text(bytes: &[u8]) -> String {
    match simdutf8::basic::from_utf8(bytes) {
        Ok(text) => text.to_owned(),
        Err(_) => String::from_utf8_lossy(bytes).into_owned(),
    }
}

#[cfg(test)]
impl Parser {
    pub(crate) fn from<V: AsRef<[u8]>>(limits: &ReqLimits, value: V) -> Self {
        let mut parser = Parser::new(limits);
        parser.push(value);
        parser
    }

    pub(crate) fn push<V: AsRef<[u8]>>(&mut self, value: V) {
        let value = value.as_ref();
        assert!(
            self.len + value.len() <= self.buffer.len(),
            "test input of {} bytes does not fit the {}-byte buffer",
            value.len(),
            self.buffer.len() - self.len
        );
        self.buffer[self.len..self.len + value.len()].copy_from_slice(value);
        self.len += value.len();
    }
}

#[cfg(test)]
impl Request {
    /// Parses a complete request with the default limits.
    pub(crate) fn from_raw(raw: &str) -> Self {
        match Parser::from(&ReqLimits::default(), raw).parse(&ReqLimits::default()) {
            Ok(Parsed::Complete(request)) => request,
            other => panic!("incomplete test request {raw:?}: {other:?}"),
        }
    }
}
