use crate::{
    errors::ErrorKind,
    http::{
        request::{Parsed, Parser, Request},
        response::Response,
    },
    limits::{ConnLimits, ReqLimits},
    server::{dispatch::Router, server_impl::AllLimits},
};
use std::{io, net::SocketAddr, sync::Arc};
use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncWriteExt},
    time::timeout,
};

/// One worker's connection state, reused for every connection it serves.
pub(crate) struct HttpConnection {
    router: Arc<Router>,

    parser: Parser,
    output: Vec<u8>,

    conn_limits: ConnLimits,
    req_limits: ReqLimits,
}

/// Why no request came out of the read phase.
#[derive(Debug)]
enum ReadFailure {
    /// Answer with an error page.
    Reply(ErrorKind),
    /// The socket failed; nothing can be sent.
    Io(io::Error),
}

impl From<ErrorKind> for ReadFailure {
    #[inline(always)]
    fn from(error: ErrorKind) -> Self {
        ReadFailure::Reply(error)
    }
}

impl HttpConnection {
    #[inline]
    pub(crate) fn new(router: Arc<Router>, limits: &AllLimits) -> Self {
        Self {
            router,

            parser: Parser::new(&limits.2),
            output: Vec::with_capacity(1024),

            conn_limits: limits.1.clone(),
            req_limits: limits.2.clone(),
        }
    }

    /// Serves one connection: read, parse, dispatch, write, close.
    pub(crate) async fn run<S>(&mut self, stream: &mut S, peer: SocketAddr) -> Result<(), io::Error>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        self.parser.reset();
        self.output.clear();

        let lifetime = self.conn_limits.connection_lifetime;
        let read = match timeout(lifetime, self.read_request(stream)).await {
            Ok(read) => read,
            Err(_) => {
                tracing::warn!(%peer, "connection lifetime exceeded while reading");
                Err(ReadFailure::Reply(ErrorKind::ServerError))
            }
        };

        let response = match read {
            Ok(None) => return Ok(()),
            Ok(Some(request)) => {
                let response = self.router.dispatch(&request).await;
                tracing::debug!(
                    %peer,
                    method = request.method().as_str(),
                    uri = request.uri(),
                    status = response.as_ref().map(|r| r.code()),
                    "request"
                );
                response
            }
            Err(ReadFailure::Reply(error)) => {
                tracing::debug!(%peer, status = error.code(), "request rejected");
                Some(Response::error(&error))
            }
            Err(ReadFailure::Io(e)) => return Err(e),
        };

        if let Some(response) = response {
            response.write_to(&mut self.output);
            writer::write_bytes(stream, &self.output, self.conn_limits.socket_write_timeout).await?;
        }

        // No keep-alive: the write side closes after one response
        if let Err(e) = stream.shutdown().await {
            tracing::debug!(%peer, error = %e, "socket shutdown failed");
        }
        Ok(())
    }

    /// `Ok(None)` when the peer closed without sending anything.
    async fn read_request<S>(&mut self, stream: &mut S) -> Result<Option<Request>, ReadFailure>
    where
        S: AsyncRead + Unpin,
    {
        loop {
            let read = self
                .parser
                .fill_buffer(stream, self.conn_limits.socket_read_timeout)
                .await;

            match read {
                Ok(0) if self.parser.is_empty() => return Ok(None),
                Ok(0) => {
                    tracing::warn!("connection closed before the request was complete");
                    return Err(ErrorKind::ServerError.into());
                }
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                    tracing::warn!("socket read timed out");
                    return Err(ErrorKind::ServerError.into());
                }
                Err(e) => return Err(ReadFailure::Io(e)),
            }

            if let Parsed::Complete(request) = self.parser.parse(&self.req_limits)? {
                return Ok(Some(request));
            }
        }
    }
}

pub(crate) mod writer {
    use crate::{errors::ErrorKind, http::response::Response};
    use std::io;
    use tokio::{
        io::{AsyncWrite, AsyncWriteExt},
        time::{timeout, Duration},
    };

    #[inline]
    pub(crate) async fn send_error<S>(stream: &mut S, error: ErrorKind, time: Duration) -> io::Result<()>
    where
        S: AsyncWrite + Unpin,
    {
        write_bytes(stream, &Response::error(&error).to_bytes(), time).await?;
        stream.shutdown().await
    }

    #[inline(always)]
    pub(crate) async fn write_bytes<S>(stream: &mut S, response: &[u8], time: Duration) -> io::Result<()>
    where
        S: AsyncWrite + Unpin,
    {
        timeout(time, stream.write_all(response)).await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{files::extensions::ExtensionTable, files::resolver::ContentRoot, Routes};
    use std::{
        fs,
        pin::Pin,
        task::{Context, Poll},
        time::Duration,
    };
    use tempfile::TempDir;
    use tokio::io::{duplex, AsyncReadExt, DuplexStream, ReadBuf};

    const PEER: SocketAddr = SocketAddr::new(
        std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
        50000,
    );

    fn connection(limits: AllLimits) -> (TempDir, HttpConnection) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("index.html"), "<h1>HUD</h1>").unwrap();

        let content = ContentRoot::open(dir.path(), ExtensionTable::default()).unwrap();
        let router = Router::new(Routes::new().with_sample(), content);

        (dir, HttpConnection::new(Arc::new(router), &limits))
    }

    async fn exchange(conn: &mut HttpConnection, request: &[u8]) -> (io::Result<()>, String) {
        let (mut client, mut server): (DuplexStream, DuplexStream) = duplex(64 * 1024);

        client.write_all(request).await.unwrap();
        client.shutdown().await.unwrap();

        let result = conn.run(&mut server, PEER).await;
        drop(server);

        let mut response = Vec::new();
        client.read_to_end(&mut response).await.unwrap();
        (result, String::from_utf8_lossy(&response).into_owned())
    }

    #[tokio::test]
    async fn serves_and_closes() {
        let (_dir, mut conn) = connection(AllLimits::default());
        let (result, response) = exchange(&mut conn, b"GET / HTTP/1.1\r\nHost: x\r\n\r\n").await;

        assert!(result.is_ok());
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("Connection: close\r\n"));
        assert!(response.ends_with("\r\n\r\n<h1>HUD</h1>"));
    }

    #[tokio::test]
    async fn reused_between_connections() {
        let (_dir, mut conn) = connection(AllLimits::default());

        let (_, first) = exchange(&mut conn, b"PUT / HTTP/1.1\r\n\r\n").await;
        let (_, second) = exchange(&mut conn, b"GET /index.html HTTP/1.1\r\n\r\n").await;

        assert!(first.starts_with("HTTP/1.1 501 Request method not implemented\r\n"));
        assert!(second.starts_with("HTTP/1.1 200 OK\r\n"));
    }

    #[tokio::test]
    async fn silent_cases() {
        let (_dir, mut conn) = connection(AllLimits::default());

        // Peer closed without a byte
        let (result, response) = exchange(&mut conn, b"").await;
        assert!(result.is_ok());
        assert_eq!(response, "");

        // POST outside the API
        let (result, response) = exchange(&mut conn, b"POST /index.html HTTP/1.1\r\n\r\n").await;
        assert!(result.is_ok());
        assert_eq!(response, "");
    }

    #[tokio::test]
    async fn truncated_request() {
        let (_dir, mut conn) = connection(AllLimits::default());
        let (result, response) = exchange(&mut conn, b"GET / HTTP/1.1\r\nHost: x\r\n").await;

        assert!(result.is_ok());
        assert!(response.starts_with("HTTP/1.1 500 Internal web-server error\r\n"));
    }

    #[tokio::test]
    async fn oversized_request() {
        let (_dir, mut conn) = connection(AllLimits::default());
        let request = format!("GET /{} HTTP/1.1\r\n\r\n", "a".repeat(9 * 1024));
        let (_, response) = exchange(&mut conn, request.as_bytes()).await;

        assert!(response.starts_with("HTTP/1.1 413 Request too large\r\n"));
    }

    #[tokio::test]
    async fn read_timeout() {
        let mut limits = AllLimits::default();
        limits.1.socket_read_timeout = Duration::from_millis(50);
        let (_dir, mut conn) = connection(limits);

        let (mut client, mut server) = duplex(1024);
        client.write_all(b"GET / HTTP/1.1\r\n").await.unwrap();

        // The client keeps its side open and never finishes the request
        conn.run(&mut server, PEER).await.unwrap();
        drop(server);

        let mut response = String::new();
        client.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 500 Internal web-server error\r\n"));
    }

    /// Duplex stream whose `shutdown` always fails.
    struct BrokenShutdown(DuplexStream);

    impl AsyncRead for BrokenShutdown {
        fn poll_read(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Pin::new(&mut self.0).poll_read(cx, buf)
        }
    }

    impl AsyncWrite for BrokenShutdown {
        fn poll_write(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Pin::new(&mut self.0).poll_write(cx, buf)
        }

        fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Pin::new(&mut self.0).poll_flush(cx)
        }

        fn poll_shutdown(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Err(io::Error::new(io::ErrorKind::NotConnected, "gone")))
        }
    }

    #[tokio::test]
    async fn shutdown_failure_after_response() {
        let (_dir, mut conn) = connection(AllLimits::default());
        let (mut client, server) = duplex(64 * 1024);
        let mut server = BrokenShutdown(server);

        client.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();
        client.shutdown().await.unwrap();

        assert!(conn.run(&mut server, PEER).await.is_ok());
        drop(server);

        let mut response = String::new();
        client.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.ends_with("<h1>HUD</h1>"));
    }

    #[tokio::test]
    async fn busy_page() {
        let (mut client, mut server) = duplex(1024);

        writer::send_error(&mut server, ErrorKind::ServiceUnavailable, Duration::from_secs(1))
            .await
            .unwrap();
        drop(server);

        let mut response = String::new();
        client.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 503 Web-server busy\r\n"));
        assert!(response.contains("<div>503 Web-server busy</div>"));
    }
}
