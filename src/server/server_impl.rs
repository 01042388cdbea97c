use crate::{
    api::Routes,
    config::ServerConfig,
    errors::{ErrorKind, ServerError},
    files::{extensions::ExtensionTable, resolver::ContentRoot},
    limits::{ConnLimits, ReqLimits, ServerLimits, WaitStrategy},
    server::{
        connection::{writer, HttpConnection},
        dispatch::Router,
        socket,
    },
};
use crossbeam::queue::SegQueue;
use std::{
    net::{SocketAddr, TcpListener as StdTcpListener},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::watch,
    task::{yield_now, JoinSet},
    time::sleep as tokio_sleep,
};

/// The HTTP server: one listener, a fixed pool of workers and a task that
/// answers `503` when the pending queue is full.
///
/// # Examples
///
/// ```no_run
/// use hudserve::{Routes, Server, ServerConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), hudserve::ServerError> {
///     let server = Server::builder()
///         .config(ServerConfig::default())
///         .routes(Routes::new().with_sample())
///         .build()?;
///
///     let handle = server.handle();
///     tokio::spawn(async move {
///         let _ = tokio::signal::ctrl_c().await;
///         handle.stop();
///     });
///
///     server.start().await
/// }
/// ```
pub struct Server {
    config: ServerConfig,
    router: Arc<Router>,
    listener: Option<StdTcpListener>,
    limits: AllLimits,
    shutdown: Arc<watch::Sender<bool>>,
}

impl Server {
    #[inline]
    pub fn builder() -> ServerBuilder {
        ServerBuilder {
            config: ServerConfig::default(),
            routes: Routes::new(),
            extensions: ExtensionTable::default(),
            listener: None,

            server_limits: None,
            connection_limits: None,
            request_limits: None,
        }
    }

    /// A handle that stops this server, usable from any task.
    #[inline]
    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            shutdown: self.shutdown.clone(),
        }
    }

    #[inline(always)]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Binds, listens and serves until [`ServerHandle::stop`] is called.
    ///
    /// Returns once the listener is closed and every queued or in-flight
    /// connection has been answered. Calling `stop` before `start` makes this
    /// return immediately without binding.
    pub async fn start(self) -> Result<(), ServerError> {
        let Server {
            config,
            router,
            listener,
            limits,
            shutdown,
        } = self;

        let mut stopped = shutdown.subscribe();
        if *stopped.borrow() {
            return Ok(());
        }

        let listener = match listener {
            Some(listener) => {
                listener.set_nonblocking(true)?;
                TcpListener::from_std(listener)?
            }
            None => socket::listen(config.socket_addr(), config.backlog)?,
        };

        tracing::info!(
            addr = %listener.local_addr()?,
            backlog = config.backlog,
            content_root = %router.content().path().display(),
            "server bound"
        );

        let stream_queue: TcpQueue = Arc::new(SegQueue::new());
        let error_queue: TcpQueue = Arc::new(SegQueue::new());
        let accepting = Arc::new(AtomicBool::new(true));

        let mut tasks = JoinSet::new();
        for _ in 0..limits.0.max_connections {
            Self::spawn_worker(&mut tasks, &stream_queue, &accepting, &router, &limits);
        }
        Self::spawn_alarmist(&mut tasks, &error_queue, &accepting, &limits);

        loop {
            tokio::select! {
                biased;

                _ = stopped.changed() => break,
                accepted = listener.accept() => match accepted {
                    Ok(value) => match stream_queue.len() < limits.0.max_pending_connections {
                        true => stream_queue.push(value),
                        false => {
                            tracing::warn!(peer = %value.1, "pending queue full, answering busy");
                            error_queue.push(value);
                        }
                    },
                    Err(e) => tracing::error!(error = %e, "accept failed"),
                },
            }
        }

        drop(listener);
        accepting.store(false, Ordering::SeqCst);

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                tracing::error!(error = %e, "worker task failed");
            }
        }

        tracing::info!("server stopped");
        Ok(())
    }

    fn spawn_worker(
        tasks: &mut JoinSet<()>,
        queue: &TcpQueue,
        accepting: &Arc<AtomicBool>,
        router: &Arc<Router>,
        limits: &AllLimits,
    ) {
        let queue = queue.clone();
        let accepting = accepting.clone();
        let wait = limits.0.wait_strategy.clone();
        let mut conn = HttpConnection::new(router.clone(), limits);

        tasks.spawn(async move {
            while let Some((mut stream, peer)) = Self::get_stream(&queue, &accepting, &wait).await {
                if let Err(e) = conn.run(&mut stream, peer).await {
                    tracing::warn!(%peer, error = %e, "connection dropped");
                }
            }
        });
    }

    fn spawn_alarmist(
        tasks: &mut JoinSet<()>,
        queue: &TcpQueue,
        accepting: &Arc<AtomicBool>,
        limits: &AllLimits,
    ) {
        let queue = queue.clone();
        let accepting = accepting.clone();
        let (server_limits, conn_limits, _) = limits.clone();

        tasks.spawn(async move {
            while let Some((mut stream, peer)) =
                Self::get_stream(&queue, &accepting, &server_limits.wait_strategy).await
            {
                let sent = writer::send_error(
                    &mut stream,
                    ErrorKind::ServiceUnavailable,
                    conn_limits.socket_write_timeout,
                )
                .await;

                if let Err(e) = sent {
                    tracing::error!(%peer, error = %e, "failed to send busy page");
                }
            }
        });
    }

    /// Next queued connection; `None` once accepting has ended and the queue
    /// is drained.
    #[inline]
    async fn get_stream(
        queue: &TcpQueue,
        accepting: &AtomicBool,
        wait: &WaitStrategy,
    ) -> Option<(TcpStream, SocketAddr)> {
        loop {
            if let Some(value) = queue.pop() {
                return Some(value);
            }
            if !accepting.load(Ordering::SeqCst) {
                // Anything pushed before the flag dropped is visible now
                return queue.pop();
            }

            match wait {
                WaitStrategy::Yield => yield_now().await,
                WaitStrategy::Sleep(time) => tokio_sleep(*time).await,
            }
        }
    }
}

/// Stops a running [`Server`].
#[derive(Debug, Clone)]
pub struct ServerHandle {
    shutdown: Arc<watch::Sender<bool>>,
}

impl ServerHandle {
    /// Closes the listener. Connections already accepted are still served.
    #[inline]
    pub fn stop(&self) {
        self.shutdown.send_replace(true);
    }

    #[inline]
    pub fn is_stopped(&self) -> bool {
        *self.shutdown.borrow()
    }
}

/// Builder for [`Server`].
///
/// Everything is optional: the defaults serve `./content/web` on
/// `127.0.0.1:2150` with no API routes.
pub struct ServerBuilder {
    config: ServerConfig,
    routes: Routes,
    extensions: ExtensionTable,
    listener: Option<StdTcpListener>,

    server_limits: Option<ServerLimits>,
    connection_limits: Option<ConnLimits>,
    request_limits: Option<ReqLimits>,
}

impl ServerBuilder {
    #[inline(always)]
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    #[inline(always)]
    pub fn routes(mut self, routes: Routes) -> Self {
        self.routes = routes;
        self
    }

    /// Replaces the default [`ExtensionTable`].
    #[inline(always)]
    pub fn extensions(mut self, extensions: ExtensionTable) -> Self {
        self.extensions = extensions;
        self
    }

    /// Serves on an already listening socket instead of binding
    /// [`ServerConfig::socket_addr`]. The configured backlog is then unused.
    ///
    /// ```no_run
    /// use hudserve::{Routes, Server};
    /// use std::net::TcpListener;
    ///
    /// # async fn run() -> Result<(), hudserve::ServerError> {
    /// let listener = TcpListener::bind("127.0.0.1:0")?;
    /// let addr = listener.local_addr()?;
    ///
    /// let server = Server::builder()
    ///     .listener(listener)
    ///     .routes(Routes::new().with_sample())
    ///     .build()?;
    /// println!("serving on {addr}");
    /// server.start().await
    /// # }
    /// ```
    #[inline(always)]
    pub fn listener(mut self, listener: StdTcpListener) -> Self {
        self.listener = Some(listener);
        self
    }

    #[inline(always)]
    pub fn server_limits(mut self, limits: ServerLimits) -> Self {
        self.server_limits = Some(limits);
        self
    }

    #[inline(always)]
    pub fn connection_limits(mut self, limits: ConnLimits) -> Self {
        self.connection_limits = Some(limits);
        self
    }

    #[inline(always)]
    pub fn request_limits(mut self, limits: ReqLimits) -> Self {
        self.request_limits = Some(limits);
        self
    }

    /// Validates the configuration and opens the content root.
    pub fn build(self) -> Result<Server, ServerError> {
        self.config.validate()?;

        let limits: AllLimits = (
            self.server_limits.unwrap_or_default(),
            self.connection_limits.unwrap_or_default(),
            self.request_limits.unwrap_or_default(),
        );
        if limits.0.max_connections == 0 {
            return Err(ServerError::Config("max_connections must be >= 1".to_string()));
        }

        let content = ContentRoot::open(self.config.content_root.clone(), self.extensions)?;
        let (shutdown, _) = watch::channel(false);

        Ok(Server {
            config: self.config,
            router: Arc::new(Router::new(self.routes, content)),
            listener: self.listener,
            limits,
            shutdown: Arc::new(shutdown),
        })
    }
}

type TcpQueue = Arc<SegQueue<(TcpStream, SocketAddr)>>;
pub(crate) type AllLimits = (ServerLimits, ConnLimits, ReqLimits);

#[cfg(test)]
mod tests {
    use super::*;
    use std::{fs, time::Duration};
    use tempfile::TempDir;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        time::timeout,
    };

    fn site() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("index.html"), "<h1>HUD</h1>").unwrap();
        dir
    }

    fn builder(dir: &TempDir) -> (ServerBuilder, SocketAddr) {
        let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let builder = Server::builder()
            .config(ServerConfig {
                content_root: dir.path().to_path_buf(),
                ..ServerConfig::default()
            })
            .listener(listener);

        (builder, addr)
    }

    async fn get(addr: SocketAddr, request: &[u8]) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(request).await.unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[test]
    fn build_errors() {
        let dir = site();

        let missing = Server::builder()
            .config(ServerConfig {
                content_root: dir.path().join("missing"),
                ..ServerConfig::default()
            })
            .build();
        assert!(matches!(missing, Err(ServerError::ContentRoot { .. })));

        let no_backlog = Server::builder()
            .config(ServerConfig {
                backlog: 0,
                content_root: dir.path().to_path_buf(),
                ..ServerConfig::default()
            })
            .build();
        assert!(matches!(no_backlog, Err(ServerError::Config(_))));

        let no_workers = builder(&dir)
            .0
            .server_limits(ServerLimits {
                max_connections: 0,
                ..ServerLimits::default()
            })
            .build();
        assert!(matches!(no_workers, Err(ServerError::Config(_))));
    }

    #[tokio::test]
    async fn stop_before_start() {
        let dir = site();
        let server = builder(&dir).0.build().unwrap();

        let handle = server.handle();
        handle.stop();
        assert!(handle.is_stopped());

        timeout(Duration::from_secs(1), server.start())
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn serve_then_stop() {
        let dir = site();
        let (builder, addr) = builder(&dir);
        let server = builder.build().unwrap();
        let handle = server.handle();

        let running = tokio::spawn(server.start());

        let response = get(addr, b"GET / HTTP/1.1\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.ends_with("<h1>HUD</h1>"));

        handle.stop();
        timeout(Duration::from_secs(5), running)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        assert!(TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn busy_when_queue_full() {
        let dir = site();
        let (builder, addr) = builder(&dir);
        let server = builder
            .server_limits(ServerLimits {
                max_connections: 1,
                max_pending_connections: 0,
                wait_strategy: WaitStrategy::Yield,
            })
            .build()
            .unwrap();
        let handle = server.handle();

        let running = tokio::spawn(server.start());

        // Nothing is written: the busy page goes out without reading
        let response = get(addr, b"").await;
        assert!(response.starts_with("HTTP/1.1 503 Web-server busy\r\n"));

        handle.stop();
        timeout(Duration::from_secs(5), running)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }
}
