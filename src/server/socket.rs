use crate::errors::ServerError;
use socket2::{Domain, Protocol, Socket, Type};
use std::{io, net::SocketAddr};
use tokio::net::TcpListener;

/// Binds `addr` and starts listening with an explicit kernel backlog.
///
/// `SO_REUSEADDR` is set so a restarted server can take the port back while
/// old connections sit in `TIME_WAIT`.
pub(crate) fn listen(addr: SocketAddr, backlog: u32) -> Result<TcpListener, ServerError> {
    let bind = |source: io::Error| ServerError::Bind { addr, source };

    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
        .map_err(bind)?;

    socket.set_reuse_address(true).map_err(bind)?;
    socket.set_nonblocking(true).map_err(bind)?;
    socket.bind(&addr.into()).map_err(bind)?;
    socket
        .listen(i32::try_from(backlog).unwrap_or(i32::MAX))
        .map_err(bind)?;

    TcpListener::from_std(socket.into()).map_err(bind)
}
