//! TCP listener and the serial accept loop.
//!
//! Connections are handled strictly one at a time with blocking I/O:
//! accept, run the full session, accept the next. Pending connections
//! wait in a small fixed kernel backlog. There are no timeouts; a
//! stalled client blocks the server, which is a documented limitation
//! of the serial design.

use std::io;
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use std::path::PathBuf;
use tracing::info;

use crate::config::Config;
use crate::session;
use crate::store::LoadError;

/// Maximum outstanding connection requests queued by the kernel.
const BACKLOG: i32 = 5;

/// Server instance: a bound listener plus the database path each
/// session loads from.
pub struct Server {
    listener: TcpListener,
    db_path: PathBuf,
}

impl Server {
    /// Bind the listening socket. Any failure here is fatal at startup.
    pub fn bind(config: &Config) -> io::Result<Server> {
        let listener = create_listener(&config.listen_addr())?;
        Ok(Server {
            listener,
            db_path: config.database.clone(),
        })
    }

    /// The address the listener is bound to. Useful with port 0.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept and serve connections forever, one at a time.
    ///
    /// An `accept` failure and a database-load failure are both fatal:
    /// the error propagates out so the process can exit, preserving the
    /// original contract that a mid-session load failure terminates the
    /// whole server rather than just that connection.
    pub fn run(&self) -> Result<(), ServerError> {
        loop {
            let (stream, peer) = self.listener.accept().map_err(ServerError::Accept)?;

            info!(peer = %peer, "Connection established");
            session::run(stream, &self.db_path)?;
            info!(peer = %peer, "Connection terminated");
        }
    }
}

/// Create a blocking TCP listener with the fixed accept backlog.
fn create_listener(addr: &str) -> io::Result<TcpListener> {
    let addr: SocketAddr = addr
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "no listen address resolved"))?;

    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(BACKLOG)?;

    Ok(socket.into())
}

/// Errors that end the accept loop. Both variants are whole-process
/// fatal by design.
#[derive(Debug)]
pub enum ServerError {
    /// `accept` on the listening socket failed.
    Accept(io::Error),
    /// A session failed to load the database.
    Load(LoadError),
}

impl From<LoadError> for ServerError {
    fn from(e: LoadError) -> Self {
        ServerError::Load(e)
    }
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerError::Accept(e) => write!(f, "Failed to accept connection: {e}"),
            ServerError::Load(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ServerError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_ephemeral_port() {
        let config = Config {
            database: PathBuf::from("mdb.db"),
            port: 0,
            host: "127.0.0.1".to_string(),
            log_level: "info".to_string(),
        };

        let server = Server::bind(&config).unwrap();
        let addr = server.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
    }
}
