//! Client-side connections to a BES daemon.
//!
//! The connect path is the only place with a timeout: sockets are created
//! with `socket2`, buffer-size hints are applied best-effort, and the
//! connect itself is bounded (non-blocking connect plus poll inside
//! `connect_timeout`). The finished socket is handed to tokio for all
//! subsequent I/O.
//!
//! For Unix-domain endpoints the client binds its own socket to a temporary
//! path first; [`Connection::close`] (or drop) removes that file.

use std::fmt;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use socket2::{Domain, Protocol, SockAddr, Socket as RawSocket, Type};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::{TcpStream, UnixStream};
use tracing::{debug, warn};

use crate::error::PptError;
use crate::handshake::{self, HandshakeState};
use crate::transport::{PptStream, DEFAULT_RECEIVE_BUFFER};

/// Default bound on connect latency.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

static TEMP_SOCKET_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Where the daemon listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Tcp { host: String, port: u16 },
    Unix { path: PathBuf },
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp { host, port } => write!(f, "tcp://{host}:{port}"),
            Self::Unix { path } => write!(f, "unix://{}", path.display()),
        }
    }
}

/// Everything needed to open a [`Connection`].
#[derive(Debug, Clone)]
pub struct ConnectSpec {
    pub endpoint: Endpoint,
    pub timeout: Duration,
    pub send_buffer_size: Option<usize>,
    pub receive_buffer_size: Option<usize>,
    /// Where a Unix client binds its own socket file. System temp dir if unset.
    pub temp_dir: Option<PathBuf>,
    /// Placeholder for the TLS upgrade; not read.
    pub cert_file: Option<PathBuf>,
    /// Placeholder for the TLS upgrade; not read.
    pub key_file: Option<PathBuf>,
}

impl ConnectSpec {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            timeout: DEFAULT_CONNECT_TIMEOUT,
            send_buffer_size: None,
            receive_buffer_size: None,
            temp_dir: None,
            cert_file: None,
            key_file: None,
        }
    }

    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::new(Endpoint::Tcp {
            host: host.into(),
            port,
        })
    }

    pub fn unix(path: impl Into<PathBuf>) -> Self {
        Self::new(Endpoint::Unix { path: path.into() })
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_buffer_sizes(mut self, send: Option<usize>, receive: Option<usize>) -> Self {
        self.send_buffer_size = send;
        self.receive_buffer_size = receive;
        self
    }

    #[must_use]
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }
}

/// A connected stream socket, TCP or Unix.
pub enum Socket {
    Tcp(TcpStream),
    Unix(UnixStream),
}

impl AsyncRead for Socket {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Unix(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Socket {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Tcp(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Unix(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(stream) => Pin::new(stream).poll_flush(cx),
            Self::Unix(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Unix(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

/// Blocking-mode socket produced by the connect step.
enum StdSocket {
    Tcp(std::net::TcpStream),
    Unix(std::os::unix::net::UnixStream),
}

/// An open client connection.
pub struct Connection {
    stream: PptStream<Socket>,
    endpoint: Endpoint,
    temp_socket: Option<PathBuf>,
    state: HandshakeState,
}

impl Connection {
    /// Opens a socket to `spec.endpoint` within `spec.timeout`.
    ///
    /// Does not perform the handshake; see [`Connection::initialize`].
    ///
    /// # Errors
    ///
    /// - `PptError::Resolve` if the host name does not resolve
    /// - `PptError::Timeout` if the connect does not finish in time
    /// - `PptError::Refused` if nothing listens at the endpoint
    /// - `PptError::Connect` for any other socket failure
    pub async fn connect(spec: &ConnectSpec) -> Result<Self, PptError> {
        let blocking_spec = spec.clone();
        let endpoint = spec.endpoint.to_string();

        let (std_socket, temp_socket) = tokio::task::spawn_blocking(move || open_socket(&blocking_spec))
            .await
            .map_err(|e| PptError::Connect {
                endpoint: endpoint.clone(),
                source: io::Error::other(e),
            })??;

        let socket = match std_socket {
            StdSocket::Tcp(stream) => TcpStream::from_std(stream).map(Socket::Tcp),
            StdSocket::Unix(stream) => UnixStream::from_std(stream).map(Socket::Unix),
        }
        .map_err(|source| PptError::Connect {
            endpoint: endpoint.clone(),
            source,
        });

        let socket = match socket {
            Ok(socket) => socket,
            Err(e) => {
                remove_temp_socket(temp_socket.as_deref());
                return Err(e);
            }
        };

        debug!(endpoint = %endpoint, "Connected");

        let buffer = spec.receive_buffer_size.unwrap_or(DEFAULT_RECEIVE_BUFFER);
        Ok(Self {
            stream: PptStream::with_receive_buffer(socket, buffer),
            endpoint: spec.endpoint.clone(),
            temp_socket,
            state: HandshakeState::Init,
        })
    }

    /// Connects and performs the handshake.
    pub async fn open(spec: &ConnectSpec) -> Result<Self, PptError> {
        let mut connection = Self::connect(spec).await?;
        connection.initialize().await?;
        Ok(connection)
    }

    /// Runs the client handshake, moving the connection to `Ready`.
    pub async fn initialize(&mut self) -> Result<(), PptError> {
        self.state = handshake::client_handshake(&mut self.stream).await?;
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.state == HandshakeState::Ready
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Path of the client-side Unix socket file, if one was created.
    pub fn temp_socket_path(&self) -> Option<&Path> {
        self.temp_socket.as_deref()
    }

    pub fn stream(&mut self) -> &mut PptStream<Socket> {
        &mut self.stream
    }

    /// Shuts the socket down and removes the temporary socket file.
    pub async fn close(mut self) -> Result<(), PptError> {
        let shutdown = self.stream.get_mut().shutdown().await;

        if let Some(path) = self.temp_socket.take() {
            if let Err(e) = std::fs::remove_file(&path) {
                if e.kind() != io::ErrorKind::NotFound {
                    return Err(PptError::Close(e));
                }
            }
        }

        match shutdown {
            Ok(()) => Ok(()),
            // The peer may already have hung up after an exit request.
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(PptError::Close(e)),
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        remove_temp_socket(self.temp_socket.as_deref());
    }
}

fn remove_temp_socket(path: Option<&Path>) {
    if let Some(path) = path {
        if let Err(e) = std::fs::remove_file(path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "Failed to remove client socket file");
            }
        }
    }
}

fn open_socket(spec: &ConnectSpec) -> Result<(StdSocket, Option<PathBuf>), PptError> {
    let endpoint = spec.endpoint.to_string();
    let connect_error = |source: io::Error| classify_connect_error(&endpoint, spec.timeout, source);

    match &spec.endpoint {
        Endpoint::Tcp { host, port } => {
            let address = resolve(host, *port).map_err(|source| PptError::Resolve {
                endpoint: endpoint.clone(),
                source,
            })?;

            let socket = RawSocket::new(Domain::for_address(address), Type::STREAM, Some(Protocol::TCP))
                .map_err(connect_error)?;
            apply_buffer_hints(&socket, spec);
            socket
                .connect_timeout(&address.into(), spec.timeout)
                .map_err(connect_error)?;
            socket.set_nonblocking(true).map_err(connect_error)?;

            Ok((StdSocket::Tcp(socket.into()), None))
        }
        Endpoint::Unix { path } => {
            let socket = RawSocket::new(Domain::UNIX, Type::STREAM, None).map_err(connect_error)?;
            apply_buffer_hints(&socket, spec);

            let temp_path = temp_socket_path(spec.temp_dir.as_deref());
            let local = SockAddr::unix(&temp_path).map_err(connect_error)?;
            socket.bind(&local).map_err(connect_error)?;

            let result = SockAddr::unix(path)
                .and_then(|remote| socket.connect_timeout(&remote, spec.timeout))
                .and_then(|()| socket.set_nonblocking(true));
            if let Err(e) = result {
                remove_temp_socket(Some(&temp_path));
                return Err(connect_error(e));
            }

            Ok((StdSocket::Unix(socket.into()), Some(temp_path)))
        }
    }
}

fn resolve(host: &str, port: u16) -> io::Result<SocketAddr> {
    (host, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::AddrNotAvailable, "no resolved addresses"))
}

/// Buffer-size hints are best-effort: failures are logged and the OS
/// defaults stay in place.
fn apply_buffer_hints(socket: &RawSocket, spec: &ConnectSpec) {
    if let Some(size) = spec.send_buffer_size {
        if let Err(e) = socket.set_send_buffer_size(size) {
            warn!(size, error = %e, "Failed to set send buffer size, using OS default");
        }
    }
    if let Some(size) = spec.receive_buffer_size {
        if let Err(e) = socket.set_recv_buffer_size(size) {
            warn!(size, error = %e, "Failed to set receive buffer size, using OS default");
        }
    }
}

fn classify_connect_error(endpoint: &str, timeout: Duration, source: io::Error) -> PptError {
    match source.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => PptError::Timeout {
            endpoint: endpoint.to_string(),
            timeout,
        },
        io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound => PptError::Refused {
            endpoint: endpoint.to_string(),
            source,
        },
        _ => PptError::Connect {
            endpoint: endpoint.to_string(),
            source,
        },
    }
}

fn temp_socket_path(dir: Option<&Path>) -> PathBuf {
    let n = TEMP_SOCKET_COUNTER.fetch_add(1, Ordering::Relaxed);
    let name = format!("ppt-client-{}-{n}.sock", std::process::id());
    match dir {
        Some(dir) => dir.join(name),
        None => std::env::temp_dir().join(name),
    }
}
