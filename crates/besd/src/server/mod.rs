//! Socket server for the BES daemon.
//!
//! The server:
//! - Listens on a Unix socket, and on TCP when a port is configured
//! - Spawns a [`ConnectionHandler`] per client, each with its own session
//! - Stops accepting when its `CancellationToken` fires
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────┐
//! │        BesServer         │
//! │ UnixListener [+ TcpList] │
//! └────────────┬─────────────┘
//!              │ accept()
//!              ▼
//! ┌──────────────────────────┐     ┌──────────────────────────┐
//! │    ConnectionHandler     │────▶│   Dispatcher (shared)    │
//! │ (per client, own Session)│     │ commands/handlers/transm │
//! └──────────────────────────┘     └──────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Accept failures are logged and the server keeps accepting
//! - A failing connection only ends its own task

mod connection;

pub use connection::{ConnectionError, ConnectionHandler};

use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use socket2::SockRef;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream, UnixListener};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ServerSettings;
use crate::dispatch::Dispatcher;

/// Socket server for the BES daemon.
pub struct BesServer {
    settings: ServerSettings,

    /// Shared by every connection
    dispatcher: Arc<Dispatcher>,

    /// Cancellation token for graceful shutdown
    cancel_token: CancellationToken,
}

impl BesServer {
    pub fn new(
        settings: ServerSettings,
        dispatcher: Arc<Dispatcher>,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            settings,
            dispatcher,
            cancel_token,
        }
    }

    /// Returns the Unix socket path.
    pub fn socket_path(&self) -> &Path {
        &self.settings.unix_socket
    }

    /// Runs the server until the cancellation token fires.
    ///
    /// Connections still open at shutdown run to completion on their own
    /// tasks.
    pub async fn run(&self) -> Result<(), ServerError> {
        let unix = self.bind_unix()?;
        let tcp = match &self.settings.tcp {
            Some((host, port)) => {
                let address = format!("{host}:{port}");
                let listener =
                    TcpListener::bind(&address)
                        .await
                        .map_err(|e| ServerError::Bind {
                            address: address.clone(),
                            error: e.to_string(),
                        })?;
                info!(address = %address, "Listening on TCP");
                Some(listener)
            }
            None => None,
        };

        info!(
            socket = %self.socket_path().display(),
            "BES server listening"
        );

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("Server shutdown requested");
                    break;
                }

                result = unix.accept() => {
                    match result {
                        Ok((stream, _addr)) => {
                            self.apply_buffer_hints(SockRef::from(&stream));
                            self.handle_connection(stream, "unix".to_string());
                        }
                        Err(e) => error!(error = %e, "Failed to accept Unix connection"),
                    }
                }

                result = accept_tcp(tcp.as_ref()) => {
                    match result {
                        Ok((stream, addr)) => {
                            if let Err(e) = stream.set_nodelay(true) {
                                debug!(error = %e, "Failed to set TCP_NODELAY");
                            }
                            self.apply_buffer_hints(SockRef::from(&stream));
                            self.handle_connection(stream, addr.to_string());
                        }
                        Err(e) => error!(error = %e, "Failed to accept TCP connection"),
                    }
                }
            }
        }

        self.cleanup();
        Ok(())
    }

    fn bind_unix(&self) -> Result<UnixListener, ServerError> {
        let path = self.socket_path();
        let setup_error = |e: io::Error| ServerError::SocketSetup {
            path: path.to_path_buf(),
            error: e.to_string(),
        };

        // A stale socket from an earlier run would make bind fail.
        if path.exists() {
            std::fs::remove_file(path).map_err(setup_error)?;
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(setup_error)?;
            }
        }

        UnixListener::bind(path).map_err(setup_error)
    }

    /// Applies the configured buffer sizes. Failures are only logged.
    fn apply_buffer_hints(&self, socket: SockRef<'_>) {
        if let Some(size) = self.settings.send_buffer_size {
            if let Err(e) = socket.set_send_buffer_size(size) {
                warn!(size, error = %e, "Failed to set send buffer size");
            }
        }
        if let Some(size) = self.settings.receive_buffer_size {
            if let Err(e) = socket.set_recv_buffer_size(size) {
                warn!(size, error = %e, "Failed to set receive buffer size");
            }
        }
    }

    fn handle_connection<S>(&self, stream: S, peer: String)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let connection_number = self.dispatcher.status().record_connection();
        let handler = ConnectionHandler::new(
            stream,
            Arc::clone(&self.dispatcher),
            connection_number,
        )
        .with_receive_buffer(self.settings.receive_buffer())
        .with_max_request_size(self.settings.max_request_size)
        .require_authentication(self.settings.authenticate);

        debug!(connection = connection_number, peer = %peer, "Accepted connection");
        tokio::spawn(handler.run());
    }

    fn cleanup(&self) {
        let path = self.socket_path();
        if path.exists() {
            if let Err(e) = std::fs::remove_file(path) {
                warn!(
                    socket = %path.display(),
                    error = %e,
                    "Failed to remove socket file"
                );
            }
        }

        info!("Server cleanup complete");
    }
}

/// Accepts on the TCP listener, or never resolves when there is none.
async fn accept_tcp(listener: Option<&TcpListener>) -> io::Result<(TcpStream, SocketAddr)> {
    match listener {
        Some(listener) => listener.accept().await,
        None => std::future::pending().await,
    }
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to setup socket at {path}: {error}")]
    SocketSetup { path: PathBuf, error: String },

    #[error("Failed to listen on {address}: {error}")]
    Bind { address: String, error: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registries;
    use crate::status::ServerStatus;

    fn server(settings: ServerSettings) -> BesServer {
        let dispatcher = Dispatcher::from_settings(
            Arc::new(Registries::new()),
            Arc::new(ServerStatus::new()),
            &settings,
        );
        BesServer::new(settings, Arc::new(dispatcher), CancellationToken::new())
    }

    #[test]
    fn test_server_error_display() {
        let err = ServerError::SocketSetup {
            path: PathBuf::from("/tmp/test.sock"),
            error: "permission denied".to_string(),
        };
        assert!(err.to_string().contains("/tmp/test.sock"));
        assert!(err.to_string().contains("permission denied"));
    }

    #[tokio::test]
    async fn test_run_removes_socket_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("nested").join("bes.sock");
        let settings = ServerSettings {
            unix_socket: socket.clone(),
            ..ServerSettings::default()
        };
        let server = server(settings);
        let token = server.cancel_token.clone();

        let task = tokio::spawn(async move { server.run().await });
        for _ in 0..100 {
            if socket.exists() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(socket.exists());

        token.cancel();
        task.await.unwrap().unwrap();
        assert!(!socket.exists());
    }

    #[tokio::test]
    async fn test_bad_tcp_host_fails_run() {
        let dir = tempfile::tempdir().unwrap();
        let settings = ServerSettings {
            unix_socket: dir.path().join("bes.sock"),
            tcp: Some(("no.such.host.invalid".to_string(), 1)),
            ..ServerSettings::default()
        };

        let err = server(settings).run().await.unwrap_err();
        assert!(matches!(err, ServerError::Bind { .. }));
    }
}
