//! Request/response client for the BES daemon.
//!
//! **Panic-Free Policy:** no `.unwrap()`, `.expect()`, `panic!()`,
//! `unreachable!()` or `todo!()` outside tests.

use std::path::Path;

use bes_protocol::{ConnectSpec, Connection, Endpoint, Extension};
use tracing::{debug, info};

use crate::error::{ClientError, Result};

// ============================================================================
// Response
// ============================================================================

/// One server reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    /// Response body as sent by the transmitter
    pub data: Vec<u8>,

    /// Extensions that arrived with the body
    pub extensions: Vec<Extension>,
}

impl Response {
    /// True if the server flagged this reply with `status=error`.
    pub fn is_error(&self) -> bool {
        self.extensions.iter().any(Extension::is_error)
    }

    /// Body as (lossy) UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

// ============================================================================
// Client
// ============================================================================

/// Client for one BES session.
///
/// Containers and definitions set through a client live as long as its
/// connection.
///
/// # Lifecycle
///
/// 1. [`connect`](Self::connect) opens the socket and runs the handshake
/// 2. [`execute`](Self::execute) sends one request and waits for its reply
/// 3. [`exit`](Self::exit) sends `status=PPT_EXIT_NOW` and closes
pub struct BesClient {
    connection: Connection,
}

impl BesClient {
    /// Connects and completes the handshake.
    ///
    /// # Errors
    /// `ClientError::Connect` if the server is unreachable, refuses the
    /// greeting or asks for authentication.
    pub async fn connect(spec: &ConnectSpec) -> Result<Self> {
        let connection = Connection::open(spec).await.map_err(ClientError::Connect)?;
        info!(endpoint = %spec.endpoint, "Connected to BES server");
        Ok(Self { connection })
    }

    pub fn endpoint(&self) -> &Endpoint {
        self.connection.endpoint()
    }

    /// Path of the client-side Unix socket file, if any.
    pub fn temp_socket_path(&self) -> Option<&Path> {
        self.connection.temp_socket_path()
    }

    /// Sends one request (one or more `;`-terminated statements) and
    /// returns the reply.
    ///
    /// An error reply is still `Ok`; check [`Response::is_error`].
    pub async fn execute(&mut self, request: &str) -> Result<Response> {
        let request = request.trim();
        if request.is_empty() {
            return Err(ClientError::EmptyRequest);
        }

        debug!(request = %request, "Sending request");
        let stream = self.connection.stream();
        stream.send(request.as_bytes()).await?;

        let message = stream.receive_message().await?;
        if message.is_exit() {
            return Err(ClientError::ServerExited);
        }

        debug!(bytes = message.data.len(), error = message.is_error(), "Received response");
        Ok(Response {
            data: message.data,
            extensions: message.extensions,
        })
    }

    /// Asks the server to end the session and closes the connection.
    pub async fn exit(mut self) -> Result<()> {
        self.connection.stream().send_exit().await?;
        self.connection.close().await?;
        debug!("Session closed");
        Ok(())
    }
}
