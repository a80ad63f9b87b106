//! Per-client connection handler.
//!
//! Each connection:
//! - Runs the server side of the PPT handshake
//! - Reads one message per request and hands its text to the dispatcher
//! - Closes every response with the end-of-message marker
//! - Answers an over-long request with an error and keeps reading
//! - Ends on `status=PPT_EXIT_NOW`, EOF or a transport/protocol error
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Errors end this connection only, after being logged

use std::sync::Arc;

use bes_core::{DispatchError, Session};
use bes_protocol::handshake::server_handshake;
use bes_protocol::{PptError, PptStream};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use crate::dispatch::{Dispatcher, RequestOutcome};

/// Connection handler for a single client.
pub struct ConnectionHandler<S> {
    stream: PptStream<S>,

    dispatcher: Arc<Dispatcher>,

    /// Containers, definitions and context set by this client
    session: Session,

    require_authentication: bool,

    connection_number: u64,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S, dispatcher: Arc<Dispatcher>, connection_number: u64) -> Self {
        Self {
            stream: PptStream::new(stream),
            dispatcher,
            session: Session::new(),
            require_authentication: false,
            connection_number,
        }
    }

    /// Re-wraps the stream with a receive buffer of `size` bytes.
    pub fn with_receive_buffer(mut self, size: usize) -> Self {
        let limit = self.stream.max_message_size();
        self.stream = PptStream::with_receive_buffer(self.stream.into_inner(), size)
            .with_max_message_size(limit);
        self
    }

    /// Requests longer than `limit` bytes are answered with an error.
    pub fn with_max_request_size(mut self, limit: usize) -> Self {
        self.stream = self.stream.with_max_message_size(Some(limit));
        self
    }

    pub fn require_authentication(mut self, required: bool) -> Self {
        self.require_authentication = required;
        self
    }

    /// Runs the connection to completion.
    pub async fn run(mut self) {
        let connection = self.connection_number;

        if let Err(e) = server_handshake(&mut self.stream, self.require_authentication).await {
            warn!(connection, error = %e, "Handshake failed");
            return;
        }
        debug!(connection, "Handshake completed");

        match self.process_messages().await {
            Ok(()) => info!(connection, "Client disconnected"),
            Err(e) => warn!(connection, error = %e, "Connection closed on error"),
        }
    }

    async fn process_messages(&mut self) -> Result<(), ConnectionError> {
        let connection = self.connection_number;
        loop {
            let message = match self.stream.receive_message().await {
                Ok(message) => message,
                Err(PptError::Closed) => {
                    debug!(connection, "Client sent EOF");
                    return Ok(());
                }
                Err(PptError::MessageTooLarge { limit }) => {
                    warn!(connection, limit, "Request too large, discarded");
                    let error = DispatchError::syntax(format!(
                        "request exceeds the {limit} byte limit"
                    ));
                    self.dispatcher.reject(&error, &mut self.stream).await?;
                    self.stream.send_end().await?;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            if message.is_exit() {
                debug!(connection, "Client requested exit");
                return Ok(());
            }

            let outcome = match message.text() {
                Ok(text) => {
                    self.dispatcher
                        .execute(text, &mut self.session, &mut self.stream)
                        .await?
                }
                Err(_) => {
                    let error = DispatchError::syntax("request is not valid UTF-8");
                    self.dispatcher.reject(&error, &mut self.stream).await?;
                    RequestOutcome::Failed(error)
                }
            };
            self.stream.send_end().await?;

            if let RequestOutcome::Failed(error) = outcome {
                debug!(connection, error = %error, "Request answered with an error");
            }
        }
    }
}

/// Errors that end a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Transport error: {0}")]
    Transport(#[from] PptError),
}
