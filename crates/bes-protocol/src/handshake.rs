//! Connection handshake.
//!
//! ```text
//!   client                                   server
//!     │  PPTCLIENT_TESTING_CONNECTION  ──────▶  │
//!     │  ◀──────  PPTSERVER_CONNECTION_OK       │   Init → Ready
//!     │  ◀──────  PPTSERVER_AUTHENTICATE        │   → authenticate() (stub)
//!     │  ◀──────  PPT_PROTOCOL_UNDEFINED        │   fatal
//! ```
//!
//! Each token travels as a complete PPT message (data chunks + end marker).

use std::fmt;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, warn};

use crate::error::PptError;
use crate::transport::PptStream;

/// Sent by the client to open a session.
pub const PPTCLIENT_TESTING_CONNECTION: &str = "PPTCLIENT_TESTING_CONNECTION";

/// Server cannot speak to this client (busy, down, or bad greeting).
pub const PPT_PROTOCOL_UNDEFINED: &str = "PPT_PROTOCOL_UNDEFINED";

/// Server accepted the connection.
pub const PPTSERVER_CONNECTION_OK: &str = "PPTSERVER_CONNECTION_OK";

/// Server requires authentication before serving requests.
pub const PPTSERVER_AUTHENTICATE: &str = "PPTSERVER_AUTHENTICATE";

/// Handshake progress for one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandshakeState {
    #[default]
    Init,
    Ready,
}

/// The server's answer to the client greeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerReply {
    Undefined,
    ConnectionOk,
    Authenticate,
}

impl ServerReply {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Undefined => PPT_PROTOCOL_UNDEFINED,
            Self::ConnectionOk => PPTSERVER_CONNECTION_OK,
            Self::Authenticate => PPTSERVER_AUTHENTICATE,
        }
    }

    pub fn parse(token: &str) -> Option<Self> {
        match token {
            PPT_PROTOCOL_UNDEFINED => Some(Self::Undefined),
            PPTSERVER_CONNECTION_OK => Some(Self::ConnectionOk),
            PPTSERVER_AUTHENTICATE => Some(Self::Authenticate),
            _ => None,
        }
    }
}

impl fmt::Display for ServerReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client side: greet the server and wait for its verdict.
pub async fn client_handshake<S>(stream: &mut PptStream<S>) -> Result<HandshakeState, PptError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    stream.send(PPTCLIENT_TESTING_CONNECTION.as_bytes()).await?;

    let reply = stream.receive_message().await?;
    let token = String::from_utf8_lossy(&reply.data).into_owned();
    debug!(reply = %token, "Handshake reply");

    match ServerReply::parse(&token) {
        Some(ServerReply::ConnectionOk) => Ok(HandshakeState::Ready),
        Some(ServerReply::Undefined) => Err(PptError::ServerUnavailable),
        Some(ServerReply::Authenticate) => {
            authenticate(stream).await?;
            Ok(HandshakeState::Ready)
        }
        None => Err(PptError::UnexpectedToken(token)),
    }
}

/// Server side: validate the greeting and answer it.
///
/// A bad greeting is answered with `PPT_PROTOCOL_UNDEFINED` before the
/// error is returned, so the client sees a clean refusal.
pub async fn server_handshake<S>(
    stream: &mut PptStream<S>,
    require_authentication: bool,
) -> Result<HandshakeState, PptError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let greeting = stream.receive_message().await?;
    let token = String::from_utf8_lossy(&greeting.data).into_owned();

    if token != PPTCLIENT_TESTING_CONNECTION {
        warn!(greeting = %token, "Client started connection with unknown greeting");
        stream.send(ServerReply::Undefined.as_str().as_bytes()).await?;
        return Err(PptError::UnexpectedToken(token));
    }

    if require_authentication {
        stream
            .send(ServerReply::Authenticate.as_str().as_bytes())
            .await?;
        authenticate(stream).await?;
    }

    stream
        .send(ServerReply::ConnectionOk.as_str().as_bytes())
        .await?;
    Ok(HandshakeState::Ready)
}

/// Authentication sub-protocol.
///
/// This is the hook where a TLS upgrade on a secondary port would be
/// negotiated. It is not implemented and always fails.
pub async fn authenticate<S>(_stream: &mut PptStream<S>) -> Result<(), PptError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    Err(PptError::AuthenticationNotImplemented)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn test_handshake_reaches_ready() {
        let (client, server) = duplex(1024);

        let server_task = tokio::spawn(async move {
            let mut stream = PptStream::new(server);
            server_handshake(&mut stream, false).await
        });

        let mut stream = PptStream::new(client);
        let state = client_handshake(&mut stream).await.unwrap();
        assert_eq!(state, HandshakeState::Ready);
        assert_eq!(server_task.await.unwrap().unwrap(), HandshakeState::Ready);
    }

    #[tokio::test]
    async fn test_undefined_reply_is_fatal() {
        let (client, server) = duplex(1024);

        tokio::spawn(async move {
            let mut stream = PptStream::new(server);
            let _ = stream.receive_message().await;
            let _ = stream.send(PPT_PROTOCOL_UNDEFINED.as_bytes()).await;
        });

        let mut stream = PptStream::new(client);
        let result = client_handshake(&mut stream).await;
        assert!(matches!(result, Err(PptError::ServerUnavailable)));
    }

    #[tokio::test]
    async fn test_authenticate_reply_hits_stub() {
        let (client, server) = duplex(1024);

        let server_task = tokio::spawn(async move {
            let mut stream = PptStream::new(server);
            server_handshake(&mut stream, true).await
        });

        let mut stream = PptStream::new(client);
        let result = client_handshake(&mut stream).await;
        assert!(matches!(result, Err(PptError::AuthenticationNotImplemented)));
        assert!(matches!(
            server_task.await.unwrap(),
            Err(PptError::AuthenticationNotImplemented)
        ));
    }

    #[tokio::test]
    async fn test_unknown_reply_is_protocol_error() {
        let (client, server) = duplex(1024);

        tokio::spawn(async move {
            let mut stream = PptStream::new(server);
            let _ = stream.receive_message().await;
            let _ = stream.send(b"HELLO THERE").await;
        });

        let mut stream = PptStream::new(client);
        let result = client_handshake(&mut stream).await;
        assert!(matches!(result, Err(PptError::UnexpectedToken(t)) if t == "HELLO THERE"));
    }

    #[tokio::test]
    async fn test_server_refuses_bad_greeting() {
        let (client, server) = duplex(1024);

        let server_task = tokio::spawn(async move {
            let mut stream = PptStream::new(server);
            server_handshake(&mut stream, false).await
        });

        let mut stream = PptStream::new(client);
        stream.send(b"GET / HTTP/1.0").await.unwrap();
        let reply = stream.receive_message().await.unwrap();
        assert_eq!(reply.text().unwrap(), PPT_PROTOCOL_UNDEFINED);
        assert!(matches!(
            server_task.await.unwrap(),
            Err(PptError::UnexpectedToken(_))
        ));
    }

    #[test]
    fn test_reply_parse_roundtrip() {
        for reply in [ServerReply::Undefined, ServerReply::ConnectionOk, ServerReply::Authenticate] {
            assert_eq!(ServerReply::parse(reply.as_str()), Some(reply));
        }
        assert_eq!(ServerReply::parse("PPTSERVER_CONNECTION_OK "), None);
    }
}
