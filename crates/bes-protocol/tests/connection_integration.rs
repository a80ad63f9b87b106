//! Client `Connection` against a minimal echo server over real sockets.
//!
//! Tests CAN use `.unwrap()` and `.expect()`.

use std::path::PathBuf;
use std::time::Duration;

use bes_protocol::handshake::server_handshake;
use bes_protocol::{ConnectSpec, Connection, PptError, PptStream, MAX_CHUNK_SIZE};
use tempfile::TempDir;
use tokio::net::{TcpListener, UnixListener};
use tokio::task::JoinHandle;

/// Echoes every message back until the client asks to exit.
///
/// Resolves to the number of messages echoed.
fn spawn_echo_unix(listener: UnixListener) -> JoinHandle<usize> {
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        echo(PptStream::new(stream)).await
    })
}

async fn echo<S>(mut stream: PptStream<S>) -> usize
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send,
{
    server_handshake(&mut stream, false).await.unwrap();
    let mut echoed = 0;
    loop {
        let message = stream.receive_message().await.unwrap();
        if message.is_exit() {
            return echoed;
        }
        stream.send(&message.data).await.unwrap();
        echoed += 1;
    }
}

fn unix_listener() -> (TempDir, PathBuf, UnixListener) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("echo.sock");
    let listener = UnixListener::bind(&path).unwrap();
    (dir, path, listener)
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[tokio::test]
async fn test_unix_round_trip_and_exit() {
    let (_dir, path, listener) = unix_listener();
    let server = spawn_echo_unix(listener);

    let mut connection = Connection::open(&ConnectSpec::unix(&path)).await.unwrap();
    assert!(connection.is_ready());
    let temp_socket = connection.temp_socket_path().unwrap().to_path_buf();
    assert!(temp_socket.exists());

    for len in [1, MAX_CHUNK_SIZE, MAX_CHUNK_SIZE + 1, 3 * MAX_CHUNK_SIZE + 7] {
        let payload = pattern(len);
        connection.stream().send(&payload).await.unwrap();
        let reply = connection.stream().receive_message().await.unwrap();
        assert_eq!(reply.data.len(), len);
        assert_eq!(reply.data, payload);
    }

    connection.stream().send_exit().await.unwrap();
    connection.close().await.unwrap();
    assert!(!temp_socket.exists());
    assert_eq!(server.await.unwrap(), 4);
}

#[tokio::test]
async fn test_small_receive_buffer_still_collects_message() {
    let (_dir, path, listener) = unix_listener();
    let server = spawn_echo_unix(listener);

    let spec = ConnectSpec::unix(&path).with_buffer_sizes(None, Some(1000));
    let mut connection = Connection::open(&spec).await.unwrap();

    let payload = pattern(10_000);
    connection.stream().send(&payload).await.unwrap();
    assert_eq!(connection.stream().receive_message().await.unwrap().data, payload);

    connection.stream().send_exit().await.unwrap();
    connection.close().await.unwrap();
    assert_eq!(server.await.unwrap(), 1);
}

#[tokio::test]
async fn test_tcp_round_trip() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        echo(PptStream::new(stream)).await
    });

    let spec = ConnectSpec::tcp("127.0.0.1", port).with_timeout(Duration::from_secs(2));
    let mut connection = Connection::open(&spec).await.unwrap();
    assert!(connection.temp_socket_path().is_none());

    connection.stream().send(b"show version;").await.unwrap();
    let reply = connection.stream().receive_message().await.unwrap();
    assert_eq!(reply.text().unwrap(), "show version;");

    connection.stream().send_exit().await.unwrap();
    connection.close().await.unwrap();
    assert_eq!(server.await.unwrap(), 1);
}

#[tokio::test]
async fn test_server_hangup_surfaces_as_closed() {
    let (_dir, path, listener) = unix_listener();
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut stream = PptStream::new(stream);
        server_handshake(&mut stream, false).await.unwrap();
        // Drop without answering.
    });

    let mut connection = Connection::open(&ConnectSpec::unix(&path)).await.unwrap();
    server.await.unwrap();

    let result = connection.stream().receive_message().await;
    assert!(matches!(result, Err(PptError::Closed)));
}
