//! Chunked message transport over an async byte stream.
//!
//! [`PptStream`] owns the stream plus a receive buffer sized once at
//! construction. Large payloads are split into `d` chunks on send and
//! handed back in buffer-sized pieces on receive, so neither side has to
//! hold a whole response in memory.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()` in this module
//! - Slicing is bounded by `min(bytes_remaining, buffer.len())`

use std::io;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::chunk::{decode_header, encode_header, ChunkType, HEADER_LEN, MAX_CHUNK_SIZE};
use crate::error::PptError;
use crate::extension::{self, Extension};

/// Default receive buffer: one full chunk.
pub const DEFAULT_RECEIVE_BUFFER: usize = MAX_CHUNK_SIZE;

/// Result of a single [`PptStream::receive`] call.
#[derive(Debug, PartialEq, Eq)]
pub enum Received<'a> {
    /// A complete extension chunk, decoded.
    Extensions(Vec<Extension>),

    /// Part (or all) of a data chunk. `remaining` is what is still owed for
    /// the current chunk; the next `receive` continues it.
    Data { data: &'a [u8], remaining: usize },

    /// Zero-length data chunk: end of the logical message.
    Done,
}

/// One logical message, collected up to its end marker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    pub data: Vec<u8>,
    pub extensions: Vec<Extension>,
}

impl Message {
    /// Message body as UTF-8.
    pub fn text(&self) -> Result<&str, PptError> {
        std::str::from_utf8(&self.data).map_err(|_| PptError::NotUtf8)
    }

    /// Value of the `status` extension, if one was sent.
    pub fn status(&self) -> Option<&str> {
        extension::find(&self.extensions, extension::STATUS).and_then(|e| e.value.as_deref())
    }

    /// True if the peer asked to end the session.
    pub fn is_exit(&self) -> bool {
        self.extensions.iter().any(Extension::is_exit)
    }

    /// True if the peer flagged this message as an error report.
    pub fn is_error(&self) -> bool {
        self.extensions.iter().any(Extension::is_error)
    }
}

/// Chunk-level reader/writer over a stream socket.
pub struct PptStream<S> {
    stream: S,
    buffer: Vec<u8>,
    bytes_remaining: usize,
    /// Upper bound on the data [`receive_message`](Self::receive_message)
    /// will collect
    max_message_size: Option<usize>,
}

impl<S> PptStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wraps a stream with the default receive buffer.
    pub fn new(stream: S) -> Self {
        Self::with_receive_buffer(stream, DEFAULT_RECEIVE_BUFFER)
    }

    /// Wraps a stream, sizing the receive buffer once.
    pub fn with_receive_buffer(stream: S, size: usize) -> Self {
        Self {
            stream,
            buffer: vec![0; size.max(1)],
            bytes_remaining: 0,
            max_message_size: None,
        }
    }

    /// Caps the data collected by [`receive_message`](Self::receive_message).
    pub fn with_max_message_size(mut self, limit: Option<usize>) -> Self {
        self.max_message_size = limit;
        self
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    pub fn max_message_size(&self) -> Option<usize> {
        self.max_message_size
    }

    /// Bytes still owed for the data chunk currently being received.
    pub fn bytes_remaining(&self) -> usize {
        self.bytes_remaining
    }

    /// Writes one chunk: header then payload.
    ///
    /// Fails without writing anything if the payload exceeds
    /// [`MAX_CHUNK_SIZE`].
    pub async fn send_chunk(&mut self, chunk_type: ChunkType, payload: &[u8]) -> Result<(), PptError> {
        if payload.len() > MAX_CHUNK_SIZE {
            return Err(PptError::ChunkTooLarge {
                len: payload.len(),
                max: MAX_CHUNK_SIZE,
            });
        }

        let header = encode_header(payload.len(), chunk_type)?;
        self.stream.write_all(&header).await.map_err(PptError::Write)?;
        if !payload.is_empty() {
            self.stream.write_all(payload).await.map_err(PptError::Write)?;
        }

        debug!(chunk_type = %chunk_type, len = payload.len(), "Sent chunk");
        Ok(())
    }

    /// Sends `data` as a run of `d` chunks without an end marker.
    pub async fn send_data(&mut self, data: &[u8]) -> Result<(), PptError> {
        for piece in data.chunks(MAX_CHUNK_SIZE) {
            self.send_chunk(ChunkType::Data, piece).await?;
        }
        Ok(())
    }

    /// Sends the zero-length end-of-message chunk and flushes.
    pub async fn send_end(&mut self) -> Result<(), PptError> {
        self.send_chunk(ChunkType::Data, &[]).await?;
        self.stream.flush().await.map_err(PptError::Write)
    }

    /// Sends a complete message: data chunks followed by the end marker.
    pub async fn send(&mut self, data: &[u8]) -> Result<(), PptError> {
        self.send_data(data).await?;
        self.send_end().await
    }

    /// Sends one `x` chunk without ending the message.
    pub async fn send_extension_chunk(&mut self, extensions: &[Extension]) -> Result<(), PptError> {
        let encoded = extension::encode(extensions);
        self.send_chunk(ChunkType::Extensions, encoded.as_bytes()).await
    }

    /// Sends an extension-only message.
    pub async fn send_extensions(&mut self, extensions: &[Extension]) -> Result<(), PptError> {
        self.send_extension_chunk(extensions).await?;
        self.send_end().await
    }

    /// Asks the peer to end the session (`status=PPT_EXIT_NOW`).
    pub async fn send_exit(&mut self) -> Result<(), PptError> {
        self.send_extensions(&[Extension::exit_now()]).await
    }

    /// Receives the next piece of the incoming message.
    ///
    /// If a previous call left part of a data chunk unread, that chunk is
    /// continued instead of reading a new header.
    pub async fn receive(&mut self) -> Result<Received<'_>, PptError> {
        if self.bytes_remaining > 0 {
            return self.read_data_piece().await;
        }

        let mut header = [0u8; HEADER_LEN];
        self.stream
            .read_exact(&mut header)
            .await
            .map_err(map_read_error)?;

        let (len, chunk_type) = decode_header(&header)?;
        if len > MAX_CHUNK_SIZE {
            return Err(PptError::ChunkTooLarge {
                len,
                max: MAX_CHUNK_SIZE,
            });
        }

        debug!(chunk_type = %chunk_type, len, "Received chunk header");

        match chunk_type {
            ChunkType::Extensions => {
                let mut payload = vec![0; len];
                self.stream
                    .read_exact(&mut payload)
                    .await
                    .map_err(map_read_error)?;
                let text = String::from_utf8(payload)
                    .map_err(|e| PptError::MalformedExtensions(String::from_utf8_lossy(e.as_bytes()).into_owned()))?;
                Ok(Received::Extensions(extension::decode(&text)?))
            }
            ChunkType::Data if len == 0 => Ok(Received::Done),
            ChunkType::Data => {
                self.bytes_remaining = len;
                self.read_data_piece().await
            }
        }
    }

    /// Collects one logical message up to its end marker.
    ///
    /// With a size cap set, data past the cap is read and dropped up to the
    /// end marker, then `MessageTooLarge` is returned. The stream is left at
    /// a message boundary, so the caller may answer and carry on.
    pub async fn receive_message(&mut self) -> Result<Message, PptError> {
        let limit = self.max_message_size;
        let mut message = Message::default();
        let mut oversized = false;
        loop {
            match self.receive().await? {
                Received::Data { data, .. } => {
                    if oversized {
                        continue;
                    }
                    match limit {
                        Some(limit) if message.data.len() + data.len() > limit => {
                            debug!(limit, "Message over size limit, discarding");
                            oversized = true;
                            message.data = Vec::new();
                        }
                        _ => message.data.extend_from_slice(data),
                    }
                }
                Received::Extensions(exts) => message.extensions.extend(exts),
                Received::Done if oversized => {
                    return Err(PptError::MessageTooLarge {
                        limit: limit.unwrap_or_default(),
                    })
                }
                Received::Done => return Ok(message),
            }
        }
    }

    async fn read_data_piece(&mut self) -> Result<Received<'_>, PptError> {
        let want = self.bytes_remaining.min(self.buffer.len());
        let piece = self.buffer.get_mut(..want).ok_or(PptError::Closed)?;
        self.stream.read_exact(piece).await.map_err(map_read_error)?;
        self.bytes_remaining -= want;

        let data = self.buffer.get(..want).ok_or(PptError::Closed)?;
        Ok(Received::Data {
            data,
            remaining: self.bytes_remaining,
        })
    }
}

fn map_read_error(error: io::Error) -> PptError {
    if error.kind() == io::ErrorKind::UnexpectedEof {
        PptError::Closed
    } else {
        PptError::Read(error)
    }
}

/// Destination a transmitter streams a response into.
///
/// The caller closes the message (end marker) after the transmitter
/// returns, so transmitters only ever write data and extension chunks.
#[async_trait]
pub trait ResponseSink: Send {
    /// Appends response bytes, chunking as needed.
    async fn write_data(&mut self, data: &[u8]) -> Result<(), PptError>;

    /// Emits an extension chunk inside the current message.
    async fn write_extensions(&mut self, extensions: &[Extension]) -> Result<(), PptError>;
}

#[async_trait]
impl<S> ResponseSink for PptStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn write_data(&mut self, data: &[u8]) -> Result<(), PptError> {
        self.send_data(data).await
    }

    async fn write_extensions(&mut self, extensions: &[Extension]) -> Result<(), PptError> {
        self.send_extension_chunk(extensions).await
    }
}

/// In-memory sink, for rendering a response without a socket.
#[derive(Debug, Default)]
pub struct BufferSink {
    pub data: Vec<u8>,
    pub extensions: Vec<Extension>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collected bytes as lossy UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

#[async_trait]
impl ResponseSink for BufferSink {
    async fn write_data(&mut self, data: &[u8]) -> Result<(), PptError> {
        self.data.extend_from_slice(data);
        Ok(())
    }

    async fn write_extensions(&mut self, extensions: &[Extension]) -> Result<(), PptError> {
        self.extensions.extend_from_slice(extensions);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[tokio::test]
    async fn test_send_writes_header_payload_and_terminator() {
        let (client, mut server) = duplex(1024);
        let mut stream = PptStream::new(client);

        stream.send(b"show version;").await.unwrap();
        drop(stream);

        let mut raw = Vec::new();
        server.read_to_end(&mut raw).await.unwrap();
        assert_eq!(raw, b"000000dd".iter().chain(b"show version;").chain(b"0000000d").copied().collect::<Vec<u8>>());
    }

    #[tokio::test]
    async fn test_send_chunk_rejects_oversized_payload() {
        let (client, _server) = duplex(64);
        let mut stream = PptStream::new(client);
        let payload = vec![0u8; MAX_CHUNK_SIZE + 1];

        let result = stream.send_chunk(ChunkType::Data, &payload).await;
        assert!(matches!(result, Err(PptError::ChunkTooLarge { .. })));
    }

    #[tokio::test]
    async fn test_empty_message_is_only_terminator() {
        let (client, mut server) = duplex(64);
        let mut stream = PptStream::new(client);
        stream.send(b"").await.unwrap();
        drop(stream);

        let mut raw = Vec::new();
        server.read_to_end(&mut raw).await.unwrap();
        assert_eq!(raw, b"0000000d");
    }

    #[tokio::test]
    async fn test_roundtrip_across_chunk_boundaries() {
        let sizes = [
            0,
            1,
            MAX_CHUNK_SIZE - 1,
            MAX_CHUNK_SIZE,
            MAX_CHUNK_SIZE + 1,
            2 * MAX_CHUNK_SIZE + 17,
            3 * MAX_CHUNK_SIZE,
        ];

        for size in sizes {
            let (client, server) = duplex(16 * 1024);
            let payload = pattern(size);
            let expected = payload.clone();

            let writer = tokio::spawn(async move {
                let mut stream = PptStream::new(client);
                stream.send(&payload).await.unwrap();
            });

            // A small receive buffer forces partial-chunk continuation.
            let mut reader = PptStream::with_receive_buffer(server, 4096);
            let message = reader.receive_message().await.unwrap();
            writer.await.unwrap();

            assert_eq!(message.data.len(), expected.len(), "size {size}");
            assert_eq!(message.data, expected, "size {size}");
            assert_eq!(reader.bytes_remaining(), 0);
        }
    }

    #[tokio::test]
    async fn test_oversized_message_is_drained_and_rejected() {
        let (client, server) = duplex(16 * 1024);
        let writer = tokio::spawn(async move {
            let mut stream = PptStream::new(client);
            stream.send(&pattern(3 * MAX_CHUNK_SIZE)).await.unwrap();
            stream.send(b"show version;").await.unwrap();
        });

        let mut reader = PptStream::new(server).with_max_message_size(Some(1000));
        let result = reader.receive_message().await;
        assert!(matches!(result, Err(PptError::MessageTooLarge { limit: 1000 })));

        // The next message starts cleanly after the rejected one.
        let next = reader.receive_message().await.unwrap();
        assert_eq!(next.text().unwrap(), "show version;");
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn test_message_at_limit_is_accepted() {
        let (client, server) = duplex(4096);
        let mut writer = PptStream::new(client);
        writer.send(&pattern(1000)).await.unwrap();

        let mut reader = PptStream::new(server).with_max_message_size(Some(1000));
        assert_eq!(reader.receive_message().await.unwrap().data.len(), 1000);
    }

    #[tokio::test]
    async fn test_receive_reports_bytes_remaining() {
        let (client, server) = duplex(8192);
        let mut writer = PptStream::new(client);
        writer.send(&pattern(100)).await.unwrap();

        let mut reader = PptStream::with_receive_buffer(server, 40);
        match reader.receive().await.unwrap() {
            Received::Data { data, remaining } => {
                assert_eq!(data.len(), 40);
                assert_eq!(remaining, 60);
            }
            other => panic!("expected data, got {other:?}"),
        }
        match reader.receive().await.unwrap() {
            Received::Data { data, remaining } => {
                assert_eq!(data.len(), 40);
                assert_eq!(remaining, 20);
            }
            other => panic!("expected data, got {other:?}"),
        }
        match reader.receive().await.unwrap() {
            Received::Data { data, remaining } => {
                assert_eq!(data.len(), 20);
                assert_eq!(remaining, 0);
            }
            other => panic!("expected data, got {other:?}"),
        }
        assert_eq!(reader.receive().await.unwrap(), Received::Done);
    }

    #[tokio::test]
    async fn test_extensions_inside_message() {
        let (client, server) = duplex(1024);
        let mut writer = PptStream::new(client);
        writer.send_extension_chunk(&[Extension::error_status()]).await.unwrap();
        writer.send(b"it broke").await.unwrap();

        let mut reader = PptStream::new(server);
        let message = reader.receive_message().await.unwrap();
        assert!(message.is_error());
        assert_eq!(message.status(), Some("error"));
        assert_eq!(message.text().unwrap(), "it broke");
    }

    #[tokio::test]
    async fn test_send_exit_is_extension_message() {
        let (client, server) = duplex(1024);
        let mut writer = PptStream::new(client);
        writer.send_exit().await.unwrap();

        let mut reader = PptStream::new(server);
        match reader.receive().await.unwrap() {
            Received::Extensions(exts) => assert_eq!(exts, vec![Extension::exit_now()]),
            other => panic!("expected extensions, got {other:?}"),
        }
        assert_eq!(reader.receive().await.unwrap(), Received::Done);
    }

    #[tokio::test]
    async fn test_malformed_header_is_protocol_error() {
        let (mut client, server) = duplex(64);
        client.write_all(b"zzzzzzzd").await.unwrap();

        let mut reader = PptStream::new(server);
        let result = reader.receive().await;
        assert!(matches!(result, Err(PptError::BadLength { .. })));
    }

    #[tokio::test]
    async fn test_eof_mid_chunk_is_closed() {
        let (mut client, server) = duplex(64);
        client.write_all(b"0000010dabc").await.unwrap();
        drop(client);

        let mut reader = PptStream::new(server);
        let result = reader.receive_message().await;
        assert!(matches!(result, Err(PptError::Closed)));
    }

    #[tokio::test]
    async fn test_buffer_sink_collects() {
        let mut sink = BufferSink::new();
        sink.write_data(b"abc").await.unwrap();
        sink.write_extensions(&[Extension::flag("x")]).await.unwrap();
        assert_eq!(sink.text(), "abc");
        assert_eq!(sink.extensions.len(), 1);
    }
}
