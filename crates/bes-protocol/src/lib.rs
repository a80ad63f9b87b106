//! BES Protocol - PPT point-to-point chunked wire protocol
//!
//! This crate provides everything that touches bytes on the wire between a
//! BES client and the daemon:
//!
//! - `chunk` - the 8-byte chunk header (`%07x` length + type byte)
//! - `extension` - the `name[=value];` sideband carried in `x` chunks
//! - `transport` - chunked send/receive over any async byte stream
//! - `handshake` - the connection greeting and authentication hook
//! - `connection` - client-side TCP / Unix socket connections
//!
//! # Wire Format
//!
//! ```text
//! ┌──────────────────────┬──────┬───────────────────────────┐
//! │ length (7 hex chars) │ type │ payload (length bytes)    │
//! │       "000001a"      │ 'd'  │ ...                       │
//! └──────────────────────┴──────┴───────────────────────────┘
//! ```
//!
//! A logical message is a run of `d` chunks closed by a zero-length `d`
//! chunk. Extension chunks (`x`) may appear inside a message.

pub mod chunk;
pub mod connection;
pub mod error;
pub mod extension;
pub mod handshake;
pub mod transport;

pub use chunk::{decode_header, encode_header, ChunkType, HEADER_LEN, MAX_CHUNK_SIZE};
pub use connection::{ConnectSpec, Connection, Endpoint, Socket};
pub use error::PptError;
pub use extension::Extension;
pub use handshake::{HandshakeState, ServerReply};
pub use transport::{BufferSink, Message, PptStream, Received, ResponseSink};
