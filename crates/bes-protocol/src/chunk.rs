//! Chunk header encoding.
//!
//! A header is exactly [`HEADER_LEN`] bytes: seven lowercase hex digits
//! giving the payload length, then one type byte.

use std::fmt;

use crate::error::PptError;

/// Largest payload a single chunk may carry.
pub const MAX_CHUNK_SIZE: usize = 0x10000 - 1;

/// Size of the fixed chunk header.
pub const HEADER_LEN: usize = 8;

/// Largest length representable by the seven hex digit field.
pub const MAX_HEADER_LENGTH: usize = 0xFF_FFFF;

const LENGTH_DIGITS: usize = HEADER_LEN - 1;

/// Payload kind carried by a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkType {
    /// Raw message bytes (`'d'`).
    Data,
    /// A `name[=value];` extension list (`'x'`).
    Extensions,
}

impl ChunkType {
    /// The on-wire tag byte.
    pub const fn as_byte(self) -> u8 {
        match self {
            Self::Data => b'd',
            Self::Extensions => b'x',
        }
    }

    /// Parses an on-wire tag byte.
    pub fn from_byte(byte: u8) -> Result<Self, PptError> {
        match byte {
            b'd' => Ok(Self::Data),
            b'x' => Ok(Self::Extensions),
            other => Err(PptError::BadChunkType(char::from(other))),
        }
    }
}

impl fmt::Display for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", char::from(self.as_byte()))
    }
}

/// Builds the 8-byte header for a chunk of `len` payload bytes.
///
/// Only the header field's range is checked here; callers sending chunks
/// additionally enforce [`MAX_CHUNK_SIZE`].
pub fn encode_header(len: usize, chunk_type: ChunkType) -> Result<[u8; HEADER_LEN], PptError> {
    if len > MAX_HEADER_LENGTH {
        return Err(PptError::LengthOutOfRange(len));
    }

    let digits = format!("{len:07x}");
    let mut header = [0u8; HEADER_LEN];
    for (slot, byte) in header.iter_mut().zip(digits.bytes()) {
        *slot = byte;
    }
    if let Some(last) = header.last_mut() {
        *last = chunk_type.as_byte();
    }
    Ok(header)
}

/// Parses an 8-byte header into payload length and chunk type.
pub fn decode_header(header: &[u8; HEADER_LEN]) -> Result<(usize, ChunkType), PptError> {
    let (digits, tag) = header.split_at(LENGTH_DIGITS);

    let mut len = 0usize;
    for &byte in digits {
        let value = match byte {
            b'0'..=b'9' => byte - b'0',
            b'a'..=b'f' => byte - b'a' + 10,
            _ => {
                return Err(PptError::BadLength {
                    field: String::from_utf8_lossy(digits).into_owned(),
                })
            }
        };
        len = len * 16 + usize::from(value);
    }

    let chunk_type = match tag.first() {
        Some(&byte) => ChunkType::from_byte(byte)?,
        None => return Err(PptError::BadChunkType('\0')),
    };

    Ok((len, chunk_type))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_header_layout() {
        let header = encode_header(26, ChunkType::Data).unwrap();
        assert_eq!(&header, b"000001ad");

        let header = encode_header(0, ChunkType::Extensions).unwrap();
        assert_eq!(&header, b"0000000x");
    }

    #[test]
    fn test_header_is_left_inverse_at_boundaries() {
        for len in [0, 1, 15, 16, 255, MAX_CHUNK_SIZE, MAX_CHUNK_SIZE + 1, MAX_HEADER_LENGTH] {
            for chunk_type in [ChunkType::Data, ChunkType::Extensions] {
                let header = encode_header(len, chunk_type).unwrap();
                assert_eq!(header.len(), HEADER_LEN);
                assert_eq!(decode_header(&header).unwrap(), (len, chunk_type));
            }
        }
    }

    #[test]
    fn test_encode_header_rejects_out_of_range() {
        assert!(matches!(
            encode_header(MAX_HEADER_LENGTH + 1, ChunkType::Data),
            Err(PptError::LengthOutOfRange(_))
        ));
    }

    #[test]
    fn test_decode_header_rejects_non_hex() {
        assert!(matches!(
            decode_header(b"00g0001d"),
            Err(PptError::BadLength { .. })
        ));
        // Uppercase digits are not part of the format.
        assert!(matches!(
            decode_header(b"00000FFd"),
            Err(PptError::BadLength { .. })
        ));
        assert!(matches!(
            decode_header(b" 000001d"),
            Err(PptError::BadLength { .. })
        ));
    }

    #[test]
    fn test_decode_header_rejects_unknown_type() {
        assert!(matches!(
            decode_header(b"0000001q"),
            Err(PptError::BadChunkType('q'))
        ));
    }
}
