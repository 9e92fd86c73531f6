//! Frame type for the member wire protocol.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::constants::*;
use crate::error::{GridError, Result};

/// A single frame of a protocol message.
///
/// Each frame consists of:
/// - A 4-byte length field (little-endian) covering flags and content
/// - A 2-byte flags field (little-endian)
/// - Variable-length content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The frame content (payload after flags).
    pub content: Bytes,
    /// Frame flags.
    pub flags: u16,
}

impl Frame {
    /// Creates a new frame with the given content and flags.
    pub fn new(content: impl Into<Bytes>, flags: u16) -> Self {
        Self {
            content: content.into(),
            flags,
        }
    }

    /// Creates a data frame with default flags.
    pub fn new_data_frame(content: impl Into<Bytes>) -> Self {
        Self::new(content, DEFAULT_FLAGS)
    }

    /// Creates a begin frame (marks start of a message).
    pub fn new_begin_frame(content: impl Into<Bytes>) -> Self {
        Self::new(content, BEGIN_FLAG)
    }

    /// Returns true if this frame has the BEGIN flag set.
    pub fn is_begin_frame(&self) -> bool {
        self.flags & BEGIN_FLAG != 0
    }

    /// Returns true if this frame has the END flag set.
    pub fn is_end_frame(&self) -> bool {
        self.flags & END_FLAG != 0
    }

    /// Returns the size of this frame on the wire.
    pub fn wire_size(&self) -> usize {
        FRAME_HEADER_SIZE + self.content.len()
    }

    /// Returns the value written in the length field (flags + content length).
    pub fn frame_length(&self) -> usize {
        SIZE_OF_FRAME_FLAGS_FIELD + self.content.len()
    }

    /// Writes this frame to the given buffer.
    pub fn write_to(&self, dst: &mut BytesMut) {
        dst.reserve(self.wire_size());
        dst.put_u32_le(self.frame_length() as u32);
        dst.put_u16_le(self.flags);
        dst.put_slice(&self.content);
    }

    /// Peeks at the length field of the next frame in `src`.
    ///
    /// Returns `Ok(None)` until four bytes are buffered. A length too small to
    /// hold the flags field is a protocol error.
    pub fn peek_length(src: &[u8]) -> Result<Option<usize>> {
        if src.len() < SIZE_OF_FRAME_LENGTH_FIELD {
            return Ok(None);
        }
        let frame_length = u32::from_le_bytes([src[0], src[1], src[2], src[3]]) as usize;
        if frame_length < SIZE_OF_FRAME_FLAGS_FIELD {
            return Err(GridError::Protocol(format!(
                "frame length {} is smaller than the flags field",
                frame_length
            )));
        }
        Ok(Some(frame_length))
    }

    /// Reads a frame from the given buffer.
    ///
    /// Returns `Ok(None)` if there isn't enough data for a complete frame; the
    /// buffer is left untouched in that case.
    pub fn read_from(src: &mut BytesMut) -> Result<Option<Self>> {
        let frame_length = match Self::peek_length(src)? {
            Some(len) => len,
            None => return Ok(None),
        };
        if src.len() < SIZE_OF_FRAME_LENGTH_FIELD + frame_length {
            return Ok(None);
        }

        src.advance(SIZE_OF_FRAME_LENGTH_FIELD);
        let flags = src.get_u16_le();
        let content = src.split_to(frame_length - SIZE_OF_FRAME_FLAGS_FIELD).freeze();
        Ok(Some(Self::new(content, flags)))
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::new(Bytes::new(), DEFAULT_FLAGS)
    }
}
