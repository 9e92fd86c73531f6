//! Codec implementation for encoding/decoding protocol messages.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

use super::constants::*;
use super::envelope::Protocol;
use super::frame::Frame;
use crate::error::{GridError, Result};

/// Codec for encoding and decoding [`Protocol`] messages.
///
/// Implements the `tokio_util::codec::{Encoder, Decoder}` traits for use
/// with tokio's framed I/O. Frames are accumulated until one carries the END
/// flag. The configured maximum bounds both a single frame, checked before its
/// content is buffered, and the frames of one message taken together. After a
/// decode error the partial message is discarded.
#[derive(Debug)]
pub struct ProtocolCodec {
    /// Frames accumulated while decoding a multi-frame message.
    pending_frames: Vec<Frame>,
    /// Sum of the frame lengths in `pending_frames`.
    pending_bytes: usize,
    /// Whether we're currently accumulating frames for a message.
    in_message: bool,
    max_frame_size: usize,
}

impl ProtocolCodec {
    /// Creates a codec with [`DEFAULT_MAX_FRAME_SIZE`].
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Creates a codec rejecting frames whose flags and content exceed `max_frame_size`.
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            pending_frames: Vec::new(),
            pending_bytes: 0,
            in_message: false,
            max_frame_size,
        }
    }

    /// Returns the frame size limit.
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    fn reset(&mut self) {
        self.pending_frames.clear();
        self.pending_bytes = 0;
        self.in_message = false;
    }

    fn decode_frames(&mut self, src: &mut BytesMut) -> Result<Option<Protocol>> {
        loop {
            let frame_length = match Frame::peek_length(src)? {
                Some(len) => len,
                None => return Ok(None),
            };
            if frame_length > self.max_frame_size {
                return Err(GridError::Protocol(format!(
                    "frame of {} bytes exceeds the limit of {}",
                    frame_length, self.max_frame_size
                )));
            }
            if self.pending_bytes + frame_length > self.max_frame_size {
                return Err(GridError::Protocol(format!(
                    "message of at least {} bytes exceeds the limit of {}",
                    self.pending_bytes + frame_length,
                    self.max_frame_size
                )));
            }

            let frame = match Frame::read_from(src)? {
                Some(frame) => frame,
                None => {
                    src.reserve(SIZE_OF_FRAME_LENGTH_FIELD + frame_length - src.len());
                    return Ok(None);
                }
            };

            if frame.is_begin_frame() {
                if self.in_message {
                    return Err(GridError::Protocol(
                        "BEGIN frame inside an unfinished message".to_string(),
                    ));
                }
                self.in_message = true;
            } else if !self.in_message {
                return Err(GridError::Protocol(
                    "frame received outside of a message".to_string(),
                ));
            }

            let is_end = frame.is_end_frame();
            self.pending_bytes += frame.frame_length();
            self.pending_frames.push(frame);

            if is_end {
                let frames = std::mem::take(&mut self.pending_frames);
                self.reset();
                return Protocol::from_frames(frames).map(Some);
            }
        }
    }
}

impl Default for ProtocolCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder<Protocol> for ProtocolCodec {
    type Error = GridError;

    fn encode(&mut self, item: Protocol, dst: &mut BytesMut) -> Result<()> {
        let frames = item.to_frames();
        let message_length: usize = frames.iter().map(Frame::frame_length).sum();
        if message_length > self.max_frame_size {
            return Err(GridError::Protocol(format!(
                "message of {} bytes exceeds the limit of {}",
                message_length, self.max_frame_size
            )));
        }
        for frame in &frames {
            frame.write_to(dst);
        }
        trace!(
            correlation_id = item.correlation_id(),
            command = item.command(),
            "encoded message"
        );
        Ok(())
    }
}

impl Decoder for ProtocolCodec {
    type Item = Protocol;
    type Error = GridError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        let decoded = self.decode_frames(src);
        if decoded.is_err() {
            self.reset();
        }
        decoded
    }
}
