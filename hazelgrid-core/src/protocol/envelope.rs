//! The request/response envelope exchanged with members.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::constants::*;
use super::frame::Frame;
use crate::error::{ErrorCode, GridError, Result};

static CORRELATION_ID_COUNTER: AtomicI64 = AtomicI64::new(1);

/// Generates a unique correlation ID for a request.
pub fn next_correlation_id() -> i64 {
    CORRELATION_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Outcome carried by a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    /// The command completed; the value, if any, is the first buffer.
    Success,
    /// The command failed.
    Failure(Failure),
}

/// Failure details carried by a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    /// Kind of the failure.
    pub code: ErrorCode,
    /// Human-readable diagnostic.
    pub message: String,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// A protocol message: a command with positional string arguments and binary
/// buffers, plus a status once it is a response.
///
/// The envelope does not interpret arguments or buffers; their meaning is
/// owned by the handler registered for the command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Protocol {
    correlation_id: i64,
    command: String,
    args: Vec<String>,
    buffers: Vec<Bytes>,
    status: Option<Status>,
}

impl Protocol {
    /// Creates a request for `command` with a fresh correlation id.
    pub fn request(command: impl Into<String>) -> Self {
        Self::new_request(command, Vec::new(), Vec::new())
    }

    /// Creates a request with all arguments and buffers at once.
    pub fn new_request(
        command: impl Into<String>,
        args: Vec<String>,
        buffers: Vec<Bytes>,
    ) -> Self {
        Self {
            correlation_id: next_correlation_id(),
            command: command.into(),
            args,
            buffers,
            status: None,
        }
    }

    /// Appends a string argument.
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends a binary buffer.
    pub fn with_buffer(mut self, buffer: impl Into<Bytes>) -> Self {
        self.buffers.push(buffer.into());
        self
    }

    /// Builds the success response to this request.
    ///
    /// `None` means "no value" and is distinct from `Some` of an empty buffer.
    pub fn success(&self, value: Option<Bytes>) -> Self {
        Self {
            correlation_id: self.correlation_id,
            command: self.command.clone(),
            args: Vec::new(),
            buffers: value.into_iter().collect(),
            status: Some(Status::Success),
        }
    }

    /// Builds the failure response describing `error`.
    pub fn failure(&self, error: &GridError) -> Self {
        self.failure_with(error.code(), error.message())
    }

    /// Builds a failure response with an explicit code and message.
    pub fn failure_with(&self, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            correlation_id: self.correlation_id,
            command: self.command.clone(),
            args: Vec::new(),
            buffers: Vec::new(),
            status: Some(Status::Failure(Failure {
                code,
                message: message.into(),
            })),
        }
    }

    /// Returns the correlation id.
    pub fn correlation_id(&self) -> i64 {
        self.correlation_id
    }

    /// Returns the command name.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Returns all arguments.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Returns all buffers.
    pub fn buffers(&self) -> &[Bytes] {
        &self.buffers
    }

    /// Returns the response status, or `None` for a request.
    pub fn status(&self) -> Option<&Status> {
        self.status.as_ref()
    }

    /// Returns the argument at `index`.
    pub fn arg(&self, index: usize) -> Result<&str> {
        self.args.get(index).map(String::as_str).ok_or_else(|| {
            GridError::Protocol(format!(
                "command '{}' is missing argument {}",
                self.command, index
            ))
        })
    }

    /// Returns the buffer at `index`.
    pub fn buffer(&self, index: usize) -> Result<&Bytes> {
        self.buffers.get(index).ok_or_else(|| {
            GridError::Protocol(format!(
                "command '{}' is missing buffer {}",
                self.command, index
            ))
        })
    }

    /// Returns the value of a success response.
    pub fn value(&self) -> Option<&Bytes> {
        match self.status {
            Some(Status::Success) => self.buffers.first(),
            _ => None,
        }
    }

    /// Returns true if this message is a request.
    pub fn is_request(&self) -> bool {
        self.status.is_none()
    }

    /// Returns true if this message is a success response.
    pub fn is_success(&self) -> bool {
        matches!(self.status, Some(Status::Success))
    }

    /// Returns true if this message is a failure response.
    pub fn is_failure(&self) -> bool {
        matches!(self.status, Some(Status::Failure(_)))
    }

    /// Returns the failure details of a failure response.
    pub fn failure_details(&self) -> Option<&Failure> {
        match &self.status {
            Some(Status::Failure(failure)) => Some(failure),
            _ => None,
        }
    }

    /// Returns true if this is a failure the caller may retry.
    pub fn is_retryable(&self) -> bool {
        self.failure_details()
            .map(|f| f.code.is_retryable())
            .unwrap_or(false)
    }

    /// Converts a response into its value, turning failures into [`GridError::Remote`].
    pub fn into_result(self) -> Result<Option<Bytes>> {
        match self.status {
            Some(Status::Success) => Ok(self.buffers.into_iter().next()),
            Some(Status::Failure(Failure { code, message })) => {
                Err(GridError::Remote { code, message })
            }
            None => Err(GridError::Protocol(format!(
                "expected a response to '{}', got a request",
                self.command
            ))),
        }
    }

    /// Returns the frames of this message, END flag on the last one.
    pub fn to_frames(&self) -> Vec<Frame> {
        let (kind, code, message) = match &self.status {
            None => (KIND_REQUEST, 0u8, None),
            Some(Status::Success) => (KIND_SUCCESS, 0u8, None),
            Some(Status::Failure(f)) => (KIND_FAILURE, f.code as u8, Some(&f.message)),
        };

        let mut initial = BytesMut::with_capacity(INITIAL_FRAME_SIZE);
        initial.put_i64_le(self.correlation_id);
        initial.put_u8(kind);
        initial.put_u8(code);
        initial.put_i32_le(self.args.len() as i32);
        initial.put_i32_le(self.buffers.len() as i32);

        let mut frames = Vec::with_capacity(3 + self.args.len() + self.buffers.len());
        frames.push(Frame::new_begin_frame(initial.freeze()));
        frames.push(Frame::new_data_frame(Bytes::copy_from_slice(
            self.command.as_bytes(),
        )));
        frames.extend(
            self.args
                .iter()
                .map(|arg| Frame::new_data_frame(Bytes::copy_from_slice(arg.as_bytes()))),
        );
        frames.extend(self.buffers.iter().cloned().map(Frame::new_data_frame));
        if let Some(message) = message {
            frames.push(Frame::new_data_frame(Bytes::copy_from_slice(
                message.as_bytes(),
            )));
        }
        if let Some(last) = frames.last_mut() {
            last.flags |= END_FLAG;
        }
        frames
    }

    /// Writes all frames of this message to `dst`.
    pub fn write_to(&self, dst: &mut BytesMut) {
        for frame in self.to_frames() {
            frame.write_to(dst);
        }
    }

    /// Reassembles a message from its frames.
    pub fn from_frames(frames: Vec<Frame>) -> Result<Self> {
        let mut frames = frames.into_iter();
        let initial = frames
            .next()
            .ok_or_else(|| GridError::Protocol("message has no frames".to_string()))?;
        if !initial.is_begin_frame() {
            return Err(GridError::Protocol(
                "first frame is missing the BEGIN flag".to_string(),
            ));
        }
        if initial.content.len() < INITIAL_FRAME_SIZE {
            return Err(GridError::Protocol(format!(
                "initial frame holds {} bytes, expected {}",
                initial.content.len(),
                INITIAL_FRAME_SIZE
            )));
        }

        let mut header = initial.content;
        let correlation_id = header.get_i64_le();
        let kind = header.get_u8();
        let code = header.get_u8();
        let arg_count = count(header.get_i32_le(), "argument")?;
        let buffer_count = count(header.get_i32_le(), "buffer")?;
        let has_message = match kind {
            KIND_REQUEST | KIND_SUCCESS => false,
            KIND_FAILURE => true,
            other => {
                return Err(GridError::Protocol(format!(
                    "unknown message kind {}",
                    other
                )))
            }
        };

        let expected = 1 + arg_count + buffer_count + usize::from(has_message);
        if frames.len() != expected {
            return Err(GridError::Protocol(format!(
                "expected {} frames after the initial frame, got {}",
                expected,
                frames.len()
            )));
        }

        let mut next_text = |what: &str| -> Result<String> {
            let frame = frames
                .next()
                .ok_or_else(|| GridError::Protocol(format!("missing {} frame", what)))?;
            String::from_utf8(frame.content.to_vec())
                .map_err(|e| GridError::Protocol(format!("invalid UTF-8 in {}: {}", what, e)))
        };

        let command = next_text("command")?;
        let args = (0..arg_count)
            .map(|_| next_text("argument"))
            .collect::<Result<Vec<_>>>()?;
        let buffers: Vec<Bytes> = frames
            .by_ref()
            .take(buffer_count)
            .map(|frame| frame.content)
            .collect();

        let status = match kind {
            KIND_REQUEST => None,
            KIND_SUCCESS => Some(Status::Success),
            _ => {
                let message = frames
                    .next()
                    .map(|frame| String::from_utf8_lossy(&frame.content).into_owned())
                    .unwrap_or_default();
                Some(Status::Failure(Failure {
                    code: ErrorCode::from_u8(code),
                    message,
                }))
            }
        };

        Ok(Self {
            correlation_id,
            command,
            args,
            buffers,
            status,
        })
    }
}

fn count(value: i32, what: &str) -> Result<usize> {
    usize::try_from(value)
        .map_err(|_| GridError::Protocol(format!("negative {} count: {}", what, value)))
}
