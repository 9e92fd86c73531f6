//! Member wire protocol.
//!
//! A [`Protocol`] message travels as a sequence of little-endian length-prefixed
//! frames: an initial frame with the correlation id, message kind, error code and
//! element counts, then the command, the arguments, the buffers and, for
//! failures, the diagnostic message.

mod codec;
pub mod constants;
mod envelope;
mod frame;

pub use codec::ProtocolCodec;
pub use constants::*;
pub use envelope::{next_correlation_id, Failure, Protocol, Status};
pub use frame::Frame;
