//! Error types for hazelgrid operations.

use std::io;
use thiserror::Error;

/// Stable one-byte identifier of an error kind, carried inside failure responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorCode {
    /// No serializer is registered for a type or type id.
    UnknownType = 1,
    /// A payload or length prefix could not be decoded.
    CorruptPayload = 2,
    /// A type id was registered twice.
    DuplicateTypeId = 3,
    /// No owner is known for a partition.
    PartitionUnavailable = 4,
    /// A forwarded call exceeded its deadline.
    RemoteCallTimeout = 5,
    /// Malformed envelope, unknown command or missing argument.
    Protocol = 6,
    /// Serialization contract violation (type mismatch, byte order mismatch).
    Serialization = 7,
    /// Invalid configuration.
    Configuration = 8,
    /// Connection to another member failed or closed.
    Connection = 9,
    /// Underlying I/O failure.
    Io = 10,
    /// Code not known to this version.
    Unknown = 255,
}

impl ErrorCode {
    /// Decodes a wire byte, mapping unassigned values to [`ErrorCode::Unknown`].
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::UnknownType,
            2 => Self::CorruptPayload,
            3 => Self::DuplicateTypeId,
            4 => Self::PartitionUnavailable,
            5 => Self::RemoteCallTimeout,
            6 => Self::Protocol,
            7 => Self::Serialization,
            8 => Self::Configuration,
            9 => Self::Connection,
            10 => Self::Io,
            _ => Self::Unknown,
        }
    }

    /// Returns `true` if an operation failing with this code may succeed when retried.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::PartitionUnavailable | Self::RemoteCallTimeout | Self::Connection
        )
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::UnknownType => "UNKNOWN_TYPE",
            Self::CorruptPayload => "CORRUPT_PAYLOAD",
            Self::DuplicateTypeId => "DUPLICATE_TYPE_ID",
            Self::PartitionUnavailable => "PARTITION_UNAVAILABLE",
            Self::RemoteCallTimeout => "REMOTE_CALL_TIMEOUT",
            Self::Protocol => "PROTOCOL",
            Self::Serialization => "SERIALIZATION",
            Self::Configuration => "CONFIGURATION",
            Self::Connection => "CONNECTION",
            Self::Io => "IO",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

/// The main error type for hazelgrid operations.
#[derive(Debug, Error)]
pub enum GridError {
    /// No encoder/decoder is registered for a type or type id.
    #[error("unknown type: {0}")]
    UnknownType(String),

    /// Decoding consumed the wrong number of bytes or hit a malformed length prefix.
    #[error("corrupt payload: {0}")]
    CorruptPayload(String),

    /// A serializer was registered for a type id that is already taken.
    #[error("duplicate type id: {0}")]
    DuplicateTypeId(i32),

    /// No owner is currently known for the partition.
    #[error("partition {0} has no available owner")]
    PartitionUnavailable(i32),

    /// A forwarded call did not complete before its deadline.
    #[error("remote call timed out: {0}")]
    RemoteCallTimeout(String),

    /// Protocol-related errors (malformed envelopes, unknown commands).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Serialization contract violations.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Configuration errors (invalid settings).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Connection-related errors (network failures, disconnections).
    #[error("connection error: {0}")]
    Connection(String),

    /// A failure reported by another member, relayed with its original code.
    #[error("remote failure [{code}]: {message}")]
    Remote {
        /// Error code reported by the remote member.
        code: ErrorCode,
        /// Diagnostic message reported by the remote member.
        message: String,
    },

    /// I/O errors from the standard library.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl GridError {
    /// Returns the wire code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::UnknownType(_) => ErrorCode::UnknownType,
            Self::CorruptPayload(_) => ErrorCode::CorruptPayload,
            Self::DuplicateTypeId(_) => ErrorCode::DuplicateTypeId,
            Self::PartitionUnavailable(_) => ErrorCode::PartitionUnavailable,
            Self::RemoteCallTimeout(_) => ErrorCode::RemoteCallTimeout,
            Self::Protocol(_) => ErrorCode::Protocol,
            Self::Serialization(_) => ErrorCode::Serialization,
            Self::Configuration(_) => ErrorCode::Configuration,
            Self::Connection(_) => ErrorCode::Connection,
            Self::Remote { code, .. } => *code,
            Self::Io(_) => ErrorCode::Io,
        }
    }

    /// Returns `true` if the failed operation may succeed when retried.
    ///
    /// Retry count and backoff are owned by the caller.
    pub fn is_retryable(&self) -> bool {
        self.code().is_retryable()
    }

    /// Returns the diagnostic message without the kind prefix.
    pub fn message(&self) -> String {
        match self {
            Self::Remote { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// A specialized `Result` type for hazelgrid operations.
pub type Result<T> = std::result::Result<T, GridError>;
