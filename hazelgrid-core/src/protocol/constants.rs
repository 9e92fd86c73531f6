//! Protocol constants for the member wire protocol.

/// Size of the frame length field in bytes.
pub const SIZE_OF_FRAME_LENGTH_FIELD: usize = 4;

/// Size of the frame flags field in bytes.
pub const SIZE_OF_FRAME_FLAGS_FIELD: usize = 2;

/// Total frame header size (length + flags).
pub const FRAME_HEADER_SIZE: usize = SIZE_OF_FRAME_LENGTH_FIELD + SIZE_OF_FRAME_FLAGS_FIELD;

/// Begin frame flag - marks the start of a message.
pub const BEGIN_FLAG: u16 = 1 << 15;

/// End frame flag - marks the end of a message.
pub const END_FLAG: u16 = 1 << 14;

/// Default frame flags (no special flags set).
pub const DEFAULT_FLAGS: u16 = 0;

/// Default upper bound for a single frame's flags and content.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Offset of the correlation id in the initial frame.
pub const CORRELATION_ID_OFFSET: usize = 0;

/// Offset of the message kind in the initial frame.
pub const KIND_OFFSET: usize = CORRELATION_ID_OFFSET + 8;

/// Offset of the error code in the initial frame.
pub const ERROR_CODE_OFFSET: usize = KIND_OFFSET + 1;

/// Offset of the argument count in the initial frame.
pub const ARG_COUNT_OFFSET: usize = ERROR_CODE_OFFSET + 1;

/// Offset of the buffer count in the initial frame.
pub const BUFFER_COUNT_OFFSET: usize = ARG_COUNT_OFFSET + 4;

/// Size of the initial frame content.
pub const INITIAL_FRAME_SIZE: usize = BUFFER_COUNT_OFFSET + 4;

/// Message kind: request.
pub const KIND_REQUEST: u8 = 0;

/// Message kind: success response.
pub const KIND_SUCCESS: u8 = 1;

/// Message kind: failure response.
pub const KIND_FAILURE: u8 = 2;

// Command names.

/// Map get: args `[map]`, buffers `[key]`.
pub const COMMAND_GET: &str = "get";

/// Map put: args `[map]`, buffers `[key, value]`; answers the previous value.
pub const COMMAND_PUT: &str = "put";

/// Map remove: args `[map]`, buffers `[key]`; answers the removed value.
pub const COMMAND_REMOVE: &str = "remove";

/// Map contains-key: args `[map]`, buffers `[key]`; answers a one-byte flag.
pub const COMMAND_CONTAINS_KEY: &str = "containsKey";

/// Health check; answers `PONG`.
pub const COMMAND_PING: &str = "ping";

/// Member-to-member forwarded map operation.
pub const COMMAND_INTERNAL_MAP: &str = "internal.map";
