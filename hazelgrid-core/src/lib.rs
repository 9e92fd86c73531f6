//! Core types of the hazelgrid data plane: errors, the binary serialization
//! codec and the member wire protocol.

#![warn(missing_docs)]

pub mod error;
pub mod protocol;
pub mod serialization;

pub use error::{ErrorCode, GridError, Result};
pub use protocol::{Protocol, ProtocolCodec, Status};
pub use serialization::{
    ByteOrder, Data, DataInput, DataOutput, ObjectDataInput, ObjectDataOutput,
    SerializationService, SerializationServiceBuilder, StreamSerializer,
};
