//! Serialization framework for the grid's binary format.

mod byte_order;
mod data;
mod data_input;
mod data_output;
mod serializer;
mod service;
pub mod utf;

pub use byte_order::ByteOrder;
pub use data::{
    compute_partition_hash, hash_to_index, murmur_hash3_x86_32, Data, DATA_HEADER_SIZE,
    PARTITION_HASH_SEED,
};
pub use data_input::{DataInput, ObjectDataInput, ObjectDataInputStream};
pub use data_output::{DataOutput, ObjectDataOutput, ObjectDataOutputStream};
pub use serializer::{
    BooleanArraySerializer, BooleanSerializer, ByteArraySerializer, ByteSerializer,
    CharArraySerializer, CharSerializer, DoubleArraySerializer, DoubleSerializer, FloatArraySerializer,
    FloatSerializer, FnSerializer, IntegerArraySerializer, IntegerSerializer, LongArraySerializer,
    LongSerializer, ShortArraySerializer, ShortSerializer, StreamSerializer, StringSerializer,
    CONSTANT_TYPE_BOOLEAN, CONSTANT_TYPE_BOOLEAN_ARRAY, CONSTANT_TYPE_BYTE,
    CONSTANT_TYPE_BYTE_ARRAY, CONSTANT_TYPE_CHAR, CONSTANT_TYPE_CHAR_ARRAY, CONSTANT_TYPE_DOUBLE,
    CONSTANT_TYPE_DOUBLE_ARRAY, CONSTANT_TYPE_FLOAT, CONSTANT_TYPE_FLOAT_ARRAY,
    CONSTANT_TYPE_INTEGER, CONSTANT_TYPE_INTEGER_ARRAY, CONSTANT_TYPE_LONG,
    CONSTANT_TYPE_LONG_ARRAY, CONSTANT_TYPE_SHORT, CONSTANT_TYPE_SHORT_ARRAY, CONSTANT_TYPE_STRING,
};
pub use service::{SerializationService, SerializationServiceBuilder};
