//! Serializer contract, closure-based serializers and built-in type encodings.

use std::any::{Any, TypeId};
use std::marker::PhantomData;

use super::{DataInput, DataOutput};
use crate::error::{GridError, Result};

/// Type id of `i8`.
pub const CONSTANT_TYPE_BYTE: i32 = -3;
/// Type id of `bool`.
pub const CONSTANT_TYPE_BOOLEAN: i32 = -4;
/// Type id of a UTF-16 code unit (`u16`).
pub const CONSTANT_TYPE_CHAR: i32 = -5;
/// Type id of `i16`.
pub const CONSTANT_TYPE_SHORT: i32 = -6;
/// Type id of `i32`.
pub const CONSTANT_TYPE_INTEGER: i32 = -7;
/// Type id of `i64`.
pub const CONSTANT_TYPE_LONG: i32 = -8;
/// Type id of `f32`.
pub const CONSTANT_TYPE_FLOAT: i32 = -9;
/// Type id of `f64`.
pub const CONSTANT_TYPE_DOUBLE: i32 = -10;
/// Type id of `String`.
pub const CONSTANT_TYPE_STRING: i32 = -11;
/// Type id of raw bytes stored as-is, with no length prefix inside the payload.
pub const CONSTANT_TYPE_BYTE_ARRAY: i32 = -12;
/// Type id of `Vec<u16>`.
pub const CONSTANT_TYPE_CHAR_ARRAY: i32 = -13;
/// Type id of `Vec<i16>`.
pub const CONSTANT_TYPE_SHORT_ARRAY: i32 = -14;
/// Type id of `Vec<i32>`.
pub const CONSTANT_TYPE_INTEGER_ARRAY: i32 = -15;
/// Type id of `Vec<i64>`.
pub const CONSTANT_TYPE_LONG_ARRAY: i32 = -16;
/// Type id of `Vec<f32>`.
pub const CONSTANT_TYPE_FLOAT_ARRAY: i32 = -17;
/// Type id of `Vec<f64>`.
pub const CONSTANT_TYPE_DOUBLE_ARRAY: i32 = -18;
/// Type id of `Vec<bool>`.
pub const CONSTANT_TYPE_BOOLEAN_ARRAY: i32 = -19;

/// Encodes and decodes one Rust type under a fixed type id.
///
/// Implementations write through the primitive codec only, so the byte order
/// of the surrounding stream applies to everything they produce.
pub trait StreamSerializer: Send + Sync + 'static {
    /// The Rust type handled by this serializer.
    type Target: Send + 'static;

    /// Returns the wire type id.
    fn type_identifier(&self) -> i32;

    /// Encodes `value`.
    fn write(&self, out: &mut dyn DataOutput, value: &Self::Target) -> Result<()>;

    /// Decodes a value. The input is bounded to exactly one payload.
    fn read(&self, input: &mut dyn DataInput) -> Result<Self::Target>;
}

/// A serializer assembled from an encode closure and a decode closure.
pub struct FnSerializer<T, E, D> {
    type_id: i32,
    encode: E,
    decode: D,
    _target: PhantomData<fn() -> T>,
}

impl<T, E, D> FnSerializer<T, E, D>
where
    T: Send + 'static,
    E: Fn(&mut dyn DataOutput, &T) -> Result<()> + Send + Sync + 'static,
    D: Fn(&mut dyn DataInput) -> Result<T> + Send + Sync + 'static,
{
    /// Creates a serializer for `type_id`.
    pub fn new(type_id: i32, encode: E, decode: D) -> Self {
        Self {
            type_id,
            encode,
            decode,
            _target: PhantomData,
        }
    }
}

impl<T, E, D> StreamSerializer for FnSerializer<T, E, D>
where
    T: Send + 'static,
    E: Fn(&mut dyn DataOutput, &T) -> Result<()> + Send + Sync + 'static,
    D: Fn(&mut dyn DataInput) -> Result<T> + Send + Sync + 'static,
{
    type Target = T;

    fn type_identifier(&self) -> i32 {
        self.type_id
    }

    fn write(&self, out: &mut dyn DataOutput, value: &T) -> Result<()> {
        (self.encode)(out, value)
    }

    fn read(&self, input: &mut dyn DataInput) -> Result<T> {
        (self.decode)(input)
    }
}

/// Passes raw bytes through unchanged: the payload is the byte sequence itself.
#[derive(Debug, Clone, Copy)]
pub struct ByteArraySerializer {
    type_id: i32,
}

impl ByteArraySerializer {
    /// Creates a passthrough serializer under [`CONSTANT_TYPE_BYTE_ARRAY`].
    pub fn new() -> Self {
        Self::with_type_id(CONSTANT_TYPE_BYTE_ARRAY)
    }

    /// Creates a passthrough serializer under a custom type id.
    pub fn with_type_id(type_id: i32) -> Self {
        Self { type_id }
    }
}

impl Default for ByteArraySerializer {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamSerializer for ByteArraySerializer {
    type Target = Vec<u8>;

    fn type_identifier(&self) -> i32 {
        self.type_id
    }

    fn write(&self, out: &mut dyn DataOutput, value: &Vec<u8>) -> Result<()> {
        out.write_bytes(value)
    }

    fn read(&self, input: &mut dyn DataInput) -> Result<Vec<u8>> {
        let len = input.remaining_hint().ok_or_else(|| {
            GridError::Serialization("byte array passthrough needs a bounded input".to_string())
        })?;
        input.read_bytes(len)
    }
}

macro_rules! builtin_serializer {
    ($(#[$doc:meta] $name:ident: $ty:ty = $id:expr, |$out:ident, $v:ident| $write:expr, |$input:ident| $read:expr;)*) => {
        $(
            #[$doc]
            #[derive(Debug, Clone, Copy, Default)]
            pub struct $name;

            impl StreamSerializer for $name {
                type Target = $ty;

                fn type_identifier(&self) -> i32 {
                    $id
                }

                fn write(&self, $out: &mut dyn DataOutput, $v: &$ty) -> Result<()> {
                    $write
                }

                fn read(&self, $input: &mut dyn DataInput) -> Result<$ty> {
                    $read
                }
            }
        )*
    };
}

builtin_serializer! {
    /// Serializer for `i8`.
    ByteSerializer: i8 = CONSTANT_TYPE_BYTE, |out, v| out.write_byte(*v), |input| input.read_byte();
    /// Serializer for `bool`.
    BooleanSerializer: bool = CONSTANT_TYPE_BOOLEAN, |out, v| out.write_bool(*v), |input| input.read_bool();
    /// Serializer for UTF-16 code units.
    CharSerializer: u16 = CONSTANT_TYPE_CHAR, |out, v| out.write_char(*v), |input| input.read_char();
    /// Serializer for `i16`.
    ShortSerializer: i16 = CONSTANT_TYPE_SHORT, |out, v| out.write_short(*v), |input| input.read_short();
    /// Serializer for `i32`.
    IntegerSerializer: i32 = CONSTANT_TYPE_INTEGER, |out, v| out.write_int(*v), |input| input.read_int();
    /// Serializer for `i64`.
    LongSerializer: i64 = CONSTANT_TYPE_LONG, |out, v| out.write_long(*v), |input| input.read_long();
    /// Serializer for `f32`.
    FloatSerializer: f32 = CONSTANT_TYPE_FLOAT, |out, v| out.write_float(*v), |input| input.read_float();
    /// Serializer for `f64`.
    DoubleSerializer: f64 = CONSTANT_TYPE_DOUBLE, |out, v| out.write_double(*v), |input| input.read_double();
    /// Serializer for `String`.
    StringSerializer: String = CONSTANT_TYPE_STRING, |out, v| out.write_utf(v), |input| input.read_utf();
    /// Serializer for `Vec<u16>`.
    CharArraySerializer: Vec<u16> = CONSTANT_TYPE_CHAR_ARRAY, |out, v| out.write_char_array(v), |input| input.read_char_array();
    /// Serializer for `Vec<i16>`.
    ShortArraySerializer: Vec<i16> = CONSTANT_TYPE_SHORT_ARRAY, |out, v| out.write_short_array(v), |input| input.read_short_array();
    /// Serializer for `Vec<i32>`.
    IntegerArraySerializer: Vec<i32> = CONSTANT_TYPE_INTEGER_ARRAY, |out, v| out.write_int_array(v), |input| input.read_int_array();
    /// Serializer for `Vec<i64>`.
    LongArraySerializer: Vec<i64> = CONSTANT_TYPE_LONG_ARRAY, |out, v| out.write_long_array(v), |input| input.read_long_array();
    /// Serializer for `Vec<f32>`.
    FloatArraySerializer: Vec<f32> = CONSTANT_TYPE_FLOAT_ARRAY, |out, v| out.write_float_array(v), |input| input.read_float_array();
    /// Serializer for `Vec<f64>`.
    DoubleArraySerializer: Vec<f64> = CONSTANT_TYPE_DOUBLE_ARRAY, |out, v| out.write_double_array(v), |input| input.read_double_array();
    /// Serializer for `Vec<bool>`.
    BooleanArraySerializer: Vec<bool> = CONSTANT_TYPE_BOOLEAN_ARRAY, |out, v| out.write_bool_array(v), |input| input.read_bool_array();
}

/// Object-safe view of a [`StreamSerializer`] used by the registry.
pub(crate) trait ErasedSerializer: Send + Sync {
    fn target_type(&self) -> TypeId;

    fn target_name(&self) -> &'static str;

    fn write_any(&self, out: &mut dyn DataOutput, value: &dyn Any) -> Result<()>;

    fn read_any(&self, input: &mut dyn DataInput) -> Result<Box<dyn Any + Send>>;
}

impl<S: StreamSerializer> ErasedSerializer for S {
    fn target_type(&self) -> TypeId {
        TypeId::of::<S::Target>()
    }

    fn target_name(&self) -> &'static str {
        std::any::type_name::<S::Target>()
    }

    fn write_any(&self, out: &mut dyn DataOutput, value: &dyn Any) -> Result<()> {
        let value = value.downcast_ref::<S::Target>().ok_or_else(|| {
            GridError::Serialization(format!(
                "serializer for type id {} expects {}",
                self.type_identifier(),
                self.target_name()
            ))
        })?;
        self.write(out, value)
    }

    fn read_any(&self, input: &mut dyn DataInput) -> Result<Box<dyn Any + Send>> {
        Ok(Box::new(self.read(input)?))
    }
}
