//! Data output traits and implementations for hazelgrid serialization.

use std::io::Write;

use bytes::{BufMut, Bytes, BytesMut};

use super::utf;
use super::ByteOrder;
use crate::error::{GridError, Result};

/// Trait for writing primitive values in the grid's binary format.
///
/// Multi-byte values are written in the output's [`ByteOrder`]. Arrays are
/// written as a 4-byte signed length followed by the elements with no padding;
/// an absent array is written as an empty slice (length 0).
pub trait DataOutput {
    /// Returns the byte order used for multi-byte values.
    fn byte_order(&self) -> ByteOrder;

    /// Writes raw bytes to the underlying sink.
    fn write_raw(&mut self, bytes: &[u8]) -> Result<()>;

    /// Writes a length-prefixed modified UTF-8 string.
    fn write_utf(&mut self, v: &str) -> Result<()>;

    /// Writes a single byte (i8).
    fn write_byte(&mut self, v: i8) -> Result<()> {
        self.write_raw(&[v as u8])
    }

    /// Writes a boolean as a single byte (0 for false, 1 for true).
    fn write_bool(&mut self, v: bool) -> Result<()> {
        self.write_raw(&[u8::from(v)])
    }

    /// Writes a 16-bit signed integer.
    fn write_short(&mut self, v: i16) -> Result<()> {
        let bytes = self.byte_order().i16_to_bytes(v);
        self.write_raw(&bytes)
    }

    /// Writes a UTF-16 code unit.
    fn write_char(&mut self, v: u16) -> Result<()> {
        let bytes = self.byte_order().u16_to_bytes(v);
        self.write_raw(&bytes)
    }

    /// Writes a 32-bit signed integer.
    fn write_int(&mut self, v: i32) -> Result<()> {
        let bytes = self.byte_order().i32_to_bytes(v);
        self.write_raw(&bytes)
    }

    /// Writes a 64-bit signed integer.
    fn write_long(&mut self, v: i64) -> Result<()> {
        let bytes = self.byte_order().i64_to_bytes(v);
        self.write_raw(&bytes)
    }

    /// Writes a 32-bit float through its IEEE-754 bit pattern.
    fn write_float(&mut self, v: f32) -> Result<()> {
        let bytes = self.byte_order().f32_to_bytes(v);
        self.write_raw(&bytes)
    }

    /// Writes a 64-bit float through its IEEE-754 bit pattern.
    fn write_double(&mut self, v: f64) -> Result<()> {
        let bytes = self.byte_order().f64_to_bytes(v);
        self.write_raw(&bytes)
    }

    /// Writes raw bytes without length prefix.
    fn write_bytes(&mut self, v: &[u8]) -> Result<()> {
        self.write_raw(v)
    }

    /// Writes a length-prefixed byte array.
    fn write_byte_array(&mut self, v: &[u8]) -> Result<()> {
        self.write_int(array_len(v.len())?)?;
        self.write_raw(v)
    }

    /// Writes a length-prefixed boolean array.
    fn write_bool_array(&mut self, v: &[bool]) -> Result<()> {
        self.write_int(array_len(v.len())?)?;
        v.iter().try_for_each(|&b| self.write_bool(b))
    }

    /// Writes a length-prefixed array of UTF-16 code units.
    fn write_char_array(&mut self, v: &[u16]) -> Result<()> {
        self.write_int(array_len(v.len())?)?;
        v.iter().try_for_each(|&c| self.write_char(c))
    }

    /// Writes a length-prefixed array of 16-bit integers.
    fn write_short_array(&mut self, v: &[i16]) -> Result<()> {
        self.write_int(array_len(v.len())?)?;
        v.iter().try_for_each(|&s| self.write_short(s))
    }

    /// Writes a length-prefixed array of 32-bit integers.
    fn write_int_array(&mut self, v: &[i32]) -> Result<()> {
        self.write_int(array_len(v.len())?)?;
        v.iter().try_for_each(|&i| self.write_int(i))
    }

    /// Writes a length-prefixed array of 64-bit integers.
    fn write_long_array(&mut self, v: &[i64]) -> Result<()> {
        self.write_int(array_len(v.len())?)?;
        v.iter().try_for_each(|&l| self.write_long(l))
    }

    /// Writes a length-prefixed array of 32-bit floats.
    fn write_float_array(&mut self, v: &[f32]) -> Result<()> {
        self.write_int(array_len(v.len())?)?;
        v.iter().try_for_each(|&f| self.write_float(f))
    }

    /// Writes a length-prefixed array of 64-bit floats.
    fn write_double_array(&mut self, v: &[f64]) -> Result<()> {
        self.write_int(array_len(v.len())?)?;
        v.iter().try_for_each(|&d| self.write_double(d))
    }
}

fn array_len(len: usize) -> Result<i32> {
    i32::try_from(len).map_err(|_| {
        GridError::Serialization(format!("array of {} elements exceeds the length prefix", len))
    })
}

/// A buffer-based implementation of `DataOutput`.
#[derive(Debug)]
pub struct ObjectDataOutput {
    buffer: BytesMut,
    byte_order: ByteOrder,
    utf_buffer: Option<Vec<u8>>,
}

impl ObjectDataOutput {
    /// Creates a new big-endian `ObjectDataOutput` with default capacity.
    pub fn new() -> Self {
        Self::with_byte_order(ByteOrder::BigEndian)
    }

    /// Creates a new `ObjectDataOutput` writing in the given byte order.
    pub fn with_byte_order(byte_order: ByteOrder) -> Self {
        Self::with_capacity(256, byte_order)
    }

    /// Creates a new `ObjectDataOutput` with the specified capacity and byte order.
    pub fn with_capacity(capacity: usize, byte_order: ByteOrder) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
            byte_order,
            utf_buffer: None,
        }
    }

    /// Returns the written bytes as a slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Consumes the output and returns the written bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer.to_vec()
    }

    /// Consumes the output and returns the written bytes without copying.
    pub fn freeze(self) -> Bytes {
        self.buffer.freeze()
    }

    /// Returns the number of bytes written.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if no bytes have been written.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clears the buffer, keeping its capacity and the text scratch buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for ObjectDataOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl DataOutput for ObjectDataOutput {
    fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.buffer.put_slice(bytes);
        Ok(())
    }

    fn write_utf(&mut self, v: &str) -> Result<()> {
        let buffer = &mut self.buffer;
        utf::write_with_scratch(&mut self.utf_buffer, self.byte_order, v, |bytes| {
            buffer.put_slice(bytes);
            Ok(())
        })
    }
}

/// A streaming implementation of `DataOutput` over any [`Write`] sink.
///
/// Errors from the sink are propagated unchanged as [`GridError::Io`].
#[derive(Debug)]
pub struct ObjectDataOutputStream<W> {
    inner: W,
    byte_order: ByteOrder,
    utf_buffer: Option<Vec<u8>>,
}

impl<W: Write> ObjectDataOutputStream<W> {
    /// Wraps `inner`, writing multi-byte values in `byte_order`.
    pub fn new(inner: W, byte_order: ByteOrder) -> Self {
        Self {
            inner,
            byte_order,
            utf_buffer: None,
        }
    }

    /// Flushes the underlying sink.
    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }

    /// Returns a reference to the underlying sink.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Consumes the stream and returns the underlying sink.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> DataOutput for ObjectDataOutputStream<W> {
    fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes)?;
        Ok(())
    }

    fn write_utf(&mut self, v: &str) -> Result<()> {
        let inner = &mut self.inner;
        utf::write_with_scratch(&mut self.utf_buffer, self.byte_order, v, |bytes| {
            inner.write_all(bytes)?;
            Ok(())
        })
    }
}

/// Output that only counts bytes, used to size an object before streaming it.
#[derive(Debug)]
pub(crate) struct CountingDataOutput {
    count: usize,
    byte_order: ByteOrder,
}

impl CountingDataOutput {
    pub(crate) fn new(byte_order: ByteOrder) -> Self {
        Self {
            count: 0,
            byte_order,
        }
    }

    pub(crate) fn count(&self) -> usize {
        self.count
    }
}

impl DataOutput for CountingDataOutput {
    fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.count += bytes.len();
        Ok(())
    }

    fn write_utf(&mut self, v: &str) -> Result<()> {
        self.count += 4 + utf::encoded_len(v);
        Ok(())
    }
}
