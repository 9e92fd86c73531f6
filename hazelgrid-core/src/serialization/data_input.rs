//! Data input traits and implementations for hazelgrid serialization.

use std::io::{Cursor, Read};

use bytes::Buf;

use super::utf;
use super::ByteOrder;
use crate::error::{GridError, Result};

/// Trait for reading primitive values from the grid's binary format.
///
/// Multi-byte values are read in the input's [`ByteOrder`]. Every reader is the
/// exact inverse of the matching [`DataOutput`](super::DataOutput) writer.
pub trait DataInput {
    /// Returns the byte order used for multi-byte values.
    fn byte_order(&self) -> ByteOrder;

    /// Fills `buf` completely from the underlying source.
    fn read_fully(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Returns the number of unread bytes if the source knows it.
    ///
    /// Length-prefixed readers use this to reject impossible lengths before
    /// allocating.
    fn remaining_hint(&self) -> Option<usize> {
        None
    }

    /// Reads a single byte (i8).
    fn read_byte(&mut self) -> Result<i8> {
        let mut b = [0u8; 1];
        self.read_fully(&mut b)?;
        Ok(b[0] as i8)
    }

    /// Reads a boolean from a single byte; any non-zero value is `true`.
    fn read_bool(&mut self) -> Result<bool> {
        let mut b = [0u8; 1];
        self.read_fully(&mut b)?;
        Ok(b[0] != 0)
    }

    /// Reads a 16-bit signed integer.
    fn read_short(&mut self) -> Result<i16> {
        let mut b = [0u8; 2];
        self.read_fully(&mut b)?;
        Ok(self.byte_order().i16_from_bytes(b))
    }

    /// Reads a UTF-16 code unit.
    fn read_char(&mut self) -> Result<u16> {
        let mut b = [0u8; 2];
        self.read_fully(&mut b)?;
        Ok(self.byte_order().u16_from_bytes(b))
    }

    /// Reads a 32-bit signed integer.
    fn read_int(&mut self) -> Result<i32> {
        let mut b = [0u8; 4];
        self.read_fully(&mut b)?;
        Ok(self.byte_order().i32_from_bytes(b))
    }

    /// Reads a 64-bit signed integer.
    fn read_long(&mut self) -> Result<i64> {
        let mut b = [0u8; 8];
        self.read_fully(&mut b)?;
        Ok(self.byte_order().i64_from_bytes(b))
    }

    /// Reads a 32-bit float from its IEEE-754 bit pattern.
    fn read_float(&mut self) -> Result<f32> {
        let mut b = [0u8; 4];
        self.read_fully(&mut b)?;
        Ok(self.byte_order().f32_from_bytes(b))
    }

    /// Reads a 64-bit float from its IEEE-754 bit pattern.
    fn read_double(&mut self) -> Result<f64> {
        let mut b = [0u8; 8];
        self.read_fully(&mut b)?;
        Ok(self.byte_order().f64_from_bytes(b))
    }

    /// Reads the specified number of raw bytes.
    fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        check_fits(self.remaining_hint(), len)?;
        let mut buf = vec![0u8; len];
        self.read_fully(&mut buf)?;
        Ok(buf)
    }

    /// Reads a length-prefixed modified UTF-8 string.
    fn read_utf(&mut self) -> Result<String> {
        let len = read_length(self, 1)?;
        let bytes = self.read_bytes(len)?;
        utf::decode(&bytes)
    }

    /// Reads a length-prefixed byte array.
    fn read_byte_array(&mut self) -> Result<Vec<u8>> {
        let len = read_length(self, 1)?;
        self.read_bytes(len)
    }

    /// Reads a length-prefixed boolean array.
    fn read_bool_array(&mut self) -> Result<Vec<bool>> {
        let len = read_length(self, 1)?;
        (0..len).map(|_| self.read_bool()).collect()
    }

    /// Reads a length-prefixed array of UTF-16 code units.
    fn read_char_array(&mut self) -> Result<Vec<u16>> {
        let len = read_length(self, 2)?;
        (0..len).map(|_| self.read_char()).collect()
    }

    /// Reads a length-prefixed array of 16-bit integers.
    fn read_short_array(&mut self) -> Result<Vec<i16>> {
        let len = read_length(self, 2)?;
        (0..len).map(|_| self.read_short()).collect()
    }

    /// Reads a length-prefixed array of 32-bit integers.
    fn read_int_array(&mut self) -> Result<Vec<i32>> {
        let len = read_length(self, 4)?;
        (0..len).map(|_| self.read_int()).collect()
    }

    /// Reads a length-prefixed array of 64-bit integers.
    fn read_long_array(&mut self) -> Result<Vec<i64>> {
        let len = read_length(self, 8)?;
        (0..len).map(|_| self.read_long()).collect()
    }

    /// Reads a length-prefixed array of 32-bit floats.
    fn read_float_array(&mut self) -> Result<Vec<f32>> {
        let len = read_length(self, 4)?;
        (0..len).map(|_| self.read_float()).collect()
    }

    /// Reads a length-prefixed array of 64-bit floats.
    fn read_double_array(&mut self) -> Result<Vec<f64>> {
        let len = read_length(self, 8)?;
        (0..len).map(|_| self.read_double()).collect()
    }
}

/// Reads a 4-byte length prefix for `element_size`-byte elements.
fn read_length<I: DataInput + ?Sized>(input: &mut I, element_size: usize) -> Result<usize> {
    let len = input.read_int()?;
    if len < 0 {
        return Err(GridError::CorruptPayload(format!(
            "negative length prefix: {}",
            len
        )));
    }
    let len = len as usize;
    check_fits(input.remaining_hint(), len.saturating_mul(element_size))?;
    Ok(len)
}

fn check_fits(remaining: Option<usize>, needed: usize) -> Result<()> {
    match remaining {
        Some(have) if have < needed => Err(GridError::CorruptPayload(format!(
            "insufficient data: need {} bytes, have {}",
            needed, have
        ))),
        _ => Ok(()),
    }
}

/// A buffer-based implementation of `DataInput`.
#[derive(Debug)]
pub struct ObjectDataInput<'a> {
    cursor: Cursor<&'a [u8]>,
    byte_order: ByteOrder,
}

impl<'a> ObjectDataInput<'a> {
    /// Creates a new big-endian `ObjectDataInput` from the given byte slice.
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_byte_order(data, ByteOrder::BigEndian)
    }

    /// Creates a new `ObjectDataInput` reading in the given byte order.
    pub fn with_byte_order(data: &'a [u8], byte_order: ByteOrder) -> Self {
        Self {
            cursor: Cursor::new(data),
            byte_order,
        }
    }

    /// Returns the number of bytes remaining to be read.
    pub fn remaining(&self) -> usize {
        self.cursor.remaining()
    }

    /// Returns the current position in the buffer.
    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    /// Consumes and returns every unread byte.
    pub fn read_remaining(&mut self) -> &'a [u8] {
        let data: &'a [u8] = *self.cursor.get_ref();
        let start = (self.cursor.position() as usize).min(data.len());
        self.cursor.set_position(data.len() as u64);
        &data[start..]
    }

    fn ensure_remaining(&self, n: usize) -> Result<()> {
        check_fits(Some(self.cursor.remaining()), n)
    }
}

impl DataInput for ObjectDataInput<'_> {
    fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    fn read_fully(&mut self, buf: &mut [u8]) -> Result<()> {
        self.ensure_remaining(buf.len())?;
        self.cursor.copy_to_slice(buf);
        Ok(())
    }

    fn remaining_hint(&self) -> Option<usize> {
        Some(self.cursor.remaining())
    }
}

/// A streaming implementation of `DataInput` over any [`Read`] source.
///
/// A source that ends early surfaces as [`GridError::Io`] with
/// `UnexpectedEof`.
#[derive(Debug)]
pub struct ObjectDataInputStream<R> {
    inner: R,
    byte_order: ByteOrder,
}

impl<R: Read> ObjectDataInputStream<R> {
    /// Wraps `inner`, reading multi-byte values in `byte_order`.
    pub fn new(inner: R, byte_order: ByteOrder) -> Self {
        Self { inner, byte_order }
    }

    /// Consumes the stream and returns the underlying source.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> DataInput for ObjectDataInputStream<R> {
    fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    fn read_fully(&mut self, buf: &mut [u8]) -> Result<()> {
        self.inner.read_exact(buf)?;
        Ok(())
    }

    fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        // Length is untrusted here, so grow with the data instead of preallocating.
        let mut buf = Vec::new();
        (&mut self.inner).take(len as u64).read_to_end(&mut buf)?;
        if buf.len() < len {
            return Err(GridError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("expected {} bytes, source ended after {}", len, buf.len()),
            )));
        }
        Ok(buf)
    }
}
