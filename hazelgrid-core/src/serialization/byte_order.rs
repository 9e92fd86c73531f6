//! Byte order policy for multi-byte primitives.

use std::fmt;
use std::str::FromStr;

use crate::error::GridError;

/// Order in which the bytes of multi-byte primitives are written.
///
/// The order is a property of a [`SerializationService`](super::SerializationService)
/// and of every stream it creates; the host platform's own order never leaks
/// into the encoded bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ByteOrder {
    /// Most significant byte first (network order).
    #[default]
    BigEndian,
    /// Least significant byte first.
    LittleEndian,
}

impl ByteOrder {
    /// Returns the byte order of the host platform.
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            Self::BigEndian
        } else {
            Self::LittleEndian
        }
    }

    /// Returns `true` if this order matches the host platform.
    #[inline]
    pub fn is_native(self) -> bool {
        self == Self::native()
    }
}

// Values are laid out natively when the configured order is the host order,
// otherwise they are byte-swapped before/after the native conversion.
macro_rules! integer_conversions {
    ($($ty:ty => $to:ident, $from:ident, $n:literal;)*) => {
        impl ByteOrder {
            $(
                #[doc = concat!("Encodes an `", stringify!($ty), "` in this byte order.")]
                #[inline]
                pub fn $to(self, v: $ty) -> [u8; $n] {
                    if self.is_native() {
                        v.to_ne_bytes()
                    } else {
                        v.swap_bytes().to_ne_bytes()
                    }
                }

                #[doc = concat!("Decodes an `", stringify!($ty), "` written in this byte order.")]
                #[inline]
                pub fn $from(self, bytes: [u8; $n]) -> $ty {
                    let v = <$ty>::from_ne_bytes(bytes);
                    if self.is_native() {
                        v
                    } else {
                        v.swap_bytes()
                    }
                }
            )*
        }
    };
}

integer_conversions! {
    i16 => i16_to_bytes, i16_from_bytes, 2;
    u16 => u16_to_bytes, u16_from_bytes, 2;
    i32 => i32_to_bytes, i32_from_bytes, 4;
    i64 => i64_to_bytes, i64_from_bytes, 8;
}

impl ByteOrder {
    /// Encodes an `f32` through its IEEE-754 bit pattern.
    #[inline]
    pub fn f32_to_bytes(self, v: f32) -> [u8; 4] {
        self.i32_to_bytes(v.to_bits() as i32)
    }

    /// Decodes an `f32` from its IEEE-754 bit pattern.
    #[inline]
    pub fn f32_from_bytes(self, bytes: [u8; 4]) -> f32 {
        f32::from_bits(self.i32_from_bytes(bytes) as u32)
    }

    /// Encodes an `f64` through its IEEE-754 bit pattern.
    #[inline]
    pub fn f64_to_bytes(self, v: f64) -> [u8; 8] {
        self.i64_to_bytes(v.to_bits() as i64)
    }

    /// Decodes an `f64` from its IEEE-754 bit pattern.
    #[inline]
    pub fn f64_from_bytes(self, bytes: [u8; 8]) -> f64 {
        f64::from_bits(self.i64_from_bytes(bytes) as u64)
    }
}

impl fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BigEndian => f.write_str("BIG_ENDIAN"),
            Self::LittleEndian => f.write_str("LITTLE_ENDIAN"),
        }
    }
}

impl FromStr for ByteOrder {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "big" | "big_endian" | "big-endian" => Ok(Self::BigEndian),
            "little" | "little_endian" | "little-endian" => Ok(Self::LittleEndian),
            "native" => Ok(Self::native()),
            other => Err(GridError::Configuration(format!(
                "unknown byte order: {}",
                other
            ))),
        }
    }
}
