//! Bounds-checked scalar access into raw header buffers.
//!
//! Every accessor takes the byte order per call rather than per buffer: the
//! extension records trailing a header may be encoded in a different byte
//! order than the header itself.

use crate::error::{Error, Result};
use byteorder::{BigEndian, ByteOrder, LittleEndian};

/// Storage type of a single header field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scalar {
    /// Unsigned byte.
    U8,
    /// Signed 16-bit integer.
    I16,
    /// Signed 32-bit integer.
    I32,
    /// Signed 64-bit integer.
    I64,
    /// IEEE 754 single precision.
    F32,
    /// IEEE 754 double precision.
    F64,
}

impl Scalar {
    /// Width of the scalar in bytes.
    pub const fn size(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::I16 => 2,
            Self::I32 | Self::F32 => 4,
            Self::I64 | Self::F64 => 8,
        }
    }
}

macro_rules! read_scalar {
    ($name:ident, $ty:ty, $len:expr, $read:ident) => {
        #[doc = concat!("Read a `", stringify!($ty), "` at `offset`.")]
        pub fn $name(&self, offset: usize, little_endian: bool) -> Result<$ty> {
            let b = self.bytes(offset, $len)?;
            Ok(if little_endian {
                LittleEndian::$read(b)
            } else {
                BigEndian::$read(b)
            })
        }
    };
}

macro_rules! write_scalar {
    ($name:ident, $ty:ty, $len:expr, $write:ident) => {
        #[doc = concat!("Write a `", stringify!($ty), "` at `offset`.")]
        pub fn $name(&mut self, offset: usize, value: $ty, little_endian: bool) -> Result<()> {
            let b = self.bytes_mut(offset, $len)?;
            if little_endian {
                LittleEndian::$write(b, value);
            } else {
                BigEndian::$write(b, value);
            }
            Ok(())
        }
    };
}

fn out_of_bounds(offset: usize, len: usize, size: usize) -> Error {
    Error::OutOfBounds { offset, len, size }
}

/// Read-only view over a byte buffer.
#[derive(Debug, Clone, Copy)]
pub struct ByteView<'a> {
    buf: &'a [u8],
}

impl<'a> ByteView<'a> {
    /// Wrap a buffer.
    pub const fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    /// Buffer length in bytes.
    pub const fn len(&self) -> usize {
        self.buf.len()
    }

    /// True if the buffer is empty.
    pub const fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Borrow `len` bytes starting at `offset`.
    pub fn bytes(&self, offset: usize, len: usize) -> Result<&'a [u8]> {
        offset
            .checked_add(len)
            .and_then(|end| self.buf.get(offset..end))
            .ok_or_else(|| out_of_bounds(offset, len, self.buf.len()))
    }

    /// Read an unsigned byte.
    pub fn read_u8(&self, offset: usize) -> Result<u8> {
        Ok(self.bytes(offset, 1)?[0])
    }

    /// Read a signed byte.
    pub fn read_i8(&self, offset: usize) -> Result<i8> {
        Ok(self.read_u8(offset)? as i8)
    }

    read_scalar!(read_i16, i16, 2, read_i16);
    read_scalar!(read_i32, i32, 4, read_i32);
    read_scalar!(read_i64, i64, 8, read_i64);
    read_scalar!(read_f32, f32, 4, read_f32);
    read_scalar!(read_f64, f64, 8, read_f64);

    /// Read eight bytes as a `u64`, least significant byte first, ignoring
    /// the header byte order.
    ///
    /// Kept for compatibility with readers that assemble 64-bit values this
    /// way; header decoding itself uses [`ByteView::read_i64`].
    pub fn read_u64_raw(&self, offset: usize) -> Result<u64> {
        let b = self.bytes(offset, 8)?;
        Ok(b.iter().rev().fold(0u64, |acc, &byte| (acc << 8) | u64::from(byte)))
    }

    /// Read `[start, end)` as text, dropping every NUL byte in the range.
    ///
    /// Bytes map one-to-one onto the code points `U+0000..=U+00FF`.
    pub fn read_string(&self, start: usize, end: usize) -> Result<String> {
        let len = end.saturating_sub(start);
        Ok(self
            .bytes(start, len)?
            .iter()
            .filter(|&&b| b != 0)
            .map(|&b| char::from(b))
            .collect())
    }

    /// Read an integer field of the given storage type, widened to `i64`.
    pub fn read_int(&self, offset: usize, kind: Scalar, little_endian: bool) -> Result<i64> {
        Ok(match kind {
            Scalar::U8 => i64::from(self.read_u8(offset)?),
            Scalar::I16 => i64::from(self.read_i16(offset, little_endian)?),
            Scalar::I32 => i64::from(self.read_i32(offset, little_endian)?),
            Scalar::I64 => self.read_i64(offset, little_endian)?,
            Scalar::F32 => self.read_f32(offset, little_endian)? as i64,
            Scalar::F64 => self.read_f64(offset, little_endian)? as i64,
        })
    }

    /// Read a floating point field of the given storage type, widened to `f64`.
    pub fn read_float(&self, offset: usize, kind: Scalar, little_endian: bool) -> Result<f64> {
        Ok(match kind {
            Scalar::F32 => f64::from(self.read_f32(offset, little_endian)?),
            Scalar::F64 => self.read_f64(offset, little_endian)?,
            _ => self.read_int(offset, kind, little_endian)? as f64,
        })
    }
}

/// Mutable view over a byte buffer.
#[derive(Debug)]
pub struct ByteViewMut<'a> {
    buf: &'a mut [u8],
}

impl<'a> ByteViewMut<'a> {
    /// Wrap a buffer.
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf }
    }

    /// Buffer length in bytes.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Mutably borrow `len` bytes starting at `offset`.
    pub fn bytes_mut(&mut self, offset: usize, len: usize) -> Result<&mut [u8]> {
        let size = self.buf.len();
        offset
            .checked_add(len)
            .and_then(|end| self.buf.get_mut(offset..end))
            .ok_or_else(|| out_of_bounds(offset, len, size))
    }

    /// Copy `src` into the buffer at `offset`.
    pub fn write_bytes(&mut self, offset: usize, src: &[u8]) -> Result<()> {
        self.bytes_mut(offset, src.len())?.copy_from_slice(src);
        Ok(())
    }

    /// Write an unsigned byte.
    pub fn write_u8(&mut self, offset: usize, value: u8) -> Result<()> {
        self.bytes_mut(offset, 1)?[0] = value;
        Ok(())
    }

    /// Write a signed byte.
    pub fn write_i8(&mut self, offset: usize, value: i8) -> Result<()> {
        self.write_u8(offset, value as u8)
    }

    write_scalar!(write_i16, i16, 2, write_i16);
    write_scalar!(write_i32, i32, 4, write_i32);
    write_scalar!(write_i64, i64, 8, write_i64);
    write_scalar!(write_f32, f32, 4, write_f32);
    write_scalar!(write_f64, f64, 8, write_f64);

    /// Write text into a fixed-width field of `width` bytes, NUL padded.
    ///
    /// Characters above `U+00FF` are stored as `?`; text longer than the
    /// field is truncated.
    pub fn write_string(&mut self, offset: usize, width: usize, text: &str) -> Result<()> {
        let field = self.bytes_mut(offset, width)?;
        field.fill(0);
        for (slot, ch) in field.iter_mut().zip(text.chars()) {
            *slot = u8::try_from(u32::from(ch)).unwrap_or(b'?');
        }
        Ok(())
    }

    /// Write an integer into a field of the given storage type (narrowing).
    pub fn write_int(
        &mut self,
        offset: usize,
        kind: Scalar,
        value: i64,
        little_endian: bool,
    ) -> Result<()> {
        match kind {
            Scalar::U8 => self.write_u8(offset, value as u8),
            Scalar::I16 => self.write_i16(offset, value as i16, little_endian),
            Scalar::I32 => self.write_i32(offset, value as i32, little_endian),
            Scalar::I64 => self.write_i64(offset, value, little_endian),
            Scalar::F32 => self.write_f32(offset, value as f32, little_endian),
            Scalar::F64 => self.write_f64(offset, value as f64, little_endian),
        }
    }

    /// Write a float into a field of the given storage type (narrowing).
    pub fn write_float(
        &mut self,
        offset: usize,
        kind: Scalar,
        value: f64,
        little_endian: bool,
    ) -> Result<()> {
        match kind {
            Scalar::F32 => self.write_f32(offset, value as f32, little_endian),
            Scalar::F64 => self.write_f64(offset, value, little_endian),
            _ => self.write_int(offset, kind, value as i64, little_endian),
        }
    }
}
