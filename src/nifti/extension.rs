//! Vendor extension records that follow the fixed header.
//!
//! Each record is `[esize: i32][ecode: i32][edata: esize - 8 bytes]`, with
//! `esize` a positive multiple of 16. Records are chained up to `vox_offset`.
//! A record's byte order is not necessarily the header's: writers have been
//! seen emitting native-order extensions inside foreign-order headers, so the
//! order is recovered per record.

use super::bytes::{ByteView, ByteViewMut};
use crate::error::{Error, Result};
use byteorder::{BigEndian, ByteOrder, LittleEndian};

/// Size of the `esize` + `ecode` prefix.
pub const EXTENSION_PREFIX_SIZE: usize = 8;

/// One extension record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NiftiExtension {
    esize: i32,
    ecode: i32,
    edata: Vec<u8>,
    little_endian: bool,
}

impl NiftiExtension {
    /// Create an extension record.
    ///
    /// `esize` counts the 8-byte prefix and must be a positive multiple of
    /// 16. A payload shorter than `esize - 8` is zero padded; a longer one is
    /// rejected.
    pub fn new(
        esize: i32,
        ecode: i32,
        edata: impl Into<Vec<u8>>,
        little_endian: bool,
    ) -> Result<Self> {
        if esize <= 0 || esize % 16 != 0 {
            return Err(Error::InvalidExtension(format!(
                "esize {esize} is not a positive multiple of 16"
            )));
        }
        let capacity = esize as usize - EXTENSION_PREFIX_SIZE;
        let mut edata = edata.into();
        if edata.len() > capacity {
            return Err(Error::InvalidExtension(format!(
                "payload of {} bytes does not fit esize {esize}",
                edata.len()
            )));
        }
        edata.resize(capacity, 0);

        Ok(Self {
            esize,
            ecode,
            edata,
            little_endian,
        })
    }

    /// Total record size in bytes, prefix included.
    pub const fn esize(&self) -> i32 {
        self.esize
    }

    /// Developer group code.
    pub const fn ecode(&self) -> i32 {
        self.ecode
    }

    /// Payload bytes (`esize - 8` of them).
    pub fn edata(&self) -> &[u8] {
        &self.edata
    }

    /// Byte order of this record's size/code prefix.
    pub const fn is_little_endian(&self) -> bool {
        self.little_endian
    }

    /// Encode the record, prefix included.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0u8; self.esize as usize];
        if self.little_endian {
            LittleEndian::write_i32(&mut buf[0..4], self.esize);
            LittleEndian::write_i32(&mut buf[4..8], self.ecode);
        } else {
            BigEndian::write_i32(&mut buf[0..4], self.esize);
            BigEndian::write_i32(&mut buf[4..8], self.ecode);
        }
        buf[EXTENSION_PREFIX_SIZE..].copy_from_slice(&self.edata);
        buf
    }
}

/// Parse the extension chain starting at `start`, stopping at `vox_offset`
/// or at a record with `esize == 0`.
pub(crate) fn parse_chain(
    view: &ByteView<'_>,
    start: usize,
    vox_offset: i64,
    little_endian: bool,
) -> Result<Vec<NiftiExtension>> {
    let mut extensions = Vec::new();
    let mut offset = start;

    while (offset as i64) < vox_offset {
        if offset >= view.len() {
            // Header-only buffer: the chain continues past what was read.
            log::debug!("extension chain truncated at offset {offset} (vox_offset {vox_offset})");
            break;
        }
        let mut record_le = little_endian;
        let mut esize = view.read_i32(offset, record_le)?;
        if esize == 0 {
            break;
        }

        let overflows = |esize: i32| esize < 0 || offset as i64 + i64::from(esize) > vox_offset;
        if overflows(esize) {
            record_le = !record_le;
            esize = view.read_i32(offset, record_le)?;
            if esize == 0 || overflows(esize) {
                return Err(Error::InvalidExtension(format!(
                    "record at offset {offset} runs past vox_offset {vox_offset} in either byte order"
                )));
            }
            log::debug!(
                "extension at offset {offset} uses {} byte order",
                if record_le { "little" } else { "big" }
            );
        }

        if esize % 16 != 0 {
            return Err(Error::InvalidExtension(format!(
                "record at offset {offset} has esize {esize}, not a multiple of 16"
            )));
        }

        let ecode = view.read_i32(offset + 4, record_le)?;
        let len = esize as usize;
        let edata = view.bytes(offset + EXTENSION_PREFIX_SIZE, len - EXTENSION_PREFIX_SIZE)?;
        log::trace!("extension at offset {offset}: esize {esize}, ecode {ecode}");

        extensions.push(NiftiExtension::new(esize, ecode, edata, record_le)?);
        offset += len;
    }

    Ok(extensions)
}

/// Write `extensions` back to back starting at `start`, each in its own byte
/// order. Returns the offset one past the last record.
pub(crate) fn write_chain(
    view: &mut ByteViewMut<'_>,
    start: usize,
    extensions: &[NiftiExtension],
) -> Result<usize> {
    let mut cursor = start;
    for ext in extensions {
        view.write_i32(cursor, ext.esize, ext.little_endian)?;
        view.write_i32(cursor + 4, ext.ecode, ext.little_endian)?;
        view.write_bytes(cursor + EXTENSION_PREFIX_SIZE, &ext.edata)?;
        cursor += ext.esize as usize;
    }
    Ok(cursor)
}
