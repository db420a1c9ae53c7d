//! Per-version byte layout of the NIfTI header.
//!
//! NIfTI-1 and NIfTI-2 carry the same fields in a different order and at
//! different widths. Each version is described by one [`Layout`] table and the
//! header codec is written once against it.

use super::bytes::Scalar;

/// NIfTI format version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NiftiVersion {
    /// NIfTI-1 format (348-byte header, 16-bit dimensions)
    #[default]
    Nifti1,
    /// NIfTI-2 format (540-byte header, 64-bit dimensions)
    Nifti2,
}

impl NiftiVersion {
    /// Header size in bytes for this version.
    pub fn header_size(self) -> usize {
        self.layout().header_size
    }

    /// Default vox_offset for this version (header size + extension flag).
    pub fn default_vox_offset(self) -> i64 {
        self.layout().extension_offset() as i64
    }

    /// Field table for this version.
    pub fn layout(self) -> &'static Layout {
        match self {
            Self::Nifti1 => &NIFTI1,
            Self::Nifti2 => &NIFTI2,
        }
    }

    /// True if `data` carries this version's magic at its fixed offset.
    ///
    /// The separate-header magic (`ni1`/`ni2`) is accepted only with
    /// `pair_ok`. Buffers shorter than the header never match.
    pub fn matches_magic(self, data: &[u8], pair_ok: bool) -> bool {
        let layout = self.layout();
        if data.len() < layout.header_size {
            return false;
        }
        let found = &data[layout.magic_offset..layout.magic_offset + MAGIC_ID_LEN];
        found == &layout.magic[..MAGIC_ID_LEN]
            || (pair_ok && found == &layout.pair_magic[..MAGIC_ID_LEN])
    }
}

/// Bytes of the magic string that identify the variant (`n+1`, `ni2`, ...).
const MAGIC_ID_LEN: usize = 3;

/// A scalar (or scalar array) field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// Byte offset of element 0.
    pub offset: usize,
    /// Storage type of each element.
    pub kind: Scalar,
}

impl Field {
    const fn new(offset: usize, kind: Scalar) -> Self {
        Self { offset, kind }
    }

    /// Byte offset of element `index` of an array field.
    pub const fn at(self, index: usize) -> usize {
        self.offset + index * self.kind.size()
    }
}

/// A fixed-width, NUL padded text field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Text {
    /// Byte offset of the first character.
    pub offset: usize,
    /// Field width in bytes.
    pub len: usize,
}

impl Text {
    const fn new(offset: usize, len: usize) -> Self {
        Self { offset, len }
    }

    /// One past the last byte of the field.
    pub const fn end(self) -> usize {
        self.offset + self.len
    }
}

/// Offsets, widths and magic constants of one header version.
#[derive(Debug, PartialEq, Eq)]
pub struct Layout {
    /// Expected `sizeof_hdr` value.
    pub sizeof_hdr: i32,
    /// Size of the fixed header in bytes.
    pub header_size: usize,
    /// Offset of the magic string.
    pub magic_offset: usize,
    /// Magic string of single-file (`.nii`) headers.
    pub magic: &'static [u8],
    /// Magic string of separate-header (`.hdr`/`.img`) headers.
    pub pair_magic: &'static [u8],
    pub dim_info: Field,
    pub dims: Field,
    pub intent_p: Field,
    pub intent_code: Field,
    pub datatype: Field,
    pub bitpix: Field,
    pub slice_start: Field,
    pub pixdim: Field,
    pub vox_offset: Field,
    pub scl_slope: Field,
    pub scl_inter: Field,
    pub slice_end: Field,
    pub slice_code: Field,
    pub xyzt_units: Field,
    pub cal_max: Field,
    pub cal_min: Field,
    pub slice_duration: Field,
    pub toffset: Field,
    pub descrip: Text,
    pub aux_file: Text,
    pub qform_code: Field,
    pub sform_code: Field,
    /// `quatern_b`, `quatern_c`, `quatern_d`.
    pub quatern: Field,
    /// `qoffset_x`, `qoffset_y`, `qoffset_z`.
    pub qoffset: Field,
    /// `srow_x`, `srow_y`, `srow_z`, row-major, 12 elements.
    pub srow: Field,
    pub intent_name: Text,
    /// Byte ranges NIfTI leaves uninterpreted (ANALYZE 7.5 leftovers).
    pub reserved: &'static [Text],
}

impl Layout {
    /// Offset of the first extension record (after the 4-byte flag).
    pub const fn extension_offset(&self) -> usize {
        self.header_size + 4
    }

    /// Total size of the reserved ranges.
    pub fn reserved_len(&self) -> usize {
        self.reserved.iter().map(|t| t.len).sum()
    }
}

/// NIfTI-1 field layout.
pub static NIFTI1: Layout = Layout {
    sizeof_hdr: 348,
    header_size: 348,
    magic_offset: 344,
    magic: b"n+1\0",
    pair_magic: b"ni1\0",
    dim_info: Field::new(39, Scalar::U8),
    dims: Field::new(40, Scalar::I16),
    intent_p: Field::new(56, Scalar::F32),
    intent_code: Field::new(68, Scalar::I16),
    datatype: Field::new(70, Scalar::I16),
    bitpix: Field::new(72, Scalar::I16),
    slice_start: Field::new(74, Scalar::I16),
    pixdim: Field::new(76, Scalar::F32),
    vox_offset: Field::new(108, Scalar::F32),
    scl_slope: Field::new(112, Scalar::F32),
    scl_inter: Field::new(116, Scalar::F32),
    slice_end: Field::new(120, Scalar::I16),
    slice_code: Field::new(122, Scalar::U8),
    xyzt_units: Field::new(123, Scalar::U8),
    cal_max: Field::new(124, Scalar::F32),
    cal_min: Field::new(128, Scalar::F32),
    slice_duration: Field::new(132, Scalar::F32),
    toffset: Field::new(136, Scalar::F32),
    descrip: Text::new(148, 80),
    aux_file: Text::new(228, 24),
    qform_code: Field::new(252, Scalar::I16),
    sform_code: Field::new(254, Scalar::I16),
    quatern: Field::new(256, Scalar::F32),
    qoffset: Field::new(268, Scalar::F32),
    srow: Field::new(280, Scalar::F32),
    intent_name: Text::new(328, 16),
    // data_type, db_name, extents, session_error, regular; glmax, glmin
    reserved: &[Text::new(4, 35), Text::new(140, 8)],
};

/// NIfTI-2 field layout.
pub static NIFTI2: Layout = Layout {
    sizeof_hdr: 540,
    header_size: 540,
    magic_offset: 4,
    magic: b"n+2\0\r\n\x1a\n",
    pair_magic: b"ni2\0\r\n\x1a\n",
    datatype: Field::new(12, Scalar::I16),
    bitpix: Field::new(14, Scalar::I16),
    dims: Field::new(16, Scalar::I64),
    intent_p: Field::new(80, Scalar::F64),
    pixdim: Field::new(104, Scalar::F64),
    vox_offset: Field::new(168, Scalar::I64),
    scl_slope: Field::new(176, Scalar::F64),
    scl_inter: Field::new(184, Scalar::F64),
    cal_max: Field::new(192, Scalar::F64),
    cal_min: Field::new(200, Scalar::F64),
    slice_duration: Field::new(208, Scalar::F64),
    toffset: Field::new(216, Scalar::F64),
    slice_start: Field::new(224, Scalar::I64),
    slice_end: Field::new(232, Scalar::I64),
    descrip: Text::new(240, 80),
    aux_file: Text::new(320, 24),
    qform_code: Field::new(344, Scalar::I32),
    sform_code: Field::new(348, Scalar::I32),
    quatern: Field::new(352, Scalar::F64),
    qoffset: Field::new(376, Scalar::F64),
    srow: Field::new(400, Scalar::F64),
    slice_code: Field::new(496, Scalar::I32),
    xyzt_units: Field::new(500, Scalar::I32),
    intent_code: Field::new(504, Scalar::I32),
    intent_name: Text::new(508, 16),
    dim_info: Field::new(524, Scalar::U8),
    // unused_str
    reserved: &[Text::new(525, 15)],
};
