//! NIfTI-1 and NIfTI-2 header parsing and serialization.
//!
//! One [`NiftiHeader`] type covers both versions. Fields are held at the
//! widest width either version uses (64-bit dimensions, f64 floats, 32-bit
//! codes) and narrowed again on write according to the version's [`Layout`].

use super::bytes::{ByteView, ByteViewMut};
use super::codes::{DataType, SpatialUnits, TemporalUnits, XForm};
use super::extension::{self, NiftiExtension};
use super::geometry::{self, Mat44, IDENTITY};
use super::layout::{Field, Layout, NiftiVersion, Text};
use crate::error::{Error, Result};
use std::fmt;

/// Flag value announcing that extension records follow the header.
const EXTENSIONS_PRESENT: [u8; 4] = [1, 0, 0, 0];

/// Parsed NIfTI header.
///
/// The extension list is private: [`NiftiHeader::add_extension`] and
/// [`NiftiHeader::remove_extension`] are the only ways to change it, and both
/// move `vox_offset` by the record's `esize` so that the voxel data offset
/// stays consistent with the serialized extension chain.
#[derive(Debug, Clone, PartialEq)]
pub struct NiftiHeader {
    /// NIfTI format version.
    pub version: NiftiVersion,
    /// Byte order of the header (true = little endian).
    pub little_endian: bool,
    /// MRI slice ordering (frequency, phase and slice dimension bits).
    pub dim_info: u8,
    /// `dims[0]` is the number of dimensions, `dims[1..=7]` their sizes.
    pub dims: [i64; 8],
    /// Intent parameters `intent_p1..=intent_p3`.
    pub intent_p: [f64; 3],
    /// Statistical intent code.
    pub intent_code: i32,
    /// Raw datatype code (see [`DataType`]).
    pub datatype_code: i16,
    /// Bits per voxel (`bitpix`).
    pub num_bits_per_voxel: i16,
    /// First slice index.
    pub slice_start: i64,
    /// `pixdim[0]` is `qfac`, `pixdim[1..=7]` the grid spacings.
    pub pixdim: [f64; 8],
    vox_offset: i64,
    /// Data scaling slope.
    pub scl_slope: f64,
    /// Data scaling intercept.
    pub scl_inter: f64,
    /// Last slice index.
    pub slice_end: i64,
    /// Slice timing order.
    pub slice_code: i32,
    /// Packed spatial and temporal unit codes.
    pub xyzt_units: i32,
    /// Display range maximum.
    pub cal_max: f64,
    /// Display range minimum.
    pub cal_min: f64,
    /// Time to acquire one slice.
    pub slice_duration: f64,
    /// Time axis shift.
    pub toffset: f64,
    /// Free-form description (`descrip`, 80 bytes on disk).
    pub description: String,
    /// Auxiliary file name (24 bytes on disk).
    pub aux_file: String,
    /// qform transform code.
    pub qform_code: i32,
    /// sform transform code.
    pub sform_code: i32,
    /// Quaternion parameters `b`, `c`, `d`. `a` is derived, see [`NiftiHeader::quatern_a`].
    pub quatern: [f64; 3],
    /// qform translation `qoffset_x`, `qoffset_y`, `qoffset_z`.
    pub qoffset: [f64; 3],
    /// Voxel-to-world affine derived at parse time; written to the `srow` fields.
    pub affine: Mat44,
    /// Intent name (16 bytes on disk).
    pub intent_name: String,
    /// Raw magic bytes (`n+1\0`, `ni1\0`, `n+2\0\r\n\x1a\n`, ...).
    pub magic: Vec<u8>,
    extension_flag: [u8; 4],
    extension_size: i32,
    extension_code: i32,
    extensions: Vec<NiftiExtension>,
    /// Uninterpreted ANALYZE 7.5 bytes, concatenated in layout order.
    reserved: Vec<u8>,
}

impl Default for NiftiHeader {
    fn default() -> Self {
        Self::new(NiftiVersion::Nifti1)
    }
}

/// Field-level reads at one byte order.
struct FieldReader<'a> {
    view: ByteView<'a>,
    little_endian: bool,
}

impl FieldReader<'_> {
    fn int(&self, field: Field) -> Result<i64> {
        self.view.read_int(field.offset, field.kind, self.little_endian)
    }

    fn float(&self, field: Field) -> Result<f64> {
        self.view.read_float(field.offset, field.kind, self.little_endian)
    }

    fn ints<const N: usize>(&self, field: Field) -> Result<[i64; N]> {
        let mut out = [0; N];
        for (i, value) in out.iter_mut().enumerate() {
            *value = self.view.read_int(field.at(i), field.kind, self.little_endian)?;
        }
        Ok(out)
    }

    fn floats<const N: usize>(&self, field: Field) -> Result<[f64; N]> {
        let mut out = [0.0; N];
        for (i, value) in out.iter_mut().enumerate() {
            *value = self.view.read_float(field.at(i), field.kind, self.little_endian)?;
        }
        Ok(out)
    }

    fn text(&self, text: Text) -> Result<String> {
        self.view.read_string(text.offset, text.end())
    }
}

/// Field-level writes at one byte order.
struct FieldWriter<'a> {
    view: ByteViewMut<'a>,
    little_endian: bool,
}

impl FieldWriter<'_> {
    fn int(&mut self, field: Field, value: i64) -> Result<()> {
        self.view.write_int(field.offset, field.kind, value, self.little_endian)
    }

    fn float(&mut self, field: Field, value: f64) -> Result<()> {
        self.view
            .write_float(field.offset, field.kind, value, self.little_endian)
    }

    fn ints(&mut self, field: Field, values: &[i64]) -> Result<()> {
        for (i, &value) in values.iter().enumerate() {
            self.view
                .write_int(field.at(i), field.kind, value, self.little_endian)?;
        }
        Ok(())
    }

    fn floats(&mut self, field: Field, values: &[f64]) -> Result<()> {
        for (i, &value) in values.iter().enumerate() {
            self.view
                .write_float(field.at(i), field.kind, value, self.little_endian)?;
        }
        Ok(())
    }

    fn text(&mut self, text: Text, value: &str) -> Result<()> {
        self.view.write_string(text.offset, text.len, value)
    }
}

fn leading_bytes(bytes: &[u8]) -> [u8; 4] {
    let mut lead = [0u8; 4];
    for (dst, src) in lead.iter_mut().zip(bytes) {
        *dst = *src;
    }
    lead
}

/// Resolve the header byte order from `sizeof_hdr`: big endian first, then
/// little endian.
fn detect_byte_order(view: &ByteView<'_>, layout: &Layout) -> Result<Option<bool>> {
    for little_endian in [false, true] {
        if view.read_i32(0, little_endian)? == layout.sizeof_hdr {
            return Ok(Some(little_endian));
        }
    }
    Ok(None)
}

impl NiftiHeader {
    /// Size of NIfTI-1 header in bytes.
    pub const SIZE: usize = 348;

    /// Size of NIfTI-2 header in bytes.
    pub const SIZE_V2: usize = 540;

    /// Empty header of the given version: zero dimensions, unit slope,
    /// identity affine, single-file magic and no extensions.
    pub fn new(version: NiftiVersion) -> Self {
        let layout = version.layout();
        Self {
            version,
            little_endian: true,
            dim_info: 0,
            dims: [0; 8],
            intent_p: [0.0; 3],
            intent_code: 0,
            datatype_code: 0,
            num_bits_per_voxel: 0,
            slice_start: 0,
            pixdim: [0.0; 8],
            vox_offset: version.default_vox_offset(),
            scl_slope: 1.0,
            scl_inter: 0.0,
            slice_end: 0,
            slice_code: 0,
            xyzt_units: 0,
            cal_max: 0.0,
            cal_min: 0.0,
            slice_duration: 0.0,
            toffset: 0.0,
            description: String::new(),
            aux_file: String::new(),
            qform_code: 0,
            sform_code: 0,
            quatern: [0.0; 3],
            qoffset: [0.0; 3],
            affine: IDENTITY,
            intent_name: String::new(),
            magic: layout.magic.to_vec(),
            extension_flag: [0; 4],
            extension_size: 0,
            extension_code: 0,
            extensions: Vec::new(),
            reserved: vec![0; layout.reserved_len()],
        }
    }

    /// Read a header with automatic version and byte order detection.
    ///
    /// The version is taken from `sizeof_hdr` (348 or 540, in either byte
    /// order).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let view = ByteView::new(bytes);
        for version in [NiftiVersion::Nifti1, NiftiVersion::Nifti2] {
            if detect_byte_order(&view, version.layout())?.is_some() {
                return Self::parse(bytes, version);
            }
        }
        Err(Error::NotNiftiHeader(leading_bytes(bytes)))
    }

    /// Parse a header of a known version from `bytes`.
    ///
    /// Bytes past the fixed header are taken as the extension flag and, when
    /// the flag is set, the extension chain up to `vox_offset`.
    pub fn parse(bytes: &[u8], version: NiftiVersion) -> Result<Self> {
        let layout = version.layout();
        let view = ByteView::new(bytes);
        let little_endian = detect_byte_order(&view, layout)?
            .ok_or_else(|| Error::NotNiftiHeader(leading_bytes(bytes)))?;
        log::debug!(
            "parsing {version:?} header ({} endian)",
            if little_endian { "little" } else { "big" }
        );

        let r = FieldReader {
            view,
            little_endian,
        };

        let pixdim = r.floats::<8>(layout.pixdim)?;
        let qform_code = r.int(layout.qform_code)? as i32;
        let sform_code = r.int(layout.sform_code)? as i32;
        let quatern = r.floats::<3>(layout.quatern)?;
        let qoffset = r.floats::<3>(layout.qoffset)?;
        let srow = r.floats::<12>(layout.srow)?;

        let affine = if qform_code > 0 && sform_code < qform_code {
            geometry::quaternion_to_affine(quatern, qoffset, &pixdim)
        } else if sform_code > 0 {
            geometry::sform_to_affine(&[
                [srow[0], srow[1], srow[2], srow[3]],
                [srow[4], srow[5], srow[6], srow[7]],
                [srow[8], srow[9], srow[10], srow[11]],
            ])
        } else {
            IDENTITY
        };

        let mut reserved = Vec::with_capacity(layout.reserved_len());
        for range in layout.reserved {
            reserved.extend_from_slice(view.bytes(range.offset, range.len)?);
        }

        let mut header = Self {
            version,
            little_endian,
            dim_info: r.int(layout.dim_info)? as u8,
            dims: r.ints::<8>(layout.dims)?,
            intent_p: r.floats::<3>(layout.intent_p)?,
            intent_code: r.int(layout.intent_code)? as i32,
            datatype_code: r.int(layout.datatype)? as i16,
            num_bits_per_voxel: r.int(layout.bitpix)? as i16,
            slice_start: r.int(layout.slice_start)?,
            pixdim,
            vox_offset: r.int(layout.vox_offset)?,
            scl_slope: r.float(layout.scl_slope)?,
            scl_inter: r.float(layout.scl_inter)?,
            slice_end: r.int(layout.slice_end)?,
            slice_code: r.int(layout.slice_code)? as i32,
            xyzt_units: r.int(layout.xyzt_units)? as i32,
            cal_max: r.float(layout.cal_max)?,
            cal_min: r.float(layout.cal_min)?,
            slice_duration: r.float(layout.slice_duration)?,
            toffset: r.float(layout.toffset)?,
            description: r.text(layout.descrip)?,
            aux_file: r.text(layout.aux_file)?,
            qform_code,
            sform_code,
            quatern,
            qoffset,
            affine,
            intent_name: r.text(layout.intent_name)?,
            magic: view.bytes(layout.magic_offset, layout.magic.len())?.to_vec(),
            extension_flag: [0; 4],
            extension_size: 0,
            extension_code: 0,
            extensions: Vec::new(),
            reserved,
        };

        if bytes.len() > layout.header_size {
            let flag = view.bytes(layout.header_size, 4)?;
            header.extension_flag.copy_from_slice(flag);
            if flag[0] != 0 {
                header.extensions = extension::parse_chain(
                    &view,
                    layout.extension_offset(),
                    header.vox_offset,
                    little_endian,
                )?;
                log::debug!("found {} extension(s)", header.extensions.len());
                if let Some(first) = header.extensions.first() {
                    header.extension_size = first.esize();
                    header.extension_code = first.ecode();
                }
            }
        }

        Ok(header)
    }

    /// Serialize the header in its own byte order.
    ///
    /// The output is the fixed header, the 4-byte extension flag and, with
    /// `include_extensions`, every extension record in list order. Without
    /// extensions the flag is written as zero.
    pub fn to_bytes(&self, include_extensions: bool) -> Result<Vec<u8>> {
        let layout = self.version.layout();
        let extensions: &[NiftiExtension] = if include_extensions {
            &self.extensions
        } else {
            &[]
        };
        let total = layout.extension_offset()
            + extensions
                .iter()
                .map(|e| e.esize() as usize)
                .sum::<usize>();

        let mut buf = vec![0u8; total];
        let mut w = FieldWriter {
            view: ByteViewMut::new(&mut buf),
            little_endian: self.little_endian,
        };

        w.view.write_i32(0, layout.sizeof_hdr, self.little_endian)?;
        w.int(layout.dim_info, i64::from(self.dim_info))?;
        w.ints(layout.dims, &self.dims)?;
        w.floats(layout.intent_p, &self.intent_p)?;
        w.int(layout.intent_code, i64::from(self.intent_code))?;
        w.int(layout.datatype, i64::from(self.datatype_code))?;
        w.int(layout.bitpix, i64::from(self.num_bits_per_voxel))?;
        w.int(layout.slice_start, self.slice_start)?;
        w.floats(layout.pixdim, &self.pixdim)?;
        w.int(layout.vox_offset, self.vox_offset)?;
        w.float(layout.scl_slope, self.scl_slope)?;
        w.float(layout.scl_inter, self.scl_inter)?;
        w.int(layout.slice_end, self.slice_end)?;
        w.int(layout.slice_code, i64::from(self.slice_code))?;
        w.int(layout.xyzt_units, i64::from(self.xyzt_units))?;
        w.float(layout.cal_max, self.cal_max)?;
        w.float(layout.cal_min, self.cal_min)?;
        w.float(layout.slice_duration, self.slice_duration)?;
        w.float(layout.toffset, self.toffset)?;
        w.text(layout.descrip, &self.description)?;
        w.text(layout.aux_file, &self.aux_file)?;
        w.int(layout.qform_code, i64::from(self.qform_code))?;
        w.int(layout.sform_code, i64::from(self.sform_code))?;
        w.floats(layout.quatern, &self.quatern)?;
        w.floats(layout.qoffset, &self.qoffset)?;
        let srow: Vec<f64> = self.affine[..3].iter().flatten().copied().collect();
        w.floats(layout.srow, &srow)?;
        w.text(layout.intent_name, &self.intent_name)?;

        let magic_len = self.magic.len().min(layout.magic.len());
        w.view
            .write_bytes(layout.magic_offset, &self.magic[..magic_len])?;

        let mut cursor = 0;
        for range in layout.reserved {
            if let Some(saved) = self.reserved.get(cursor..cursor + range.len) {
                w.view.write_bytes(range.offset, saved)?;
            }
            cursor += range.len;
        }

        let flag = match (include_extensions, self.extensions.is_empty()) {
            (false, _) => [0; 4],
            (true, false) => EXTENSIONS_PRESENT,
            (true, true) => self.extension_flag,
        };
        w.view.write_bytes(layout.header_size, &flag)?;
        extension::write_chain(&mut w.view, layout.extension_offset(), extensions)?;

        log::trace!("serialized {:?} header to {} bytes", self.version, total);
        Ok(buf)
    }

    /// Insert an extension at `index` (clamped to the end; `None` appends)
    /// and grow `vox_offset` by its `esize`.
    pub fn add_extension(&mut self, extension: NiftiExtension, index: Option<usize>) {
        let len = self.extensions.len();
        let index = index.map_or(len, |i| i.min(len));
        self.vox_offset += i64::from(extension.esize());
        self.extensions.insert(index, extension);
        self.refresh_extension_fields();
    }

    /// Remove the extension at `index`, shrinking `vox_offset` by its
    /// `esize`. Out-of-range indices leave the header unchanged.
    pub fn remove_extension(&mut self, index: usize) -> Option<NiftiExtension> {
        if index >= self.extensions.len() {
            return None;
        }
        let removed = self.extensions.remove(index);
        self.vox_offset -= i64::from(removed.esize());
        self.refresh_extension_fields();
        Some(removed)
    }

    fn refresh_extension_fields(&mut self) {
        match self.extensions.first() {
            Some(first) => {
                self.extension_flag = EXTENSIONS_PRESENT;
                self.extension_size = first.esize();
                self.extension_code = first.ecode();
            }
            None => {
                self.extension_flag = [0; 4];
                self.extension_size = 0;
                self.extension_code = 0;
            }
        }
    }

    /// Extension records in file order.
    pub fn extensions(&self) -> &[NiftiExtension] {
        &self.extensions
    }

    /// Byte offset of the voxel data.
    pub const fn vox_offset(&self) -> i64 {
        self.vox_offset
    }

    /// The 4 bytes following the fixed header.
    pub const fn extension_flag(&self) -> [u8; 4] {
        self.extension_flag
    }

    /// True if the extension flag announces extension records.
    pub const fn has_extension(&self) -> bool {
        self.extension_flag[0] != 0
    }

    /// `esize` of the first extension, or 0.
    pub const fn extension_size(&self) -> i32 {
        self.extension_size
    }

    /// `ecode` of the first extension, or 0.
    pub const fn extension_code(&self) -> i32 {
        self.extension_code
    }

    /// Size of the fixed header for this header's version.
    pub fn header_size(&self) -> usize {
        self.version.header_size()
    }

    /// Offset of the first extension record.
    pub fn extension_offset(&self) -> usize {
        self.version.layout().extension_offset()
    }

    /// True for separate-header (`.hdr`/`.img`) magic.
    pub fn is_hdr(&self) -> bool {
        let pair = self.version.layout().pair_magic;
        self.magic.get(..3) == pair.get(..3)
    }

    /// Magic bytes as text, NUL and trailing signature bytes dropped.
    pub fn magic_str(&self) -> String {
        self.magic
            .iter()
            .take_while(|&&b| b != 0)
            .map(|&b| char::from(b))
            .collect()
    }

    /// Quaternion parameter `a`, derived from `b`, `c`, `d`.
    pub fn quatern_a(&self) -> f64 {
        let [b, c, d] = self.quatern;
        geometry::quatern_a(b, c, d)
    }

    /// qform affine computed from the current quaternion, offsets and `pixdim`.
    ///
    /// Unlike [`NiftiHeader::affine`], this reflects edits made after parsing.
    pub fn qform_affine(&self) -> Mat44 {
        geometry::quaternion_to_affine(self.quatern, self.qoffset, &self.pixdim)
    }

    /// Orientation code of the stored affine, e.g. `"XYZ+++"`.
    pub fn orientation(&self) -> Option<String> {
        geometry::orientation_code(&geometry::rotation_part(&self.affine))
    }

    /// Decoded datatype, if the code is a known one.
    pub fn datatype(&self) -> Option<DataType> {
        DataType::from_code(self.datatype_code)
    }

    /// Spatial unit bits of `xyzt_units`.
    pub fn spatial_units(&self) -> SpatialUnits {
        SpatialUnits::from_code(self.xyzt_units)
    }

    /// Temporal unit bits of `xyzt_units`.
    pub fn temporal_units(&self) -> TemporalUnits {
        TemporalUnits::from_code(self.xyzt_units)
    }

    /// Image shape: `dims[1..=dims[0]]`.
    pub fn shape(&self) -> Vec<usize> {
        let ndim = self.dims[0].clamp(0, 7) as usize;
        self.dims[1..=ndim].iter().map(|&d| d.max(0) as usize).collect()
    }
}

/// Round to 7 significant digits, printed in shortest form.
fn sig7(value: f64) -> f64 {
    format!("{value:.6e}").parse().unwrap_or(value)
}

fn join<I>(values: I) -> String
where
    I: IntoIterator,
    I::Item: ToString,
{
    values
        .into_iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for NiftiHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let datatype = self.datatype().map_or("Unknown", DataType::description);

        writeln!(f, "Dim Info = {}", self.dim_info)?;
        writeln!(f, "Image Dimensions (1-8): {}", join(&self.dims))?;
        writeln!(f, "Intent Parameters (1-3): {}", join(&self.intent_p))?;
        writeln!(f, "Intent Code = {}", self.intent_code)?;
        writeln!(f, "Datatype = {} ({datatype})", self.datatype_code)?;
        writeln!(f, "Bits Per Voxel = {}", self.num_bits_per_voxel)?;
        writeln!(f, "Slice Start = {}", self.slice_start)?;
        writeln!(
            f,
            "Voxel Dimensions (1-8): {}",
            join(self.pixdim.iter().map(|&p| sig7(p)))
        )?;
        writeln!(f, "Image Offset = {}", self.vox_offset)?;
        writeln!(
            f,
            "Data Scale:  Slope = {}  Intercept = {}",
            sig7(self.scl_slope),
            sig7(self.scl_inter)
        )?;
        writeln!(f, "Slice End = {}", self.slice_end)?;
        writeln!(f, "Slice Code = {}", self.slice_code)?;
        writeln!(
            f,
            "Units Code = {} ({}, {})",
            self.xyzt_units,
            self.spatial_units().name(),
            self.temporal_units().name()
        )?;
        writeln!(
            f,
            "Display Range:  Max = {}  Min = {}",
            sig7(self.cal_max),
            sig7(self.cal_min)
        )?;
        writeln!(f, "Slice Duration = {}", self.slice_duration)?;
        writeln!(f, "Time Axis Shift = {}", self.toffset)?;
        writeln!(f, "Description: \"{}\"", self.description)?;
        writeln!(f, "Auxiliary File: \"{}\"", self.aux_file)?;
        writeln!(
            f,
            "Q-Form Code = {} ({})",
            self.qform_code,
            XForm::from_code(self.qform_code).name()
        )?;
        writeln!(
            f,
            "S-Form Code = {} ({})",
            self.sform_code,
            XForm::from_code(self.sform_code).name()
        )?;
        let [b, c, d] = self.quatern;
        writeln!(
            f,
            "Quaternion Parameters:  b = {}  c = {}  d = {}",
            sig7(b),
            sig7(c),
            sig7(d)
        )?;
        let [x, y, z] = self.qoffset;
        writeln!(f, "Quaternion Offsets:  x = {x}  y = {y}  z = {z}")?;
        for (axis, row) in ["X", "Y", "Z"].iter().zip(&self.affine) {
            writeln!(
                f,
                "S-Form Parameters {axis}: {}",
                join(row.iter().map(|&v| sig7(v)))
            )?;
        }
        writeln!(f, "Intent Name: \"{}\"", self.intent_name)?;
        if self.has_extension() {
            writeln!(
                f,
                "Extension: Size = {}  Code = {}",
                self.extension_size, self.extension_code
            )?;
        }
        Ok(())
    }
}
