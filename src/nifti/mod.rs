//! `NIfTI` header support.
//!
//! `NIfTI` (Neuroimaging Informatics Technology Initiative) is a standard format
//! for neuroimaging data. This module reads and writes NIfTI-1 and NIfTI-2
//! headers byte-exactly, including the vendor extension chain, and derives the
//! voxel-to-world geometry they describe.

pub mod bytes;
pub mod codes;
pub(crate) mod extension;
pub mod geometry;
pub(crate) mod header;
pub mod io;
pub mod layout;

pub use codes::{DataType, SpatialUnits, TemporalUnits, XForm};
pub use extension::NiftiExtension;
pub use header::NiftiHeader;
pub use io::{
    decompress, has_extension, is_compressed, is_nifti, is_nifti1, is_nifti2, load_header,
    load_header_with, read_extension, read_extension_data, read_header, read_header_with,
    read_image, ReadOptions,
};
pub use layout::NiftiVersion;
