//! Byte-exact NIfTI-1 / NIfTI-2 header codec.
//!
//! Parses a raw header buffer into a [`NiftiHeader`], exposes the qform/sform
//! geometry and orientation, lets callers add or remove extension records,
//! and serializes the result back to the same bytes.
//!
//! ```no_run
//! use nifti_codec::nifti;
//!
//! let header = nifti::load_header("scan.nii.gz")?;
//! println!("{header}");
//! println!("orientation: {:?}", header.orientation());
//! # Ok::<(), nifti_codec::Error>(())
//! ```

pub mod error;
pub mod nifti;

pub use error::{Error, Result};
pub use nifti::{DataType, NiftiExtension, NiftiHeader, NiftiVersion, ReadOptions};
