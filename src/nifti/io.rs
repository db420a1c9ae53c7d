//! Format sniffing, gzip handling and byte-range helpers around the header codec.

use super::bytes::ByteView;
use super::extension::EXTENSION_PREFIX_SIZE;
use super::header::NiftiHeader;
use super::layout::NiftiVersion;
use crate::error::{Error, Result};
use flate2::bufread::MultiGzDecoder;
use std::borrow::Cow;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

const GZIP_BUFFER_SIZE: usize = 256 * 1024; // 256KB buffer for streaming decompression

/// Options for [`read_header_with`] and [`load_header_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOptions {
    /// Accept separate-header magic (`ni1`/`ni2`).
    pub allow_pair: bool,
    /// Inflate gzip input before parsing.
    pub decompress: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            allow_pair: false,
            decompress: true,
        }
    }
}

impl ReadOptions {
    /// Default options for a file path: `.hdr` (optionally gzipped) files
    /// accept the separate-header magic.
    pub fn for_path<P: AsRef<Path>>(path: P) -> Self {
        Self::default().allow_pair(is_hdr_path(path.as_ref()))
    }

    /// Accept or reject separate-header magic.
    pub fn allow_pair(mut self, allow: bool) -> Self {
        self.allow_pair = allow;
        self
    }

    /// Enable or disable gzip inflation.
    pub fn decompress(mut self, enabled: bool) -> Self {
        self.decompress = enabled;
        self
    }
}

fn is_hdr_path(path: &Path) -> bool {
    let stem = if path.extension().is_some_and(|e| e.eq_ignore_ascii_case("gz")) {
        path.file_stem().map(Path::new)
    } else {
        Some(path)
    };
    stem.and_then(Path::extension)
        .is_some_and(|e| e.eq_ignore_ascii_case("hdr"))
}

/// True if `data` starts with the gzip magic bytes.
pub fn is_compressed(data: &[u8]) -> bool {
    data.starts_with(&GZIP_MAGIC)
}

fn estimate_gzip_uncompressed_size(compressed: &[u8]) -> usize {
    // ISIZE per RFC 1952: "original input size modulo 2^32"
    // This is only reliable for single-member gzip < 4GB.
    if compressed.len() >= 4 {
        let trailer = &compressed[compressed.len() - 4..];
        u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]) as usize
    } else {
        compressed.len() * 4
    }
}

/// Inflate a (possibly multi-member) gzip stream.
pub fn decompress(compressed: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = MultiGzDecoder::new(BufReader::with_capacity(GZIP_BUFFER_SIZE, compressed));

    let estimated = estimate_gzip_uncompressed_size(compressed);
    let mut output = Vec::with_capacity(estimated);

    decoder
        .read_to_end(&mut output)
        .map_err(|e| Error::Decompression(format!("gzip stream decode failed: {e}")))?;
    log::debug!(
        "inflated {} gzip bytes to {}",
        compressed.len(),
        output.len()
    );
    Ok(output)
}

/// True if `data` carries NIfTI-1 magic (`ni1` only with `pair_ok`).
pub fn is_nifti1(data: &[u8], pair_ok: bool) -> bool {
    NiftiVersion::Nifti1.matches_magic(data, pair_ok)
}

/// True if `data` carries NIfTI-2 magic (`ni2` only with `pair_ok`).
pub fn is_nifti2(data: &[u8], pair_ok: bool) -> bool {
    NiftiVersion::Nifti2.matches_magic(data, pair_ok)
}

/// True if `data` is a NIfTI-1 or NIfTI-2 header.
pub fn is_nifti(data: &[u8], pair_ok: bool) -> bool {
    is_nifti1(data, pair_ok) || is_nifti2(data, pair_ok)
}

fn sniff_version(data: &[u8], pair_ok: bool) -> Option<NiftiVersion> {
    if is_nifti1(data, pair_ok) {
        Some(NiftiVersion::Nifti1)
    } else if is_nifti2(data, pair_ok) {
        Some(NiftiVersion::Nifti2)
    } else {
        None
    }
}

fn not_nifti(data: &[u8]) -> Error {
    let mut lead = [0u8; 4];
    for (dst, src) in lead.iter_mut().zip(data) {
        *dst = *src;
    }
    Error::NotNiftiHeader(lead)
}

/// Parse an uncompressed header, choosing the version from its magic string.
pub fn read_header(data: &[u8], pair_ok: bool) -> Result<NiftiHeader> {
    let version = sniff_version(data, pair_ok).ok_or_else(|| not_nifti(data))?;
    log::debug!("detected {version:?} magic");
    NiftiHeader::parse(data, version)
}

/// Parse a header, inflating gzip input first when enabled.
pub fn read_header_with(data: &[u8], options: &ReadOptions) -> Result<NiftiHeader> {
    let data = if options.decompress && is_compressed(data) {
        Cow::Owned(decompress(data)?)
    } else {
        Cow::Borrowed(data)
    };
    read_header(&data, options.allow_pair)
}

/// Load only the header (and its extensions) from a file.
///
/// Gzip input is recognized by content, not extension. `.hdr` files accept
/// the separate-header magic.
pub fn load_header<P: AsRef<Path>>(path: P) -> Result<NiftiHeader> {
    let options = ReadOptions::for_path(path.as_ref());
    load_header_with(path, &options)
}

/// Load only the header from a file with explicit options.
pub fn load_header_with<P: AsRef<Path>>(path: P, options: &ReadOptions) -> Result<NiftiHeader> {
    let path = path.as_ref();
    let mut reader = BufReader::with_capacity(GZIP_BUFFER_SIZE, File::open(path)?);
    if options.decompress && is_compressed(reader.fill_buf()?) {
        log::debug!("{} is gzip compressed", path.display());
        read_header_stream(MultiGzDecoder::new(reader), options.allow_pair)
    } else {
        read_header_stream(reader, options.allow_pair)
    }
}

/// Read just enough of `reader` to parse the header and its extension chain.
fn read_header_stream<R: Read>(mut reader: R, pair_ok: bool) -> Result<NiftiHeader> {
    let largest = NiftiVersion::Nifti2.layout().extension_offset();
    let mut buf = Vec::with_capacity(largest);
    (&mut reader).take(largest as u64).read_to_end(&mut buf)?;

    let version = sniff_version(&buf, pair_ok).ok_or_else(|| not_nifti(&buf))?;
    // Parse the fixed header and flag alone first to learn vox_offset.
    let prefix = version.layout().extension_offset().min(buf.len());
    let header = NiftiHeader::parse(&buf[..prefix], version)?;

    let vox_offset = usize::try_from(header.vox_offset()).unwrap_or(0);
    if !header.has_extension() || vox_offset <= prefix {
        return Ok(header);
    }

    if vox_offset > buf.len() {
        let remaining = (vox_offset - buf.len()) as u64;
        reader.take(remaining).read_to_end(&mut buf)?;
    }
    NiftiHeader::parse(&buf, version)
}

/// True if the header's extension flag is set.
pub fn has_extension(header: &NiftiHeader) -> bool {
    header.has_extension()
}

/// Number of voxel data bytes described by the header:
/// `dims[1] * dims[2] * dims[3] * dims[4] * dims[5] * bitpix / 8`, with a
/// zero `dims[4]` or `dims[5]` counted as 1.
pub fn image_len(header: &NiftiHeader) -> Result<usize> {
    let at_least_one = |d: i64| if d == 0 { 1 } else { d };
    let d = &header.dims;
    let bits = [d[1], d[2], d[3], at_least_one(d[4]), at_least_one(d[5])]
        .into_iter()
        .try_fold(i64::from(header.num_bits_per_voxel), i64::checked_mul);

    bits.and_then(|b| usize::try_from(b / 8).ok()).ok_or_else(|| {
        Error::InvalidDimensions(format!(
            "dims {:?} with {} bits per voxel do not give a valid byte count",
            &d[1..6],
            header.num_bits_per_voxel
        ))
    })
}

fn offset_of(value: i64) -> Result<usize> {
    usize::try_from(value)
        .map_err(|_| Error::InvalidDimensions(format!("negative offset {value}")))
}

/// Voxel data bytes of an uncompressed single-file image.
pub fn read_image<'a>(header: &NiftiHeader, data: &'a [u8]) -> Result<&'a [u8]> {
    let offset = offset_of(header.vox_offset())?;
    ByteView::new(data).bytes(offset, image_len(header)?)
}

/// Bytes of the first extension record, prefix included.
pub fn read_extension<'a>(header: &NiftiHeader, data: &'a [u8]) -> Result<&'a [u8]> {
    let size = offset_of(i64::from(header.extension_size()))?;
    ByteView::new(data).bytes(header.extension_offset(), size)
}

/// Payload bytes of the first extension record.
pub fn read_extension_data<'a>(header: &NiftiHeader, data: &'a [u8]) -> Result<&'a [u8]> {
    let size = offset_of(i64::from(header.extension_size()))?;
    ByteView::new(data).bytes(
        header.extension_offset() + EXTENSION_PREFIX_SIZE,
        size.saturating_sub(EXTENSION_PREFIX_SIZE),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nifti::NiftiExtension;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tempfile::tempdir;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn image_file(version: NiftiVersion, with_extension: bool) -> (NiftiHeader, Vec<u8>) {
        let mut header = NiftiHeader::new(version);
        header.dims = [4, 4, 3, 2, 2, 1, 1, 1];
        header.datatype_code = 2;
        header.num_bits_per_voxel = 8;
        header.pixdim = [1.0; 8];
        if with_extension {
            let ext = NiftiExtension::new(384, 6, b"<xml/>".to_vec(), true).unwrap();
            header.add_extension(ext, None);
        }
        let mut bytes = header.to_bytes(true).unwrap();
        bytes.extend((0..48u8).collect::<Vec<_>>());
        (header, bytes)
    }

    #[test]
    fn test_is_compressed() {
        assert!(is_compressed(&gzip(b"abc")));
        assert!(!is_compressed(b"\x1f"));
        assert!(!is_compressed(&[0x5c, 0x01, 0, 0]));
    }

    #[test]
    fn test_decompress_multi_member() {
        let mut data = gzip(b"hello ");
        data.extend(gzip(b"world"));
        assert_eq!(decompress(&data).unwrap(), b"hello world");

        let err = decompress(b"definitely not gzip").unwrap_err();
        assert!(matches!(err, Error::Decompression(_)));
    }

    #[test]
    fn test_magic_sniffing() {
        let (_, v1) = image_file(NiftiVersion::Nifti1, false);
        let (_, v2) = image_file(NiftiVersion::Nifti2, false);
        assert!(is_nifti1(&v1, false) && is_nifti(&v1, false));
        assert!(!is_nifti2(&v1, true));
        assert!(is_nifti2(&v2, false) && !is_nifti1(&v2, true));
        assert!(!is_nifti(&v1[..347], true));
        assert!(!is_nifti(&[0u8; 600], true));
    }

    #[test]
    fn test_read_header_pair_magic() {
        let mut header = NiftiHeader::new(NiftiVersion::Nifti1);
        header.magic = b"ni1\0".to_vec();
        let bytes = header.to_bytes(false).unwrap();

        assert!(matches!(
            read_header(&bytes, false),
            Err(Error::NotNiftiHeader(_))
        ));
        let parsed = read_header(&bytes, true).unwrap();
        assert!(parsed.is_hdr());
    }

    #[test]
    fn test_read_header_with_gzip() {
        let (header, bytes) = image_file(NiftiVersion::Nifti2, true);
        let compressed = gzip(&bytes);

        let parsed = read_header_with(&compressed, &ReadOptions::default()).unwrap();
        assert_eq!(parsed, header);

        let raw = ReadOptions::default().decompress(false);
        assert!(read_header_with(&compressed, &raw).is_err());
    }

    #[test]
    fn test_read_image_range() {
        let (header, bytes) = image_file(NiftiVersion::Nifti1, false);
        assert_eq!(image_len(&header).unwrap(), 48);
        let image = read_image(&header, &bytes).unwrap();
        assert_eq!(image.len(), 48);
        assert_eq!(image[0], 0);
        assert_eq!(image[47], 47);

        // A zero fifth dimension counts as one.
        let mut header = header;
        header.dims[5] = 0;
        assert_eq!(image_len(&header).unwrap(), 48);

        header.dims[1] = -4;
        assert!(matches!(
            image_len(&header),
            Err(Error::InvalidDimensions(_))
        ));
    }

    #[test]
    fn test_read_image_truncated() {
        let (header, bytes) = image_file(NiftiVersion::Nifti1, false);
        assert!(matches!(
            read_image(&header, &bytes[..360]),
            Err(Error::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_read_extension_ranges() {
        let (header, bytes) = image_file(NiftiVersion::Nifti1, true);
        assert!(has_extension(&header));

        let record = read_extension(&header, &bytes).unwrap();
        assert_eq!(record.len(), 384);
        assert_eq!(&record[..8], &[128, 1, 0, 0, 6, 0, 0, 0]);

        let payload = read_extension_data(&header, &bytes).unwrap();
        assert_eq!(payload.len(), 376);
        assert_eq!(&payload[..6], b"<xml/>");

        let (plain, bytes) = image_file(NiftiVersion::Nifti1, false);
        assert!(!has_extension(&plain));
        assert!(read_extension_data(&plain, &bytes).unwrap().is_empty());
    }

    #[test]
    fn test_load_header_files() {
        let dir = tempdir().unwrap();

        let (header, bytes) = image_file(NiftiVersion::Nifti1, true);
        let path = dir.path().join("scan.nii");
        std::fs::write(&path, &bytes).unwrap();
        assert_eq!(load_header(&path).unwrap(), header);

        let gz_path = dir.path().join("scan.nii.gz");
        std::fs::write(&gz_path, gzip(&bytes)).unwrap();
        assert_eq!(load_header(&gz_path).unwrap(), header);

        let mut pair = NiftiHeader::new(NiftiVersion::Nifti2);
        pair.magic = b"ni2\0\r\n\x1a\n".to_vec();
        let hdr_bytes = pair.to_bytes(false).unwrap();
        let hdr_path = dir.path().join("scan.hdr");
        std::fs::write(&hdr_path, &hdr_bytes).unwrap();
        assert!(load_header(&hdr_path).unwrap().is_hdr());

        let renamed = dir.path().join("scan_hdr.nii");
        std::fs::write(&renamed, &hdr_bytes).unwrap();
        assert!(matches!(
            load_header(&renamed),
            Err(Error::NotNiftiHeader(_))
        ));
    }

    #[test]
    fn test_read_options_for_path() {
        assert!(ReadOptions::for_path("a/b/scan.hdr").allow_pair);
        assert!(ReadOptions::for_path("scan.HDR.gz").allow_pair);
        assert!(!ReadOptions::for_path("scan.nii.gz").allow_pair);
        assert!(ReadOptions::for_path("scan.nii").decompress);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            load_header(dir.path().join("absent.nii")),
            Err(Error::Io(_))
        ));
    }
}
