//! End-to-end tests for header parsing, extension editing and serialization.
//!
//! Headers are assembled field by field with `byteorder` so the expected
//! bytes do not depend on the codec under test.

use byteorder::{ByteOrder, LittleEndian};
use nifti_codec::nifti::{self, geometry, DataType, NiftiExtension, NiftiHeader, NiftiVersion};
use nifti_codec::Error;
use std::io::Write;
use tempfile::NamedTempFile;

const MNI_DIMS: [i16; 8] = [3, 91, 109, 91, 1, 1, 1, 1];

/// A 2mm MNI152-style single-file header (352 bytes, no extensions).
fn mni_header_bytes() -> Vec<u8> {
    let mut b = vec![0u8; 352];
    LittleEndian::write_i32(&mut b[0..4], 348);
    b[38] = b'r'; // ANALYZE "regular"
    for (i, &d) in MNI_DIMS.iter().enumerate() {
        LittleEndian::write_i16(&mut b[40 + 2 * i..], d);
    }
    LittleEndian::write_i16(&mut b[70..72], 2); // uint8
    LittleEndian::write_i16(&mut b[72..74], 8);
    let pixdim = [-1.0f32, 2.0, 2.0, 2.0, 1.0, 1.0, 1.0, 1.0];
    for (i, &p) in pixdim.iter().enumerate() {
        LittleEndian::write_f32(&mut b[76 + 4 * i..], p);
    }
    LittleEndian::write_f32(&mut b[108..112], 352.0);
    LittleEndian::write_f32(&mut b[112..116], 1.0);
    b[123] = 10; // mm + s
    LittleEndian::write_f32(&mut b[124..128], 255.0);
    LittleEndian::write_i32(&mut b[140..144], 255); // glmax
    b[148..154].copy_from_slice(b"FSL5.0");
    LittleEndian::write_i16(&mut b[252..254], 4);
    LittleEndian::write_i16(&mut b[254..256], 4);
    LittleEndian::write_f32(&mut b[260..264], 1.0); // quatern_c
    let qoffset = [90.0f32, -126.0, -72.0];
    for (i, &q) in qoffset.iter().enumerate() {
        LittleEndian::write_f32(&mut b[268 + 4 * i..], q);
    }
    let srow = [
        -2.0f32, 0.0, 0.0, 90.0, //
        0.0, 2.0, 0.0, -126.0, //
        0.0, 0.0, 2.0, -72.0,
    ];
    for (i, &s) in srow.iter().enumerate() {
        LittleEndian::write_f32(&mut b[280 + 4 * i..], s);
    }
    b[344..348].copy_from_slice(b"n+1\0");
    b
}

/// The MNI header followed by one 384-byte comment extension.
fn mni_with_extension_bytes() -> Vec<u8> {
    let mut b = mni_header_bytes();
    b[348] = 1;
    LittleEndian::write_f32(&mut b[108..112], 736.0);
    let mut record = vec![0u8; 384];
    LittleEndian::write_i32(&mut record[0..4], 384);
    LittleEndian::write_i32(&mut record[4..8], 6);
    let text = b"acquired on a 3T scanner; resampled to MNI152 2mm";
    record[8..8 + text.len()].copy_from_slice(text);
    b.extend_from_slice(&record);
    b
}

fn crc32(data: &[u8]) -> u32 {
    let mut crc = flate2::Crc::new();
    crc.update(data);
    crc.sum()
}

#[test]
fn test_mni_header_fields() {
    let bytes = mni_header_bytes();
    assert!(nifti::is_nifti1(&bytes, false));
    assert!(!nifti::is_nifti2(&bytes, true));

    let header = nifti::read_header(&bytes, false).unwrap();
    assert_eq!(header.version, NiftiVersion::Nifti1);
    assert!(header.little_endian);
    assert_eq!(header.dims, [3, 91, 109, 91, 1, 1, 1, 1]);
    assert_eq!(header.shape(), vec![91, 109, 91]);
    assert_eq!(header.datatype(), Some(DataType::UInt8));
    assert_eq!(header.vox_offset(), 352);
    assert_eq!(header.description, "FSL5.0");
    assert_eq!(header.magic_str(), "n+1");
    assert!(!header.has_extension());
    assert!(header.extensions().is_empty());
    assert_eq!(
        header.affine,
        [
            [-2.0, 0.0, 0.0, 90.0],
            [0.0, 2.0, 0.0, -126.0],
            [0.0, 0.0, 2.0, -72.0],
            [0.0, 0.0, 0.0, 1.0],
        ]
    );
}

#[test]
fn test_mni_header_byte_identical_roundtrip() {
    let bytes = mni_header_bytes();
    let header = NiftiHeader::from_bytes(&bytes).unwrap();
    let written = header.to_bytes(true).unwrap();
    assert_eq!(written.len(), 352);
    assert_eq!(written, bytes);
}

#[test]
fn test_qform_matches_sform() {
    let header = NiftiHeader::from_bytes(&mni_header_bytes()).unwrap();
    // c = 1 is a 180 degree rotation about y; qfac -1 flips z back.
    assert_eq!(header.quatern_a(), 0.0);
    assert_eq!(header.qform_affine(), header.affine);
    assert_eq!(header.orientation().as_deref(), Some("XYZ-++"));
}

#[test]
fn test_single_extension() {
    let bytes = mni_with_extension_bytes();
    let mut header = NiftiHeader::from_bytes(&bytes).unwrap();

    assert!(nifti::has_extension(&header));
    assert_eq!(header.extensions().len(), 1);
    let ext = header.extensions()[0].clone();
    assert_eq!(ext.esize(), 384);
    assert_eq!(ext.ecode(), 6);
    assert_eq!(ext.edata().len(), 376);
    assert_eq!((header.extension_size(), header.extension_code()), (384, 6));

    let raw_payload = nifti::read_extension_data(&header, &bytes).unwrap();
    assert_eq!(crc32(raw_payload), crc32(ext.edata()));
    assert_eq!(nifti::read_extension(&header, &bytes).unwrap().len(), 384);

    let removed = header.remove_extension(0).unwrap();
    assert_eq!(removed, ext);
    assert_eq!(header.vox_offset(), 736 - 384);
    assert_eq!(header.to_bytes(true).unwrap(), mni_header_bytes());

    header.add_extension(removed, None);
    assert_eq!(header.vox_offset(), 736);
    assert_eq!(header.to_bytes(true).unwrap(), bytes);
}

#[test]
fn test_header_without_extensions_serialization() {
    let header = NiftiHeader::from_bytes(&mni_with_extension_bytes()).unwrap();
    let stripped = header.to_bytes(false).unwrap();
    assert_eq!(stripped.len(), 352);
    assert_eq!(&stripped[348..352], &[0, 0, 0, 0]);
    // vox_offset still accounts for the extension that was left out.
    assert_eq!(LittleEndian::read_f32(&stripped[108..112]), 736.0);
}

#[test]
fn test_invalid_magic_rejected() {
    let mut bytes = mni_header_bytes();
    bytes[344..348].copy_from_slice(b"BAD!");
    assert!(!nifti::is_nifti(&bytes, true));
    assert!(matches!(
        nifti::read_header(&bytes, true),
        Err(Error::NotNiftiHeader(_))
    ));

    let garbage: Vec<u8> = (0..600u32).map(|i| (i * 7 % 251) as u8).collect();
    assert!(!nifti::is_nifti(&garbage, true));
    let err = NiftiHeader::from_bytes(&garbage).unwrap_err();
    assert!(err.to_string().contains("not a NIfTI header"));
}

#[test]
fn test_big_endian_roundtrip() {
    let mut header = NiftiHeader::from_bytes(&mni_with_extension_bytes()).unwrap();
    header.little_endian = false;
    let bytes = header.to_bytes(true).unwrap();
    assert_eq!(&bytes[0..4], &[0, 0, 1, 0x5c]);
    // The extension keeps its own little-endian prefix.
    assert_eq!(&bytes[352..356], &[0x80, 0x01, 0, 0]);

    let parsed = NiftiHeader::from_bytes(&bytes).unwrap();
    assert!(!parsed.little_endian);
    assert_eq!(parsed, header);
}

#[test]
fn test_nifti2_extension_roundtrip() {
    let mut header = NiftiHeader::new(NiftiVersion::Nifti2);
    header.dims = [4, 256, 256, 170, 40_000, 1, 1, 1];
    header.datatype_code = DataType::Float32.code();
    header.num_bits_per_voxel = 32;
    header.pixdim = [1.0, 0.9, 0.9, 1.2, 2.5, 0.0, 0.0, 0.0];
    header.qform_code = 1;
    header.quatern = [0.0, 0.0, 0.0];
    header.qoffset = [-115.2, -115.2, -102.0];
    header.affine = header.qform_affine();
    header.intent_name = "fmri".into();
    let afni = NiftiExtension::new(32, 4, b"afni".to_vec(), false).unwrap();
    let json = NiftiExtension::new(64, 16, b"json".to_vec(), true).unwrap();
    header.add_extension(afni, None);
    header.add_extension(json, None);
    assert_eq!(header.vox_offset(), 544 + 96);

    let bytes = header.to_bytes(true).unwrap();
    assert_eq!(bytes.len(), 640);
    assert!(nifti::is_nifti2(&bytes, false));

    let parsed = nifti::read_header(&bytes, false).unwrap();
    assert_eq!(parsed, header);
    assert_eq!(parsed.orientation().as_deref(), Some("XYZ+++"));
    assert!(!parsed.extensions()[0].is_little_endian());
    assert!(parsed.extensions()[1].is_little_endian());
}

#[test]
fn test_vox_offset_tracks_extensions() {
    let mut header = NiftiHeader::from_bytes(&mni_header_bytes()).unwrap();
    let invariant = |h: &NiftiHeader| {
        let total: i64 = h.extensions().iter().map(|e| i64::from(e.esize())).sum();
        h.vox_offset() - total
    };
    assert_eq!(invariant(&header), 352);

    let sizes = [16, 384, 32, 48, 16];
    for (i, &esize) in sizes.iter().enumerate() {
        let ext = NiftiExtension::new(esize, i as i32, Vec::new(), i % 2 == 0).unwrap();
        header.add_extension(ext, Some(i / 2));
        assert_eq!(invariant(&header), 352);
    }
    for index in [3, 0, 10, 1, 0, 0, 0] {
        header.remove_extension(index);
        assert_eq!(invariant(&header), 352);
    }
    assert!(header.extensions().is_empty());
    assert_eq!(header.vox_offset(), 352);
}

#[test]
fn test_extension_size_validation() {
    assert!(matches!(
        NiftiExtension::new(15, 0, Vec::new(), true),
        Err(Error::InvalidExtension(_))
    ));
    assert!(NiftiExtension::new(16, 0, Vec::new(), true).is_ok());
    assert_eq!(
        NiftiExtension::new(384, 6, vec![0u8; 376], true)
            .unwrap()
            .edata()
            .len(),
        376
    );
}

#[test]
fn test_corrupt_extension_chain() {
    let mut bytes = mni_with_extension_bytes();
    // 400 bytes overflows vox_offset in both byte orders.
    LittleEndian::write_i32(&mut bytes[352..356], 400);
    assert!(matches!(
        NiftiHeader::from_bytes(&bytes),
        Err(Error::InvalidExtension(_))
    ));
}

#[test]
fn test_read_image_bytes() {
    let mut bytes = mni_header_bytes();
    let voxels = 91 * 109 * 91;
    bytes.extend((0..voxels).map(|i| (i % 256) as u8));

    let header = nifti::read_header(&bytes, false).unwrap();
    let image = nifti::read_image(&header, &bytes).unwrap();
    assert_eq!(image.len(), voxels);
    assert_eq!(image[300], 44);
    assert_eq!(crc32(image), crc32(&bytes[352..]));
}

#[test]
fn test_load_gzipped_file() {
    let mut bytes = mni_with_extension_bytes();
    bytes.extend(std::iter::repeat(7u8).take(91 * 109 * 91));

    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::fast());
    encoder.write_all(&bytes).unwrap();
    let compressed = encoder.finish().unwrap();
    assert!(nifti::is_compressed(&compressed));

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&compressed).unwrap();
    file.flush().unwrap();

    let header = nifti::load_header(file.path()).unwrap();
    assert_eq!(header, NiftiHeader::from_bytes(&bytes).unwrap());
    assert_eq!(header.extensions().len(), 1);

    let inflated = nifti::decompress(&compressed).unwrap();
    assert_eq!(inflated, bytes);
}

#[test]
fn test_geometry_helpers() {
    let pixdim = [0.0, 2.0, 2.0, 2.0, 0.0, 0.0, 0.0, 0.0];
    let affine = geometry::quaternion_to_affine([1.0, 0.0, 0.0], [0.0; 3], &pixdim);
    assert_eq!(affine[0][0], 2.0);
    assert_eq!(affine[1][1], -2.0);
    assert_eq!(affine[2][2], -2.0);
    assert_eq!(
        geometry::orientation_code(&geometry::rotation_part(&geometry::IDENTITY)).as_deref(),
        Some("XYZ+++")
    );
}

#[test]
fn test_formatted_dump() {
    let header = NiftiHeader::from_bytes(&mni_with_extension_bytes()).unwrap();
    let text = header.to_string();
    assert!(text.starts_with("Dim Info = 0\n"));
    assert!(text.contains("Image Dimensions (1-8): 3, 91, 109, 91, 1, 1, 1, 1\n"));
    assert!(text.contains("Datatype = 2 (1-Byte Unsigned Integer)\n"));
    assert!(text.contains("Image Offset = 736\n"));
    assert!(text.contains("Q-Form Code = 4 (MNI)\n"));
    assert!(text.contains("S-Form Parameters X: -2, 0, 0, 90\n"));
    assert!(text.contains("Extension: Size = 384  Code = 6\n"));
}
