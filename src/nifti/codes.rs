//! Standard NIfTI code tables: datatypes, transform codes and units.

/// Mask selecting the spatial unit bits of `xyzt_units`.
pub const SPATIAL_UNITS_MASK: i32 = 0x07;

/// Mask selecting the temporal unit bits of `xyzt_units`.
pub const TEMPORAL_UNITS_MASK: i32 = 0x38;

/// `NIfTI` data type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i16)]
pub enum DataType {
    /// No data
    None = 0,
    /// 1 bit per voxel
    Binary = 1,
    /// Unsigned 8-bit integer
    UInt8 = 2,
    /// Signed 16-bit integer
    Int16 = 4,
    /// Signed 32-bit integer
    Int32 = 8,
    /// 32-bit floating point
    Float32 = 16,
    /// Pair of 32-bit floats
    Complex64 = 32,
    /// 64-bit floating point
    Float64 = 64,
    /// RGB triple of unsigned bytes
    Rgb24 = 128,
    /// Signed 8-bit integer
    Int8 = 256,
    /// Unsigned 16-bit integer
    UInt16 = 512,
    /// Unsigned 32-bit integer
    UInt32 = 768,
    /// Signed 64-bit integer
    Int64 = 1024,
    /// Unsigned 64-bit integer
    UInt64 = 1280,
    /// 128-bit floating point
    Float128 = 1536,
    /// Pair of 64-bit floats
    Complex128 = 1792,
    /// Pair of 128-bit floats
    Complex256 = 2048,
}

impl DataType {
    /// Parse from `NIfTI` datatype code.
    pub const fn from_code(code: i16) -> Option<Self> {
        Some(match code {
            0 => Self::None,
            1 => Self::Binary,
            2 => Self::UInt8,
            4 => Self::Int16,
            8 => Self::Int32,
            16 => Self::Float32,
            32 => Self::Complex64,
            64 => Self::Float64,
            128 => Self::Rgb24,
            256 => Self::Int8,
            512 => Self::UInt16,
            768 => Self::UInt32,
            1024 => Self::Int64,
            1280 => Self::UInt64,
            1536 => Self::Float128,
            1792 => Self::Complex128,
            2048 => Self::Complex256,
            _ => return None,
        })
    }

    /// The on-disk code.
    pub const fn code(self) -> i16 {
        self as i16
    }

    /// Bits per voxel implied by the type.
    pub const fn bits_per_voxel(self) -> i16 {
        match self {
            Self::None => 0,
            Self::Binary => 1,
            Self::UInt8 | Self::Int8 => 8,
            Self::Int16 | Self::UInt16 => 16,
            Self::Rgb24 => 24,
            Self::Int32 | Self::UInt32 | Self::Float32 => 32,
            Self::Int64 | Self::UInt64 | Self::Float64 | Self::Complex64 => 64,
            Self::Float128 | Self::Complex128 => 128,
            Self::Complex256 => 256,
        }
    }

    /// Human-readable description, as printed in header dumps.
    pub const fn description(self) -> &'static str {
        match self {
            Self::UInt8 => "1-Byte Unsigned Integer",
            Self::Int16 => "2-Byte Signed Integer",
            Self::Int32 => "4-Byte Signed Integer",
            Self::Float32 => "4-Byte Float",
            Self::Float64 => "8-Byte Float",
            Self::Rgb24 => "RGB",
            Self::Int8 => "1-Byte Signed Integer",
            Self::UInt16 => "2-Byte Unsigned Integer",
            Self::UInt32 => "4-Byte Unsigned Integer",
            Self::Int64 => "8-Byte Signed Integer",
            Self::UInt64 => "8-Byte Unsigned Integer",
            _ => "Unknown",
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

/// qform/sform transform codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i32)]
pub enum XForm {
    /// Arbitrary coordinates
    #[default]
    Unknown = 0,
    /// Scanner-based anatomical coordinates
    ScannerAnat = 1,
    /// Coordinates aligned to another file or truth
    AlignedAnat = 2,
    /// Talairach-Tournoux atlas space
    Talairach = 3,
    /// MNI 152 normalized space
    Mni152 = 4,
}

impl XForm {
    /// Parse a transform code; unrecognized codes map to `Unknown`.
    pub const fn from_code(code: i32) -> Self {
        match code {
            1 => Self::ScannerAnat,
            2 => Self::AlignedAnat,
            3 => Self::Talairach,
            4 => Self::Mni152,
            _ => Self::Unknown,
        }
    }

    /// Short display name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::ScannerAnat => "Scanner",
            Self::AlignedAnat => "Aligned",
            Self::Talairach => "Talairach",
            Self::Mni152 => "MNI",
        }
    }
}

/// Spatial units for voxel dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpatialUnits {
    #[default]
    /// Units are not specified.
    Unknown,
    /// Voxel dimensions expressed in meters.
    Meter,
    /// Voxel dimensions expressed in millimeters.
    Millimeter,
    /// Voxel dimensions expressed in micrometers.
    Micrometer,
}

impl SpatialUnits {
    /// Decode the spatial bits of `xyzt_units`.
    pub const fn from_code(code: i32) -> Self {
        match code & SPATIAL_UNITS_MASK {
            1 => Self::Meter,
            2 => Self::Millimeter,
            3 => Self::Micrometer,
            _ => Self::Unknown,
        }
    }

    /// Encode as the spatial bits of `xyzt_units`.
    pub const fn to_code(self) -> i32 {
        match self {
            Self::Unknown => 0,
            Self::Meter => 1,
            Self::Millimeter => 2,
            Self::Micrometer => 3,
        }
    }

    /// Display name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Meter => "Meters",
            Self::Millimeter => "Millimeters",
            Self::Micrometer => "Microns",
        }
    }
}

/// Temporal units for time dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TemporalUnits {
    #[default]
    /// Temporal spacing unspecified.
    Unknown,
    /// Temporal spacing in seconds.
    Second,
    /// Temporal spacing in milliseconds.
    Millisecond,
    /// Temporal spacing in microseconds.
    Microsecond,
    /// Frequency in hertz.
    Hertz,
    /// Parts per million.
    Ppm,
    /// Radians per second.
    Rads,
}

impl TemporalUnits {
    /// Decode the temporal bits of `xyzt_units`.
    pub const fn from_code(code: i32) -> Self {
        match code & TEMPORAL_UNITS_MASK {
            0x08 => Self::Second,
            0x10 => Self::Millisecond,
            0x18 => Self::Microsecond,
            0x20 => Self::Hertz,
            0x28 => Self::Ppm,
            0x30 => Self::Rads,
            _ => Self::Unknown,
        }
    }

    /// Encode as the temporal bits of `xyzt_units`.
    pub const fn to_code(self) -> i32 {
        match self {
            Self::Unknown => 0,
            Self::Second => 0x08,
            Self::Millisecond => 0x10,
            Self::Microsecond => 0x18,
            Self::Hertz => 0x20,
            Self::Ppm => 0x28,
            Self::Rads => 0x30,
        }
    }

    /// Display name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Second => "Seconds",
            Self::Millisecond => "Milliseconds",
            Self::Microsecond => "Microseconds",
            Self::Hertz => "Hz",
            Self::Ppm => "PPM",
            Self::Rads => "Rads",
        }
    }
}
