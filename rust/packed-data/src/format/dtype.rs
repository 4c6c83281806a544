// rust/packed-data/src/format/dtype.rs

use std::fmt;

/// Element type of a packed chunk, identified on disk by a one-byte code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dtype {
    U8,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    U16,
}

impl Dtype {
    /// All recognized element types, in code order.
    pub const ALL: [Dtype; 8] = [
        Dtype::U8,
        Dtype::I8,
        Dtype::I16,
        Dtype::I32,
        Dtype::I64,
        Dtype::F32,
        Dtype::F64,
        Dtype::U16,
    ];

    /// Looks up the element type for an on-disk code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::U8),
            2 => Some(Self::I8),
            3 => Some(Self::I16),
            4 => Some(Self::I32),
            5 => Some(Self::I64),
            6 => Some(Self::F32),
            7 => Some(Self::F64),
            8 => Some(Self::U16),
            _ => None,
        }
    }

    /// The on-disk code for this element type.
    pub fn code(self) -> u8 {
        match self {
            Self::U8 => 1,
            Self::I8 => 2,
            Self::I16 => 3,
            Self::I32 => 4,
            Self::I64 => 5,
            Self::F32 => 6,
            Self::F64 => 7,
            Self::U16 => 8,
        }
    }

    /// Size of one element in bytes.
    pub fn itemsize(self) -> usize {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::F32 => 4,
            Self::I64 | Self::F64 => 8,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::U8 => "uint8",
            Self::I8 => "int8",
            Self::I16 => "int16",
            Self::I32 => "int32",
            Self::I64 => "int64",
            Self::F32 => "float32",
            Self::F64 => "float64",
            Self::U16 => "uint16",
        }
    }

    /// Decodes little-endian elements from `bytes`, widening each to `i64`.
    ///
    /// `bytes.len()` must be a multiple of [`Dtype::itemsize`]; a trailing
    /// partial element is ignored. Floating-point values are truncated toward
    /// zero and saturate at the `i64` bounds.
    pub fn widen(self, bytes: &[u8], out: &mut Vec<i64>) {
        out.reserve(bytes.len() / self.itemsize());
        match self {
            Self::U8 => out.extend(bytes.iter().map(|&b| i64::from(b))),
            Self::I8 => out.extend(bytes.iter().map(|&b| i64::from(b as i8))),
            Self::I16 => out.extend(
                bytes
                    .chunks_exact(2)
                    .map(|c| i64::from(i16::from_le_bytes([c[0], c[1]]))),
            ),
            Self::U16 => out.extend(
                bytes
                    .chunks_exact(2)
                    .map(|c| i64::from(u16::from_le_bytes([c[0], c[1]]))),
            ),
            Self::I32 => out.extend(
                bytes
                    .chunks_exact(4)
                    .map(|c| i64::from(i32::from_le_bytes([c[0], c[1], c[2], c[3]]))),
            ),
            Self::F32 => out.extend(
                bytes
                    .chunks_exact(4)
                    .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]) as i64),
            ),
            Self::I64 => out.extend(bytes.chunks_exact(8).map(|c| {
                i64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]])
            })),
            Self::F64 => out.extend(bytes.chunks_exact(8).map(|c| {
                f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]) as i64
            })),
        }
    }
}

impl fmt::Display for Dtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
