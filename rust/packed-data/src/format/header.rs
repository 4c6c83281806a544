// rust/packed-data/src/format/header.rs

//! Packed chunk file header.
//!
//! Every packed file starts with a fixed 24-byte little-endian header and is
//! followed immediately by the payload:
//!
//! ```text
//! offset  size  field
//!      0     7  magic ("LITPKDS")
//!      7     8  version (u64, must be 1)
//!     15     1  dtype code (1..=8)
//!     16     8  chunk element count (u64)
//!     24     *  payload: element count x itemsize bytes, no padding
//! ```

use bytes::Bytes;

use super::dtype::Dtype;
use crate::error::{DataError, Result};

/// Magic bytes identifying a packed file.
pub const HEADER_MAGIC: [u8; 7] = *b"LITPKDS";

/// Total header size in bytes.
pub const HEADER_SIZE: usize = 24;

/// The only supported format version.
pub const FORMAT_VERSION: u64 = 1;

const VERSION_OFFSET: usize = 7;
const DTYPE_OFFSET: usize = 15;
const COUNT_OFFSET: usize = 16;

/// Parsed header of a packed chunk file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedHeader {
    /// Element type of the payload
    pub dtype: Dtype,
    /// Number of elements in the payload
    pub chunk_len: u64,
}

impl PackedHeader {
    /// Parses and validates the header at the start of `bytes`.
    ///
    /// `path` only labels errors.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Format`] if the input is shorter than the header,
    /// the magic does not match, the version is not 1, or the dtype code is
    /// not recognized.
    pub fn parse(path: &str, bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(DataError::format(
                path,
                format!(
                    "file is {} bytes, shorter than the {HEADER_SIZE}-byte header",
                    bytes.len()
                ),
            ));
        }

        if bytes[..VERSION_OFFSET] != HEADER_MAGIC {
            return Err(DataError::format(path, "file doesn't match expected format (bad magic)"));
        }

        let version = read_u64_le(&bytes[VERSION_OFFSET..DTYPE_OFFSET]);
        if version != FORMAT_VERSION {
            return Err(DataError::format(
                path,
                format!("unsupported version {version}, expected {FORMAT_VERSION}"),
            ));
        }

        let code = bytes[DTYPE_OFFSET];
        let dtype = Dtype::from_code(code)
            .ok_or_else(|| DataError::format(path, format!("unknown dtype code {code}")))?;

        let chunk_len = read_u64_le(&bytes[COUNT_OFFSET..HEADER_SIZE]);

        Ok(Self { dtype, chunk_len })
    }

    /// Number of payload bytes this header describes, if it fits in memory.
    pub fn payload_len(&self) -> Option<usize> {
        usize::try_from(self.chunk_len)
            .ok()?
            .checked_mul(self.dtype.itemsize())
    }
}

/// Parses a whole packed file and returns its header and payload.
///
/// The payload is a zero-copy view of `bytes` starting right after the
/// header and trimmed to exactly `chunk_len * itemsize` bytes.
///
/// # Errors
///
/// Returns [`DataError::Format`] for any header violation, or when the file
/// holds fewer payload bytes than the header declares.
pub fn parse_chunk(path: &str, bytes: Bytes) -> Result<(PackedHeader, Bytes)> {
    let header = PackedHeader::parse(path, &bytes)?;

    let payload_len = header.payload_len().ok_or_else(|| {
        DataError::format(
            path,
            format!("element count {} overflows addressable memory", header.chunk_len),
        )
    })?;

    let available = bytes.len() - HEADER_SIZE;
    if available < payload_len {
        return Err(DataError::format(
            path,
            format!(
                "payload truncated: header declares {} {} elements ({payload_len} bytes), found {available} bytes",
                header.chunk_len, header.dtype
            ),
        ));
    }

    Ok((header, bytes.slice(HEADER_SIZE..HEADER_SIZE + payload_len)))
}

fn read_u64_le(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(buf)
}
