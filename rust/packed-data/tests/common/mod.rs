//! Helpers shared by the integration tests.

use std::fs;
use std::path::Path;

use packed_data::format::{Dtype, FORMAT_VERSION, HEADER_MAGIC};

/// Encodes a packed chunk whose elements are stored as `dtype`.
///
/// Values are cast with `as`, so callers pick values that fit.
pub fn encode_chunk(dtype: Dtype, values: &[i64]) -> Vec<u8> {
    let mut out = Vec::with_capacity(24 + values.len() * dtype.itemsize());
    out.extend_from_slice(&HEADER_MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.push(dtype.code());
    out.extend_from_slice(&(values.len() as u64).to_le_bytes());

    for &v in values {
        match dtype {
            Dtype::U8 => out.push(v as u8),
            Dtype::I8 => out.push(v as i8 as u8),
            Dtype::I16 => out.extend_from_slice(&(v as i16).to_le_bytes()),
            Dtype::U16 => out.extend_from_slice(&(v as u16).to_le_bytes()),
            Dtype::I32 => out.extend_from_slice(&(v as i32).to_le_bytes()),
            Dtype::I64 => out.extend_from_slice(&v.to_le_bytes()),
            Dtype::F32 => out.extend_from_slice(&(v as f32).to_le_bytes()),
            Dtype::F64 => out.extend_from_slice(&(v as f64).to_le_bytes()),
        }
    }
    out
}

/// Writes `count` uint16 chunk files named `chunk_NNN.bin` under `dir`.
///
/// File `i` holds `i * 1000 .. i * 1000 + chunk_len`.
pub fn write_corpus(dir: &Path, count: usize, chunk_len: usize) -> Vec<String> {
    fs::create_dir_all(dir).unwrap();
    (0..count)
        .map(|i| {
            let name = format!("chunk_{i:03}.bin");
            let base = (i * 1000) as i64;
            let values: Vec<i64> = (base..base + chunk_len as i64).collect();
            fs::write(dir.join(&name), encode_chunk(Dtype::U16, &values)).unwrap();
            name
        })
        .collect()
}
