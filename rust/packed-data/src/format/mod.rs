// rust/packed-data/src/format/mod.rs

//! Packed binary file format.
//!
//! A packed file holds one chunk: a 24-byte header followed by a flat array
//! of numeric elements of a single [`Dtype`]. This crate only reads the
//! format.

mod dtype;
mod header;

pub use dtype::Dtype;
pub use header::{parse_chunk, PackedHeader, FORMAT_VERSION, HEADER_MAGIC, HEADER_SIZE};
