//! zlib compression of leaf payloads.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::util::{Error, Result};

/// Compress data using zlib.
///
/// `level` runs from 1 (fast) to 9 (best). Returns `None` when compression
/// is disabled or would not save space. The result carries an 8-byte
/// little-endian prefix holding the uncompressed size.
pub fn compress(data: &[u8], level: u32) -> Result<Option<Vec<u8>>> {
    if level == 0 || data.is_empty() {
        return Ok(None);
    }

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(level.min(9)));
    encoder.write_all(data)?;
    let compressed = encoder.finish()?;

    if compressed.len() + 8 >= data.len() {
        return Ok(None);
    }

    let mut result = Vec::with_capacity(8 + compressed.len());
    result.extend_from_slice(&(data.len() as u64).to_le_bytes());
    result.extend_from_slice(&compressed);
    Ok(Some(result))
}

/// Decompress a payload produced by [`compress`].
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < 8 {
        return Err(Error::UnexpectedEof(data.len() as u64));
    }

    let mut size = [0u8; 8];
    size.copy_from_slice(&data[..8]);
    let uncompressed_size = u64::from_le_bytes(size) as usize;

    let mut decoder = ZlibDecoder::new(&data[8..]);
    let mut out = Vec::with_capacity(uncompressed_size.min(1 << 30));
    decoder.read_to_end(&mut out)?;

    if out.len() != uncompressed_size {
        return Err(Error::invalid(format!(
            "decompressed {} bytes, expected {}",
            out.len(),
            uncompressed_size
        )));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compress_decompress() {
        let original = b"Some vertex data that repeats. ".repeat(100);
        let compressed = compress(&original, 6).unwrap().expect("should compress");
        assert!(compressed.len() < original.len());
        assert_eq!(decompress(&compressed).unwrap(), original);
    }

    #[test]
    fn test_level_zero_disables() {
        assert!(compress(b"Short data", 0).unwrap().is_none());
    }

    #[test]
    fn test_incompressible_is_skipped() {
        assert!(compress(b"Hi", 9).unwrap().is_none());
    }

    #[test]
    fn test_corrupt_payload() {
        let mut compressed = compress(&[7u8; 1000], 6).unwrap().unwrap();
        compressed.truncate(12);
        assert!(decompress(&compressed).is_err());
        assert!(decompress(&[1, 2]).is_err());
    }
}
