//! Chunk codecs for arrays stored in directory containers

use crate::error::{Result, StackError};
use flate2::read::{DeflateDecoder, DeflateEncoder};
use flate2::Compression as FlateCompression;
use serde::{Deserialize, Serialize};
use std::io::Read;

/// Compression methods available for chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CompressionMethod {
    /// Stored as-is
    None = 0,
    /// Deflate/ZIP compression
    Deflate = 1,
    /// Run-length encoding, suited to flag and mask arrays
    RLE = 2,
    /// Zstandard compression
    Zstd = 3,
}

impl CompressionMethod {
    /// Get the method from a byte value
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(CompressionMethod::None),
            1 => Some(CompressionMethod::Deflate),
            2 => Some(CompressionMethod::RLE),
            3 => Some(CompressionMethod::Zstd),
            _ => None,
        }
    }
}

impl Default for CompressionMethod {
    fn default() -> Self {
        CompressionMethod::Zstd
    }
}

/// Compression level (0-9, where 0 is no compression and 9 is maximum)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionLevel(u8);

impl CompressionLevel {
    pub fn new(level: u8) -> Self {
        Self(level.min(9))
    }

    pub fn best() -> Self {
        Self(9)
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self(6)
    }
}

/// Encodes and decodes one chunk payload
pub trait Compressor: Send + Sync {
    fn compress(&self, data: &[u8], level: CompressionLevel) -> Result<Vec<u8>>;

    /// `expected_size` is a capacity hint only
    fn decompress(&self, data: &[u8], expected_size: Option<usize>) -> Result<Vec<u8>>;

    fn method(&self) -> CompressionMethod;
}

#[derive(Debug, Default)]
pub struct NoneCompressor;

impl Compressor for NoneCompressor {
    fn compress(&self, data: &[u8], _level: CompressionLevel) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decompress(&self, data: &[u8], _expected_size: Option<usize>) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn method(&self) -> CompressionMethod {
        CompressionMethod::None
    }
}

#[derive(Debug, Default)]
pub struct DeflateCompressor;

impl Compressor for DeflateCompressor {
    fn compress(&self, data: &[u8], level: CompressionLevel) -> Result<Vec<u8>> {
        let mut encoder = DeflateEncoder::new(data, FlateCompression::new(level.value() as u32));
        let mut compressed = Vec::new();
        encoder
            .read_to_end(&mut compressed)
            .map_err(|e| StackError::Compression(e.to_string()))?;
        Ok(compressed)
    }

    fn decompress(&self, data: &[u8], expected_size: Option<usize>) -> Result<Vec<u8>> {
        let mut decoder = DeflateDecoder::new(data);
        let mut decompressed = Vec::with_capacity(expected_size.unwrap_or(0));
        decoder
            .read_to_end(&mut decompressed)
            .map_err(|e| StackError::Decompression(e.to_string()))?;
        Ok(decompressed)
    }

    fn method(&self) -> CompressionMethod {
        CompressionMethod::Deflate
    }
}

#[derive(Debug, Default)]
pub struct ZstdCompressor;

impl Compressor for ZstdCompressor {
    fn compress(&self, data: &[u8], level: CompressionLevel) -> Result<Vec<u8>> {
        zstd::encode_all(data, level.value() as i32)
            .map_err(|e| StackError::Compression(e.to_string()))
    }

    fn decompress(&self, data: &[u8], _expected_size: Option<usize>) -> Result<Vec<u8>> {
        zstd::decode_all(data).map_err(|e| StackError::Decompression(e.to_string()))
    }

    fn method(&self) -> CompressionMethod {
        CompressionMethod::Zstd
    }
}

/// Byte-wise run-length encoding as `(count, value)` pairs
#[derive(Debug, Default)]
pub struct RLECompressor;

impl Compressor for RLECompressor {
    fn compress(&self, data: &[u8], _level: CompressionLevel) -> Result<Vec<u8>> {
        let mut compressed = Vec::new();
        let mut runs = data.iter().peekable();
        while let Some(&byte) = runs.next() {
            let mut count = 1u8;
            while count < u8::MAX && runs.peek() == Some(&&byte) {
                runs.next();
                count += 1;
            }
            compressed.push(count);
            compressed.push(byte);
        }
        Ok(compressed)
    }

    fn decompress(&self, data: &[u8], expected_size: Option<usize>) -> Result<Vec<u8>> {
        if data.len() % 2 != 0 {
            return Err(StackError::Decompression(
                "RLE data must have even length".to_string(),
            ));
        }
        let mut decompressed = Vec::with_capacity(expected_size.unwrap_or(0));
        for run in data.chunks_exact(2) {
            decompressed.extend(std::iter::repeat(run[1]).take(run[0] as usize));
        }
        Ok(decompressed)
    }

    fn method(&self) -> CompressionMethod {
        CompressionMethod::RLE
    }
}

/// Get a compressor for a given method
pub fn get_compressor(method: CompressionMethod) -> Box<dyn Compressor> {
    match method {
        CompressionMethod::None => Box::new(NoneCompressor),
        CompressionMethod::Deflate => Box::new(DeflateCompressor),
        CompressionMethod::RLE => Box::new(RLECompressor),
        CompressionMethod::Zstd => Box::new(ZstdCompressor),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(method: CompressionMethod, data: &[u8]) -> Vec<u8> {
        let compressor = get_compressor(method);
        let compressed = compressor
            .compress(data, CompressionLevel::default())
            .unwrap();
        compressor
            .decompress(&compressed, Some(data.len()))
            .unwrap()
    }

    #[test]
    fn test_codecs_recover_chunk() {
        let mut chunk: Vec<u8> = b"coherence ".repeat(50);
        chunk.extend(vec![0u8; 300]);
        for method in [
            CompressionMethod::None,
            CompressionMethod::Deflate,
            CompressionMethod::RLE,
            CompressionMethod::Zstd,
        ] {
            assert_eq!(roundtrip(method, &chunk), chunk, "{:?}", method);
        }
    }

    #[test]
    fn test_rle_long_runs_of_flags() {
        let flags = vec![1u8; 600];
        let compressed = RLECompressor
            .compress(&flags, CompressionLevel::default())
            .unwrap();
        // 255 + 255 + 90
        assert_eq!(compressed, vec![255, 1, 255, 1, 90, 1]);
    }

    #[test]
    fn test_rle_rejects_odd_input() {
        assert!(matches!(
            RLECompressor.decompress(&[3, 1, 2], None),
            Err(StackError::Decompression(_))
        ));
    }

    #[test]
    fn test_method_from_u8() {
        assert_eq!(CompressionMethod::from_u8(3), Some(CompressionMethod::Zstd));
        assert_eq!(CompressionMethod::from_u8(4), None);
    }
}
