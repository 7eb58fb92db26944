//! Write-side configuration for containers

use crate::compression::{CompressionLevel, CompressionMethod};
use crate::types::DataType;
use serde::{Deserialize, Serialize};

/// How arrays are encoded when written to a directory container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteOptions {
    /// Codec for numeric and string chunks
    pub compression: CompressionMethod,

    /// Codec for boolean arrays
    pub flag_compression: CompressionMethod,

    pub level: CompressionLevel,

    /// Allow cubes to be chunked per leading-axis slice; when off every array is one chunk
    pub chunked: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            compression: CompressionMethod::Zstd,
            flag_compression: CompressionMethod::RLE,
            level: CompressionLevel::default(),
            chunked: true,
        }
    }
}

impl WriteOptions {
    pub fn with_compression(mut self, method: CompressionMethod) -> Self {
        self.compression = method;
        self
    }

    pub fn with_flag_compression(mut self, method: CompressionMethod) -> Self {
        self.flag_compression = method;
        self
    }

    pub fn with_level(mut self, level: CompressionLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_chunked(mut self, chunked: bool) -> Self {
        self.chunked = chunked;
        self
    }

    /// Codec used for an array of the given element type
    pub fn method_for(&self, data_type: DataType) -> CompressionMethod {
        if data_type == DataType::Bool {
            self.flag_compression
        } else {
            self.compression
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders() {
        let options = WriteOptions::default()
            .with_compression(CompressionMethod::Deflate)
            .with_flag_compression(CompressionMethod::None)
            .with_level(CompressionLevel::best())
            .with_chunked(false);
        assert_eq!(options.method_for(DataType::F32), CompressionMethod::Deflate);
        assert_eq!(options.method_for(DataType::Bool), CompressionMethod::None);
        assert_eq!(options.level.value(), 9);
        assert!(!options.chunked);
    }

    #[test]
    fn test_partial_json() {
        let options: WriteOptions = serde_json::from_str(r#"{"compression":"None"}"#).unwrap();
        assert_eq!(options.compression, CompressionMethod::None);
        assert_eq!(options.flag_compression, CompressionMethod::RLE);
        assert!(options.chunked);
    }
}
