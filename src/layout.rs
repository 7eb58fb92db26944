//! Array layout - shape, element type and how an array is divided into stored chunks

use crate::array::TemporalSelector;
use crate::compression::CompressionMethod;
use crate::error::{Result, StackError};
use crate::types::DataType;
use crate::utils::format_bytes;
use serde::{Deserialize, Serialize};

/// Shape and element type of a stored array, without its data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrayInfo {
    pub shape: Vec<usize>,
    pub data_type: DataType,
}

impl ArrayInfo {
    pub fn new(shape: Vec<usize>, data_type: DataType) -> Self {
        Self { shape, data_type }
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Extent of axis 0
    pub fn leading_len(&self) -> Option<usize> {
        self.shape.first().copied()
    }

    /// `(length, width)` of the last two axes
    pub fn spatial_extent(&self) -> Option<(usize, usize)> {
        match self.shape.as_slice() {
            [.., length, width] => Some((*length, *width)),
            _ => None,
        }
    }

    pub fn num_elements(&self) -> usize {
        self.shape.iter().product()
    }

    /// Uncompressed size in bytes, `None` for string arrays
    pub fn size_in_bytes(&self) -> Option<usize> {
        self.data_type
            .size_in_bytes()
            .map(|size| size * self.num_elements())
    }
}

/// On-disk layout of an array: one chunk, or one chunk per leading-axis slice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrayLayout {
    #[serde(flatten)]
    pub info: ArrayInfo,

    /// Codec applied to every chunk
    pub compression: CompressionMethod,

    /// One chunk per leading-axis slice
    pub chunked: bool,

    /// CRC32 of each compressed chunk, in chunk order
    pub checksums: Vec<u32>,
}

impl ArrayLayout {
    /// Create a layout; chunking applies to arrays of rank three or more only
    pub fn new(info: ArrayInfo, compression: CompressionMethod, chunked: bool) -> Self {
        let chunked = chunked && info.rank() >= 3;
        Self {
            info,
            compression,
            chunked,
            checksums: Vec::new(),
        }
    }

    /// Number of stored chunks
    pub fn chunk_count(&self) -> usize {
        if self.chunked {
            self.info.shape[0]
        } else {
            1
        }
    }

    /// Shape of the array held by one chunk
    pub fn chunk_shape(&self) -> Vec<usize> {
        if self.chunked {
            self.info.shape[1..].to_vec()
        } else {
            self.info.shape.clone()
        }
    }

    /// Chunks holding the selected leading-axis positions, in selection order
    pub fn chunks_for(&self, temporal: &TemporalSelector) -> Vec<usize> {
        if self.chunked {
            temporal.positions(self.info.shape[0])
        } else {
            vec![0]
        }
    }

    /// Verify a chunk's checksum
    pub fn verify_chunk(&self, index: usize, checksum: u32, name: &str) -> Result<()> {
        match self.checksums.get(index) {
            Some(&expected) if expected == checksum => Ok(()),
            Some(&expected) => Err(StackError::InvalidFormat(format!(
                "checksum mismatch in chunk {} of '{}': expected {:08x}, found {:08x}",
                index, name, expected, checksum
            ))),
            None => Err(StackError::InvalidFormat(format!(
                "no checksum recorded for chunk {} of '{}'",
                index, name
            ))),
        }
    }

    /// Get a summary string of the layout
    pub fn summary(&self) -> String {
        let size_str = self
            .info
            .shape
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(" x ");
        let bytes = self
            .info
            .size_in_bytes()
            .map(format_bytes)
            .unwrap_or_else(|| "variable size".to_string());

        format!(
            "{}D array: {} ({}), {} chunk(s), {} uncompressed, {:?}",
            self.info.rank(),
            size_str,
            self.info.data_type,
            self.chunk_count(),
            bytes,
            self.compression
        )
    }
}
