//! Directory container - attributes, layout headers and compressed chunks on the local file system
//!
//! ```text
//! <root>/attrs.json
//! <root>/arrays/<name>.json            layout header
//! <root>/arrays/<name>/<index>.chunk   compressed bincode element vector
//! ```

use crate::array::{with_array, ArrayData, Selection, TemporalSelector};
use crate::compression::get_compressor;
use crate::config::WriteOptions;
use crate::error::{Result, StackError};
use crate::io::{AccessMode, Attributes, Container, StorageBackend};
use crate::layout::{ArrayInfo, ArrayLayout};
use crate::types::{AttrValue, DataType};
use crate::utils::{calculate_checksum, chunk_path, is_valid_array_name, layout_path};
use bytes::Bytes;
use ndarray::{ArrayD, IxDyn};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};

const ATTRS_FILE: &str = "attrs.json";
const ARRAYS_DIR: &str = "arrays";

/// Container stored as a directory tree
#[derive(Debug)]
pub struct DirContainer {
    root: PathBuf,
    mode: AccessMode,
    options: WriteOptions,
    attrs: Attributes,
}

impl DirContainer {
    /// Open an existing container directory
    pub fn open(path: impl AsRef<Path>, mode: AccessMode) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        let attrs_path = root.join(ATTRS_FILE);
        if !attrs_path.is_file() {
            return Err(StackError::NotFound(format!(
                "no container at {}",
                root.display()
            )));
        }
        let attrs: Attributes = serde_json::from_slice(&fs::read(&attrs_path)?)?;
        log::debug!("Opened container {} ({:?})", root.display(), mode);
        Ok(Self {
            root,
            mode,
            options: WriteOptions::default(),
            attrs,
        })
    }

    /// Create an empty container, open for update
    pub fn create(path: impl AsRef<Path>, options: WriteOptions) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        if root.join(ATTRS_FILE).exists() {
            return Err(StackError::AlreadyExists(root.display().to_string()));
        }
        fs::create_dir_all(root.join(ARRAYS_DIR))?;
        let container = Self {
            root,
            mode: AccessMode::Update,
            options,
            attrs: Attributes::new(),
        };
        container.persist_attrs()?;
        Ok(container)
    }

    /// Replace the options used by subsequent writes
    pub fn with_options(mut self, options: WriteOptions) -> Self {
        self.options = options;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn options(&self) -> &WriteOptions {
        &self.options
    }

    /// Layout header of an array, `None` when absent
    pub fn layout(&self, name: &str) -> Result<Option<ArrayLayout>> {
        if !is_valid_array_name(name) {
            return Ok(None);
        }
        let path = self.root.join(layout_path(name));
        if !path.is_file() {
            return Ok(None);
        }
        let layout = serde_json::from_slice(&fs::read(&path)?)?;
        Ok(Some(layout))
    }

    /// Compressed bytes of one chunk, checksum verified
    pub fn read_raw_chunk(&self, layout: &ArrayLayout, name: &str, index: usize) -> Result<Bytes> {
        let raw = Bytes::from(fs::read(self.root.join(chunk_path(name, index)))?);
        layout.verify_chunk(index, calculate_checksum(&raw), name)?;
        Ok(raw)
    }

    fn require_layout(&self, name: &str) -> Result<ArrayLayout> {
        self.layout(name)?
            .ok_or_else(|| StackError::NotFound(name.to_string()))
    }

    fn persist_attrs(&self) -> Result<()> {
        fs::write(
            self.root.join(ATTRS_FILE),
            serde_json::to_vec_pretty(&self.attrs)?,
        )?;
        Ok(())
    }

    fn write_layout(&self, name: &str, layout: &ArrayLayout) -> Result<()> {
        fs::write(
            self.root.join(layout_path(name)),
            serde_json::to_vec_pretty(layout)?,
        )?;
        Ok(())
    }

    fn read_chunk(&self, layout: &ArrayLayout, name: &str, index: usize) -> Result<ArrayData> {
        let raw = self.read_raw_chunk(layout, name, index)?;
        let shape = layout.chunk_shape();
        let expected_size = layout
            .info
            .data_type
            .size_in_bytes()
            .map(|size| 8 + size * shape.iter().product::<usize>());
        let payload = get_compressor(layout.compression).decompress(&raw, expected_size)?;

        log::debug!("Decoded chunk {} of '{}' ({} bytes)", index, name, raw.len());
        Ok(match layout.info.data_type {
            DataType::Bool => ArrayData::Bool(decode_elements(&payload, &shape, name)?),
            DataType::I16 => ArrayData::I16(decode_elements(&payload, &shape, name)?),
            DataType::I32 => ArrayData::I32(decode_elements(&payload, &shape, name)?),
            DataType::I64 => ArrayData::I64(decode_elements(&payload, &shape, name)?),
            DataType::F32 => ArrayData::F32(decode_elements(&payload, &shape, name)?),
            DataType::F64 => ArrayData::F64(decode_elements(&payload, &shape, name)?),
            DataType::Text => ArrayData::Text(decode_elements(&payload, &shape, name)?),
        })
    }

    /// Encode, compress and store one chunk; returns its checksum
    fn write_chunk(&self, layout: &ArrayLayout, name: &str, index: usize, chunk: &ArrayData) -> Result<u32> {
        let payload = with_array!(chunk, a => bincode::serialize(&a.iter().collect::<Vec<_>>()))?;
        let compressed = get_compressor(layout.compression).compress(&payload, self.options.level)?;
        fs::write(self.root.join(chunk_path(name, index)), &compressed)?;
        Ok(calculate_checksum(&compressed))
    }
}

fn decode_elements<T: DeserializeOwned>(payload: &[u8], shape: &[usize], name: &str) -> Result<ArrayD<T>> {
    let elements: Vec<T> = bincode::deserialize(payload)?;
    ArrayD::from_shape_vec(IxDyn(shape), elements).map_err(|e| {
        StackError::InvalidFormat(format!("chunk of '{}' does not match shape {:?}: {}", name, shape, e))
    })
}

impl Container for DirContainer {
    fn mode(&self) -> AccessMode {
        self.mode
    }

    fn attrs(&self) -> Result<Attributes> {
        Ok(self.attrs.clone())
    }

    fn array_names(&self) -> Result<Vec<String>> {
        let dir = self.root.join(ARRAYS_DIR);
        let mut names = Vec::new();
        if dir.is_dir() {
            for entry in fs::read_dir(&dir)? {
                let path = entry?.path();
                if path.extension().and_then(|e| e.to_str()) == Some("json") {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        names.push(stem.to_string());
                    }
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn array_info(&self, name: &str) -> Result<Option<ArrayInfo>> {
        Ok(self.layout(name)?.map(|layout| layout.info))
    }

    fn read_slice(&self, name: &str, selection: &Selection) -> Result<ArrayData> {
        let layout = self.require_layout(name)?;
        selection.check(&layout.info.shape, name)?;

        if !layout.chunked {
            return self.read_chunk(&layout, name, 0)?.select(selection, name);
        }

        let chunks = layout.chunks_for(&selection.temporal);
        log::debug!("Reading {} of {} chunk(s) of '{}'", chunks.len(), layout.chunk_count(), name);
        if chunks.is_empty() {
            return Ok(ArrayData::zeros(
                layout.info.data_type,
                &selection.output_shape(&layout.info.shape),
            ));
        }

        let spatial = Selection {
            temporal: TemporalSelector::All,
            rows: selection.rows.clone(),
            cols: selection.cols.clone(),
        };
        let mut parts = Vec::with_capacity(chunks.len());
        for index in chunks {
            parts.push(self.read_chunk(&layout, name, index)?.select(&spatial, name)?);
        }
        ArrayData::stack_leading(layout.info.data_type, parts)
    }

    fn write_array(&mut self, name: &str, data: ArrayData, chunked: bool) -> Result<()> {
        self.ensure_writable(name)?;
        if !is_valid_array_name(name) {
            return Err(StackError::Configuration(format!("invalid array name '{}'", name)));
        }

        let info = ArrayInfo::new(data.shape().to_vec(), data.data_type());
        let chunked = chunked && self.options.chunked;
        let mut layout = ArrayLayout::new(info, self.options.method_for(data.data_type()), chunked);

        let chunk_dir = self.root.join(ARRAYS_DIR).join(name);
        if chunk_dir.exists() {
            fs::remove_dir_all(&chunk_dir)?;
        }
        fs::create_dir_all(&chunk_dir)?;

        if layout.chunked {
            for index in 0..layout.chunk_count() {
                let checksum = self.write_chunk(&layout, name, index, &data.index_leading(index))?;
                layout.checksums.push(checksum);
            }
        } else {
            let checksum = self.write_chunk(&layout, name, 0, &data)?;
            layout.checksums.push(checksum);
        }
        self.write_layout(name, &layout)?;

        log::debug!("Wrote '{}': {}", name, layout.summary());
        Ok(())
    }

    fn write_attr(&mut self, key: &str, value: AttrValue) -> Result<()> {
        self.ensure_writable(key)?;
        self.attrs.insert(key.to_string(), value);
        self.persist_attrs()
    }

    fn update_slice(&mut self, name: &str, temporal: &TemporalSelector, values: ArrayData) -> Result<()> {
        self.ensure_writable(name)?;
        let mut layout = self.require_layout(name)?;
        if values.data_type() != layout.info.data_type {
            return Err(StackError::InvalidDataType {
                expected: layout.info.data_type.to_string(),
                found: values.data_type().to_string(),
            });
        }

        if !layout.chunked {
            let mut whole = self.read_chunk(&layout, name, 0)?;
            whole.assign_leading(temporal, &values, name)?;
            layout.checksums = vec![self.write_chunk(&layout, name, 0, &whole)?];
            return self.write_layout(name, &layout);
        }

        let axis_len = layout.info.shape[0];
        temporal.check(axis_len, name)?;
        let positions = temporal.positions(axis_len);
        let chunk_shape = layout.chunk_shape();

        let single = positions.len() == 1 && values.shape() == chunk_shape.as_slice();
        if !single {
            let mut expected = vec![positions.len()];
            expected.extend_from_slice(&chunk_shape);
            if values.shape() != expected.as_slice() {
                return Err(StackError::InvalidDimensions(format!(
                    "update of '{}' expects shape {:?}, got {:?}",
                    name,
                    expected,
                    values.shape()
                )));
            }
        }

        for (k, &index) in positions.iter().enumerate() {
            let checksum = if single {
                self.write_chunk(&layout, name, index, &values)?
            } else {
                self.write_chunk(&layout, name, index, &values.index_leading(k))?
            };
            layout.checksums[index] = checksum;
        }
        self.write_layout(name, &layout)
    }

    fn backend(&self) -> StorageBackend {
        StorageBackend::FileSystem
    }
}
