//! Container access - the attribute and N-D array store that stacks live in

use crate::array::{ArrayData, Selection, TemporalSelector};
use crate::error::{Result, StackError};
use crate::layout::ArrayInfo;
use crate::store::DirContainer;
use crate::types::AttrValue;
use crate::utils::is_valid_array_name;
use std::collections::BTreeMap;

/// Root attributes of a container
pub type Attributes = BTreeMap<String, AttrValue>;

/// Storage backend types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// Directory on the local file system
    FileSystem,
    /// Process memory, nothing persisted
    Memory,
}

impl StorageBackend {
    /// Parse storage backend from URL scheme
    pub fn from_url(url: &str) -> Result<Self> {
        if let Some(scheme_end) = url.find("://") {
            let scheme = &url[..scheme_end];
            match scheme {
                "file" => Ok(StorageBackend::FileSystem),
                "mem" => Ok(StorageBackend::Memory),
                _ => Err(StackError::InvalidUrl(format!("Unknown scheme: {}", scheme))),
            }
        } else {
            // Assume file system if no scheme
            Ok(StorageBackend::FileSystem)
        }
    }
}

/// Whether a container accepts writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    Update,
}

/// Generic key-value plus N-D array store.
///
/// Implementations are synchronous; writers need exclusive access.
pub trait Container {
    fn mode(&self) -> AccessMode;

    /// All root attributes
    fn attrs(&self) -> Result<Attributes>;

    /// Names of stored arrays, sorted
    fn array_names(&self) -> Result<Vec<String>>;

    /// Shape and element type of an array, `None` when absent
    fn array_info(&self, name: &str) -> Result<Option<ArrayInfo>>;

    /// Read a bounded selection of an array
    fn read_slice(&self, name: &str, selection: &Selection) -> Result<ArrayData>;

    /// Create or replace a whole array
    fn write_array(&mut self, name: &str, data: ArrayData, chunked: bool) -> Result<()>;

    fn write_attr(&mut self, key: &str, value: AttrValue) -> Result<()>;

    /// Overwrite leading-axis positions of an existing array
    fn update_slice(&mut self, name: &str, temporal: &TemporalSelector, values: ArrayData) -> Result<()>;

    fn backend(&self) -> StorageBackend;

    /// Read a whole array
    fn read_array(&self, name: &str) -> Result<ArrayData> {
        self.read_slice(name, &Selection::all())
    }

    fn has_array(&self, name: &str) -> Result<bool> {
        Ok(self.array_info(name)?.is_some())
    }

    /// Fail with `ReadOnly` unless the container was opened for update
    fn ensure_writable(&self, what: &str) -> Result<()> {
        match self.mode() {
            AccessMode::Update => Ok(()),
            AccessMode::Read => Err(StackError::ReadOnly(what.to_string())),
        }
    }
}

impl<C: Container + ?Sized> Container for Box<C> {
    fn mode(&self) -> AccessMode {
        (**self).mode()
    }

    fn attrs(&self) -> Result<Attributes> {
        (**self).attrs()
    }

    fn array_names(&self) -> Result<Vec<String>> {
        (**self).array_names()
    }

    fn array_info(&self, name: &str) -> Result<Option<ArrayInfo>> {
        (**self).array_info(name)
    }

    fn read_slice(&self, name: &str, selection: &Selection) -> Result<ArrayData> {
        (**self).read_slice(name, selection)
    }

    fn write_array(&mut self, name: &str, data: ArrayData, chunked: bool) -> Result<()> {
        (**self).write_array(name, data, chunked)
    }

    fn write_attr(&mut self, key: &str, value: AttrValue) -> Result<()> {
        (**self).write_attr(key, value)
    }

    fn update_slice(&mut self, name: &str, temporal: &TemporalSelector, values: ArrayData) -> Result<()> {
        (**self).update_slice(name, temporal, values)
    }

    fn backend(&self) -> StorageBackend {
        (**self).backend()
    }
}

/// In-memory container
#[derive(Debug, Clone)]
pub struct MemoryContainer {
    mode: AccessMode,
    attrs: Attributes,
    arrays: BTreeMap<String, ArrayData>,
}

impl Default for MemoryContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryContainer {
    /// Create an empty container open for update
    pub fn new() -> Self {
        Self {
            mode: AccessMode::Update,
            attrs: Attributes::new(),
            arrays: BTreeMap::new(),
        }
    }

    /// Reopen the same content with a different access mode
    pub fn with_mode(mut self, mode: AccessMode) -> Self {
        self.mode = mode;
        self
    }
}

impl Container for MemoryContainer {
    fn mode(&self) -> AccessMode {
        self.mode
    }

    fn attrs(&self) -> Result<Attributes> {
        Ok(self.attrs.clone())
    }

    fn array_names(&self) -> Result<Vec<String>> {
        Ok(self.arrays.keys().cloned().collect())
    }

    fn array_info(&self, name: &str) -> Result<Option<ArrayInfo>> {
        Ok(self
            .arrays
            .get(name)
            .map(|data| ArrayInfo::new(data.shape().to_vec(), data.data_type())))
    }

    fn read_slice(&self, name: &str, selection: &Selection) -> Result<ArrayData> {
        let data = self
            .arrays
            .get(name)
            .ok_or_else(|| StackError::NotFound(name.to_string()))?;
        data.select(selection, name)
    }

    fn write_array(&mut self, name: &str, data: ArrayData, _chunked: bool) -> Result<()> {
        self.ensure_writable(name)?;
        if !is_valid_array_name(name) {
            return Err(StackError::Configuration(format!("invalid array name '{}'", name)));
        }
        self.arrays.insert(name.to_string(), data);
        Ok(())
    }

    fn write_attr(&mut self, key: &str, value: AttrValue) -> Result<()> {
        self.ensure_writable(key)?;
        self.attrs.insert(key.to_string(), value);
        Ok(())
    }

    fn update_slice(&mut self, name: &str, temporal: &TemporalSelector, values: ArrayData) -> Result<()> {
        self.ensure_writable(name)?;
        let target = self
            .arrays
            .get_mut(name)
            .ok_or_else(|| StackError::NotFound(name.to_string()))?;
        target.assign_leading(temporal, &values, name)
    }

    fn backend(&self) -> StorageBackend {
        StorageBackend::Memory
    }
}

/// Parse URL and open the matching container.
///
/// `mem://` URLs yield a fresh, empty in-memory container.
pub fn open_container(url: &str, mode: AccessMode) -> Result<Box<dyn Container>> {
    match StorageBackend::from_url(url)? {
        StorageBackend::FileSystem => {
            let path = url.strip_prefix("file://").unwrap_or(url);
            Ok(Box::new(DirContainer::open(path, mode)?))
        }
        StorageBackend::Memory => Ok(Box::new(MemoryContainer::new().with_mode(mode))),
    }
}
