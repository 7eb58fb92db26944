//! Stack metadata - typed view over the root attributes of a container

use crate::catalog::StackKind;
use crate::epoch::EpochKey;
use crate::error::{Result, StackError};
use crate::io::{Attributes, Container};
use crate::types::AttrValue;
use chrono::{DateTime, FixedOffset, Utc};

pub const FILE_TYPE: &str = "FILE_TYPE";
pub const REF_DATE: &str = "REF_DATE";
pub const WAVELENGTH: &str = "WAVELENGTH";
pub const Y_FIRST: &str = "Y_FIRST";
pub const LENGTH: &str = "LENGTH";
pub const WIDTH: &str = "WIDTH";
pub const MODIFIED: &str = "MODIFIED";

/// Root attributes of a stack
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StackMetadata {
    attrs: Attributes,
}

impl StackMetadata {
    pub fn new(attrs: Attributes) -> Self {
        Self { attrs }
    }

    /// Metadata for a fresh stack of the given kind
    pub fn for_kind(kind: StackKind) -> Self {
        let mut metadata = Self::default();
        metadata.set(FILE_TYPE, kind.file_type());
        metadata
    }

    /// Load the attributes of a container
    pub fn load<C: Container + ?Sized>(container: &C) -> Result<Self> {
        Ok(Self::new(container.attrs()?))
    }

    pub fn attrs(&self) -> &Attributes {
        &self.attrs
    }

    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.attrs.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<AttrValue>) {
        self.attrs.insert(key.into(), value.into());
    }

    /// Raw `FILE_TYPE` value
    pub fn file_type(&self) -> Option<String> {
        self.get(FILE_TYPE).map(|v| v.to_string())
    }

    /// Stack kind recorded in `FILE_TYPE`
    pub fn kind(&self) -> Result<StackKind> {
        let file_type = self
            .file_type()
            .ok_or_else(|| StackError::MissingField(FILE_TYPE.to_string()))?;
        StackKind::from_file_type(&file_type)
            .ok_or_else(|| StackError::Metadata(format!("unsupported {}: {}", FILE_TYPE, file_type)))
    }

    /// Reference date, `None` when the attribute is absent
    pub fn ref_date(&self) -> Result<Option<EpochKey>> {
        self.get(REF_DATE)
            .map(|v| EpochKey::parse(&v.to_string()))
            .transpose()
    }

    /// Radar wavelength in meters
    pub fn wavelength(&self) -> Result<f64> {
        let value = self
            .get(WAVELENGTH)
            .ok_or_else(|| StackError::MissingField(WAVELENGTH.to_string()))?;
        value
            .as_f64()
            .ok_or_else(|| StackError::Metadata(format!("{} is not a number: {}", WAVELENGTH, value)))
    }

    /// Geocoded stacks carry a `Y_FIRST` coordinate
    pub fn is_geocoded(&self) -> bool {
        self.attrs.contains_key(Y_FIRST)
    }

    pub fn length(&self) -> Option<usize> {
        self.get(LENGTH).and_then(|v| v.as_i64()).and_then(|v| usize::try_from(v).ok())
    }

    pub fn width(&self) -> Option<usize> {
        self.get(WIDTH).and_then(|v| v.as_i64()).and_then(|v| usize::try_from(v).ok())
    }

    pub fn modified(&self) -> Option<DateTime<FixedOffset>> {
        self.get(MODIFIED)
            .and_then(|v| v.as_str())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
    }

    /// Update modification timestamp
    pub fn touch(&mut self) {
        self.set(MODIFIED, Utc::now().to_rfc3339());
    }

    /// Write every attribute to a container
    pub fn write_to<C: Container + ?Sized>(&self, container: &mut C) -> Result<()> {
        for (key, value) in &self.attrs {
            container.write_attr(key, value.clone())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryContainer;

    #[test]
    fn test_typed_accessors() {
        let mut metadata = StackMetadata::for_kind(StackKind::IfgramStack);
        metadata.set(WAVELENGTH, 0.05546576);
        metadata.set(REF_DATE, 20200113i64);
        metadata.set(LENGTH, "450");

        assert_eq!(metadata.kind().unwrap(), StackKind::IfgramStack);
        assert_eq!(metadata.wavelength().unwrap(), 0.05546576);
        assert_eq!(
            metadata.ref_date().unwrap(),
            Some(EpochKey::parse("20200113").unwrap())
        );
        assert_eq!(metadata.length(), Some(450));
        assert_eq!(metadata.width(), None);
        assert!(!metadata.is_geocoded());

        metadata.set(Y_FIRST, 34.2);
        assert!(metadata.is_geocoded());
    }

    #[test]
    fn test_negative_size_is_absent() {
        let mut metadata = StackMetadata::default();
        metadata.set(LENGTH, -5i64);
        metadata.set(WIDTH, "-1");
        assert_eq!(metadata.length(), None);
        assert_eq!(metadata.width(), None);
    }

    #[test]
    fn test_missing_fields() {
        let metadata = StackMetadata::default();
        assert!(matches!(metadata.kind(), Err(StackError::MissingField(_))));
        assert!(matches!(metadata.wavelength(), Err(StackError::MissingField(_))));
        assert_eq!(metadata.ref_date().unwrap(), None);

        let mut metadata = StackMetadata::default();
        metadata.set(FILE_TYPE, "velocity");
        assert!(matches!(metadata.kind(), Err(StackError::Metadata(_))));
        metadata.set(REF_DATE, "2020-01-01");
        assert!(matches!(metadata.ref_date(), Err(StackError::MalformedDate(_))));
    }

    #[test]
    fn test_touch_and_write() {
        let mut metadata = StackMetadata::for_kind(StackKind::TimeSeries);
        assert!(metadata.modified().is_none());
        metadata.touch();
        assert!(metadata.modified().is_some());

        let mut container = MemoryContainer::new();
        metadata.write_to(&mut container).unwrap();
        let loaded = StackMetadata::load(&container).unwrap();
        assert_eq!(loaded, metadata);
    }
}
