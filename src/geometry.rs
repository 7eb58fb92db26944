//! Geometry stacks: per-pixel rasters plus an optional per-epoch baseline cube

use crate::array::ArrayData;
use crate::catalog::{AxisKind, StackKind, DATE};
use crate::epoch::EpochKey;
use crate::error::{Result, StackError};
use crate::io::Container;
use crate::metadata::StackMetadata;
use crate::stack::StackHandle;
use crate::types::BoundingBox;

#[derive(Debug)]
pub struct Geometry<C> {
    handle: StackHandle<C>,
}

impl<C: Container> Geometry<C> {
    pub fn open(container: C) -> Result<Self> {
        Ok(Self {
            handle: StackHandle::open(container, StackKind::Geometry)?,
        })
    }

    /// Write a new geometry stack.
    ///
    /// Every dataset must be a catalog name; per-epoch datasets (`bperp`) need `dates`.
    pub fn create(
        container: C,
        datasets: Vec<(&str, ArrayData)>,
        dates: Option<&[EpochKey]>,
        metadata: StackMetadata,
    ) -> Result<Self> {
        let kind = StackKind::Geometry;
        for (name, data) in &datasets {
            let spec = kind
                .lookup(name)
                .ok_or_else(|| StackError::UnknownDataset(name.to_string()))?;
            let expected_rank = match spec.axis {
                AxisKind::Plain => 2,
                _ => 3,
            };
            if data.ndim() != expected_rank {
                return Err(StackError::InvalidDimensions(format!(
                    "geometry dataset '{}' must be {}-D, got shape {:?}",
                    name,
                    expected_rank,
                    data.shape()
                )));
            }
            if spec.axis == AxisKind::Epoch {
                let num_date = dates.map(|d| d.len()).unwrap_or(0);
                if num_date != data.shape()[0] {
                    return Err(StackError::InvalidDimensions(format!(
                        "'{}' has {} slices but {} dates were given",
                        name,
                        data.shape()[0],
                        num_date
                    )));
                }
            }
        }

        let mut arrays = datasets;
        if let Some(dates) = dates {
            arrays.push((DATE, ArrayData::text_vec(dates.iter().map(|d| d.to_string()).collect())));
        }
        Ok(Self {
            handle: StackHandle::create(container, kind, metadata, arrays, true)?,
        })
    }

    pub fn handle(&self) -> &StackHandle<C> {
        &self.handle
    }

    pub fn into_inner(self) -> C {
        self.handle.into_inner()
    }

    /// Read a raster, or `bperp` / `bperp-<date>`
    pub fn read(&self, name: &str, bbox: Option<BoundingBox>) -> Result<ArrayData> {
        self.handle.read(name, bbox, false)
    }

    /// Present datasets with `bperp` expanded into `bperp-<date>`
    pub fn dataset_list(&self) -> Result<Vec<String>> {
        self.handle.dataset_list()
    }

    pub fn is_geocoded(&self) -> Result<bool> {
        Ok(self.handle.state()?.metadata.is_geocoded())
    }

    /// `(length, width)` of the first present dataset
    pub fn size(&self) -> Result<(usize, usize)> {
        let state = self.handle.state()?;
        Ok((state.length, state.width))
    }
}
