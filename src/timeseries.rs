//! Time-series stacks: one displacement slice per epoch

use crate::array::ArrayData;
use crate::catalog::{StackKind, BPERP, DATE};
use crate::epoch::EpochKey;
use crate::error::{Result, StackError};
use crate::io::Container;
use crate::metadata::StackMetadata;
use crate::reduce;
use crate::stack::{StackHandle, StackIndex, StackState};
use crate::types::BoundingBox;
use ndarray::{Array1, Array2, Array3};
use std::sync::Arc;

/// Open time-series stack
#[derive(Debug)]
pub struct TimeSeries<C> {
    handle: StackHandle<C>,
}

impl<C: Container> TimeSeries<C> {
    pub fn open(container: C) -> Result<Self> {
        Ok(Self {
            handle: StackHandle::open(container, StackKind::TimeSeries)?,
        })
    }

    /// Write a new time-series stack of `(epochs, length, width)` displacements
    pub fn create(
        container: C,
        data: Array3<f32>,
        dates: &[EpochKey],
        bperp: Option<&[f32]>,
        metadata: StackMetadata,
    ) -> Result<Self> {
        let num_date = data.shape()[0];
        if dates.len() != num_date {
            return Err(StackError::InvalidDimensions(format!(
                "{} dates for {} time-series slices",
                dates.len(),
                num_date
            )));
        }

        let mut arrays = vec![
            (StackKind::TimeSeries.default_dataset(), ArrayData::F32(data.into_dyn())),
            (DATE, ArrayData::text_vec(dates.iter().map(|d| d.to_string()).collect())),
        ];
        if let Some(bperp) = bperp {
            if bperp.len() != num_date {
                return Err(StackError::InvalidDimensions(format!(
                    "{} perpendicular baselines for {} dates",
                    bperp.len(),
                    num_date
                )));
            }
            arrays.push((BPERP, ArrayData::F32(Array1::from(bperp.to_vec()).into_dyn())));
        }

        Ok(Self {
            handle: StackHandle::create(container, StackKind::TimeSeries, metadata, arrays, true)?,
        })
    }

    pub fn handle(&self) -> &StackHandle<C> {
        &self.handle
    }

    pub fn into_inner(self) -> C {
        self.handle.into_inner()
    }

    /// Read by dataset name or bare date (`"20161020"`)
    pub fn read(&self, name: &str, bbox: Option<BoundingBox>) -> Result<ArrayData> {
        self.handle.read(name, bbox, false)
    }

    fn state(&self) -> Result<Arc<StackState>> {
        self.handle.state()
    }

    /// Dates in storage order
    pub fn read_epochs(&self) -> Result<Vec<EpochKey>> {
        let state = self.state()?;
        match &state.index {
            StackIndex::Epochs(epochs) => Ok(epochs.storage_keys().to_vec()),
            _ => Err(StackError::MissingField(DATE.to_string())),
        }
    }

    /// `REF_DATE`, defaulting to the first stored date
    pub fn ref_date(&self) -> Result<EpochKey> {
        let dates = self.read_epochs()?;
        let reference = match self.state()?.metadata.ref_date()? {
            Some(key) => key,
            None => dates[0],
        };
        if !dates.contains(&reference) {
            return Err(StackError::UnknownEpoch(reference.to_string()));
        }
        Ok(reference)
    }

    /// Days from the reference date, storage order
    pub fn temporal_baselines(&self) -> Result<Vec<i64>> {
        let reference = self.ref_date()?;
        Ok(self
            .read_epochs()?
            .iter()
            .map(|d| d.days_since(&reference))
            .collect())
    }

    /// Perpendicular baselines relative to the reference date, `None` when not stored
    pub fn perp_baselines(&self) -> Result<Option<Vec<f64>>> {
        let container = self.handle.container();
        if !container.has_array(BPERP)? {
            return Ok(None);
        }
        let bperp: Vec<f64> = container.read_array(BPERP)?.into_f64()?.iter().copied().collect();
        let dates = self.read_epochs()?;
        if bperp.len() != dates.len() {
            return Err(StackError::InvalidFormat(format!(
                "{} perpendicular baselines for {} dates",
                bperp.len(),
                dates.len()
            )));
        }
        let reference = self.ref_date()?;
        let r = dates.iter().position(|d| *d == reference).unwrap_or(0);
        let base = bperp[r];
        Ok(Some(bperp.iter().map(|b| b - base).collect()))
    }

    /// Dates as fractional years, storage order
    pub fn decimal_years(&self) -> Result<Vec<f64>> {
        Ok(self.read_epochs()?.iter().map(|d| d.decimal_year()).collect())
    }

    /// Spatial standard deviation of each epoch of the default cube
    pub fn std_per_epoch(&self, mask: Option<&Array2<bool>>, bbox: Option<BoundingBox>) -> Result<Vec<f64>> {
        let (positions, bbox) = self.epoch_planes(bbox)?;
        reduce::std_per_slice(self.handle.container(), StackKind::TimeSeries.default_dataset(), &positions, mask, &bbox)
    }

    /// Spatial root mean square of each epoch of the default cube
    pub fn rms_per_epoch(&self, mask: Option<&Array2<bool>>, bbox: Option<BoundingBox>) -> Result<Vec<f64>> {
        let (positions, bbox) = self.epoch_planes(bbox)?;
        reduce::rms_per_slice(self.handle.container(), StackKind::TimeSeries.default_dataset(), &positions, mask, &bbox)
    }

    fn epoch_planes(&self, bbox: Option<BoundingBox>) -> Result<(Vec<usize>, BoundingBox)> {
        let plan = self.handle.resolve("", bbox, false)?;
        let positions = self.handle.slice_positions(&plan)?.unwrap_or_default();
        Ok((positions, plan.bbox()))
    }

    /// Spatial mean of every slice a name addresses
    pub fn spatial_average(
        &self,
        name: &str,
        mask: Option<&Array2<bool>>,
        bbox: Option<BoundingBox>,
    ) -> Result<Vec<f64>> {
        let plan = self.handle.resolve(name, bbox, false)?;
        let positions = self.handle.slice_positions(&plan)?;
        reduce::spatial_average(self.handle.container(), &plan.array, positions.as_deref(), mask, &plan.bbox())
    }

    /// Mean over every epoch a name addresses
    pub fn temporal_average(&self, name: &str, bbox: Option<BoundingBox>) -> Result<Array2<f32>> {
        let plan = self.handle.resolve(name, bbox, false)?;
        let positions = self
            .handle
            .slice_positions(&plan)?
            .ok_or_else(|| StackError::InvalidDimensions(format!("'{}' has no epoch axis", plan.array)))?;
        let scales = vec![1.0; positions.len()];
        reduce::temporal_average(self.handle.container(), &plan.array, &positions, &scales, &plan.bbox())
    }
}
