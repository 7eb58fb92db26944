//! Interferogram stacks: one slice per pair, with keep flags and network inversion

use crate::array::{ArrayData, TemporalSelector};
use crate::catalog::{AxisKind, StackKind, ValueScaling, BPERP, DATE, DROP_IFGRAM};
use crate::drop_mask::DropMask;
use crate::epoch::{EpochKey, PairIndex, PairKey};
use crate::error::{Result, StackError};
use crate::io::Container;
use crate::metadata::{StackMetadata, MODIFIED};
use crate::network::{self, DesignMatrices};
use crate::reduce;
use crate::stack::{StackHandle, StackIndex, StackState};
use crate::types::{AttrValue, BoundingBox};
use chrono::Utc;
use ndarray::{Array1, Array2};
use std::collections::BTreeSet;
use std::f64::consts::PI;
use std::sync::Arc;

/// Days per year used to convert temporal baselines
const DAYS_PER_YEAR: f64 = 365.25;

const CONNECT_COMPONENT: &str = "connectComponent";

#[derive(Debug)]
pub struct IfgramStack<C> {
    handle: StackHandle<C>,
}

impl<C: Container> IfgramStack<C> {
    pub fn open(container: C) -> Result<Self> {
        Ok(Self {
            handle: StackHandle::open(container, StackKind::IfgramStack)?,
        })
    }

    /// Write a new interferogram stack with every pair kept.
    ///
    /// Every dataset must be a pair-indexed catalog cube with one slice per pair.
    pub fn create(
        container: C,
        pairs: &[PairKey],
        bperp: &[f32],
        datasets: Vec<(&str, ArrayData)>,
        metadata: StackMetadata,
    ) -> Result<Self> {
        let kind = StackKind::IfgramStack;
        let num_pair = pairs.len();
        if num_pair == 0 {
            return Err(StackError::EmptyIndex("no pairs".to_string()));
        }
        if bperp.len() != num_pair {
            return Err(StackError::InvalidDimensions(format!(
                "{} perpendicular baselines for {} pairs",
                bperp.len(),
                num_pair
            )));
        }
        for (name, data) in &datasets {
            let spec = kind
                .lookup(name)
                .ok_or_else(|| StackError::UnknownDataset(name.to_string()))?;
            if spec.axis != AxisKind::Pair || data.ndim() != 3 || data.shape()[0] != num_pair {
                return Err(StackError::InvalidDimensions(format!(
                    "'{}' must have shape ({}, length, width), got {:?}",
                    name,
                    num_pair,
                    data.shape()
                )));
            }
        }

        let dates: Vec<String> = pairs
            .iter()
            .flat_map(|p| [p.first.to_string(), p.second.to_string()])
            .collect();
        let dates = Array2::from_shape_vec((num_pair, 2), dates)
            .map_err(|e| StackError::InvalidDimensions(e.to_string()))?;

        let mut arrays = vec![
            (DATE, ArrayData::Text(dates.into_dyn())),
            (BPERP, ArrayData::F32(Array1::from(bperp.to_vec()).into_dyn())),
            (DROP_IFGRAM, ArrayData::Bool(Array1::from_elem(num_pair, true).into_dyn())),
        ];
        arrays.extend(datasets);
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

    /// Re-read index and keep flags from the container
    pub fn refresh(&self) -> Result<()> {
        self.handle.refresh().map(|_| ())
    }

    /// Read a cube, or one pair of it (`unwrapPhase-20161020_20161026`)
    pub fn read(&self, name: &str, bbox: Option<BoundingBox>, apply_filter: bool) -> Result<ArrayData> {
        self.handle.read(name, bbox, apply_filter)
    }

    fn network(&self) -> Result<(Arc<StackState>, PairIndex, DropMask)> {
        let state = self.handle.state()?;
        let (index, mask) = match &state.index {
            StackIndex::Pairs { index, mask } => (index.clone(), mask.clone()),
            _ => return Err(StackError::MissingField(DATE.to_string())),
        };
        Ok((state, index, mask))
    }

    /// Pair index over the kept pairs, or all pairs
    pub fn pair_index(&self, apply_filter: bool) -> Result<PairIndex> {
        let (_, index, mask) = self.network()?;
        mask.filtered_index(&index, apply_filter)
    }

    pub fn keep_flags(&self) -> Result<Vec<bool>> {
        let (_, _, mask) = self.network()?;
        Ok(mask.keep().to_vec())
    }

    /// Pair keys in storage order
    pub fn pair_keys(&self, apply_filter: bool) -> Result<Vec<PairKey>> {
        let (_, index, mask) = self.network()?;
        Ok(mask.filtered_keys(&index, apply_filter))
    }

    /// Epochs spanned by the (kept) pairs, chronological
    pub fn epoch_keys(&self, apply_filter: bool) -> Result<Vec<EpochKey>> {
        Ok(self.pair_index(apply_filter)?.epochs().keys())
    }

    /// Temporal baseline of each pair in days
    pub fn temporal_baselines(&self, apply_filter: bool) -> Result<Vec<i64>> {
        let (_, index, mask) = self.network()?;
        Ok(mask
            .filtered_pairs(&index, apply_filter)
            .iter()
            .map(|p| p.delta_days)
            .collect())
    }

    /// Stored perpendicular baseline of each pair
    pub fn perp_baselines(&self, apply_filter: bool) -> Result<Vec<f64>> {
        let (_, index, mask) = self.network()?;
        let bperp: Vec<f64> = self
            .handle
            .container()
            .read_array(BPERP)?
            .into_f64()?
            .iter()
            .copied()
            .collect();
        if bperp.len() != index.len() {
            return Err(StackError::InvalidFormat(format!(
                "{} perpendicular baselines for {} pairs",
                bperp.len(),
                index.len()
            )));
        }
        Ok(mask
            .filtered_indices(apply_filter)
            .into_iter()
            .map(|i| bperp[i])
            .collect())
    }

    /// Every `<cube>-<pair>` name
    pub fn dataset_list(&self) -> Result<Vec<String>> {
        self.handle.dataset_list()
    }

    /// Drop exactly the given pairs and persist the keep flags.
    ///
    /// Returns whether any flag changed. Cached state is re-derived on next use.
    /// `MODIFIED` is written before the flags; a failed flag write leaves the stored flags unchanged.
    pub fn set_keep<S: AsRef<str>>(&mut self, to_drop: &[S]) -> Result<bool> {
        let (_, index, mut mask) = self.network()?;
        let to_drop = to_drop
            .iter()
            .map(|s| PairKey::parse(s.as_ref()).map_err(|_| StackError::UnknownPair(s.as_ref().to_string())))
            .collect::<Result<BTreeSet<_>>>()?;
        let changed = mask.set_keep(&index, &to_drop)?;

        let keep = ArrayData::Bool(Array1::from(mask.keep().to_vec()).into_dyn());
        let container = self.handle.container_mut();
        container.write_attr(MODIFIED, AttrValue::from(Utc::now().to_rfc3339()))?;
        if container.has_array(DROP_IFGRAM)? {
            container.update_slice(DROP_IFGRAM, &TemporalSelector::All, keep)?;
        } else {
            container.write_array(DROP_IFGRAM, keep, false)?;
        }

        log::info!(
            "Updated {}: dropped {} of {} pairs",
            DROP_IFGRAM,
            index.len() - mask.num_kept(),
            index.len()
        );
        Ok(changed)
    }

    /// Incidence and time-weighted design matrices of the (kept) network
    pub fn design_matrices(&self, reference: Option<&EpochKey>, apply_filter: bool) -> Result<DesignMatrices> {
        network::design_matrices(&self.pair_index(apply_filter)?, reference)
    }

    /// Perpendicular-baseline time series, one value per epoch, zero at the first epoch
    pub fn perp_baseline_time_series(&self, apply_filter: bool) -> Result<Vec<f64>> {
        let index = self.pair_index(apply_filter)?;
        let bperp = self.perp_baselines(apply_filter)?;
        network::perp_baseline_time_series(&index, &bperp)
    }

    /// Invert one observation per (kept) pair into a series over `epoch_keys`
    pub fn invert_epoch_series(
        &self,
        observations: &[f64],
        reference: Option<&EpochKey>,
        apply_filter: bool,
    ) -> Result<Vec<f64>> {
        network::invert_epoch_series(&self.pair_index(apply_filter)?, observations, reference)
    }

    /// Spatial mean of every slice a name addresses
    pub fn spatial_average(
        &self,
        name: &str,
        mask: Option<&Array2<bool>>,
        bbox: Option<BoundingBox>,
        apply_filter: bool,
    ) -> Result<Vec<f64>> {
        let plan = self.handle.resolve(name, bbox, apply_filter)?;
        let positions = self.handle.slice_positions(&plan)?;
        reduce::spatial_average(self.handle.container(), &plan.array, positions.as_deref(), mask, &plan.bbox())
    }

    /// Mean over the (kept) pairs of a cube.
    ///
    /// Unwrapped phase is converted to range rate (m/year) pair by pair first.
    pub fn temporal_average(&self, name: &str, bbox: Option<BoundingBox>, apply_filter: bool) -> Result<Array2<f32>> {
        let plan = self.handle.resolve(name, bbox, apply_filter)?;
        let positions = self
            .handle
            .slice_positions(&plan)?
            .ok_or_else(|| StackError::InvalidDimensions(format!("'{}' has no pair axis", plan.array)))?;

        let scaling = StackKind::IfgramStack
            .lookup(&plan.array)
            .map(|s| s.scaling)
            .unwrap_or(ValueScaling::None);
        let scales = match scaling {
            ValueScaling::None => vec![1.0; positions.len()],
            ValueScaling::PhaseToRangeRate => {
                let (state, index, _) = self.network()?;
                let phase_to_range = -state.metadata.wavelength()? / (4.0 * PI);
                positions
                    .iter()
                    .map(|&p| {
                        let pair = index.pairs()[p];
                        if pair.delta_days == 0 {
                            return Err(StackError::Metadata(format!(
                                "pair {} has a zero temporal baseline",
                                index.keys()[p]
                            )));
                        }
                        Ok((phase_to_range / (pair.delta_days as f64 / DAYS_PER_YEAR)) as f32)
                    })
                    .collect::<Result<Vec<_>>>()?
            }
        };
        reduce::temporal_average(self.handle.container(), &plan.array, &positions, &scales, &plan.bbox())
    }

    /// Pixels non-zero in every (kept) slice of `name`.
    ///
    /// Defaults to `connectComponent` when stored, otherwise `unwrapPhase`.
    pub fn nonzero_mask(&self, name: Option<&str>, bbox: Option<BoundingBox>, apply_filter: bool) -> Result<Array2<bool>> {
        let name = match name {
            Some(name) => name,
            None if self.handle.container().has_array(CONNECT_COMPONENT)? => CONNECT_COMPONENT,
            None => StackKind::IfgramStack.default_dataset(),
        };
        let plan = self.handle.resolve(name, bbox, apply_filter)?;
        let positions = self.handle.slice_positions(&plan)?;
        reduce::nonzero_mask(self.handle.container(), &plan.array, positions.as_deref(), &plan.bbox())
    }
}
