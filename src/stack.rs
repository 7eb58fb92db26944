//! Generic stack handle shared by time-series, geometry and interferogram stacks
//!
//! The handle owns a container and lazily derives the stack state (metadata, temporal
//! index, drop mask, spatial size). The state is cached until a write through the handle
//! or an explicit [`StackHandle::refresh`] invalidates it.

use crate::address::{DatasetAddress, ReadPlan, Resolver, TemporalAxis};
use crate::array::ArrayData;
use crate::catalog::{AxisKind, StackKind, DATE, DROP_IFGRAM};
use crate::drop_mask::DropMask;
use crate::epoch::{EpochIndex, PairIndex};
use crate::error::{Result, StackError};
use crate::io::Container;
use crate::metadata::{StackMetadata, FILE_TYPE};
use crate::types::BoundingBox;
use ndarray::{ArrayD, Ix2};
use parking_lot::RwLock;
use std::sync::Arc;

/// Leading-axis index of a stack
#[derive(Debug, Clone, PartialEq)]
pub enum StackIndex {
    /// No per-epoch arrays stored
    None,
    Epochs(EpochIndex),
    Pairs { index: PairIndex, mask: DropMask },
}

impl StackIndex {
    pub fn axis(&self) -> TemporalAxis<'_> {
        match self {
            StackIndex::None => TemporalAxis::None,
            StackIndex::Epochs(epochs) => TemporalAxis::Epochs(epochs),
            StackIndex::Pairs { index, mask } => TemporalAxis::Pairs { index, mask },
        }
    }
}

/// Everything derived from a container when a stack is opened
#[derive(Debug, Clone, PartialEq)]
pub struct StackState {
    pub metadata: StackMetadata,
    pub index: StackIndex,
    pub length: usize,
    pub width: usize,
}

impl StackState {
    /// Box covering the whole raster
    pub fn full_box(&self) -> BoundingBox {
        BoundingBox::full(self.length, self.width)
    }
}

/// Open stack of a given kind over a container
#[derive(Debug)]
pub struct StackHandle<C> {
    container: C,
    kind: StackKind,
    state: RwLock<Option<Arc<StackState>>>,
}

impl<C: Container> StackHandle<C> {
    /// Open a stack, checking `FILE_TYPE` when the container records one
    pub fn open(container: C, kind: StackKind) -> Result<Self> {
        let handle = Self {
            container,
            kind,
            state: RwLock::new(None),
        };
        let state = handle.state()?;
        if let Some(file_type) = state.metadata.file_type() {
            if StackKind::from_file_type(&file_type) != Some(kind) {
                return Err(StackError::Metadata(format!(
                    "container holds a {} stack, not {}",
                    file_type, kind
                )));
            }
        }
        log::info!(
            "Opened {} stack: {} x {} pixels, {}",
            kind,
            state.length,
            state.width,
            describe(&state.index)
        );
        Ok(handle)
    }

    /// Write metadata and arrays of a new stack, then open it
    pub fn create(
        mut container: C,
        kind: StackKind,
        mut metadata: StackMetadata,
        arrays: Vec<(&str, ArrayData)>,
        chunked: bool,
    ) -> Result<Self> {
        container.ensure_writable(kind.file_type())?;
        metadata.set(FILE_TYPE, kind.file_type());
        metadata.touch();
        metadata.write_to(&mut container)?;
        for (name, data) in arrays {
            log::info!("Creating dataset '{}' of {} in shape {:?}", name, data.data_type(), data.shape());
            container.write_array(name, data, chunked)?;
        }
        Self::open(container, kind)
    }

    pub fn kind(&self) -> StackKind {
        self.kind
    }

    pub fn container(&self) -> &C {
        &self.container
    }

    /// Mutable access to the container; drops the cached state
    pub fn container_mut(&mut self) -> &mut C {
        self.invalidate();
        &mut self.container
    }

    pub fn into_inner(self) -> C {
        self.container
    }

    /// Cached stack state, derived on first use
    pub fn state(&self) -> Result<Arc<StackState>> {
        if let Some(state) = self.state.read().as_ref() {
            return Ok(Arc::clone(state));
        }
        let state = Arc::new(self.derive_state()?);
        *self.state.write() = Some(Arc::clone(&state));
        Ok(state)
    }

    /// Drop the cached state so the next access re-reads the container
    pub fn invalidate(&self) {
        *self.state.write() = None;
    }

    /// Re-derive the state now, picking up external modifications
    pub fn refresh(&self) -> Result<Arc<StackState>> {
        self.invalidate();
        self.state()
    }

    fn derive_state(&self) -> Result<StackState> {
        let metadata = StackMetadata::load(&self.container)?;
        let index = match self.kind {
            StackKind::IfgramStack => {
                let index = read_pair_index(&self.container)?;
                let mask = match self.container.array_info(DROP_IFGRAM)? {
                    Some(_) => {
                        let keep = self.container.read_array(DROP_IFGRAM)?.into_bool()?;
                        DropMask::new(keep.iter().copied().collect(), &index)?
                    }
                    None => DropMask::keep_all(&index),
                };
                StackIndex::Pairs { index, mask }
            }
            StackKind::TimeSeries => StackIndex::Epochs(read_epoch_index(&self.container)?),
            StackKind::Geometry => match self.container.array_info(DATE)? {
                Some(_) => StackIndex::Epochs(read_epoch_index(&self.container)?),
                None => StackIndex::None,
            },
        };

        let mut extent = None;
        for spec in self.kind.catalog() {
            if let Some(info) = self.container.array_info(spec.name)? {
                extent = info.spatial_extent();
                break;
            }
        }
        let (length, width) = extent
            .or_else(|| Some((metadata.length()?, metadata.width()?)))
            .unwrap_or((0, 0));

        Ok(StackState {
            metadata,
            index,
            length,
            width,
        })
    }

    /// Resolve a compound dataset name into a read plan
    pub fn resolve(&self, name: &str, bbox: Option<BoundingBox>, apply_filter: bool) -> Result<ReadPlan> {
        let address = DatasetAddress::parse(name, self.kind)?;
        let state = self.state()?;
        let info = match self.kind.lookup(&address.base) {
            Some(_) => self.container.array_info(&address.base)?,
            None => None,
        };
        Resolver::new(self.kind, state.index.axis()).resolve(&address, info.as_ref(), bbox, apply_filter)
    }

    /// Read a dataset by compound name; a leading axis of extent one is squeezed
    pub fn read(&self, name: &str, bbox: Option<BoundingBox>, apply_filter: bool) -> Result<ArrayData> {
        let plan = self.resolve(name, bbox, apply_filter)?;
        Ok(self.container.read_slice(&plan.array, &plan.selection())?.squeeze_leading())
    }

    /// Leading-axis positions a plan reads, `None` for a plain raster
    pub fn slice_positions(&self, plan: &ReadPlan) -> Result<Option<Vec<usize>>> {
        if !plan.has_leading_axis {
            return Ok(None);
        }
        let leading = self
            .container
            .array_info(&plan.array)?
            .and_then(|info| info.leading_len())
            .ok_or_else(|| StackError::NotFound(plan.array.clone()))?;
        Ok(Some(plan.temporal.positions(leading)))
    }

    /// Catalog datasets present in the container
    pub fn dataset_names(&self) -> Result<Vec<&'static str>> {
        let mut names = Vec::new();
        for spec in self.kind.catalog() {
            if self.container.has_array(spec.name)? {
                names.push(spec.name);
            }
        }
        Ok(names)
    }

    /// Every name addressable slice by slice
    pub fn dataset_list(&self) -> Result<Vec<String>> {
        let state = self.state()?;
        let names = self.dataset_names()?;
        let list = match (&state.index, self.kind) {
            (StackIndex::Epochs(epochs), StackKind::TimeSeries) => {
                epochs.storage_keys().iter().map(|k| k.to_string()).collect()
            }
            (StackIndex::Pairs { index, .. }, _) => names
                .iter()
                .filter(|name| self.kind.lookup(name).is_some_and(|s| s.axis == AxisKind::Pair))
                .flat_map(|name| index.keys().iter().map(move |k| format!("{}-{}", name, k)))
                .collect(),
            (StackIndex::Epochs(epochs), _) => names
                .iter()
                .flat_map(|name| {
                    let per_epoch = self
                        .kind
                        .lookup(name)
                        .is_some_and(|s| s.axis == AxisKind::Epoch);
                    if per_epoch {
                        epochs
                            .storage_keys()
                            .iter()
                            .map(|k| format!("{}-{}", name, k))
                            .collect::<Vec<_>>()
                    } else {
                        vec![name.to_string()]
                    }
                })
                .collect(),
            (StackIndex::None, _) => names.iter().map(|name| name.to_string()).collect(),
        };
        Ok(list)
    }
}

fn describe(index: &StackIndex) -> String {
    match index {
        StackIndex::None => "no temporal axis".to_string(),
        StackIndex::Epochs(epochs) => format!("{} epochs", epochs.len()),
        StackIndex::Pairs { index, mask } => format!(
            "{} pairs ({} kept) over {} epochs",
            index.len(),
            mask.num_kept(),
            index.epochs().len()
        ),
    }
}

fn read_dates<C: Container + ?Sized>(container: &C) -> Result<ArrayD<String>> {
    if !container.has_array(DATE)? {
        return Err(StackError::MissingField(DATE.to_string()));
    }
    container.read_array(DATE)?.into_text()
}

/// Pair index from the `(m, 2)` date array
pub(crate) fn read_pair_index<C: Container + ?Sized>(container: &C) -> Result<PairIndex> {
    let dates = read_dates(container)?;
    let shape = dates.shape().to_vec();
    let dates = dates
        .into_dimensionality::<Ix2>()
        .ok()
        .filter(|d| d.ncols() == 2)
        .ok_or_else(|| {
            StackError::InvalidFormat(format!("pair date array must have shape (m, 2), found {:?}", shape))
        })?;
    let pairs: Vec<(String, String)> = dates
        .outer_iter()
        .map(|row| (row[0].clone(), row[1].clone()))
        .collect();
    PairIndex::from_date_pairs(&pairs)
}

/// Epoch index from the `(n,)` date array
pub(crate) fn read_epoch_index<C: Container + ?Sized>(container: &C) -> Result<EpochIndex> {
    let dates = read_dates(container)?;
    if dates.ndim() != 1 {
        return Err(StackError::InvalidFormat(format!(
            "epoch date array must be 1-D, found {:?}",
            dates.shape()
        )));
    }
    let dates: Vec<String> = dates.iter().cloned().collect();
    EpochIndex::from_date_strings(&dates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryContainer;
    use crate::types::AttrValue;
    use ndarray::{Array3, IxDyn};

    fn ifgram_container() -> MemoryContainer {
        let mut container = MemoryContainer::new();
        container
            .write_attr("FILE_TYPE", AttrValue::from("ifgramStack"))
            .unwrap();
        let dates = ArrayD::from_shape_vec(
            IxDyn(&[3, 2]),
            ["20200101", "20200113", "20200113", "20200125", "20200101", "20200125"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
        .unwrap();
        container.write_array(DATE, ArrayData::Text(dates), false).unwrap();
        let cube = Array3::from_shape_fn((3, 4, 5), |(i, r, c)| (i * 100 + r * 10 + c) as f32);
        container
            .write_array("unwrapPhase", ArrayData::F32(cube.into_dyn()), true)
            .unwrap();
        container
    }

    #[test]
    fn test_open_derives_state() {
        let handle = StackHandle::open(ifgram_container(), StackKind::IfgramStack).unwrap();
        let state = handle.state().unwrap();
        assert_eq!((state.length, state.width), (4, 5));
        assert_eq!(state.full_box(), BoundingBox::new(0, 0, 5, 4));
        match &state.index {
            StackIndex::Pairs { index, mask } => {
                assert_eq!(index.len(), 3);
                assert_eq!(mask.num_kept(), 3);
            }
            other => panic!("unexpected index {:?}", other),
        }
    }

    #[test]
    fn test_kind_mismatch() {
        assert!(matches!(
            StackHandle::open(ifgram_container(), StackKind::TimeSeries),
            Err(StackError::Metadata(_))
        ));
    }

    #[test]
    fn test_read_qualified_and_boxed() {
        let handle = StackHandle::open(ifgram_container(), StackKind::IfgramStack).unwrap();
        let slice = handle
            .read("unwrapPhase-20200113_20200125", Some(BoundingBox::new(1, 2, 3, 4)), false)
            .unwrap()
            .into_f32()
            .unwrap();
        assert_eq!(slice.shape(), &[2, 2]);
        assert_eq!(slice[[0, 0]], 121.0);

        let whole = handle.read("unwrapPhase", None, false).unwrap();
        assert_eq!(whole.shape(), &[3, 4, 5]);

        assert!(matches!(
            handle.read("unwrapPhase-20200101_20200113", Some(BoundingBox::new(0, 0, 6, 4)), false),
            Err(StackError::OutOfBounds(_))
        ));
        assert!(matches!(
            handle.read("coherence", None, false),
            Err(StackError::UnknownDataset(_))
        ));
    }

    #[test]
    fn test_dataset_list() {
        let handle = StackHandle::open(ifgram_container(), StackKind::IfgramStack).unwrap();
        assert_eq!(handle.dataset_names().unwrap(), vec!["unwrapPhase"]);
        assert_eq!(
            handle.dataset_list().unwrap(),
            vec![
                "unwrapPhase-20200101_20200113",
                "unwrapPhase-20200113_20200125",
                "unwrapPhase-20200101_20200125",
            ]
        );
    }

    #[test]
    fn test_refresh_picks_up_external_change() {
        let mut handle = StackHandle::open(ifgram_container(), StackKind::IfgramStack).unwrap();
        let before = handle.state().unwrap();

        let keep = ArrayD::from_shape_vec(IxDyn(&[3]), vec![true, false, true]).unwrap();
        handle
            .container_mut()
            .write_array(DROP_IFGRAM, ArrayData::Bool(keep), false)
            .unwrap();
        let after = handle.refresh().unwrap();
        assert_ne!(before, after);
        match &after.index {
            StackIndex::Pairs { mask, .. } => assert_eq!(mask.keep(), &[true, false, true]),
            other => panic!("unexpected index {:?}", other),
        }
    }

    #[test]
    fn test_missing_date_array() {
        let mut container = MemoryContainer::new();
        container
            .write_attr("FILE_TYPE", AttrValue::from("timeseries"))
            .unwrap();
        assert!(matches!(
            StackHandle::open(container, StackKind::TimeSeries),
            Err(StackError::MissingField(_))
        ));
    }
}
