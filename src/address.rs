//! Compound dataset names and their resolution into bounded read plans
//!
//! A compound name is `base[-qualifier]`, where the qualifier is an epoch key
//! (`bperp-20161020`) or a pair key (`unwrapPhase-20161020_20161026`). Names are parsed
//! once into [`DatasetAddress`]; everything downstream works on the parsed form.

use crate::array::{Selection, TemporalSelector};
use crate::catalog::{AxisKind, StackKind};
use crate::drop_mask::DropMask;
use crate::epoch::{EpochIndex, EpochKey, PairIndex, PairKey};
use crate::error::{Result, StackError};
use crate::layout::ArrayInfo;
use crate::types::BoundingBox;
use std::fmt;
use std::ops::Range;

/// Optional per-epoch or per-pair part of a compound name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Qualifier {
    None,
    Epoch(EpochKey),
    Pair(PairKey),
    /// Text that is neither key form; reported against the dataset's axis on resolution
    Unparsed(String),
}

impl Qualifier {
    /// Parse the text after the delimiter; an underscore marks a pair key
    pub fn parse(s: &str) -> Result<Self> {
        if s.contains('_') {
            Ok(Qualifier::Pair(PairKey::parse(s)?))
        } else {
            Ok(Qualifier::Epoch(EpochKey::parse(s)?))
        }
    }
}

/// A parsed compound dataset name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DatasetAddress {
    pub base: String,
    pub qualifier: Qualifier,
}

impl DatasetAddress {
    /// Separator between base name and qualifier
    pub const DELIMITER: char = '-';

    pub fn new(base: impl Into<String>, qualifier: Qualifier) -> Self {
        Self {
            base: base.into(),
            qualifier,
        }
    }

    /// Parse a compound name for a stack type.
    ///
    /// An empty name addresses the stack's default dataset. For time-series stacks a bare
    /// epoch key addresses that epoch of the default cube.
    pub fn parse(name: &str, kind: StackKind) -> Result<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(Self::new(kind.default_dataset(), Qualifier::None));
        }
        match name.split_once(Self::DELIMITER) {
            Some((base, qualifier)) => {
                let parsed = Qualifier::parse(qualifier).unwrap_or_else(|_| Qualifier::Unparsed(qualifier.to_string()));
                Ok(Self::new(base, parsed))
            }
            None if kind.accepts_bare_epoch() && kind.lookup(name).is_none() => {
                let key = EpochKey::parse(name)
                    .map_err(|_| StackError::UnknownDataset(name.to_string()))?;
                Ok(Self::new(kind.default_dataset(), Qualifier::Epoch(key)))
            }
            None => Ok(Self::new(name, Qualifier::None)),
        }
    }
}

impl fmt::Display for DatasetAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Qualifier::None => f.write_str(&self.base),
            Qualifier::Epoch(k) => write!(f, "{}{}{}", self.base, Self::DELIMITER, k),
            Qualifier::Pair(k) => write!(f, "{}{}{}", self.base, Self::DELIMITER, k),
            Qualifier::Unparsed(s) => write!(f, "{}{}{}", self.base, Self::DELIMITER, s),
        }
    }
}

/// Concrete bounded read against one container array
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadPlan {
    pub array: String,
    pub temporal: TemporalSelector,
    pub rows: Range<usize>,
    pub cols: Range<usize>,
    /// Whether the stored array has a leading axis
    pub has_leading_axis: bool,
}

impl ReadPlan {
    /// Selection to hand to the container
    pub fn selection(&self) -> Selection {
        Selection {
            temporal: self.temporal.clone(),
            rows: Some(self.rows.clone()),
            cols: Some(self.cols.clone()),
        }
    }

    pub fn bbox(&self) -> BoundingBox {
        BoundingBox::new(self.cols.start, self.rows.start, self.cols.end, self.rows.end)
    }
}

/// Leading-axis index available to the resolver
#[derive(Debug, Clone, Copy)]
pub enum TemporalAxis<'a> {
    None,
    Epochs(&'a EpochIndex),
    Pairs {
        index: &'a PairIndex,
        mask: &'a DropMask,
    },
}

/// Resolves parsed addresses against a stack's catalog and temporal index
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    kind: StackKind,
    axis: TemporalAxis<'a>,
}

impl<'a> Resolver<'a> {
    pub fn new(kind: StackKind, axis: TemporalAxis<'a>) -> Self {
        Self { kind, axis }
    }

    /// Compute the read plan for `address` against the stored array `info`.
    ///
    /// `info` is `None` when the container has no such array.
    pub fn resolve(
        &self,
        address: &DatasetAddress,
        info: Option<&ArrayInfo>,
        bbox: Option<BoundingBox>,
        apply_filter: bool,
    ) -> Result<ReadPlan> {
        let spec = self
            .kind
            .lookup(&address.base)
            .ok_or_else(|| StackError::UnknownDataset(address.base.clone()))?;
        let info = info.ok_or_else(|| StackError::UnknownDataset(address.base.clone()))?;

        let (temporal, has_leading_axis) = match info.rank() {
            2 => {
                if address.qualifier != Qualifier::None {
                    return Err(StackError::UnknownDataset(address.to_string()));
                }
                (TemporalSelector::All, false)
            }
            3 => (self.temporal_selector(address, spec.axis, info, apply_filter)?, true),
            rank => {
                return Err(StackError::InvalidDimensions(format!(
                    "dataset '{}' has rank {}, expected 2 or 3",
                    address.base, rank
                )))
            }
        };

        let (length, width) = info.spatial_extent().unwrap_or((0, 0));
        let bbox = bbox.unwrap_or_else(|| BoundingBox::full(length, width));
        bbox.check_within(length, width)?;

        let plan = ReadPlan {
            array: spec.name.to_string(),
            temporal,
            rows: bbox.rows(),
            cols: bbox.cols(),
            has_leading_axis,
        };
        log::debug!("resolved '{}' to {:?}", address, plan);
        Ok(plan)
    }

    fn temporal_selector(
        &self,
        address: &DatasetAddress,
        axis: AxisKind,
        info: &ArrayInfo,
        apply_filter: bool,
    ) -> Result<TemporalSelector> {
        let leading = info.leading_len().unwrap_or(0);
        match (axis, self.axis) {
            (AxisKind::Pair, TemporalAxis::Pairs { index, mask }) => {
                check_axis_length(&address.base, leading, index.len())?;
                match &address.qualifier {
                    Qualifier::None if apply_filter => {
                        Ok(TemporalSelector::Indices(mask.filtered_indices(true)))
                    }
                    Qualifier::None => Ok(TemporalSelector::All),
                    Qualifier::Pair(key) => Ok(TemporalSelector::Index(index.require_position(key)?)),
                    Qualifier::Epoch(key) => Err(StackError::UnknownPair(key.to_string())),
                    Qualifier::Unparsed(text) => Err(StackError::UnknownPair(text.clone())),
                }
            }
            (AxisKind::Epoch, TemporalAxis::Epochs(epochs)) => {
                check_axis_length(&address.base, leading, epochs.len())?;
                match &address.qualifier {
                    Qualifier::None => Ok(TemporalSelector::All),
                    Qualifier::Epoch(key) => epochs
                        .position(key)
                        .map(TemporalSelector::Index)
                        .ok_or_else(|| StackError::UnknownEpoch(key.to_string())),
                    Qualifier::Pair(key) => Err(StackError::UnknownEpoch(key.to_string())),
                    Qualifier::Unparsed(text) => Err(StackError::UnknownEpoch(text.clone())),
                }
            }
            (AxisKind::Plain, _) => Err(StackError::InvalidFormat(format!(
                "dataset '{}' is stored as a 3-D cube but is a 2-D raster",
                address.base
            ))),
            _ => Err(StackError::Metadata(format!(
                "no {} index available for dataset '{}'",
                if axis == AxisKind::Pair { "pair" } else { "epoch" },
                address.base
            ))),
        }
    }
}

fn check_axis_length(name: &str, leading: usize, expected: usize) -> Result<()> {
    if leading != expected {
        return Err(StackError::InvalidFormat(format!(
            "dataset '{}' has {} slices but the index has {} entries",
            name, leading, expected
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DataType;

    fn pairs() -> PairIndex {
        PairIndex::from_date_pairs(&[
            ("20200101", "20200113"),
            ("20200113", "20200125"),
            ("20200101", "20200125"),
        ])
        .unwrap()
    }

    fn cube_info(n: usize) -> ArrayInfo {
        ArrayInfo::new(vec![n, 40, 50], DataType::F32)
    }

    #[test]
    fn test_parse_names() {
        let a = DatasetAddress::parse("unwrapPhase-20161020_20161026", StackKind::IfgramStack).unwrap();
        assert_eq!(a.base, "unwrapPhase");
        assert!(matches!(a.qualifier, Qualifier::Pair(_)));
        assert_eq!(a.to_string(), "unwrapPhase-20161020_20161026");

        let a = DatasetAddress::parse("bperp-20161020", StackKind::Geometry).unwrap();
        assert!(matches!(a.qualifier, Qualifier::Epoch(_)));

        let a = DatasetAddress::parse("20161020", StackKind::TimeSeries).unwrap();
        assert_eq!(a.to_string(), "timeseries-20161020");

        let a = DatasetAddress::parse("", StackKind::Geometry).unwrap();
        assert_eq!(a, DatasetAddress::new("height", Qualifier::None));

        let a = DatasetAddress::parse("bperp-2016", StackKind::Geometry).unwrap();
        assert_eq!(a.qualifier, Qualifier::Unparsed("2016".to_string()));
        assert_eq!(a.to_string(), "bperp-2016");
        assert!(matches!(
            DatasetAddress::parse("velocity", StackKind::TimeSeries),
            Err(StackError::UnknownDataset(_))
        ));
    }

    #[test]
    fn test_resolve_pair_qualifier_within_base_axis() {
        let index = pairs();
        let mask = DropMask::keep_all(&index);
        let resolver = Resolver::new(StackKind::IfgramStack, TemporalAxis::Pairs { index: &index, mask: &mask });
        let info = cube_info(3);

        let base = DatasetAddress::parse("coherence", StackKind::IfgramStack).unwrap();
        let full = resolver.resolve(&base, Some(&info), None, false).unwrap();
        assert_eq!(full.temporal, TemporalSelector::All);
        assert_eq!(full.bbox(), BoundingBox::new(0, 0, 50, 40));

        for key in index.keys() {
            let name = format!("coherence-{}", key);
            let address = DatasetAddress::parse(&name, StackKind::IfgramStack).unwrap();
            let plan = resolver.resolve(&address, Some(&info), None, false).unwrap();
            match plan.temporal {
                TemporalSelector::Index(i) => {
                    assert!(full.temporal.positions(3).contains(&i));
                    assert_eq!(index.pair_key(i), Some(key));
                }
                other => panic!("unexpected selector {:?}", other),
            }
        }
    }

    #[test]
    fn test_resolve_applies_drop_filter() {
        let index = pairs();
        let mask = DropMask::new(vec![true, false, true], &index).unwrap();
        let resolver = Resolver::new(StackKind::IfgramStack, TemporalAxis::Pairs { index: &index, mask: &mask });
        let address = DatasetAddress::parse("unwrapPhase", StackKind::IfgramStack).unwrap();

        let plan = resolver.resolve(&address, Some(&cube_info(3)), None, true).unwrap();
        assert_eq!(plan.temporal, TemporalSelector::Indices(vec![0, 2]));
        let plan = resolver.resolve(&address, Some(&cube_info(3)), None, false).unwrap();
        assert_eq!(plan.temporal, TemporalSelector::All);
    }

    #[test]
    fn test_resolve_errors() {
        let index = pairs();
        let mask = DropMask::keep_all(&index);
        let resolver = Resolver::new(StackKind::IfgramStack, TemporalAxis::Pairs { index: &index, mask: &mask });
        let info = cube_info(3);

        let unknown = DatasetAddress::new("height", Qualifier::None);
        assert!(matches!(
            resolver.resolve(&unknown, Some(&info), None, false),
            Err(StackError::UnknownDataset(_))
        ));

        let absent = DatasetAddress::new("iono", Qualifier::None);
        assert!(matches!(
            resolver.resolve(&absent, None, None, false),
            Err(StackError::UnknownDataset(_))
        ));

        let missing_pair = DatasetAddress::parse("coherence-20200101_20200102", StackKind::IfgramStack).unwrap();
        assert!(matches!(
            resolver.resolve(&missing_pair, Some(&info), None, false),
            Err(StackError::UnknownPair(_))
        ));

        let garbled = DatasetAddress::parse("coherence-notapair", StackKind::IfgramStack).unwrap();
        assert!(matches!(
            resolver.resolve(&garbled, Some(&info), None, false),
            Err(StackError::UnknownPair(_))
        ));

        // the base is checked before the qualifier
        let unknown_base = DatasetAddress::parse("velocity-garbage", StackKind::IfgramStack).unwrap();
        assert!(matches!(
            resolver.resolve(&unknown_base, Some(&info), None, false),
            Err(StackError::UnknownDataset(_))
        ));

        let address = DatasetAddress::new("coherence", Qualifier::None);
        assert!(matches!(
            resolver.resolve(&address, Some(&info), Some(BoundingBox::new(0, 0, 51, 40)), false),
            Err(StackError::OutOfBounds(_))
        ));
        assert!(matches!(
            resolver.resolve(&address, Some(&cube_info(4)), None, false),
            Err(StackError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_resolve_epoch_and_plain() {
        let epochs = EpochIndex::from_date_strings(&["20161020", "20161026"]).unwrap();
        let resolver = Resolver::new(StackKind::Geometry, TemporalAxis::Epochs(&epochs));

        let address = DatasetAddress::parse("bperp-20161026", StackKind::Geometry).unwrap();
        let plan = resolver
            .resolve(&address, Some(&cube_info(2)), Some(BoundingBox::new(5, 5, 10, 10)), false)
            .unwrap();
        assert_eq!(plan.temporal, TemporalSelector::Index(1));
        assert_eq!(plan.rows, 5..10);

        for name in ["bperp-20161101", "bperp-2016"] {
            let address = DatasetAddress::parse(name, StackKind::Geometry).unwrap();
            assert!(matches!(
                resolver.resolve(&address, Some(&cube_info(2)), None, false),
                Err(StackError::UnknownEpoch(_))
            ));
        }

        let raster = ArrayInfo::new(vec![40, 50], DataType::F32);
        let plan = resolver
            .resolve(&DatasetAddress::new("height", Qualifier::None), Some(&raster), None, false)
            .unwrap();
        assert!(!plan.has_leading_axis);
        assert_eq!(plan.cols, 0..50);

        let qualified = DatasetAddress::parse("height-20161020", StackKind::Geometry).unwrap();
        assert!(matches!(
            resolver.resolve(&qualified, Some(&raster), None, false),
            Err(StackError::UnknownDataset(_))
        ));
    }
}
