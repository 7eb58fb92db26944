//! Static dataset catalogs per stack type

use crate::types::DataType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-epoch (time-series, geometry) or per-pair (ifgramStack) date array
pub const DATE: &str = "date";
/// Perpendicular baseline per epoch or per pair
pub const BPERP: &str = "bperp";
/// Keep flag per pair, `true` = keep
pub const DROP_IFGRAM: &str = "dropIfgram";

/// What the leading axis of a cube is indexed by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AxisKind {
    /// Pure spatial raster, no leading axis
    Plain,
    /// One slice per epoch
    Epoch,
    /// One slice per pair
    Pair,
}

/// Value conversion applied by reductions over a dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueScaling {
    None,
    /// Unwrapped phase in radians to line-of-sight range rate in m/year,
    /// using the `WAVELENGTH` attribute and each pair's temporal baseline
    PhaseToRangeRate,
}

/// Catalog entry for one addressable dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetSpec {
    pub name: &'static str,
    pub unit: &'static str,
    pub data_type: DataType,
    pub axis: AxisKind,
    pub scaling: ValueScaling,
}

const fn spec(name: &'static str, unit: &'static str, data_type: DataType, axis: AxisKind) -> DatasetSpec {
    DatasetSpec {
        name,
        unit,
        data_type,
        axis,
        scaling: ValueScaling::None,
    }
}

static TIMESERIES_DATASETS: &[DatasetSpec] = &[
    spec("timeseries", "m", DataType::F32, AxisKind::Epoch),
    spec("raw", "m", DataType::F32, AxisKind::Epoch),
    spec("troposphericDelay", "m", DataType::F32, AxisKind::Epoch),
    spec("topographicResidual", "m", DataType::F32, AxisKind::Epoch),
    spec("ramp", "m", DataType::F32, AxisKind::Epoch),
    spec("displacement", "m", DataType::F32, AxisKind::Epoch),
    spec("temporalCoherence", "1", DataType::F32, AxisKind::Plain),
    spec("mask", "1", DataType::Bool, AxisKind::Plain),
];

static GEOMETRY_DATASETS: &[DatasetSpec] = &[
    spec("height", "m", DataType::F32, AxisKind::Plain),
    spec("latitude", "degree", DataType::F32, AxisKind::Plain),
    spec("longitude", "degree", DataType::F32, AxisKind::Plain),
    spec("rangeCoord", "1", DataType::F32, AxisKind::Plain),
    spec("azimuthCoord", "1", DataType::F32, AxisKind::Plain),
    spec("incidenceAngle", "degree", DataType::F32, AxisKind::Plain),
    spec("headingAngle", "degree", DataType::F32, AxisKind::Plain),
    spec("slantRangeDistance", "m", DataType::F32, AxisKind::Plain),
    spec("shadowMask", "1", DataType::Bool, AxisKind::Plain),
    spec("waterMask", "1", DataType::Bool, AxisKind::Plain),
    spec("commonMask", "1", DataType::Bool, AxisKind::Plain),
    spec("bperp", "m", DataType::F32, AxisKind::Epoch),
];

static IFGRAM_DATASETS: &[DatasetSpec] = &[
    DatasetSpec {
        name: "unwrapPhase",
        unit: "radian",
        data_type: DataType::F32,
        axis: AxisKind::Pair,
        scaling: ValueScaling::PhaseToRangeRate,
    },
    spec("coherence", "1", DataType::F32, AxisKind::Pair),
    spec("connectComponent", "1", DataType::I16, AxisKind::Pair),
    spec("wrapPhase", "radian", DataType::F32, AxisKind::Pair),
    spec("iono", "radian", DataType::F32, AxisKind::Pair),
    spec("rangeOffset", "1", DataType::F32, AxisKind::Pair),
    spec("azimuthOffset", "1", DataType::F32, AxisKind::Pair),
];

/// Units of derived products and legacy single-file extensions
static EXTRA_UNITS: &[(&str, &str)] = &[
    ("velocity", "m/year"),
    ("acceleration", "m/year^2"),
    ("mask", "1"),
    (".unw", "radian"),
    (".int", "radian"),
    (".flat", "radian"),
    (".cor", "1"),
    (".dem", "m"),
    (".hgt", "m"),
    (".hgt_sim", "m"),
];

/// Stack types sharing the generic handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StackKind {
    TimeSeries,
    Geometry,
    IfgramStack,
}

impl StackKind {
    /// Value written to the `FILE_TYPE` attribute
    pub fn file_type(&self) -> &'static str {
        match self {
            StackKind::TimeSeries => "timeseries",
            StackKind::Geometry => "geometry",
            StackKind::IfgramStack => "ifgramStack",
        }
    }

    /// Recognise a `FILE_TYPE` attribute value
    pub fn from_file_type(value: &str) -> Option<Self> {
        match value {
            "timeseries" | "HDFEOS" | "GIANT_TS" => Some(StackKind::TimeSeries),
            "geometry" => Some(StackKind::Geometry),
            "ifgramStack" => Some(StackKind::IfgramStack),
            _ => None,
        }
    }

    /// Every dataset this stack type can address
    pub fn catalog(&self) -> &'static [DatasetSpec] {
        match self {
            StackKind::TimeSeries => TIMESERIES_DATASETS,
            StackKind::Geometry => GEOMETRY_DATASETS,
            StackKind::IfgramStack => IFGRAM_DATASETS,
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&'static DatasetSpec> {
        self.catalog().iter().find(|s| s.name == name)
    }

    /// Dataset read when a name is omitted
    pub fn default_dataset(&self) -> &'static str {
        self.catalog()[0].name
    }

    /// Whether a bare epoch key addresses the default dataset (`"20161020"`)
    pub fn accepts_bare_epoch(&self) -> bool {
        matches!(self, StackKind::TimeSeries)
    }
}

impl fmt::Display for StackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_type())
    }
}

/// Physical unit of a dataset name, product name or legacy file extension
pub fn dataset_unit(name: &str) -> Option<&'static str> {
    [StackKind::IfgramStack, StackKind::Geometry, StackKind::TimeSeries]
        .iter()
        .find_map(|kind| kind.lookup(name))
        .map(|s| s.unit)
        .or_else(|| {
            EXTRA_UNITS
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, unit)| *unit)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_lookup() {
        let spec = StackKind::IfgramStack.lookup("unwrapPhase").unwrap();
        assert_eq!(spec.axis, AxisKind::Pair);
        assert_eq!(spec.scaling, ValueScaling::PhaseToRangeRate);
        assert_eq!(
            StackKind::IfgramStack.lookup("coherence").unwrap().scaling,
            ValueScaling::None
        );
        assert_eq!(StackKind::Geometry.lookup("bperp").unwrap().axis, AxisKind::Epoch);
        assert!(StackKind::Geometry.lookup("unwrapPhase").is_none());
    }

    #[test]
    fn test_default_datasets() {
        assert_eq!(StackKind::TimeSeries.default_dataset(), "timeseries");
        assert_eq!(StackKind::Geometry.default_dataset(), "height");
        assert_eq!(StackKind::IfgramStack.default_dataset(), "unwrapPhase");
    }

    #[test]
    fn test_units() {
        assert_eq!(dataset_unit("unwrapPhase"), Some("radian"));
        assert_eq!(dataset_unit("incidenceAngle"), Some("degree"));
        assert_eq!(dataset_unit("displacement"), Some("m"));
        assert_eq!(dataset_unit("velocity"), Some("m/year"));
        assert_eq!(dataset_unit(".cor"), Some("1"));
        assert_eq!(dataset_unit("unknown"), None);
    }

    #[test]
    fn test_file_types() {
        assert_eq!(StackKind::from_file_type("HDFEOS"), Some(StackKind::TimeSeries));
        assert_eq!(
            StackKind::from_file_type(StackKind::IfgramStack.file_type()),
            Some(StackKind::IfgramStack)
        );
        assert_eq!(StackKind::from_file_type("velocity"), None);
    }
}
