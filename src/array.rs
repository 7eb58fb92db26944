//! Typed N-D array payloads and slice selections exchanged with containers

use crate::error::{Result, StackError};
use crate::types::{BoundingBox, DataType};
use ndarray::{ArrayD, ArrayViewD, Axis, IxDyn, Slice};
use std::ops::Range;

/// Selection along the leading (pair or epoch) axis
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemporalSelector {
    /// Whole axis
    All,
    /// One position; the read keeps a leading axis of extent one
    Index(usize),
    /// Explicit positions, in the given order
    Indices(Vec<usize>),
}

impl TemporalSelector {
    /// Positions selected on an axis of `axis_len` entries
    pub fn positions(&self, axis_len: usize) -> Vec<usize> {
        match self {
            TemporalSelector::All => (0..axis_len).collect(),
            TemporalSelector::Index(i) => vec![*i],
            TemporalSelector::Indices(v) => v.clone(),
        }
    }

    /// Number of positions selected on an axis of `axis_len` entries
    pub fn count(&self, axis_len: usize) -> usize {
        match self {
            TemporalSelector::All => axis_len,
            TemporalSelector::Index(_) => 1,
            TemporalSelector::Indices(v) => v.len(),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, TemporalSelector::All)
    }

    /// Ensure every selected position exists on an axis of `axis_len` entries
    pub fn check(&self, axis_len: usize, name: &str) -> Result<()> {
        let out_of_range = match self {
            TemporalSelector::All => None,
            TemporalSelector::Index(i) => (*i >= axis_len).then_some(*i),
            TemporalSelector::Indices(v) => v.iter().copied().find(|&i| i >= axis_len),
        };
        match out_of_range {
            Some(i) => Err(StackError::OutOfBounds(format!(
                "index {} on leading axis of '{}' with {} entries",
                i, name, axis_len
            ))),
            None => Ok(()),
        }
    }
}

/// A bounded request against one container array.
///
/// `rows` and `cols` address the last two axes; `temporal` addresses axis 0 and must be
/// `All` when axis 0 is itself a spatial axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub temporal: TemporalSelector,
    pub rows: Option<Range<usize>>,
    pub cols: Option<Range<usize>>,
}

impl Selection {
    /// Select the whole array
    pub fn all() -> Self {
        Self {
            temporal: TemporalSelector::All,
            rows: None,
            cols: None,
        }
    }

    /// Select along the leading axis only
    pub fn leading(temporal: TemporalSelector) -> Self {
        Self {
            temporal,
            rows: None,
            cols: None,
        }
    }

    /// Restrict the spatial axes to a bounding box
    pub fn with_box(mut self, bbox: &BoundingBox) -> Self {
        self.rows = Some(bbox.rows());
        self.cols = Some(bbox.cols());
        self
    }

    /// Validate this selection against an array shape
    pub fn check(&self, shape: &[usize], name: &str) -> Result<()> {
        let rank = shape.len();
        let spatial = self.rows.is_some() || self.cols.is_some();
        if spatial && rank < 2 {
            return Err(StackError::InvalidDimensions(format!(
                "spatial selection on {}-D array '{}'",
                rank, name
            )));
        }
        if !self.temporal.is_all() {
            if rank == 0 || (spatial && rank < 3) {
                return Err(StackError::InvalidDimensions(format!(
                    "array '{}' has no leading axis to select from",
                    name
                )));
            }
            self.temporal.check(shape[0], name)?;
        }
        for (range, axis) in [(&self.rows, rank.wrapping_sub(2)), (&self.cols, rank.wrapping_sub(1))] {
            if let Some(range) = range {
                if range.start > range.end || range.end > shape[axis] {
                    return Err(StackError::OutOfBounds(format!(
                        "range {}..{} on axis {} of '{}' with extent {}",
                        range.start, range.end, axis, name, shape[axis]
                    )));
                }
            }
        }
        Ok(())
    }

    /// Shape of the array this selection produces from an array of `shape`
    pub fn output_shape(&self, shape: &[usize]) -> Vec<usize> {
        let mut out = shape.to_vec();
        let rank = out.len();
        if !self.temporal.is_all() && rank > 0 {
            out[0] = self.temporal.count(shape[0]);
        }
        if let Some(rows) = &self.rows {
            out[rank - 2] = rows.len();
        }
        if let Some(cols) = &self.cols {
            out[rank - 1] = cols.len();
        }
        out
    }
}

/// Apply a validated selection to an in-memory array
pub(crate) fn select<T: Clone>(array: ArrayViewD<'_, T>, selection: &Selection) -> ArrayD<T> {
    let rank = array.ndim();
    let mut view = array;
    if let Some(rows) = &selection.rows {
        view.slice_axis_inplace(Axis(rank - 2), Slice::from(rows.clone()));
    }
    if let Some(cols) = &selection.cols {
        view.slice_axis_inplace(Axis(rank - 1), Slice::from(cols.clone()));
    }
    match &selection.temporal {
        TemporalSelector::All => view.to_owned(),
        TemporalSelector::Index(i) => view.select(Axis(0), &[*i]),
        TemporalSelector::Indices(v) => view.select(Axis(0), v),
    }
}

/// Overwrite leading-axis positions of `target` with `values`
pub(crate) fn assign_leading<T: Clone>(
    target: &mut ArrayD<T>,
    temporal: &TemporalSelector,
    values: ArrayViewD<'_, T>,
    name: &str,
) -> Result<()> {
    if target.ndim() == 0 {
        return Err(StackError::InvalidDimensions(format!(
            "cannot update 0-D array '{}'",
            name
        )));
    }
    temporal.check(target.shape()[0], name)?;
    let positions = temporal.positions(target.shape()[0]);
    let values = if values.ndim() + 1 == target.ndim() && positions.len() == 1 {
        values.insert_axis(Axis(0))
    } else {
        values
    };

    let mut expected = target.shape().to_vec();
    expected[0] = positions.len();
    if values.shape() != expected.as_slice() {
        return Err(StackError::InvalidDimensions(format!(
            "update of '{}' expects shape {:?}, got {:?}",
            name,
            expected,
            values.shape()
        )));
    }

    for (k, &i) in positions.iter().enumerate() {
        target
            .index_axis_mut(Axis(0), i)
            .assign(&values.index_axis(Axis(0), k));
    }
    Ok(())
}

/// Array payload with its element type carried in the variant
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    Bool(ArrayD<bool>),
    I16(ArrayD<i16>),
    I32(ArrayD<i32>),
    I64(ArrayD<i64>),
    F32(ArrayD<f32>),
    F64(ArrayD<f64>),
    Text(ArrayD<String>),
}

/// Evaluate `$body` with `$arr` bound to the inner array of any variant
macro_rules! with_array {
    ($value:expr, $arr:ident => $body:expr) => {
        match $value {
            ArrayData::Bool($arr) => $body,
            ArrayData::I16($arr) => $body,
            ArrayData::I32($arr) => $body,
            ArrayData::I64($arr) => $body,
            ArrayData::F32($arr) => $body,
            ArrayData::F64($arr) => $body,
            ArrayData::Text($arr) => $body,
        }
    };
}

/// Rebuild the same variant from `$body` evaluated on the inner array
macro_rules! map_array {
    ($value:expr, $arr:ident => $body:expr) => {
        match $value {
            ArrayData::Bool($arr) => ArrayData::Bool($body),
            ArrayData::I16($arr) => ArrayData::I16($body),
            ArrayData::I32($arr) => ArrayData::I32($body),
            ArrayData::I64($arr) => ArrayData::I64($body),
            ArrayData::F32($arr) => ArrayData::F32($body),
            ArrayData::F64($arr) => ArrayData::F64($body),
            ArrayData::Text($arr) => ArrayData::Text($body),
        }
    };
}

pub(crate) use with_array;

/// Cast every numeric variant into `ArrayD<$target>`
macro_rules! cast_numeric {
    ($value:expr, $target:ty, $name:expr) => {
        match $value {
            ArrayData::Bool(a) => Ok(a.mapv(|v| if v { 1 as $target } else { 0 as $target })),
            ArrayData::I16(a) => Ok(a.mapv(|v| v as $target)),
            ArrayData::I32(a) => Ok(a.mapv(|v| v as $target)),
            ArrayData::I64(a) => Ok(a.mapv(|v| v as $target)),
            ArrayData::F32(a) => Ok(a.mapv(|v| v as $target)),
            ArrayData::F64(a) => Ok(a.mapv(|v| v as $target)),
            ArrayData::Text(_) => Err(StackError::InvalidDataType {
                expected: $name.to_string(),
                found: DataType::Text.to_string(),
            }),
        }
    };
}

impl ArrayData {
    /// Element type of the payload
    pub fn data_type(&self) -> DataType {
        match self {
            ArrayData::Bool(_) => DataType::Bool,
            ArrayData::I16(_) => DataType::I16,
            ArrayData::I32(_) => DataType::I32,
            ArrayData::I64(_) => DataType::I64,
            ArrayData::F32(_) => DataType::F32,
            ArrayData::F64(_) => DataType::F64,
            ArrayData::Text(_) => DataType::Text,
        }
    }

    pub fn shape(&self) -> &[usize] {
        with_array!(self, a => a.shape())
    }

    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    pub fn len(&self) -> usize {
        with_array!(self, a => a.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply a selection, validating it first
    pub fn select(&self, selection: &Selection, name: &str) -> Result<ArrayData> {
        selection.check(self.shape(), name)?;
        Ok(map_array!(self, a => select(a.view(), selection)))
    }

    /// Default-filled array (zeros, `false`, empty strings) of the given type and shape
    pub fn zeros(data_type: DataType, shape: &[usize]) -> ArrayData {
        let shape = IxDyn(shape);
        match data_type {
            DataType::Bool => ArrayData::Bool(ArrayD::default(shape)),
            DataType::I16 => ArrayData::I16(ArrayD::default(shape)),
            DataType::I32 => ArrayData::I32(ArrayD::default(shape)),
            DataType::I64 => ArrayData::I64(ArrayD::default(shape)),
            DataType::F32 => ArrayData::F32(ArrayD::default(shape)),
            DataType::F64 => ArrayData::F64(ArrayD::default(shape)),
            DataType::Text => ArrayData::Text(ArrayD::default(shape)),
        }
    }

    /// Owned copy of one leading-axis slice; `index` must be in range
    pub fn index_leading(&self, index: usize) -> ArrayData {
        map_array!(self, a => a.index_axis(Axis(0), index).to_owned())
    }

    /// Remove a leading axis of extent one from a result of rank three or more
    pub fn squeeze_leading(self) -> ArrayData {
        if self.ndim() < 3 || self.shape()[0] != 1 {
            return self;
        }
        map_array!(self, a => a.index_axis_move(Axis(0), 0))
    }

    /// Overwrite leading-axis positions with `values` of the same element type
    pub fn assign_leading(
        &mut self,
        temporal: &TemporalSelector,
        values: &ArrayData,
        name: &str,
    ) -> Result<()> {
        match (self, values) {
            (ArrayData::Bool(t), ArrayData::Bool(v)) => assign_leading(t, temporal, v.view(), name),
            (ArrayData::I16(t), ArrayData::I16(v)) => assign_leading(t, temporal, v.view(), name),
            (ArrayData::I32(t), ArrayData::I32(v)) => assign_leading(t, temporal, v.view(), name),
            (ArrayData::I64(t), ArrayData::I64(v)) => assign_leading(t, temporal, v.view(), name),
            (ArrayData::F32(t), ArrayData::F32(v)) => assign_leading(t, temporal, v.view(), name),
            (ArrayData::F64(t), ArrayData::F64(v)) => assign_leading(t, temporal, v.view(), name),
            (ArrayData::Text(t), ArrayData::Text(v)) => assign_leading(t, temporal, v.view(), name),
            (target, values) => Err(StackError::InvalidDataType {
                expected: target.data_type().to_string(),
                found: values.data_type().to_string(),
            }),
        }
    }

    /// Stack same-typed parts along a new leading axis
    pub fn stack_leading(data_type: DataType, parts: Vec<ArrayData>) -> Result<ArrayData> {
        macro_rules! stack_variant {
            ($variant:ident) => {{
                let mut arrays = Vec::with_capacity(parts.len());
                for part in parts {
                    match part {
                        ArrayData::$variant(a) => arrays.push(a),
                        other => {
                            return Err(StackError::InvalidDataType {
                                expected: data_type.to_string(),
                                found: other.data_type().to_string(),
                            })
                        }
                    }
                }
                let views: Vec<_> = arrays.iter().map(|a| a.view()).collect();
                let stacked = ndarray::stack(Axis(0), &views)
                    .map_err(|e| StackError::InvalidDimensions(e.to_string()))?;
                Ok(ArrayData::$variant(stacked))
            }};
        }
        match data_type {
            DataType::Bool => stack_variant!(Bool),
            DataType::I16 => stack_variant!(I16),
            DataType::I32 => stack_variant!(I32),
            DataType::I64 => stack_variant!(I64),
            DataType::F32 => stack_variant!(F32),
            DataType::F64 => stack_variant!(F64),
            DataType::Text => stack_variant!(Text),
        }
    }

    /// Convert to single precision, casting integer and boolean payloads
    pub fn into_f32(self) -> Result<ArrayD<f32>> {
        cast_numeric!(self, f32, "float32")
    }

    /// Convert to double precision, casting integer and boolean payloads
    pub fn into_f64(self) -> Result<ArrayD<f64>> {
        cast_numeric!(self, f64, "float64")
    }

    /// Convert to a boolean array; numeric payloads map non-zero to `true`
    pub fn into_bool(self) -> Result<ArrayD<bool>> {
        match self {
            ArrayData::Bool(a) => Ok(a),
            ArrayData::Text(_) => Err(StackError::InvalidDataType {
                expected: DataType::Bool.to_string(),
                found: DataType::Text.to_string(),
            }),
            other => Ok(other.into_f64()?.mapv(|v| v != 0.0)),
        }
    }

    /// Take the payload as strings
    pub fn into_text(self) -> Result<ArrayD<String>> {
        match self {
            ArrayData::Text(a) => Ok(a),
            other => Err(StackError::InvalidDataType {
                expected: DataType::Text.to_string(),
                found: other.data_type().to_string(),
            }),
        }
    }

    /// Build a 1-D string array
    pub fn text_vec(values: Vec<String>) -> ArrayData {
        ArrayData::Text(ndarray::Array1::from(values).into_dyn())
    }
}

impl From<ArrayD<f32>> for ArrayData {
    fn from(value: ArrayD<f32>) -> Self {
        ArrayData::F32(value)
    }
}

impl From<ArrayD<f64>> for ArrayData {
    fn from(value: ArrayD<f64>) -> Self {
        ArrayData::F64(value)
    }
}

impl From<ArrayD<bool>> for ArrayData {
    fn from(value: ArrayD<bool>) -> Self {
        ArrayData::Bool(value)
    }
}

impl From<ArrayD<i16>> for ArrayData {
    fn from(value: ArrayD<i16>) -> Self {
        ArrayData::I16(value)
    }
}

impl From<ArrayD<String>> for ArrayData {
    fn from(value: ArrayD<String>) -> Self {
        ArrayData::Text(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array, Array3};

    fn cube() -> ArrayData {
        let data = Array::from_iter((0..24).map(|v| v as f32))
            .into_shape_with_order((2, 3, 4))
            .unwrap()
            .into_dyn();
        ArrayData::F32(data)
    }

    #[test]
    fn test_select_box_and_index() {
        let selection = Selection {
            temporal: TemporalSelector::Index(1),
            rows: Some(1..3),
            cols: Some(0..2),
        };
        let out = cube().select(&selection, "cube").unwrap();
        assert_eq!(out.shape(), &[1, 2, 2]);
        assert_eq!(selection.output_shape(&[2, 3, 4]), vec![1, 2, 2]);

        let out = out.squeeze_leading().into_f32().unwrap();
        assert_eq!(out.shape(), &[2, 2]);
        assert_eq!(out[[0, 0]], 16.0);
        assert_eq!(out[[1, 1]], 21.0);
    }

    #[test]
    fn test_select_indices_preserves_order() {
        let selection = Selection::leading(TemporalSelector::Indices(vec![1, 0]));
        let out = cube().select(&selection, "cube").unwrap().into_f32().unwrap();
        assert_eq!(out.shape(), &[2, 3, 4]);
        assert_eq!(out[[0, 0, 0]], 12.0);
        assert_eq!(out[[1, 0, 0]], 0.0);
    }

    #[test]
    fn test_select_rejects_bad_ranges() {
        let selection = Selection::all().with_box(&BoundingBox::new(0, 0, 5, 3));
        assert!(matches!(
            cube().select(&selection, "cube"),
            Err(StackError::OutOfBounds(_))
        ));

        let selection = Selection::leading(TemporalSelector::Index(2));
        assert!(matches!(
            cube().select(&selection, "cube"),
            Err(StackError::OutOfBounds(_))
        ));
    }

    #[test]
    fn test_assign_leading() {
        let mut data = ArrayData::F32(Array3::<f32>::zeros((3, 2, 2)).into_dyn());
        let slice = ArrayData::F32(ndarray::Array2::<f32>::ones((2, 2)).into_dyn());
        data.assign_leading(&TemporalSelector::Index(1), &slice, "cube")
            .unwrap();
        let data = data.into_f32().unwrap();
        assert_eq!(data[[0, 0, 0]], 0.0);
        assert_eq!(data[[1, 1, 1]], 1.0);
        assert_eq!(data[[2, 0, 1]], 0.0);

        let mut mask = ArrayData::Bool(ArrayD::from_elem(IxDyn(&[3]), true));
        let wrong = ArrayData::F32(ArrayD::zeros(IxDyn(&[3])));
        assert!(matches!(
            mask.assign_leading(&TemporalSelector::All, &wrong, "mask"),
            Err(StackError::InvalidDataType { .. })
        ));
    }

    #[test]
    fn test_stack_leading() {
        let parts = vec![
            ArrayData::I16(ArrayD::from_elem(IxDyn(&[2, 2]), 1)),
            ArrayData::I16(ArrayD::from_elem(IxDyn(&[2, 2]), 2)),
        ];
        let stacked = ArrayData::stack_leading(DataType::I16, parts).unwrap();
        assert_eq!(stacked.shape(), &[2, 2, 2]);
        assert_eq!(stacked.data_type(), DataType::I16);
    }

    #[test]
    fn test_conversions() {
        let flags = ArrayData::I16(ArrayD::from_shape_vec(IxDyn(&[3]), vec![0, 2, -1]).unwrap());
        assert_eq!(
            flags.into_bool().unwrap().iter().copied().collect::<Vec<_>>(),
            vec![false, true, true]
        );
        assert!(ArrayData::text_vec(vec!["a".into()]).into_f32().is_err());
    }
}
