//! Streaming reductions over cubes, one leading-axis slice at a time

use crate::array::{Selection, TemporalSelector};
use crate::error::{Result, StackError};
use crate::io::Container;
use crate::types::BoundingBox;
use ndarray::{Array2, Ix2};
use num_traits::Float;

/// Read one 2-D plane: a leading-axis position of a cube, or a whole raster
pub fn read_plane<C: Container + ?Sized>(
    container: &C,
    array: &str,
    position: Option<usize>,
    bbox: &BoundingBox,
) -> Result<Array2<f32>> {
    let temporal = match position {
        Some(p) => TemporalSelector::Index(p),
        None => TemporalSelector::All,
    };
    let selection = Selection::leading(temporal).with_box(bbox);
    container
        .read_slice(array, &selection)?
        .squeeze_leading()
        .into_f32()?
        .into_dimensionality::<Ix2>()
        .map_err(|e| StackError::InvalidDimensions(format!("'{}' is not a stack of planes: {}", array, e)))
}

/// Planes selected by `positions`, or the raster itself when `None`
fn planes(positions: Option<&[usize]>) -> Vec<Option<usize>> {
    match positions {
        Some(positions) => positions.iter().map(|&p| Some(p)).collect(),
        None => vec![None],
    }
}

/// Mean of the selected slices, each multiplied by its entry in `scales`.
///
/// The divisor is the number of slices read; NaN propagates.
pub fn temporal_average<C: Container + ?Sized>(
    container: &C,
    array: &str,
    positions: &[usize],
    scales: &[f32],
    bbox: &BoundingBox,
) -> Result<Array2<f32>> {
    if positions.is_empty() {
        return Err(StackError::EmptyIndex(format!("no slices of '{}' to average", array)));
    }
    if scales.len() != positions.len() {
        return Err(StackError::InvalidDimensions(format!(
            "{} scale factors for {} slices",
            scales.len(),
            positions.len()
        )));
    }

    log::info!("Averaging {} slices of '{}'", positions.len(), array);
    let mut total = Array2::<f32>::zeros((bbox.length(), bbox.width()));
    for (&position, &scale) in positions.iter().zip(scales) {
        let plane = read_plane(container, array, Some(position), bbox)?;
        total.scaled_add(scale, &plane);
    }
    total /= positions.len() as f32;
    Ok(total)
}

/// NaN-aware mean per slice; masked-out pixels are ignored.
///
/// Slices with no valid pixel average to NaN.
pub fn spatial_average<C: Container + ?Sized>(
    container: &C,
    array: &str,
    positions: Option<&[usize]>,
    mask: Option<&Array2<bool>>,
    bbox: &BoundingBox,
) -> Result<Vec<f64>> {
    check_mask(mask, bbox)?;
    let mut averages = Vec::new();
    for position in planes(positions) {
        let plane = read_plane(container, array, position, bbox)?;
        let stats = PlaneStats::collect(&plane, mask);
        if stats.count == 0 {
            log::warn!("No valid pixels in slice {:?} of '{}'", position, array);
        }
        averages.push(stats.mean());
    }
    Ok(averages)
}

/// Pixels that are finite and non-zero in every selected slice
pub fn nonzero_mask<C: Container + ?Sized>(
    container: &C,
    array: &str,
    positions: Option<&[usize]>,
    bbox: &BoundingBox,
) -> Result<Array2<bool>> {
    log::info!("Computing non-zero mask from '{}'", array);
    let mut mask = Array2::from_elem((bbox.length(), bbox.width()), true);
    for position in planes(positions) {
        let plane = read_plane(container, array, position, bbox)?;
        mask.zip_mut_with(&plane, |keep, &v| *keep &= v.is_finite() && v != 0.0);
    }
    if !mask.iter().any(|&keep| keep) {
        log::warn!("Non-zero mask of '{}' is empty", array);
    }
    Ok(mask)
}

/// NaN-aware standard deviation per slice
pub fn std_per_slice<C: Container + ?Sized>(
    container: &C,
    array: &str,
    positions: &[usize],
    mask: Option<&Array2<bool>>,
    bbox: &BoundingBox,
) -> Result<Vec<f64>> {
    per_slice(container, array, positions, mask, bbox, PlaneStats::std)
}

/// NaN-aware root mean square per slice
pub fn rms_per_slice<C: Container + ?Sized>(
    container: &C,
    array: &str,
    positions: &[usize],
    mask: Option<&Array2<bool>>,
    bbox: &BoundingBox,
) -> Result<Vec<f64>> {
    per_slice(container, array, positions, mask, bbox, PlaneStats::rms)
}

fn per_slice<C: Container + ?Sized>(
    container: &C,
    array: &str,
    positions: &[usize],
    mask: Option<&Array2<bool>>,
    bbox: &BoundingBox,
    statistic: fn(&PlaneStats) -> f64,
) -> Result<Vec<f64>> {
    check_mask(mask, bbox)?;
    positions
        .iter()
        .map(|&p| {
            let plane = read_plane(container, array, Some(p), bbox)?;
            Ok(statistic(&PlaneStats::collect(&plane, mask)))
        })
        .collect()
}

fn check_mask(mask: Option<&Array2<bool>>, bbox: &BoundingBox) -> Result<()> {
    match mask {
        Some(m) if m.dim() != (bbox.length(), bbox.width()) => Err(StackError::InvalidDimensions(format!(
            "mask of shape {:?} for a {}x{} box",
            m.dim(),
            bbox.length(),
            bbox.width()
        ))),
        _ => Ok(()),
    }
}

/// Running sums over the valid pixels of one plane
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct PlaneStats {
    count: usize,
    sum: f64,
    sum_sq: f64,
}

impl PlaneStats {
    fn collect<T: Float>(plane: &Array2<T>, mask: Option<&Array2<bool>>) -> Self {
        let mut stats = Self::default();
        for ((r, c), &v) in plane.indexed_iter() {
            if v.is_nan() || mask.is_some_and(|m| !m[(r, c)]) {
                continue;
            }
            let v = v.to_f64().unwrap_or(f64::NAN);
            stats.count += 1;
            stats.sum += v;
            stats.sum_sq += v * v;
        }
        stats
    }

    fn mean(&self) -> f64 {
        if self.count == 0 {
            return f64::NAN;
        }
        self.sum / self.count as f64
    }

    fn rms(&self) -> f64 {
        if self.count == 0 {
            return f64::NAN;
        }
        (self.sum_sq / self.count as f64).sqrt()
    }

    fn std(&self) -> f64 {
        if self.count == 0 {
            return f64::NAN;
        }
        let mean = self.mean();
        (self.sum_sq / self.count as f64 - mean * mean).max(0.0).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::ArrayData;
    use crate::io::MemoryContainer;
    use ndarray::{Array3, ArrayD, IxDyn};

    fn container() -> MemoryContainer {
        let mut container = MemoryContainer::new();
        let mut cube = Array3::<f32>::zeros((3, 2, 2));
        cube.index_axis_mut(ndarray::Axis(0), 0).fill(1.0);
        cube.index_axis_mut(ndarray::Axis(0), 1).fill(3.0);
        cube[[2, 0, 0]] = f32::NAN;
        cube[[2, 1, 1]] = 4.0;
        container
            .write_array("coherence", ArrayData::F32(cube.into_dyn()), true)
            .unwrap();
        container
            .write_array("height", ArrayData::F32(ArrayD::from_elem(IxDyn(&[2, 2]), 5.0)), false)
            .unwrap();
        container
    }

    #[test]
    fn test_temporal_average() {
        let container = container();
        let bbox = BoundingBox::full(2, 2);
        let avg = temporal_average(&container, "coherence", &[0, 1], &[1.0, 1.0], &bbox).unwrap();
        assert_eq!(avg, Array2::from_elem((2, 2), 2.0));

        let avg = temporal_average(&container, "coherence", &[0, 1], &[2.0, -1.0], &bbox).unwrap();
        assert_eq!(avg, Array2::from_elem((2, 2), -0.5));

        assert!(matches!(
            temporal_average(&container, "coherence", &[], &[], &bbox),
            Err(StackError::EmptyIndex(_))
        ));
    }

    #[test]
    fn test_spatial_average_skips_nan_and_mask() {
        let container = container();
        let bbox = BoundingBox::full(2, 2);
        let averages = spatial_average(&container, "coherence", Some(&[1, 2][..]), None, &bbox).unwrap();
        assert_eq!(averages[0], 3.0);
        assert!((averages[1] - 4.0 / 3.0).abs() < 1e-12);

        let mut mask = Array2::from_elem((2, 2), false);
        mask[(1, 1)] = true;
        let averages = spatial_average(&container, "coherence", Some(&[2][..]), Some(&mask), &bbox).unwrap();
        assert_eq!(averages, vec![4.0]);

        let raster = spatial_average(&container, "height", None, None, &bbox).unwrap();
        assert_eq!(raster, vec![5.0]);
    }

    #[test]
    fn test_nonzero_mask() {
        let container = container();
        let bbox = BoundingBox::full(2, 2);
        let mask = nonzero_mask(&container, "coherence", Some(&[0, 1][..]), &bbox).unwrap();
        assert!(mask.iter().all(|&v| v));

        let mask = nonzero_mask(&container, "coherence", Some(&[0, 2][..]), &bbox).unwrap();
        assert_eq!(mask, Array2::from_shape_vec((2, 2), vec![false, false, false, true]).unwrap());
    }

    #[test]
    fn test_std_and_rms() {
        let container = container();
        let bbox = BoundingBox::new(0, 0, 2, 1);
        // row 0 of slice 2 is [NaN, 0]
        let std = std_per_slice(&container, "coherence", &[1, 2], None, &bbox).unwrap();
        assert_eq!(std, vec![0.0, 0.0]);
        let rms = rms_per_slice(&container, "coherence", &[0, 1], None, &bbox).unwrap();
        assert_eq!(rms, vec![1.0, 3.0]);

        let wrong = Array2::from_elem((2, 2), true);
        assert!(matches!(
            rms_per_slice(&container, "coherence", &[0], Some(&wrong), &bbox),
            Err(StackError::InvalidDimensions(_))
        ));
    }
}
