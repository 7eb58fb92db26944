//! Mask containers: a single 2-D dataset where non-zero means keep

use crate::error::{Result, StackError};
use crate::io::{AccessMode, Container};
use crate::reduce::read_plane;
use crate::store::DirContainer;
use crate::types::BoundingBox;
use ndarray::Array2;
use std::path::Path;

const MASK: &str = "mask";

/// Read the mask dataset of a container, optionally bounded.
///
/// Uses `mask` when present, otherwise the first array by name.
pub fn read_mask<C: Container + ?Sized>(container: &C, bbox: Option<BoundingBox>) -> Result<Array2<bool>> {
    let names = container.array_names()?;
    let name = if names.iter().any(|n| n == MASK) {
        MASK.to_string()
    } else {
        names
            .into_iter()
            .min()
            .ok_or_else(|| StackError::NotFound("mask container has no dataset".to_string()))?
    };

    let info = container
        .array_info(&name)?
        .ok_or_else(|| StackError::NotFound(name.clone()))?;
    if info.rank() != 2 {
        return Err(StackError::InvalidDimensions(format!(
            "mask '{}' must be 2-D, got shape {:?}",
            name, info.shape
        )));
    }
    let (length, width) = (info.shape[0], info.shape[1]);
    let bbox = bbox.unwrap_or_else(|| BoundingBox::full(length, width));
    bbox.check_within(length, width)?;

    log::debug!("Reading mask '{}' over {}", name, bbox);
    let plane = read_plane(container, &name, None, &bbox)?;
    Ok(plane.mapv(|v| v != 0.0 && !v.is_nan()))
}

/// Open a mask container directory read-only and read its mask
pub fn read_mask_file(path: impl AsRef<Path>, bbox: Option<BoundingBox>) -> Result<Array2<bool>> {
    let container = DirContainer::open(path, AccessMode::Read)?;
    read_mask(&container, bbox)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::ArrayData;
    use crate::io::MemoryContainer;
    use ndarray::{Array2, Array3};

    #[test]
    fn test_read_mask_prefers_mask_dataset() {
        let mut container = MemoryContainer::new();
        let values = Array2::from_shape_vec((2, 3), vec![1i16, 0, 2, 0, 1, 1]).unwrap();
        container
            .write_array("mask", ArrayData::I16(values.into_dyn()), false)
            .unwrap();
        container
            .write_array("aaa", ArrayData::F32(Array2::<f32>::zeros((2, 3)).into_dyn()), false)
            .unwrap();

        let mask = read_mask(&container, None).unwrap();
        assert_eq!(
            mask,
            Array2::from_shape_vec((2, 3), vec![true, false, true, false, true, true]).unwrap()
        );

        let mask = read_mask(&container, Some(BoundingBox::new(1, 1, 3, 2))).unwrap();
        assert_eq!(mask, Array2::from_elem((1, 2), true));

        assert!(matches!(
            read_mask(&container, Some(BoundingBox::new(0, 0, 4, 2))),
            Err(StackError::OutOfBounds(_))
        ));
    }

    #[test]
    fn test_read_mask_single_dataset() {
        let mut container = MemoryContainer::new();
        let values = Array2::from_shape_vec((1, 2), vec![0.5f32, f32::NAN]).unwrap();
        container
            .write_array("waterMask", ArrayData::F32(values.into_dyn()), false)
            .unwrap();
        assert_eq!(read_mask(&container, None).unwrap(), Array2::from_shape_vec((1, 2), vec![true, false]).unwrap());
    }

    #[test]
    fn test_read_mask_errors() {
        assert!(matches!(
            read_mask(&MemoryContainer::new(), None),
            Err(StackError::NotFound(_))
        ));

        let mut container = MemoryContainer::new();
        container
            .write_array("mask", ArrayData::F32(Array3::<f32>::ones((2, 2, 2)).into_dyn()), false)
            .unwrap();
        assert!(matches!(
            read_mask(&container, None),
            Err(StackError::InvalidDimensions(_))
        ));
    }
}
