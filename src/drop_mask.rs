//! Keep/drop flags per pair and the filtered views derived from them

use crate::epoch::{Pair, PairIndex, PairKey};
use crate::error::{Result, StackError};
use std::collections::BTreeSet;

/// Boolean keep flag per pair, parallel to the pair index storage order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropMask {
    keep: Vec<bool>,
}

impl DropMask {
    /// Wrap stored flags, checking they line up with the pair index
    pub fn new(keep: Vec<bool>, index: &PairIndex) -> Result<Self> {
        if keep.len() != index.len() {
            return Err(StackError::InvalidDimensions(format!(
                "keep mask has {} entries for {} pairs",
                keep.len(),
                index.len()
            )));
        }
        Ok(Self { keep })
    }

    /// Mask keeping every pair
    pub fn keep_all(index: &PairIndex) -> Self {
        Self {
            keep: vec![true; index.len()],
        }
    }

    pub fn keep(&self) -> &[bool] {
        &self.keep
    }

    pub fn num_kept(&self) -> usize {
        self.keep.iter().filter(|&&k| k).count()
    }

    /// Storage positions to read, all of them when `apply_filter` is false
    pub fn filtered_indices(&self, apply_filter: bool) -> Vec<usize> {
        self.keep
            .iter()
            .enumerate()
            .filter(|(_, &k)| !apply_filter || k)
            .map(|(i, _)| i)
            .collect()
    }

    /// Pair descriptors in storage order, restricted to kept pairs when filtering
    pub fn filtered_pairs(&self, index: &PairIndex, apply_filter: bool) -> Vec<Pair> {
        self.filtered_indices(apply_filter)
            .into_iter()
            .map(|i| index.pairs()[i])
            .collect()
    }

    /// Pair keys in storage order, restricted to kept pairs when filtering
    pub fn filtered_keys(&self, index: &PairIndex, apply_filter: bool) -> Vec<PairKey> {
        self.filtered_indices(apply_filter)
            .into_iter()
            .map(|i| index.keys()[i])
            .collect()
    }

    /// Pair index re-derived over the filtered pairs
    pub fn filtered_index(&self, index: &PairIndex, apply_filter: bool) -> Result<PairIndex> {
        if !apply_filter {
            return Ok(index.clone());
        }
        index.subset(&self.filtered_indices(true))
    }

    /// Recompute flags so exactly the pairs in `to_drop` are dropped.
    ///
    /// Every key must exist in `index`. Returns whether any flag changed.
    pub fn set_keep(&mut self, index: &PairIndex, to_drop: &BTreeSet<PairKey>) -> Result<bool> {
        let unknown: Vec<String> = to_drop
            .iter()
            .filter(|k| index.position(k).is_none())
            .map(|k| k.to_string())
            .collect();
        if !unknown.is_empty() {
            return Err(StackError::UnknownPair(unknown.join(",")));
        }

        let keep: Vec<bool> = index.keys().iter().map(|k| !to_drop.contains(k)).collect();
        let changed = keep != self.keep;
        self.keep = keep;
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> PairIndex {
        PairIndex::from_date_pairs(&[
            ("20200101", "20200113"),
            ("20200113", "20200125"),
            ("20200101", "20200125"),
        ])
        .unwrap()
    }

    fn keys(list: &[&str]) -> BTreeSet<PairKey> {
        list.iter().map(|s| PairKey::parse(s).unwrap()).collect()
    }

    #[test]
    fn test_unfiltered_views() {
        let index = index();
        let mask = DropMask::new(vec![true, false, true], &index).unwrap();
        assert_eq!(mask.filtered_indices(false), vec![0, 1, 2]);
        assert_eq!(mask.filtered_pairs(&index, false).len(), 3);
        assert_eq!(mask.filtered_indices(true), vec![0, 2]);
        assert_eq!(mask.num_kept(), 2);
    }

    #[test]
    fn test_length_mismatch() {
        assert!(matches!(
            DropMask::new(vec![true], &index()),
            Err(StackError::InvalidDimensions(_))
        ));
    }

    #[test]
    fn test_set_keep_drops_exactly_the_given_pairs() {
        let index = index();
        let mut mask = DropMask::keep_all(&index);
        let drop = keys(&["20200101_20200125"]);

        assert!(mask.set_keep(&index, &drop).unwrap());
        let kept: Vec<String> = mask
            .filtered_keys(&index, true)
            .iter()
            .map(|k| k.to_string())
            .collect();
        assert_eq!(kept, vec!["20200101_20200113", "20200113_20200125"]);
        assert_eq!(mask.filtered_pairs(&index, true), index.pairs()[..2].to_vec());

        // second call with the same set leaves the mask unchanged
        let before = mask.clone();
        assert!(!mask.set_keep(&index, &drop).unwrap());
        assert_eq!(mask, before);
    }

    #[test]
    fn test_set_keep_rejects_unknown_pairs() {
        let index = index();
        let mut mask = DropMask::keep_all(&index);
        let result = mask.set_keep(&index, &keys(&["20200101_20200113", "20190101_20190113"]));
        match result {
            Err(StackError::UnknownPair(msg)) => assert_eq!(msg, "20190101_20190113"),
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(mask.num_kept(), 3);
    }

    #[test]
    fn test_filtered_index() {
        let index = index();
        let mask = DropMask::new(vec![false, true, false], &index).unwrap();
        let filtered = mask.filtered_index(&index, true).unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered.epochs().len(), 2);

        let none = DropMask::new(vec![false, false, false], &index).unwrap();
        assert!(matches!(
            none.filtered_index(&index, true),
            Err(StackError::EmptyIndex(_))
        ));
    }
}
