//! Epoch and pair indices derived from stored date strings

use crate::error::{Result, StackError};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

/// Calendar date identifying one acquisition, written as `YYYYMMDD`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EpochKey(NaiveDate);

impl EpochKey {
    /// Storage format of epoch keys
    pub const FORMAT: &'static str = "%Y%m%d";

    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Parse a `YYYYMMDD` key
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(StackError::MalformedDate(s.to_string()));
        }
        NaiveDate::parse_from_str(s, Self::FORMAT)
            .map(Self)
            .map_err(|_| StackError::MalformedDate(s.to_string()))
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// Whole days from `earlier` to this epoch
    pub fn days_since(&self, earlier: &EpochKey) -> i64 {
        (self.0 - earlier.0).num_days()
    }

    /// Fractional year, e.g. `2014.95`
    pub fn decimal_year(&self) -> f64 {
        self.0.year() as f64 + (self.0.ordinal() - 1) as f64 / 365.25
    }
}

impl fmt::Display for EpochKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(Self::FORMAT))
    }
}

impl FromStr for EpochKey {
    type Err = StackError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Pair of epochs linked by one interferometric measurement, written `a_b`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey {
    pub first: EpochKey,
    pub second: EpochKey,
}

impl PairKey {
    pub fn new(first: EpochKey, second: EpochKey) -> Self {
        Self { first, second }
    }

    pub fn parse(s: &str) -> Result<Self> {
        let (a, b) = s
            .trim()
            .split_once('_')
            .ok_or_else(|| StackError::MalformedDate(s.to_string()))?;
        Ok(Self::new(EpochKey::parse(a)?, EpochKey::parse(b)?))
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.first, self.second)
    }
}

impl FromStr for PairKey {
    type Err = StackError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// One epoch with its offset in days from the earliest epoch of its index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Epoch {
    pub key: EpochKey,
    pub offset: i64,
}

/// Chronologically ordered, deduplicated epochs
#[derive(Debug, Clone, PartialEq)]
pub struct EpochIndex {
    epochs: Vec<Epoch>,
    ordinals: HashMap<EpochKey, usize>,
    /// Keys in storage order of the array they were read from
    axis: Vec<EpochKey>,
    positions: HashMap<EpochKey, usize>,
}

impl EpochIndex {
    /// Build from any collection of keys; duplicates collapse and order is chronological
    pub fn from_keys<I: IntoIterator<Item = EpochKey>>(keys: I) -> Result<Self> {
        let unique: BTreeSet<EpochKey> = keys.into_iter().collect();
        let sorted: Vec<EpochKey> = unique.into_iter().collect();
        Self::build(sorted.clone(), sorted)
    }

    /// Build from an explicit per-epoch date array, keeping its storage positions
    pub fn from_date_strings<S: AsRef<str>>(dates: &[S]) -> Result<Self> {
        let axis = dates
            .iter()
            .map(|d| EpochKey::parse(d.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        let mut sorted = axis.clone();
        sorted.sort();
        if let Some(dup) = sorted.windows(2).find(|w| w[0] == w[1]) {
            return Err(StackError::Metadata(format!(
                "date {} appears more than once in the epoch array",
                dup[0]
            )));
        }
        Self::build(sorted, axis)
    }

    fn build(sorted: Vec<EpochKey>, axis: Vec<EpochKey>) -> Result<Self> {
        let first = *sorted
            .first()
            .ok_or_else(|| StackError::EmptyIndex("no epochs".to_string()))?;

        let epochs: Vec<Epoch> = sorted
            .iter()
            .map(|key| Epoch {
                key: *key,
                offset: key.days_since(&first),
            })
            .collect();
        let ordinals = sorted.iter().enumerate().map(|(i, k)| (*k, i)).collect();
        let positions = axis.iter().enumerate().map(|(i, k)| (*k, i)).collect();

        Ok(Self {
            epochs,
            ordinals,
            axis,
            positions,
        })
    }

    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }

    /// Epochs in chronological order
    pub fn epochs(&self) -> &[Epoch] {
        &self.epochs
    }

    /// Keys in chronological order
    pub fn keys(&self) -> Vec<EpochKey> {
        self.epochs.iter().map(|e| e.key).collect()
    }

    /// Keys in the storage order of the array the index was read from
    pub fn storage_keys(&self) -> &[EpochKey] {
        &self.axis
    }

    pub fn first(&self) -> EpochKey {
        self.epochs[0].key
    }

    /// Chronological ordinal of a key
    pub fn ordinal(&self, key: &EpochKey) -> Option<usize> {
        self.ordinals.get(key).copied()
    }

    /// Chronological ordinal of a key, failing with `UnknownEpoch`
    pub fn require_ordinal(&self, key: &EpochKey) -> Result<usize> {
        self.ordinal(key)
            .ok_or_else(|| StackError::UnknownEpoch(key.to_string()))
    }

    /// Position of a key on the stored leading axis
    pub fn position(&self, key: &EpochKey) -> Option<usize> {
        self.positions.get(key).copied()
    }

    /// Offsets in days from the earliest epoch, chronological order
    pub fn tbase(&self) -> Vec<i64> {
        self.epochs.iter().map(|e| e.offset).collect()
    }

    /// Day separations between consecutive epochs
    pub fn tbase_diff(&self) -> Vec<i64> {
        self.epochs
            .windows(2)
            .map(|w| w[1].offset - w[0].offset)
            .collect()
    }

    /// Offsets in days relative to `reference`, chronological order
    pub fn offsets_from(&self, reference: &EpochKey) -> Result<Vec<i64>> {
        let r = self.require_ordinal(reference)?;
        let base = self.epochs[r].offset;
        Ok(self.epochs.iter().map(|e| e.offset - base).collect())
    }
}

/// One stored pair, referencing epochs by chronological ordinal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pair {
    pub first: usize,
    pub second: usize,
    pub delta_days: i64,
}

/// Pairs in storage order plus the epoch index spanned by them
#[derive(Debug, Clone, PartialEq)]
pub struct PairIndex {
    epochs: EpochIndex,
    pairs: Vec<Pair>,
    keys: Vec<PairKey>,
    positions: HashMap<PairKey, usize>,
}

impl PairIndex {
    /// Build from the stored `(epoch_a, epoch_b)` string pairs
    pub fn from_date_pairs<S: AsRef<str>>(dates: &[(S, S)]) -> Result<Self> {
        let keys = dates
            .iter()
            .map(|(a, b)| Ok(PairKey::new(EpochKey::parse(a.as_ref())?, EpochKey::parse(b.as_ref())?)))
            .collect::<Result<Vec<_>>>()?;
        Self::from_keys(keys)
    }

    /// Build from parsed pair keys in storage order
    pub fn from_keys(keys: Vec<PairKey>) -> Result<Self> {
        if keys.is_empty() {
            return Err(StackError::EmptyIndex("no pairs".to_string()));
        }
        if let Some(bad) = keys.iter().find(|k| k.first > k.second) {
            return Err(StackError::InvalidFormat(format!(
                "pair {} is not in chronological order",
                bad
            )));
        }

        let epochs = EpochIndex::from_keys(keys.iter().flat_map(|k| [k.first, k.second]))?;
        let mut pairs = Vec::with_capacity(keys.len());
        for key in &keys {
            let first = epochs.require_ordinal(&key.first)?;
            let second = epochs.require_ordinal(&key.second)?;
            pairs.push(Pair {
                first,
                second,
                delta_days: epochs.epochs[second].offset - epochs.epochs[first].offset,
            });
        }

        let mut positions = HashMap::with_capacity(keys.len());
        for (i, key) in keys.iter().enumerate() {
            positions.entry(*key).or_insert(i);
        }

        log::debug!(
            "derived pair index: {} pairs over {} epochs",
            pairs.len(),
            epochs.len()
        );

        Ok(Self {
            epochs,
            pairs,
            keys,
            positions,
        })
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn epochs(&self) -> &EpochIndex {
        &self.epochs
    }

    pub fn pairs(&self) -> &[Pair] {
        &self.pairs
    }

    pub fn keys(&self) -> &[PairKey] {
        &self.keys
    }

    /// Canonical key of the pair at storage position `i`
    pub fn pair_key(&self, i: usize) -> Option<&PairKey> {
        self.keys.get(i)
    }

    /// Storage position of a pair
    pub fn position(&self, key: &PairKey) -> Option<usize> {
        self.positions.get(key).copied()
    }

    /// Storage position of a pair, failing with `UnknownPair`
    pub fn require_position(&self, key: &PairKey) -> Result<usize> {
        self.position(key)
            .ok_or_else(|| StackError::UnknownPair(key.to_string()))
    }

    /// Re-derive an index over the pairs at the given storage positions
    pub fn subset(&self, positions: &[usize]) -> Result<PairIndex> {
        let keys = positions
            .iter()
            .map(|&i| {
                self.keys.get(i).copied().ok_or_else(|| {
                    StackError::OutOfBounds(format!("pair position {} of {}", i, self.len()))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        PairIndex::from_keys(keys)
    }
}
