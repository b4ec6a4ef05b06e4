#![forbid(unsafe_code)]

use std::cell::OnceCell;
use std::collections::HashSet;
use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};
use tb_types::ErrorKind;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum IndexLabel {
    Int64(i64),
    Utf8(String),
}

impl IndexLabel {
    #[must_use]
    pub fn kind(&self) -> LabelKind {
        match self {
            Self::Int64(_) => LabelKind::Int64,
            Self::Utf8(_) => LabelKind::Utf8,
        }
    }
}

impl From<i64> for IndexLabel {
    fn from(value: i64) -> Self {
        Self::Int64(value)
    }
}

impl From<i32> for IndexLabel {
    fn from(value: i32) -> Self {
        Self::Int64(i64::from(value))
    }
}

impl From<&str> for IndexLabel {
    fn from(value: &str) -> Self {
        Self::Utf8(value.to_owned())
    }
}

impl From<String> for IndexLabel {
    fn from(value: String) -> Self {
        Self::Utf8(value)
    }
}

impl fmt::Display for IndexLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int64(v) => write!(f, "{v}"),
            Self::Utf8(v) => write!(f, "{v}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelKind {
    Int64,
    Utf8,
}

/// Ordering of an index's labels. Ties are allowed in both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Monotonic {
    Increasing,
    Decreasing,
    Neither,
}

fn detect_monotonic(labels: &[IndexLabel]) -> Monotonic {
    if labels.len() <= 1 {
        return Monotonic::Increasing;
    }
    if labels.windows(2).any(|w| w[0].kind() != w[1].kind()) {
        return Monotonic::Neither;
    }
    if labels.windows(2).all(|w| w[0] <= w[1]) {
        Monotonic::Increasing
    } else if labels.windows(2).all(|w| w[0] >= w[1]) {
        Monotonic::Decreasing
    } else {
        Monotonic::Neither
    }
}

fn detect_duplicates(labels: &[IndexLabel]) -> bool {
    let mut seen = HashSet::with_capacity(labels.len());
    labels.iter().any(|label| !seen.insert(label))
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IndexError {
    #[error("index mixes label types: found {first:?} and {other:?}")]
    MixedLabelTypes { first: LabelKind, other: LabelKind },
    #[error("label not found: {0}")]
    LabelNotFound(IndexLabel),
    #[error("cannot slice a non-monotonic index on label {0} which is not unique")]
    NonUniqueSliceBound(IndexLabel),
}

impl IndexError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MixedLabelTypes { .. } => ErrorKind::Type,
            Self::LabelNotFound(_) | Self::NonUniqueSliceBound(_) => ErrorKind::Key,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "IndexSnapshot")]
pub struct Index {
    labels: Vec<IndexLabel>,
    #[serde(skip)]
    duplicate_cache: OnceCell<bool>,
    #[serde(skip)]
    monotonic_cache: OnceCell<Monotonic>,
}

#[derive(Deserialize)]
struct IndexSnapshot {
    labels: Vec<IndexLabel>,
}

impl TryFrom<IndexSnapshot> for Index {
    type Error = IndexError;

    fn try_from(snapshot: IndexSnapshot) -> Result<Self, Self::Error> {
        let index = Self::new(snapshot.labels);
        index.label_kind()?;
        Ok(index)
    }
}

impl PartialEq for Index {
    fn eq(&self, other: &Self) -> bool {
        self.labels == other.labels
    }
}

impl Eq for Index {}

impl Index {
    #[must_use]
    pub fn new(labels: Vec<IndexLabel>) -> Self {
        Self {
            labels,
            duplicate_cache: OnceCell::new(),
            monotonic_cache: OnceCell::new(),
        }
    }

    /// Default `0..len` index.
    #[must_use]
    pub fn range(len: usize) -> Self {
        Self::new((0..len).map(|i| IndexLabel::Int64(i as i64)).collect())
    }

    #[must_use]
    pub fn from_i64(values: Vec<i64>) -> Self {
        Self::new(values.into_iter().map(IndexLabel::from).collect())
    }

    #[must_use]
    pub fn from_utf8(values: Vec<String>) -> Self {
        Self::new(values.into_iter().map(IndexLabel::from).collect())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    #[must_use]
    pub fn labels(&self) -> &[IndexLabel] {
        &self.labels
    }

    #[must_use]
    pub fn has_duplicates(&self) -> bool {
        *self
            .duplicate_cache
            .get_or_init(|| detect_duplicates(&self.labels))
    }

    #[must_use]
    pub fn monotonic(&self) -> Monotonic {
        *self
            .monotonic_cache
            .get_or_init(|| detect_monotonic(&self.labels))
    }

    /// The single label type shared by every label, or `None` when empty.
    pub fn label_kind(&self) -> Result<Option<LabelKind>, IndexError> {
        let Some(first) = self.labels.first().map(IndexLabel::kind) else {
            return Ok(None);
        };
        if let Some(other) = self
            .labels
            .iter()
            .map(IndexLabel::kind)
            .find(|kind| *kind != first)
        {
            return Err(IndexError::MixedLabelTypes { first, other });
        }
        Ok(Some(first))
    }

    fn is_strictly_increasing(&self) -> bool {
        self.monotonic() == Monotonic::Increasing && !self.has_duplicates()
    }

    /// First position holding `needle`.
    ///
    /// Strictly increasing indexes use binary search; everything else scans.
    #[must_use]
    pub fn position(&self, needle: &IndexLabel) -> Option<usize> {
        if self.is_strictly_increasing() {
            self.labels.binary_search(needle).ok()
        } else {
            self.labels.iter().position(|label| label == needle)
        }
    }

    /// Every position holding `needle`, in index order.
    #[must_use]
    pub fn positions(&self, needle: &IndexLabel) -> Vec<usize> {
        if !self.has_duplicates() {
            return self.position(needle).into_iter().collect();
        }
        self.labels
            .iter()
            .enumerate()
            .filter(|(_, label)| *label == needle)
            .map(|(pos, _)| pos)
            .collect()
    }

    /// Resolve an inclusive label range to a half-open range of positions.
    ///
    /// Monotonic indexes locate the bounds by binary search, so the bounds do
    /// not have to be present; an inverted range comes back empty. A
    /// non-monotonic index requires each given bound to occur exactly once.
    pub fn slice_locs(
        &self,
        start: Option<&IndexLabel>,
        stop: Option<&IndexLabel>,
    ) -> Result<Range<usize>, IndexError> {
        let kind = self.label_kind()?;
        for bound in [start, stop].into_iter().flatten() {
            if kind.is_some_and(|kind| kind != bound.kind()) {
                return Err(IndexError::LabelNotFound(bound.clone()));
            }
        }

        let (lo, hi) = match self.monotonic() {
            Monotonic::Increasing => (
                start.map_or(0, |s| self.labels.partition_point(|l| l < s)),
                stop.map_or(self.len(), |s| self.labels.partition_point(|l| l <= s)),
            ),
            Monotonic::Decreasing => (
                start.map_or(0, |s| self.labels.partition_point(|l| l > s)),
                stop.map_or(self.len(), |s| self.labels.partition_point(|l| l >= s)),
            ),
            Monotonic::Neither => (
                start.map_or(Ok(0), |s| self.unique_position(s))?,
                stop.map_or(Ok(self.len()), |s| self.unique_position(s).map(|p| p + 1))?,
            ),
        };

        Ok(lo..hi.max(lo))
    }

    fn unique_position(&self, label: &IndexLabel) -> Result<usize, IndexError> {
        match self.positions(label).as_slice() {
            [] => Err(IndexError::LabelNotFound(label.clone())),
            [pos] => Ok(*pos),
            _ => Err(IndexError::NonUniqueSliceBound(label.clone())),
        }
    }

    #[must_use]
    pub fn take(&self, positions: &[usize]) -> Self {
        Self::new(positions.iter().map(|&i| self.labels[i].clone()).collect())
    }

    #[must_use]
    pub fn slice(&self, range: Range<usize>) -> Self {
        let end = range.end.min(self.labels.len());
        let start = range.start.min(end);
        Self::new(self.labels[start..end].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::{Index, IndexError, IndexLabel, LabelKind, Monotonic};

    fn utf8(labels: &[&str]) -> Index {
        Index::from_utf8(labels.iter().map(|s| (*s).to_owned()).collect())
    }

    #[test]
    fn range_index_is_strictly_increasing() {
        let index = Index::range(4);
        assert_eq!(index.monotonic(), Monotonic::Increasing);
        assert!(!index.has_duplicates());
        assert_eq!(index.position(&3_i64.into()), Some(3));
        assert_eq!(index.position(&4_i64.into()), None);
    }

    #[test]
    fn positions_reports_every_duplicate() {
        let index = utf8(&["a", "b", "a"]);
        assert!(index.has_duplicates());
        assert_eq!(index.positions(&"a".into()), vec![0, 2]);
        assert!(index.positions(&"z".into()).is_empty());
    }

    #[test]
    fn mixed_label_kinds_are_reported() {
        let index = Index::new(vec![1_i64.into(), "a".into()]);
        assert_eq!(
            index.label_kind(),
            Err(IndexError::MixedLabelTypes {
                first: LabelKind::Int64,
                other: LabelKind::Utf8,
            })
        );
        assert_eq!(index.monotonic(), Monotonic::Neither);
    }

    #[test]
    fn snapshot_round_trips_and_rejects_mixed_labels() {
        let index = utf8(&["a", "b"]);
        let json = serde_json::to_value(&index).expect("serialize");
        let back: Index = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, index);

        let mixed = serde_json::json!({
            "labels": [
                {"kind": "int64", "value": 1},
                {"kind": "utf8", "value": "a"},
            ]
        });
        let err = serde_json::from_value::<Index>(mixed).expect_err("mixed kinds");
        assert!(err.to_string().contains("mixes label types"));
    }

    #[test]
    fn slice_locs_is_inclusive_on_sorted_index() {
        let index = Index::range(10);
        let range = index
            .slice_locs(Some(&2_i64.into()), Some(&5_i64.into()))
            .expect("slice");
        assert_eq!(range, 2..6);
    }

    #[test]
    fn slice_locs_bounds_need_not_exist_on_sorted_index() {
        let index = Index::from_i64(vec![10, 20, 30, 40]);
        let range = index
            .slice_locs(Some(&15_i64.into()), Some(&35_i64.into()))
            .expect("slice");
        assert_eq!(range, 1..3);
        let open = index.slice_locs(None, Some(&20_i64.into())).expect("slice");
        assert_eq!(open, 0..2);
    }

    #[test]
    fn inverted_range_is_empty() {
        let index = Index::range(5);
        let range = index
            .slice_locs(Some(&4_i64.into()), Some(&1_i64.into()))
            .expect("slice");
        assert!(range.is_empty());
    }

    #[test]
    fn slice_locs_on_decreasing_index() {
        let index = utf8(&["d", "c", "b", "a"]);
        assert_eq!(index.monotonic(), Monotonic::Decreasing);
        let range = index
            .slice_locs(Some(&"c".into()), Some(&"b".into()))
            .expect("slice");
        assert_eq!(range, 1..3);
    }

    #[test]
    fn non_monotonic_slice_requires_unique_bounds() {
        let index = utf8(&["Apples", "Potatoes", "Carrots", "Potatoes"]);
        assert_eq!(index.monotonic(), Monotonic::Neither);
        let range = index
            .slice_locs(Some(&"Apples".into()), Some(&"Carrots".into()))
            .expect("unique bounds");
        assert_eq!(range, 0..3);

        let err = index
            .slice_locs(Some(&"Potatoes".into()), None)
            .expect_err("duplicate bound");
        assert_eq!(err, IndexError::NonUniqueSliceBound("Potatoes".into()));

        let err = index
            .slice_locs(None, Some(&"Zucchini".into()))
            .expect_err("absent bound");
        assert_eq!(err.kind(), tb_types::ErrorKind::Key);
    }

    #[test]
    fn slice_bound_of_wrong_kind_is_missing_label() {
        let index = Index::range(3);
        let err = index
            .slice_locs(Some(&IndexLabel::from("0")), None)
            .expect_err("kind mismatch");
        assert_eq!(err, IndexError::LabelNotFound("0".into()));
    }

    proptest! {
        #[test]
        fn prop_sorted_slice_matches_filter(
            mut values in proptest::collection::vec(-50_i64..50, 0..40),
            a in -60_i64..60,
            b in -60_i64..60,
        ) {
            values.sort_unstable();
            let index = Index::from_i64(values.clone());
            let range = index
                .slice_locs(Some(&a.into()), Some(&b.into()))
                .expect("sorted slice never fails");
            let expected: Vec<i64> = values.iter().copied().filter(|v| a <= *v && *v <= b).collect();
            let got: Vec<i64> = values[range].to_vec();
            prop_assert_eq!(got, expected);
        }
    }
}
