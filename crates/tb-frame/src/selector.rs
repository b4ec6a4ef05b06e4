//! Row and column selectors for `iloc` / `loc`.
//!
//! Position selectors use half-open ranges (`1..3` is positions 1 and 2).
//! Label selectors only accept inclusive ranges (`0..=10`), so the closed
//! interval is visible at the call site.

use std::ops::{Range, RangeFrom, RangeFull, RangeInclusive, RangeTo, RangeToInclusive};

use tb_index::{Index, IndexLabel};

use crate::{FrameError, Series};

/// Position-based selector for one axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PositionSpec {
    All,
    At(i64),
    /// Half-open; negative bounds count from the end, out-of-range bounds clamp.
    Range {
        start: Option<i64>,
        stop: Option<i64>,
    },
    List(Vec<i64>),
}

/// Label-based row selector.
#[derive(Debug, Clone, PartialEq)]
pub enum LabelSpec {
    All,
    At(IndexLabel),
    /// Inclusive of both bounds.
    Range {
        start: Option<IndexLabel>,
        stop: Option<IndexLabel>,
    },
    List(Vec<IndexLabel>),
    Mask(Vec<bool>),
    SeriesMask(Series),
}

/// Label-based column selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnSpec {
    All,
    Name(String),
    /// Inclusive of both bounds, following column order.
    Range {
        start: Option<String>,
        stop: Option<String>,
    },
    List(Vec<String>),
    Mask(Vec<bool>),
}

impl LabelSpec {
    pub fn range(start: impl Into<IndexLabel>, stop: impl Into<IndexLabel>) -> Self {
        Self::Range {
            start: Some(start.into()),
            stop: Some(stop.into()),
        }
    }
}

impl ColumnSpec {
    pub fn range(start: impl Into<String>, stop: impl Into<String>) -> Self {
        Self::Range {
            start: Some(start.into()),
            stop: Some(stop.into()),
        }
    }
}

macro_rules! position_conversions {
    ($($int:ty),*) => {$(
        impl From<$int> for PositionSpec {
            fn from(value: $int) -> Self {
                Self::At(i64::from(value))
            }
        }

        impl From<Range<$int>> for PositionSpec {
            fn from(value: Range<$int>) -> Self {
                Self::Range {
                    start: Some(i64::from(value.start)),
                    stop: Some(i64::from(value.end)),
                }
            }
        }

        impl From<RangeFrom<$int>> for PositionSpec {
            fn from(value: RangeFrom<$int>) -> Self {
                Self::Range {
                    start: Some(i64::from(value.start)),
                    stop: None,
                }
            }
        }

        impl From<RangeTo<$int>> for PositionSpec {
            fn from(value: RangeTo<$int>) -> Self {
                Self::Range {
                    start: None,
                    stop: Some(i64::from(value.end)),
                }
            }
        }

        impl From<Vec<$int>> for PositionSpec {
            fn from(value: Vec<$int>) -> Self {
                Self::List(value.into_iter().map(i64::from).collect())
            }
        }

        impl<const N: usize> From<[$int; N]> for PositionSpec {
            fn from(value: [$int; N]) -> Self {
                Self::List(value.into_iter().map(i64::from).collect())
            }
        }

        impl From<$int> for LabelSpec {
            fn from(value: $int) -> Self {
                Self::At(IndexLabel::from(value))
            }
        }

        impl From<RangeInclusive<$int>> for LabelSpec {
            fn from(value: RangeInclusive<$int>) -> Self {
                let (start, stop) = value.into_inner();
                Self::range(start, stop)
            }
        }

        impl From<RangeFrom<$int>> for LabelSpec {
            fn from(value: RangeFrom<$int>) -> Self {
                Self::Range {
                    start: Some(IndexLabel::from(value.start)),
                    stop: None,
                }
            }
        }

        impl From<RangeToInclusive<$int>> for LabelSpec {
            fn from(value: RangeToInclusive<$int>) -> Self {
                Self::Range {
                    start: None,
                    stop: Some(IndexLabel::from(value.end)),
                }
            }
        }

        impl From<Vec<$int>> for LabelSpec {
            fn from(value: Vec<$int>) -> Self {
                Self::List(value.into_iter().map(IndexLabel::from).collect())
            }
        }
    )*};
}

position_conversions!(i32, i64);

impl From<RangeFull> for PositionSpec {
    fn from(_: RangeFull) -> Self {
        Self::All
    }
}

impl From<RangeFull> for LabelSpec {
    fn from(_: RangeFull) -> Self {
        Self::All
    }
}

impl From<&str> for LabelSpec {
    fn from(value: &str) -> Self {
        Self::At(value.into())
    }
}

impl From<String> for LabelSpec {
    fn from(value: String) -> Self {
        Self::At(value.into())
    }
}

impl From<IndexLabel> for LabelSpec {
    fn from(value: IndexLabel) -> Self {
        Self::At(value)
    }
}

impl From<RangeInclusive<&str>> for LabelSpec {
    fn from(value: RangeInclusive<&str>) -> Self {
        let (start, stop) = value.into_inner();
        Self::range(start, stop)
    }
}

impl From<Vec<IndexLabel>> for LabelSpec {
    fn from(value: Vec<IndexLabel>) -> Self {
        Self::List(value)
    }
}

impl From<Vec<&str>> for LabelSpec {
    fn from(value: Vec<&str>) -> Self {
        Self::List(value.into_iter().map(IndexLabel::from).collect())
    }
}

impl From<Vec<bool>> for LabelSpec {
    fn from(value: Vec<bool>) -> Self {
        Self::Mask(value)
    }
}

impl From<Series> for LabelSpec {
    fn from(value: Series) -> Self {
        Self::SeriesMask(value)
    }
}

impl From<&Series> for LabelSpec {
    fn from(value: &Series) -> Self {
        Self::SeriesMask(value.clone())
    }
}

impl From<RangeFull> for ColumnSpec {
    fn from(_: RangeFull) -> Self {
        Self::All
    }
}

impl From<&str> for ColumnSpec {
    fn from(value: &str) -> Self {
        Self::Name(value.to_owned())
    }
}

impl From<String> for ColumnSpec {
    fn from(value: String) -> Self {
        Self::Name(value)
    }
}

impl From<RangeInclusive<&str>> for ColumnSpec {
    fn from(value: RangeInclusive<&str>) -> Self {
        let (start, stop) = value.into_inner();
        Self::range(start, stop)
    }
}

impl From<RangeFrom<&str>> for ColumnSpec {
    fn from(value: RangeFrom<&str>) -> Self {
        Self::Range {
            start: Some(value.start.to_owned()),
            stop: None,
        }
    }
}

impl From<RangeToInclusive<&str>> for ColumnSpec {
    fn from(value: RangeToInclusive<&str>) -> Self {
        Self::Range {
            start: None,
            stop: Some(value.end.to_owned()),
        }
    }
}

impl From<Vec<&str>> for ColumnSpec {
    fn from(value: Vec<&str>) -> Self {
        Self::List(value.into_iter().map(str::to_owned).collect())
    }
}

impl<const N: usize> From<[&str; N]> for ColumnSpec {
    fn from(value: [&str; N]) -> Self {
        Self::List(value.into_iter().map(str::to_owned).collect())
    }
}

impl From<Vec<String>> for ColumnSpec {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

impl From<Vec<bool>> for ColumnSpec {
    fn from(value: Vec<bool>) -> Self {
        Self::Mask(value)
    }
}

/// Positions picked along one axis, plus whether the selector named a
/// single element (which collapses that axis in the result).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Resolved {
    pub(crate) positions: Vec<usize>,
    pub(crate) single: bool,
}

impl Resolved {
    fn single(position: usize) -> Self {
        Self {
            positions: vec![position],
            single: true,
        }
    }

    fn many(positions: Vec<usize>) -> Self {
        Self {
            positions,
            single: false,
        }
    }
}

pub(crate) fn normalize_position(position: i64, len: usize) -> Result<usize, FrameError> {
    let len_i128 = len as i128;
    let position_i128 = i128::from(position);
    let normalized = if position_i128 < 0 {
        len_i128 + position_i128
    } else {
        position_i128
    };

    if normalized < 0 || normalized >= len_i128 {
        return Err(FrameError::PositionOutOfBounds { position, len });
    }
    Ok(normalized as usize)
}

fn clamp_bound(bound: i64, len: usize) -> usize {
    if bound < 0 {
        len.saturating_sub(bound.unsigned_abs() as usize)
    } else {
        (bound as u64).min(len as u64) as usize
    }
}

pub(crate) fn resolve_positions(spec: &PositionSpec, len: usize) -> Result<Resolved, FrameError> {
    let resolved = match spec {
        PositionSpec::All => Resolved::many((0..len).collect()),
        PositionSpec::At(position) => Resolved::single(normalize_position(*position, len)?),
        PositionSpec::Range { start, stop } => {
            let lo = start.map_or(0, |s| clamp_bound(s, len));
            let hi = stop.map_or(len, |s| clamp_bound(s, len));
            Resolved::many((lo..hi.max(lo)).collect())
        }
        PositionSpec::List(positions) => Resolved::many(
            positions
                .iter()
                .map(|&p| normalize_position(p, len))
                .collect::<Result<Vec<_>, _>>()?,
        ),
    };
    log::trace!("iloc {spec:?} over {len} -> {} positions", resolved.positions.len());
    Ok(resolved)
}

fn label_positions(index: &Index, label: &IndexLabel) -> Result<Vec<usize>, FrameError> {
    let positions = index.positions(label);
    if positions.is_empty() {
        return Err(FrameError::LabelNotFound(label.clone()));
    }
    Ok(positions)
}

fn check_mask_len(mask: &[bool], expected: usize) -> Result<(), FrameError> {
    if mask.len() != expected {
        return Err(FrameError::MaskLengthMismatch {
            expected,
            found: mask.len(),
        });
    }
    Ok(())
}

fn mask_positions(mask: &[bool]) -> Vec<usize> {
    mask.iter()
        .enumerate()
        .filter_map(|(pos, &keep)| keep.then_some(pos))
        .collect()
}

pub(crate) fn resolve_labels(spec: &LabelSpec, index: &Index) -> Result<Resolved, FrameError> {
    let resolved = match spec {
        LabelSpec::All => Resolved::many((0..index.len()).collect()),
        LabelSpec::At(label) => {
            let positions = label_positions(index, label)?;
            if positions.len() == 1 {
                Resolved::single(positions[0])
            } else {
                Resolved::many(positions)
            }
        }
        LabelSpec::Range { start, stop } => {
            Resolved::many(index.slice_locs(start.as_ref(), stop.as_ref())?.collect())
        }
        LabelSpec::List(labels) => {
            let mut positions = Vec::with_capacity(labels.len());
            for label in labels {
                positions.extend(label_positions(index, label)?);
            }
            Resolved::many(positions)
        }
        LabelSpec::Mask(mask) => {
            check_mask_len(mask, index.len())?;
            Resolved::many(mask_positions(mask))
        }
        LabelSpec::SeriesMask(series) => {
            if series.index() != index {
                return Err(FrameError::IndexMismatch {
                    left: index.len(),
                    right: series.len(),
                });
            }
            Resolved::many(mask_positions(&series.mask_bits("loc")?))
        }
    };
    log::trace!("loc over {} rows -> {} positions", index.len(), resolved.positions.len());
    Ok(resolved)
}

fn name_position(names: &[&str], name: &str) -> Result<usize, FrameError> {
    names
        .iter()
        .position(|candidate| *candidate == name)
        .ok_or_else(|| FrameError::ColumnNotFound(name.to_owned()))
}

pub(crate) fn resolve_columns(spec: &ColumnSpec, names: &[&str]) -> Result<Resolved, FrameError> {
    let resolved = match spec {
        ColumnSpec::All => Resolved::many((0..names.len()).collect()),
        ColumnSpec::Name(name) => Resolved::single(name_position(names, name)?),
        ColumnSpec::Range { start, stop } => {
            let lo = start
                .as_deref()
                .map_or(Ok(0), |name| name_position(names, name))?;
            let hi = stop
                .as_deref()
                .map_or(Ok(names.len()), |name| name_position(names, name).map(|p| p + 1))?;
            Resolved::many((lo..hi.max(lo)).collect())
        }
        ColumnSpec::List(requested) => Resolved::many(
            requested
                .iter()
                .map(|name| name_position(names, name))
                .collect::<Result<Vec<_>, _>>()?,
        ),
        ColumnSpec::Mask(mask) => {
            check_mask_len(mask, names.len())?;
            Resolved::many(mask_positions(mask))
        }
    };
    Ok(resolved)
}
