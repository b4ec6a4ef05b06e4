#![forbid(unsafe_code)]

mod selector;

use std::collections::HashSet;
use std::ops::{BitAnd, BitOr, Not, Range};

use serde::{Deserialize, Serialize};
use tb_columnar::{Column, ColumnError};
use tb_index::{Index, IndexError, IndexLabel};
use tb_types::{DType, ErrorKind, NullKind, Scalar, TypeError};
use thiserror::Error;

pub use selector::{ColumnSpec, LabelSpec, PositionSpec};
pub use tb_columnar::ComparisonOp;
use selector::{Resolved, normalize_position, resolve_columns, resolve_labels, resolve_positions};

/// Rows returned by `head`/`tail` when no count is given.
pub const DEFAULT_HEAD_ROWS: i64 = 5;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FrameError {
    #[error("index length ({index_len}) does not match column length ({column_len})")]
    LengthMismatch { index_len: usize, column_len: usize },
    #[error("a mapping made only of scalar values needs an explicit index")]
    ScalarsWithoutIndex,
    #[error("boolean mask has length {found}, expected {expected}")]
    MaskLengthMismatch { expected: usize, found: usize },
    #[error("cannot combine series with different indexes (lengths {left} and {right})")]
    IndexMismatch { left: usize, right: usize },
    #[error("column not found: {0:?}")]
    ColumnNotFound(String),
    #[error("duplicate column name: {0:?}")]
    DuplicateColumn(String),
    #[error("label not found: {0}")]
    LabelNotFound(IndexLabel),
    #[error("position {position} out of bounds for length {len}")]
    PositionOutOfBounds { position: i64, len: usize },
    #[error("boolean series required for {op}; found dtype {dtype:?}")]
    NonBooleanMask { op: &'static str, dtype: DType },
    #[error("the truth value of a series of length {len} is ambiguous")]
    AmbiguousTruthValue { len: usize },
    #[error("selection is a {found}, not a {expected}")]
    UnexpectedSelection {
        expected: &'static str,
        found: &'static str,
    },
    #[error("cannot use {value:?} as an index label")]
    InvalidIndexValue { value: Scalar },
    #[error(transparent)]
    Column(#[from] ColumnError),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(transparent)]
    Type(#[from] TypeError),
}

impl FrameError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::LengthMismatch { .. }
            | Self::ScalarsWithoutIndex
            | Self::MaskLengthMismatch { .. }
            | Self::IndexMismatch { .. } => ErrorKind::Shape,
            Self::ColumnNotFound(_) | Self::DuplicateColumn(_) | Self::LabelNotFound(_) => {
                ErrorKind::Key
            }
            Self::PositionOutOfBounds { .. } => ErrorKind::Index,
            Self::NonBooleanMask { .. }
            | Self::AmbiguousTruthValue { .. }
            | Self::UnexpectedSelection { .. }
            | Self::InvalidIndexValue { .. } => ErrorKind::Type,
            Self::Column(err) => err.kind(),
            Self::Index(err) => err.kind(),
            Self::Type(err) => err.kind(),
        }
    }
}

fn normalize_head_take(n: i64, len: usize) -> usize {
    if n >= 0 {
        usize::try_from(n).unwrap_or(usize::MAX).min(len)
    } else {
        len.saturating_sub(usize::try_from(n.unsigned_abs()).unwrap_or(usize::MAX))
    }
}

fn normalize_tail_start(n: i64, len: usize) -> usize {
    if n >= 0 {
        len.saturating_sub(usize::try_from(n).unwrap_or(usize::MAX))
    } else {
        usize::try_from(n.unsigned_abs()).unwrap_or(usize::MAX).min(len)
    }
}

/// Shape-dependent result of `iloc` / `loc`.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Scalar(Scalar),
    Series(Series),
    Frame(DataFrame),
}

impl Selection {
    fn shape_name(&self) -> &'static str {
        match self {
            Self::Scalar(_) => "scalar",
            Self::Series(_) => "series",
            Self::Frame(_) => "frame",
        }
    }

    fn unexpected(&self, expected: &'static str) -> FrameError {
        FrameError::UnexpectedSelection {
            expected,
            found: self.shape_name(),
        }
    }

    pub fn into_scalar(self) -> Result<Scalar, FrameError> {
        match self {
            Self::Scalar(value) => Ok(value),
            other => Err(other.unexpected("scalar")),
        }
    }

    pub fn into_series(self) -> Result<Series, FrameError> {
        match self {
            Self::Series(series) => Ok(series),
            other => Err(other.unexpected("series")),
        }
    }

    pub fn into_frame(self) -> Result<DataFrame, FrameError> {
        match self {
            Self::Frame(frame) => Ok(frame),
            other => Err(other.unexpected("frame")),
        }
    }
}

/// One column bound to a row index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SeriesSnapshot")]
pub struct Series {
    name: Option<String>,
    index: Index,
    column: Column,
}

#[derive(Deserialize)]
struct SeriesSnapshot {
    name: Option<String>,
    index: Index,
    column: Column,
}

impl TryFrom<SeriesSnapshot> for Series {
    type Error = FrameError;

    fn try_from(snapshot: SeriesSnapshot) -> Result<Self, Self::Error> {
        let mut series = Self::anonymous(snapshot.index, snapshot.column)?;
        series.name = snapshot.name;
        Ok(series)
    }
}

impl Series {
    pub fn new(name: impl Into<String>, index: Index, column: Column) -> Result<Self, FrameError> {
        let mut series = Self::anonymous(index, column)?;
        series.name = Some(name.into());
        Ok(series)
    }

    pub fn anonymous(index: Index, column: Column) -> Result<Self, FrameError> {
        if index.len() != column.len() {
            return Err(FrameError::LengthMismatch {
                index_len: index.len(),
                column_len: column.len(),
            });
        }
        index.label_kind()?;
        Ok(Self {
            name: None,
            index,
            column,
        })
    }

    /// Build a named series from explicit labels and values.
    pub fn from_values<L, V>(
        name: impl Into<String>,
        labels: impl IntoIterator<Item = L>,
        values: impl IntoIterator<Item = V>,
    ) -> Result<Self, FrameError>
    where
        L: Into<IndexLabel>,
        V: Into<Scalar>,
    {
        let index = Index::new(labels.into_iter().map(Into::into).collect());
        let column = Column::from_values(values.into_iter().map(Into::into).collect())?;
        Self::new(name, index, column)
    }

    /// Build a named series over the default `0..N` index.
    pub fn from_vec<V: Into<Scalar>>(
        name: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Result<Self, FrameError> {
        let column = Column::from_values(values.into_iter().map(Into::into).collect())?;
        Self::new(name, Index::range(column.len()), column)
    }

    // Same name and index, new cells. `column` must match the index length.
    fn derived(&self, column: Column) -> Self {
        Self {
            name: self.name.clone(),
            index: self.index.clone(),
            column,
        }
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[must_use]
    pub fn index(&self) -> &Index {
        &self.index
    }

    #[must_use]
    pub fn column(&self) -> &Column {
        &self.column
    }

    #[must_use]
    pub fn values(&self) -> &[Scalar] {
        self.column.values()
    }

    #[must_use]
    pub fn dtype(&self) -> DType {
        self.column.dtype()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.column.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.column.is_empty()
    }

    /// Number of non-missing cells.
    #[must_use]
    pub fn count(&self) -> usize {
        self.column.count()
    }

    /// Cell at the first occurrence of `label`.
    pub fn at(&self, label: impl Into<IndexLabel>) -> Result<&Scalar, FrameError> {
        let label = label.into();
        self.index
            .position(&label)
            .and_then(|pos| self.column.value(pos))
            .ok_or(FrameError::LabelNotFound(label))
    }

    /// Cell at `position`; negative positions count from the end.
    pub fn iat(&self, position: i64) -> Result<&Scalar, FrameError> {
        let pos = normalize_position(position, self.len())?;
        self.column
            .value(pos)
            .ok_or(FrameError::PositionOutOfBounds {
                position,
                len: self.len(),
            })
    }

    pub fn iloc(&self, spec: impl Into<PositionSpec>) -> Result<Selection, FrameError> {
        let rows = resolve_positions(&spec.into(), self.len())?;
        self.select(&rows)
    }

    pub fn loc(&self, spec: impl Into<LabelSpec>) -> Result<Selection, FrameError> {
        let rows = resolve_labels(&spec.into(), &self.index)?;
        self.select(&rows)
    }

    fn select(&self, rows: &Resolved) -> Result<Selection, FrameError> {
        if rows.single {
            let pos = rows.positions[0];
            let value = self
                .column
                .value(pos)
                .cloned()
                .ok_or(ColumnError::PositionOutOfBounds {
                    position: pos,
                    len: self.len(),
                })?;
            return Ok(Selection::Scalar(value));
        }
        Ok(Selection::Series(self.take(&rows.positions)?))
    }

    fn take(&self, positions: &[usize]) -> Result<Self, FrameError> {
        Ok(Self {
            name: self.name.clone(),
            index: self.index.take(positions),
            column: self.column.take(positions)?,
        })
    }

    fn slice(&self, range: Range<usize>) -> Self {
        Self {
            name: self.name.clone(),
            index: self.index.slice(range.clone()),
            column: self.column.slice(range),
        }
    }

    /// First `n` cells (default 5); negative `n` drops the last `|n|`.
    #[must_use]
    pub fn head(&self, n: impl Into<Option<i64>>) -> Self {
        let take = normalize_head_take(n.into().unwrap_or(DEFAULT_HEAD_ROWS), self.len());
        self.slice(0..take)
    }

    /// Last `n` cells (default 5); negative `n` drops the first `|n|`.
    #[must_use]
    pub fn tail(&self, n: impl Into<Option<i64>>) -> Self {
        let start = normalize_tail_start(n.into().unwrap_or(DEFAULT_HEAD_ROWS), self.len());
        self.slice(start..self.len())
    }

    // --- Comparisons ---

    pub fn compare_scalar(
        &self,
        scalar: impl Into<Scalar>,
        op: ComparisonOp,
    ) -> Result<Self, FrameError> {
        let column = self.column.compare_scalar(&scalar.into(), op)?;
        Ok(self.derived(column))
    }

    pub fn eq_scalar(&self, scalar: impl Into<Scalar>) -> Result<Self, FrameError> {
        self.compare_scalar(scalar, ComparisonOp::Eq)
    }

    pub fn ne_scalar(&self, scalar: impl Into<Scalar>) -> Result<Self, FrameError> {
        self.compare_scalar(scalar, ComparisonOp::Ne)
    }

    pub fn lt_scalar(&self, scalar: impl Into<Scalar>) -> Result<Self, FrameError> {
        self.compare_scalar(scalar, ComparisonOp::Lt)
    }

    pub fn gt_scalar(&self, scalar: impl Into<Scalar>) -> Result<Self, FrameError> {
        self.compare_scalar(scalar, ComparisonOp::Gt)
    }

    pub fn le_scalar(&self, scalar: impl Into<Scalar>) -> Result<Self, FrameError> {
        self.compare_scalar(scalar, ComparisonOp::Le)
    }

    pub fn ge_scalar(&self, scalar: impl Into<Scalar>) -> Result<Self, FrameError> {
        self.compare_scalar(scalar, ComparisonOp::Ge)
    }

    /// Element-wise comparison against a series with an identical index.
    pub fn compare_series(&self, other: &Self, op: ComparisonOp) -> Result<Self, FrameError> {
        self.require_same_index(other)?;
        let column = self.column.binary_comparison(&other.column, op)?;
        Ok(self.derived(column))
    }

    fn require_same_index(&self, other: &Self) -> Result<(), FrameError> {
        if self.index != other.index {
            return Err(FrameError::IndexMismatch {
                left: self.len(),
                right: other.len(),
            });
        }
        Ok(())
    }

    // --- Logical Boolean Operators ---

    fn mask_cells(&self, op: &'static str) -> Result<Vec<Option<bool>>, FrameError> {
        if !self.column.is_boolean() {
            return Err(FrameError::NonBooleanMask {
                op,
                dtype: self.dtype(),
            });
        }
        Ok(self.values().iter().map(Scalar::as_bool).collect())
    }

    /// Mask cells as plain booleans; a missing cell does not select its row.
    pub(crate) fn mask_bits(&self, op: &'static str) -> Result<Vec<bool>, FrameError> {
        Ok(self
            .mask_cells(op)?
            .into_iter()
            .map(|cell| cell.unwrap_or(false))
            .collect())
    }

    fn combine_masks(
        &self,
        other: &Self,
        op: &'static str,
        combine: fn(Option<bool>, Option<bool>) -> Option<bool>,
    ) -> Result<Self, FrameError> {
        let left = self.mask_cells(op)?;
        let right = other.mask_cells(op)?;
        self.require_same_index(other)?;

        let values = left
            .into_iter()
            .zip(right)
            .map(|(lhs, rhs)| Scalar::from(combine(lhs, rhs)))
            .collect();
        let name = if self.name == other.name {
            self.name.clone()
        } else {
            None
        };

        Ok(Self {
            name,
            index: self.index.clone(),
            column: Column::new(DType::Bool, values)?,
        })
    }

    /// Element-wise AND of two boolean series over the same index.
    ///
    /// Missing cells follow three-valued logic: `false & missing` is
    /// `false`, `true & missing` is missing.
    pub fn and(&self, other: &Self) -> Result<Self, FrameError> {
        self.combine_masks(other, "and", |lhs, rhs| match (lhs, rhs) {
            (Some(false), _) | (_, Some(false)) => Some(false),
            (Some(true), Some(true)) => Some(true),
            _ => None,
        })
    }

    /// Element-wise OR; `true | missing` is `true`, `false | missing` is missing.
    pub fn or(&self, other: &Self) -> Result<Self, FrameError> {
        self.combine_masks(other, "or", |lhs, rhs| match (lhs, rhs) {
            (Some(true), _) | (_, Some(true)) => Some(true),
            (Some(false), Some(false)) => Some(false),
            _ => None,
        })
    }

    /// Element-wise NOT. Missing cells stay missing.
    pub fn not(&self) -> Result<Self, FrameError> {
        let values = self
            .mask_cells("not")?
            .into_iter()
            .map(|cell| Scalar::from(cell.map(|v| !v)))
            .collect();
        Ok(self.derived(Column::new(DType::Bool, values)?))
    }

    /// Collapse a one-element boolean series to `bool`.
    ///
    /// Anything longer or shorter is ambiguous, mirroring how `if series`
    /// is rejected for array-like values.
    pub fn truth_value(&self) -> Result<bool, FrameError> {
        match self.values() {
            [Scalar::Bool(value)] => Ok(*value),
            [other] => Err(FrameError::NonBooleanMask {
                op: "truth_value",
                dtype: other.dtype(),
            }),
            _ => Err(FrameError::AmbiguousTruthValue { len: self.len() }),
        }
    }

    // --- Membership and missing data ---

    /// `true` where the cell equals one of `values`.
    #[must_use]
    pub fn isin<V: Into<Scalar>>(&self, values: impl IntoIterator<Item = V>) -> Self {
        let test_values: Vec<Scalar> = values.into_iter().map(Into::into).collect();
        self.derived(self.column.isin(&test_values))
    }

    #[must_use]
    pub fn isnull(&self) -> Self {
        self.derived(self.column.isnull())
    }

    #[must_use]
    pub fn notnull(&self) -> Self {
        self.derived(self.column.notnull())
    }
}

macro_rules! mask_operator {
    ($op_trait:ident, $op_fn:ident, $combine:ident) => {
        impl $op_trait for &Series {
            type Output = Result<Series, FrameError>;

            fn $op_fn(self, rhs: Self) -> Self::Output {
                Series::$combine(self, rhs)
            }
        }

        impl $op_trait for Series {
            type Output = Result<Series, FrameError>;

            fn $op_fn(self, rhs: Self) -> Self::Output {
                Series::$combine(&self, &rhs)
            }
        }
    };
}

mask_operator!(BitAnd, bitand, and);
mask_operator!(BitOr, bitor, or);

impl Not for &Series {
    type Output = Result<Series, FrameError>;

    fn not(self) -> Self::Output {
        Series::not(self)
    }
}

impl Not for Series {
    type Output = Result<Series, FrameError>;

    fn not(self) -> Self::Output {
        Series::not(&self)
    }
}

/// Value for a column assignment: one scalar to broadcast, or one value per row.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnInput {
    Scalar(Scalar),
    Values(Vec<Scalar>),
}

macro_rules! column_input_conversions {
    ($($ty:ty),* $(,)?) => {$(
        impl From<$ty> for ColumnInput {
            fn from(value: $ty) -> Self {
                Self::Scalar(Scalar::from(value))
            }
        }

        impl From<Vec<$ty>> for ColumnInput {
            fn from(values: Vec<$ty>) -> Self {
                Self::Values(values.into_iter().map(Scalar::from).collect())
            }
        }
    )*};
}

column_input_conversions!(
    Scalar,
    bool,
    i64,
    i32,
    f64,
    &str,
    String,
    Option<bool>,
    Option<i64>,
    Option<i32>,
    Option<f64>,
    Option<&str>,
    Option<String>,
);

impl From<&Series> for ColumnInput {
    fn from(series: &Series) -> Self {
        Self::Values(series.values().to_vec())
    }
}

/// Ordered named columns sharing one row index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "FrameSnapshot")]
pub struct DataFrame {
    index: Index,
    columns: Vec<(String, Column)>,
}

#[derive(Deserialize)]
struct FrameSnapshot {
    index: Index,
    columns: Vec<(String, Column)>,
}

impl TryFrom<FrameSnapshot> for DataFrame {
    type Error = FrameError;

    fn try_from(snapshot: FrameSnapshot) -> Result<Self, Self::Error> {
        Self::from_columns(snapshot.index, snapshot.columns)
    }
}

impl DataFrame {

    pub fn from_columns(index: Index, columns: Vec<(String, Column)>) -> Result<Self, FrameError> {
        let mut seen = HashSet::with_capacity(columns.len());
        for (name, column) in &columns {
            if !seen.insert(name.as_str()) {
                return Err(FrameError::DuplicateColumn(name.clone()));
            }
            if column.len() != index.len() {
                return Err(FrameError::LengthMismatch {
                    index_len: index.len(),
                    column_len: column.len(),
                });
            }
        }
        index.label_kind()?;
        Ok(Self { index, columns })
    }

    /// Build a table from `(name, values)` pairs in order.
    ///
    /// Sequences must all have the same length, which must match `index`
    /// when one is given. Scalar entries broadcast to that length.
    pub fn from_mapping<N, C>(
        columns: impl IntoIterator<Item = (N, C)>,
        index: Option<Vec<IndexLabel>>,
    ) -> Result<Self, FrameError>
    where
        N: Into<String>,
        C: Into<ColumnInput>,
    {
        let entries: Vec<(String, ColumnInput)> = columns
            .into_iter()
            .map(|(name, input)| (name.into(), input.into()))
            .collect();

        let first_len = entries.iter().find_map(|(_, input)| match input {
            ColumnInput::Values(values) => Some(values.len()),
            ColumnInput::Scalar(_) => None,
        });
        let row_count = match (&index, first_len) {
            (Some(labels), _) => labels.len(),
            (None, Some(len)) => len,
            (None, None) if entries.is_empty() => 0,
            (None, None) => return Err(FrameError::ScalarsWithoutIndex),
        };

        let mut built = Vec::with_capacity(entries.len());
        for (name, input) in entries {
            let column = match input {
                ColumnInput::Scalar(value) => Column::broadcast(value, row_count)?,
                ColumnInput::Values(values) => {
                    if values.len() != row_count {
                        return Err(FrameError::LengthMismatch {
                            index_len: row_count,
                            column_len: values.len(),
                        });
                    }
                    Column::from_values(values)?
                }
            };
            built.push((name, column));
        }

        let index = index.map_or_else(|| Index::range(row_count), Index::new);
        Self::from_columns(index, built)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    #[must_use]
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// `(rows, columns)`.
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.len(), self.num_columns())
    }

    #[must_use]
    pub fn index(&self) -> &Index {
        &self.index
    }

    #[must_use]
    pub fn columns(&self) -> &[(String, Column)] {
        &self.columns
    }

    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(name, _)| name.as_str()).collect()
    }

    fn column_position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|(existing, _)| existing == name)
    }

    /// First column called `name`.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.column_position(name).map(|pos| &self.columns[pos].1)
    }

    /// Bracket-style access: the column as a series over the row index.
    pub fn get(&self, name: &str) -> Result<Series, FrameError> {
        let column = self
            .column(name)
            .ok_or_else(|| FrameError::ColumnNotFound(name.to_owned()))?;
        Ok(Series {
            name: Some(name.to_owned()),
            index: self.index.clone(),
            column: column.clone(),
        })
    }

    // --- Selection ---

    /// Position-based selection over rows and columns.
    pub fn iloc(
        &self,
        rows: impl Into<PositionSpec>,
        columns: impl Into<PositionSpec>,
    ) -> Result<Selection, FrameError> {
        let rows = resolve_positions(&rows.into(), self.len())?;
        let columns = resolve_positions(&columns.into(), self.num_columns())?;
        self.select(&rows, &columns)
    }

    pub fn iloc_rows(&self, rows: impl Into<PositionSpec>) -> Result<Selection, FrameError> {
        self.iloc(rows, PositionSpec::All)
    }

    /// Label-based selection; label and name ranges include both ends.
    pub fn loc(
        &self,
        rows: impl Into<LabelSpec>,
        columns: impl Into<ColumnSpec>,
    ) -> Result<Selection, FrameError> {
        let rows = resolve_labels(&rows.into(), &self.index)?;
        let columns = resolve_columns(&columns.into(), &self.column_names())?;
        self.select(&rows, &columns)
    }

    pub fn loc_rows(&self, rows: impl Into<LabelSpec>) -> Result<Selection, FrameError> {
        self.loc(rows, ColumnSpec::All)
    }

    fn select(&self, rows: &Resolved, columns: &Resolved) -> Result<Selection, FrameError> {
        match (rows.single, columns.single) {
            (true, true) => {
                let (_, column) = &self.columns[columns.positions[0]];
                let row = rows.positions[0];
                let value = column
                    .value(row)
                    .cloned()
                    .ok_or(ColumnError::PositionOutOfBounds {
                        position: row,
                        len: column.len(),
                    })?;
                Ok(Selection::Scalar(value))
            }
            (true, false) => Ok(Selection::Series(
                self.cross_section(rows.positions[0], &columns.positions),
            )),
            (false, true) => {
                let (name, column) = &self.columns[columns.positions[0]];
                Ok(Selection::Series(Series {
                    name: Some(name.clone()),
                    index: self.index.take(&rows.positions),
                    column: column.take(&rows.positions)?,
                }))
            }
            (false, false) => Ok(Selection::Frame(
                self.take(&rows.positions, &columns.positions)?,
            )),
        }
    }

    /// One row as a series indexed by column names.
    fn cross_section(&self, row: usize, columns: &[usize]) -> Series {
        let mut names = Vec::with_capacity(columns.len());
        let mut values = Vec::with_capacity(columns.len());
        for &pos in columns {
            let (name, column) = &self.columns[pos];
            names.push(name.clone());
            values.push(
                column
                    .value(row)
                    .cloned()
                    .unwrap_or(Scalar::Null(NullKind::Null)),
            );
        }
        Series {
            name: self.index.labels().get(row).map(ToString::to_string),
            index: Index::from_utf8(names),
            column: Column::from_values_lenient(values),
        }
    }

    fn take(&self, rows: &[usize], columns: &[usize]) -> Result<Self, FrameError> {
        let picked = columns
            .iter()
            .map(|&pos| -> Result<(String, Column), FrameError> {
                let (name, column) = &self.columns[pos];
                Ok((name.clone(), column.take(rows)?))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            index: self.index.take(rows),
            columns: picked,
        })
    }

    fn slice_rows(&self, range: Range<usize>) -> Self {
        Self {
            index: self.index.slice(range.clone()),
            columns: self
                .columns
                .iter()
                .map(|(name, column)| (name.clone(), column.slice(range.clone())))
                .collect(),
        }
    }

    /// First `n` rows (default 5); negative `n` drops the last `|n|`.
    #[must_use]
    pub fn head(&self, n: impl Into<Option<i64>>) -> Self {
        let take = normalize_head_take(n.into().unwrap_or(DEFAULT_HEAD_ROWS), self.len());
        self.slice_rows(0..take)
    }

    /// Last `n` rows (default 5); negative `n` drops the first `|n|`.
    #[must_use]
    pub fn tail(&self, n: impl Into<Option<i64>>) -> Self {
        let start = normalize_tail_start(n.into().unwrap_or(DEFAULT_HEAD_ROWS), self.len());
        self.slice_rows(start..self.len())
    }

    // --- Assignment ---

    fn build_column(&self, input: ColumnInput) -> Result<Column, FrameError> {
        match input {
            ColumnInput::Scalar(value) => Ok(Column::broadcast(value, self.len())?),
            ColumnInput::Values(values) => {
                if values.len() != self.len() {
                    return Err(FrameError::LengthMismatch {
                        index_len: self.len(),
                        column_len: values.len(),
                    });
                }
                Ok(Column::from_values(values)?)
            }
        }
    }

    // Overwrites keep the column's position; new names are appended.
    fn put_column(&mut self, name: String, column: Column) {
        log::debug!(
            "assigning column {name:?} ({:?}, {} rows)",
            column.dtype(),
            column.len()
        );
        match self.column_position(&name) {
            Some(pos) => self.columns[pos].1 = column,
            None => self.columns.push((name, column)),
        }
    }

    /// Create or overwrite `name` with a broadcast scalar or one value per row.
    ///
    /// On error the table is left untouched.
    pub fn set_column(
        &mut self,
        name: impl Into<String>,
        value: impl Into<ColumnInput>,
    ) -> Result<(), FrameError> {
        let column = self.build_column(value.into())?;
        self.put_column(name.into(), column);
        Ok(())
    }

    /// Drain `values` once, in row order, and assign the result to `name`.
    pub fn assign_iter<V: Into<Scalar>>(
        &mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Result<(), FrameError> {
        let collected: Vec<Scalar> = values.into_iter().map(Into::into).collect();
        self.set_column(name, ColumnInput::Values(collected))
    }

    /// Copy of the table with `column` stored under `name`.
    pub fn with_column(&self, name: impl Into<String>, column: Column) -> Result<Self, FrameError> {
        if column.len() != self.len() {
            return Err(FrameError::LengthMismatch {
                index_len: self.len(),
                column_len: column.len(),
            });
        }
        let mut out = self.clone();
        out.put_column(name.into(), column);
        Ok(out)
    }

    /// Copy of the table with column `name` promoted to the row index.
    ///
    /// Integer and string columns become labels of the same kind; any other
    /// dtype, or a missing cell, is rejected.
    pub fn set_index(&self, name: &str) -> Result<Self, FrameError> {
        let pos = self
            .column_position(name)
            .ok_or_else(|| FrameError::ColumnNotFound(name.to_owned()))?;
        let labels = self.columns[pos]
            .1
            .values()
            .iter()
            .map(|value| match value {
                Scalar::Int64(v) => Ok(IndexLabel::Int64(*v)),
                Scalar::Utf8(v) => Ok(IndexLabel::Utf8(v.clone())),
                other => Err(FrameError::InvalidIndexValue {
                    value: other.clone(),
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut columns = self.columns.clone();
        columns.remove(pos);
        log::debug!("promoted column {name:?} to the row index");
        Ok(Self {
            index: Index::new(labels),
            columns,
        })
    }
}
