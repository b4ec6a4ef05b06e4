#![forbid(unsafe_code)]

use std::cmp::Ordering;
use std::ops::Range;

use serde::{Deserialize, Serialize};
use tb_types::{
    DType, ErrorKind, NullKind, Scalar, TypeError, cast_scalar_owned, infer_dtype,
    infer_dtype_lenient,
};
use thiserror::Error;

/// Packed bitmap with one bit per cell; a set bit means "value present".
#[derive(Debug, Clone, Eq)]
pub struct ValidityMask {
    words: Vec<u64>,
    len: usize,
}

impl ValidityMask {
    #[must_use]
    pub fn from_values(values: &[Scalar]) -> Self {
        let len = values.len();
        let mut words = vec![0_u64; len.div_ceil(64)];
        for (idx, value) in values.iter().enumerate() {
            if !value.is_missing() {
                words[idx / 64] |= 1_u64 << (idx % 64);
            }
        }
        Self { words, len }
    }

    #[must_use]
    pub fn get(&self, idx: usize) -> bool {
        if idx >= self.len {
            return false;
        }
        (self.words[idx / 64] >> (idx % 64)) & 1 == 1
    }

    #[must_use]
    pub fn count_valid(&self) -> usize {
        // Bits past `len` are never set, so whole-word popcounts are exact.
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn bits(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.len).map(|idx| self.get(idx))
    }
}

impl PartialEq for ValidityMask {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.bits().eq(other.bits())
    }
}

impl Serialize for ValidityMask {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let bits: Vec<bool> = self.bits().collect();
        let mut state = serializer.serialize_struct("ValidityMask", 1)?;
        state.serialize_field("bits", &bits)?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for ValidityMask {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            bits: Vec<bool>,
        }
        let raw = Raw::deserialize(deserializer)?;
        let len = raw.bits.len();
        let mut words = vec![0_u64; len.div_ceil(64)];
        for (idx, &valid) in raw.bits.iter().enumerate() {
            if valid {
                words[idx / 64] |= 1_u64 << (idx % 64);
            }
        }
        Ok(Self { words, len })
    }
}

/// Element-wise comparison operations that produce `Bool`-typed columns.
///
/// A missing operand makes every operator `false` except `Ne`, which is
/// `true`: the missing marker is not equal to anything, itself included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOp {
    Gt,
    Lt,
    Eq,
    Ne,
    Ge,
    Le,
}

impl ComparisonOp {
    fn missing_result(self) -> bool {
        matches!(self, Self::Ne)
    }

    fn apply<T: PartialOrd + ?Sized>(self, lhs: &T, rhs: &T) -> bool {
        match self {
            Self::Gt => lhs > rhs,
            Self::Lt => lhs < rhs,
            Self::Eq => lhs == rhs,
            Self::Ne => lhs != rhs,
            Self::Ge => lhs >= rhs,
            Self::Le => lhs <= rhs,
        }
    }
}

fn scalar_compare(left: &Scalar, right: &Scalar, op: ComparisonOp) -> Result<bool, ColumnError> {
    if left.is_missing() || right.is_missing() {
        return Ok(op.missing_result());
    }

    match (left, right) {
        (Scalar::Utf8(a), Scalar::Utf8(b)) => Ok(op.apply(a.as_str(), b.as_str())),
        (Scalar::Bool(a), Scalar::Bool(b)) => Ok(op.apply(a, b)),
        (Scalar::Utf8(_), _) | (_, Scalar::Utf8(_)) => match op {
            ComparisonOp::Eq => Ok(false),
            ComparisonOp::Ne => Ok(true),
            _ => Err(TypeError::Incomparable {
                left: left.dtype(),
                right: right.dtype(),
            }
            .into()),
        },
        _ => Ok(left
            .numeric_cmp(right)
            .map_or(op.missing_result(), |ordering| op.apply(&ordering, &Ordering::Equal))),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ColumnSnapshot")]
pub struct Column {
    dtype: DType,
    values: Vec<Scalar>,
    validity: ValidityMask,
}

#[derive(Deserialize)]
struct ColumnSnapshot {
    dtype: DType,
    values: Vec<Scalar>,
    validity: ValidityMask,
}

impl TryFrom<ColumnSnapshot> for Column {
    type Error = ColumnError;

    fn try_from(snapshot: ColumnSnapshot) -> Result<Self, Self::Error> {
        let column = Self::new(snapshot.dtype, snapshot.values)?;
        if snapshot.validity.len() != column.len() {
            return Err(ColumnError::LengthMismatch {
                left: column.len(),
                right: snapshot.validity.len(),
            });
        }
        if let Some(position) = column
            .validity
            .bits()
            .zip(snapshot.validity.bits())
            .position(|(rebuilt, stored)| rebuilt != stored)
        {
            return Err(ColumnError::InconsistentValidity { position });
        }
        Ok(column)
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ColumnError {
    #[error("column length mismatch: left={left}, right={right}")]
    LengthMismatch { left: usize, right: usize },
    #[error("position {position} out of bounds for column of length {len}")]
    PositionOutOfBounds { position: usize, len: usize },
    #[error("validity bit at position {position} disagrees with the cell value")]
    InconsistentValidity { position: usize },
    #[error(transparent)]
    Type(#[from] TypeError),
}

impl ColumnError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::LengthMismatch { .. } => ErrorKind::Shape,
            Self::PositionOutOfBounds { .. } => ErrorKind::Index,
            Self::InconsistentValidity { .. } => ErrorKind::Parse,
            Self::Type(err) => err.kind(),
        }
    }
}

impl Column {
    /// Construct a column, coercing every value to `dtype`.
    ///
    /// Values that already carry the target dtype are moved through; NaN
    /// floats become the missing marker.
    pub fn new(dtype: DType, values: Vec<Scalar>) -> Result<Self, ColumnError> {
        let needs_coercion = values.iter().any(|v| {
            let d = v.dtype();
            d != dtype && d != DType::Null
        });

        let coerced = if needs_coercion {
            values
                .into_iter()
                .map(|value| cast_scalar_owned(value, dtype))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            values
                .into_iter()
                .map(|value| match value.normalize_missing() {
                    Scalar::Null(_) => Scalar::missing_for_dtype(dtype),
                    other => other,
                })
                .collect()
        };

        let validity = ValidityMask::from_values(&coerced);

        Ok(Self {
            dtype,
            values: coerced,
            validity,
        })
    }

    /// Infer the dtype from the values; string/number mixes are rejected.
    pub fn from_values(values: Vec<Scalar>) -> Result<Self, ColumnError> {
        let dtype = infer_dtype(&values)?;
        Self::new(dtype, values)
    }

    /// Heterogeneous column used for row cross-sections. Never coerces.
    #[must_use]
    pub fn object(values: Vec<Scalar>) -> Self {
        let values: Vec<Scalar> = values.into_iter().map(Scalar::normalize_missing).collect();
        let validity = ValidityMask::from_values(&values);
        Self {
            dtype: DType::Object,
            values,
            validity,
        }
    }

    /// Infer the dtype, falling back to [`Column::object`] on a mix.
    #[must_use]
    pub fn from_values_lenient(values: Vec<Scalar>) -> Self {
        match infer_dtype_lenient(&values) {
            DType::Object => Self::object(values),
            dtype => Self::new(dtype, values.clone()).unwrap_or_else(|_| Self::object(values)),
        }
    }

    /// Repeat one value `len` times.
    pub fn broadcast(value: Scalar, len: usize) -> Result<Self, ColumnError> {
        let dtype = value.dtype();
        Self::new(dtype, vec![value; len])
    }

    #[must_use]
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn values(&self) -> &[Scalar] {
        &self.values
    }

    #[must_use]
    pub fn value(&self, idx: usize) -> Option<&Scalar> {
        self.values.get(idx)
    }

    /// Gather the cells at `positions`, in that order. Repeats are allowed.
    pub fn take(&self, positions: &[usize]) -> Result<Self, ColumnError> {
        let values = positions
            .iter()
            .map(|&position| {
                self.values
                    .get(position)
                    .cloned()
                    .ok_or(ColumnError::PositionOutOfBounds {
                        position,
                        len: self.len(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.with_values(values))
    }

    #[must_use]
    pub fn slice(&self, range: Range<usize>) -> Self {
        let end = range.end.min(self.len());
        let start = range.start.min(end);
        self.with_values(self.values[start..end].to_vec())
    }

    // Values are drawn from `self`, so they already fit the dtype.
    fn with_values(&self, values: Vec<Scalar>) -> Self {
        let validity = ValidityMask::from_values(&values);
        Self {
            dtype: self.dtype,
            values,
            validity,
        }
    }

    /// Compare every element against a scalar, producing a `Bool` column.
    pub fn compare_scalar(&self, scalar: &Scalar, op: ComparisonOp) -> Result<Self, ColumnError> {
        let values = self
            .values
            .iter()
            .map(|v| scalar_compare(v, scalar, op).map(Scalar::Bool))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(DType::Bool, values)
    }

    /// Element-wise comparison of two equally long columns.
    pub fn binary_comparison(&self, right: &Self, op: ComparisonOp) -> Result<Self, ColumnError> {
        if self.len() != right.len() {
            return Err(ColumnError::LengthMismatch {
                left: self.len(),
                right: right.len(),
            });
        }

        let values = self
            .values
            .iter()
            .zip(&right.values)
            .map(|(l, r)| scalar_compare(l, r, op).map(Scalar::Bool))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(DType::Bool, values)
    }

    /// Membership test against `test_values`.
    ///
    /// Integers and floats compare numerically. A missing cell is a member
    /// only when `test_values` itself contains a missing marker.
    #[must_use]
    pub fn isin(&self, test_values: &[Scalar]) -> Self {
        let has_missing = test_values.iter().any(Scalar::is_missing);
        let values = self
            .values
            .iter()
            .map(|value| {
                if value.is_missing() {
                    Scalar::Bool(has_missing)
                } else {
                    Scalar::Bool(test_values.iter().any(|tv| value.domain_eq(tv)))
                }
            })
            .collect::<Vec<_>>();
        self.bool_column(values)
    }

    /// `true` where the cell is the missing marker.
    #[must_use]
    pub fn isnull(&self) -> Self {
        let values = self.validity.bits().map(|valid| Scalar::Bool(!valid)).collect();
        self.bool_column(values)
    }

    /// `true` where the cell holds a value.
    #[must_use]
    pub fn notnull(&self) -> Self {
        let values = self.validity.bits().map(Scalar::Bool).collect();
        self.bool_column(values)
    }

    fn bool_column(&self, values: Vec<Scalar>) -> Self {
        let validity = ValidityMask::from_values(&values);
        Self {
            dtype: DType::Bool,
            values,
            validity,
        }
    }

    /// Number of non-missing cells.
    #[must_use]
    pub fn count(&self) -> usize {
        self.validity.count_valid()
    }

    /// Whether the column holds only `Bool` cells (missing cells allowed).
    #[must_use]
    pub fn is_boolean(&self) -> bool {
        self.values
            .iter()
            .all(|v| matches!(v, Scalar::Bool(_) | Scalar::Null(NullKind::Null)))
    }
}
