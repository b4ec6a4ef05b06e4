#![forbid(unsafe_code)]

use std::fmt;
use std::path::Path;

use csv::{ReaderBuilder, Trim};
use serde::{Deserialize, Serialize};
use tb_columnar::{Column, ColumnError};
use tb_frame::{DataFrame, FrameError};
use tb_index::{Index, IndexLabel};
use tb_types::{DType, ErrorKind, NullKind, Scalar};
use thiserror::Error;

/// Field texts read as the missing marker.
const MISSING_TOKENS: &[&str] = &["", "NaN", "nan", "NA", "null"];

/// Which column becomes the row index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IndexColumn {
    Name(String),
    Position(usize),
}

impl From<&str> for IndexColumn {
    fn from(value: &str) -> Self {
        Self::Name(value.to_owned())
    }
}

impl From<String> for IndexColumn {
    fn from(value: String) -> Self {
        Self::Name(value)
    }
}

impl From<usize> for IndexColumn {
    fn from(value: usize) -> Self {
        Self::Position(value)
    }
}

impl fmt::Display for IndexColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => write!(f, "{name:?}"),
            Self::Position(pos) => write!(f, "#{pos}"),
        }
    }
}

/// Parser settings. Omitted fields take their defaults when deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CsvOptions {
    pub delimiter: char,
    pub has_header: bool,
    pub index_col: Option<IndexColumn>,
    pub trim_fields: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: ',',
            has_header: true,
            index_col: None,
            trim_fields: true,
        }
    }
}

impl CsvOptions {
    pub fn from_json(json: &str) -> Result<Self, IoError> {
        Ok(serde_json::from_str(json)?)
    }

    #[must_use]
    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    #[must_use]
    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    #[must_use]
    pub fn with_index_col(mut self, index_col: impl Into<IndexColumn>) -> Self {
        self.index_col = Some(index_col.into());
        self
    }

    #[must_use]
    pub fn with_trim_fields(mut self, trim_fields: bool) -> Self {
        self.trim_fields = trim_fields;
        self
    }

    fn delimiter_byte(&self) -> Result<u8, IoError> {
        match u8::try_from(self.delimiter) {
            Ok(byte) if byte.is_ascii() && !matches!(byte, b'"' | b'\n' | b'\r') => Ok(byte),
            _ => Err(IoError::InvalidDelimiter(self.delimiter)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteProblem {
    Unterminated,
    StrayQuote,
    TextAfterQuote,
}

impl fmt::Display for QuoteProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unterminated => "quoted field is never closed",
            Self::StrayQuote => "quote inside an unquoted field",
            Self::TextAfterQuote => "text after closing quote",
        })
    }
}

#[derive(Debug, Error)]
pub enum IoError {
    #[error("line {line}: {problem}")]
    Quote { line: u64, problem: QuoteProblem },
    #[error("line {line}: expected {expected} fields, found {found}")]
    FieldCount { line: u64, expected: u64, found: u64 },
    #[error("delimiter must be a single ASCII byte other than a quote or newline, got {0:?}")]
    InvalidDelimiter(char),
    #[error("index column {0} not found")]
    IndexColumnNotFound(String),
    #[error("index column position {position} out of range for {width} fields")]
    IndexColumnOutOfRange { position: usize, width: usize },
    #[error("invalid csv options: {0}")]
    Options(#[from] serde_json::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error(transparent)]
    Column(#[from] ColumnError),
    #[error(transparent)]
    Frame(#[from] FrameError),
}

impl IoError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Quote { .. }
            | Self::FieldCount { .. }
            | Self::InvalidDelimiter(_)
            | Self::Options(_)
            | Self::Utf8(_) => ErrorKind::Parse,
            Self::IndexColumnNotFound(_) => ErrorKind::Key,
            Self::IndexColumnOutOfRange { .. } => ErrorKind::Index,
            Self::Csv(err) => match err.kind() {
                csv::ErrorKind::Io(_) => ErrorKind::Io,
                _ => ErrorKind::Parse,
            },
            Self::Io(_) => ErrorKind::Io,
            Self::Column(err) => err.kind(),
            Self::Frame(err) => err.kind(),
        }
    }
}

fn field_count_or_csv(err: csv::Error) -> IoError {
    if let csv::ErrorKind::UnequalLengths {
        pos,
        expected_len,
        len,
    } = err.kind()
    {
        return IoError::FieldCount {
            line: pos.as_ref().map_or(0, csv::Position::line),
            expected: *expected_len,
            found: *len,
        };
    }
    IoError::Csv(err)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldState {
    Start,
    Unquoted,
    Quoted,
    ClosingQuote,
}

/// Reject malformed quoting before the csv reader sees the input.
///
/// A quote may only open a field; inside a quoted field `""` is a literal
/// quote and a lone `"` must be followed by a delimiter or end of record.
fn validate_quoting(source: &str, delimiter: u8) -> Result<(), IoError> {
    let mut state = FieldState::Start;
    let mut line = 1_u64;
    let mut opened_on = 1_u64;

    for byte in source.bytes() {
        let boundary = byte == delimiter || byte == b'\n' || byte == b'\r';
        state = match (state, byte) {
            (FieldState::Quoted, b'"') => FieldState::ClosingQuote,
            (FieldState::Quoted, _) => FieldState::Quoted,
            (FieldState::ClosingQuote, b'"') => FieldState::Quoted,
            (FieldState::Start, b'"') => {
                opened_on = line;
                FieldState::Quoted
            }
            (_, _) if boundary => FieldState::Start,
            (FieldState::ClosingQuote, _) => {
                return Err(IoError::Quote {
                    line,
                    problem: QuoteProblem::TextAfterQuote,
                });
            }
            (FieldState::Unquoted, b'"') => {
                return Err(IoError::Quote {
                    line,
                    problem: QuoteProblem::StrayQuote,
                });
            }
            (_, _) => FieldState::Unquoted,
        };
        if byte == b'\n' {
            line += 1;
        }
    }

    if state == FieldState::Quoted {
        return Err(IoError::Quote {
            line: opened_on,
            problem: QuoteProblem::Unterminated,
        });
    }
    Ok(())
}

fn is_missing_token(field: &str) -> bool {
    MISSING_TOKENS.contains(&field)
}

fn parse_bool(field: &str) -> Option<bool> {
    if field.eq_ignore_ascii_case("true") {
        Some(true)
    } else if field.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Pick one dtype for the whole column: Int64, then Float64, then Bool,
/// falling back to Utf8. An all-missing column is Float64.
fn infer_column(fields: Vec<String>) -> Result<Column, ColumnError> {
    let present = || fields.iter().filter(|f| !is_missing_token(f));

    let dtype = if present().all(|f| f.parse::<i64>().is_ok()) {
        if present().next().is_none() {
            DType::Float64
        } else {
            DType::Int64
        }
    } else if present().all(|f| f.parse::<f64>().is_ok()) {
        DType::Float64
    } else if present().all(|f| parse_bool(f).is_some()) {
        DType::Bool
    } else {
        DType::Utf8
    };

    let values = fields
        .into_iter()
        .map(|field| {
            if is_missing_token(&field) {
                return Scalar::Null(NullKind::Null);
            }
            match dtype {
                DType::Int64 => field.parse().map_or(Scalar::Null(NullKind::Null), Scalar::Int64),
                DType::Float64 => field
                    .parse()
                    .map_or(Scalar::Null(NullKind::NaN), Scalar::Float64),
                DType::Bool => parse_bool(&field).map_or(Scalar::Null(NullKind::Null), Scalar::Bool),
                _ => Scalar::Utf8(field),
            }
        })
        .collect();

    Column::new(dtype, values)
}

/// Integer labels when every raw value is an integer, string labels otherwise.
fn index_from_fields(fields: Vec<String>) -> Index {
    let ints: Option<Vec<i64>> = fields.iter().map(|f| f.parse().ok()).collect();
    match ints {
        Some(ints) => Index::from_i64(ints),
        None => Index::new(fields.into_iter().map(IndexLabel::from).collect()),
    }
}

fn resolve_index_column(
    index_col: &IndexColumn,
    names: &[String],
) -> Result<usize, IoError> {
    match index_col {
        IndexColumn::Name(name) => names
            .iter()
            .position(|candidate| candidate == name)
            .ok_or_else(|| IoError::IndexColumnNotFound(name.clone())),
        IndexColumn::Position(position) if *position < names.len() => Ok(*position),
        IndexColumn::Position(position) => Err(IoError::IndexColumnOutOfRange {
            position: *position,
            width: names.len(),
        }),
    }
}

/// Parse delimited text into a table with one inferred dtype per column.
pub fn parse_delimited(source: &str, options: &CsvOptions) -> Result<DataFrame, IoError> {
    let delimiter = options.delimiter_byte()?;
    // A byte-order mark is not part of the first field.
    let source = source.strip_prefix('\u{feff}').unwrap_or(source);
    validate_quoting(source, delimiter)?;

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(false)
        .trim(if options.trim_fields {
            Trim::All
        } else {
            Trim::None
        })
        .from_reader(source.as_bytes());

    let mut names: Option<Vec<String>> = None;
    let mut fields: Vec<Vec<String>> = Vec::new();
    let mut row_count = 0_usize;

    for record in reader.records() {
        let record = record.map_err(field_count_or_csv)?;
        if names.is_none() {
            names = Some(if options.has_header {
                record.iter().map(str::to_owned).collect()
            } else {
                (0..record.len()).map(|pos| pos.to_string()).collect()
            });
            fields = vec![Vec::new(); record.len()];
            if options.has_header {
                continue;
            }
        }
        for (column, field) in fields.iter_mut().zip(record.iter()) {
            column.push(field.to_owned());
        }
        row_count += 1;
    }

    let names = names.unwrap_or_default();
    let index_pos = options
        .index_col
        .as_ref()
        .map(|index_col| resolve_index_column(index_col, &names))
        .transpose()?;

    let mut index = Index::range(row_count);
    let mut columns = Vec::with_capacity(names.len());
    for (pos, (name, raw)) in names.into_iter().zip(fields).enumerate() {
        if Some(pos) == index_pos {
            index = index_from_fields(raw);
            continue;
        }
        let column = infer_column(raw)?;
        log::trace!("column {name:?} inferred as {:?}", column.dtype());
        columns.push((name, column));
    }

    let frame = DataFrame::from_columns(index, columns)?;
    log::debug!(
        "parsed {} rows x {} columns (index column: {})",
        frame.len(),
        frame.num_columns(),
        options
            .index_col
            .as_ref()
            .map_or_else(|| "none".to_owned(), ToString::to_string),
    );
    Ok(frame)
}

/// Parse comma-separated text with a header row and the default index.
pub fn read_csv_str(input: &str) -> Result<DataFrame, IoError> {
    parse_delimited(input, &CsvOptions::default())
}

/// Read a UTF-8 file and parse it with `options`.
pub fn read_csv(path: impl AsRef<Path>, options: &CsvOptions) -> Result<DataFrame, IoError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    let source = String::from_utf8(bytes)?;
    log::debug!("read {} bytes from {}", source.len(), path.display());
    parse_delimited(&source, options)
}
