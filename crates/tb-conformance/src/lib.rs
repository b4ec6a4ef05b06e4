#![forbid(unsafe_code)]

//! Fixture datasets shared by the behaviour suites under `tests/`.
//!
//! `second_data.csv` is the fruit-harvest table used throughout the suites:
//! an unnamed leading index column, a `Country` text column and three
//! integer columns with a few empty cells. `data.csv` is a three-row table
//! without an index column.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tb_frame::{DataFrame, Series};
use tb_index::Index;
use tb_io::{CsvOptions, IoError, read_csv};
use tb_types::Scalar;

pub const FRUITS_FIXTURE: &str = "second_data.csv";
pub const PRODUCTS_FIXTURE: &str = "data.csv";

#[must_use]
pub fn fixture_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

#[must_use]
pub fn fixture_path(name: &str) -> PathBuf {
    fixture_root().join(name)
}

pub fn load_fixture(name: &str, options: &CsvOptions) -> Result<DataFrame, IoError> {
    let path = fixture_path(name);
    log::debug!("loading fixture {}", path.display());
    read_csv(path, options)
}

/// The fruit table with its first column promoted to the row index.
pub fn fruits() -> Result<DataFrame, IoError> {
    load_fixture(FRUITS_FIXTURE, &CsvOptions::default().with_index_col(0_usize))
}

pub fn products() -> Result<DataFrame, IoError> {
    load_fixture(PRODUCTS_FIXTURE, &CsvOptions::default())
}

/// Write `contents` to `dir/name` and return the path.
pub fn write_scratch_csv(dir: &Path, name: &str, contents: &str) -> io::Result<PathBuf> {
    let path = dir.join(name);
    fs::write(&path, contents)?;
    Ok(path)
}

/// Integer cells of `series`, `None` for missing or non-integer cells.
#[must_use]
pub fn int_cells(series: &Series) -> Vec<Option<i64>> {
    series
        .values()
        .iter()
        .map(|value| match value {
            Scalar::Int64(v) => Some(*v),
            _ => None,
        })
        .collect()
}

#[must_use]
pub fn label_strings(index: &Index) -> Vec<String> {
    index.labels().iter().map(ToString::to_string).collect()
}
