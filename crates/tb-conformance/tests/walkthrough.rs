#![forbid(unsafe_code)]

//! End-to-end scenarios over the fixture tables: construction, parsing,
//! positional and label selection, conditional filtering and assignment.

use tb_conformance::{
    fixture_path, fruits, int_cells, label_strings, products, write_scratch_csv,
};
use tb_frame::{ColumnInput, ColumnSpec, DataFrame, FrameError, Series};
use tb_index::{Index, IndexLabel};
use tb_io::{CsvOptions, parse_delimited, read_csv};
use tb_types::{DType, ErrorKind, Scalar};

fn rows_of(frame: &DataFrame) -> Vec<String> {
    label_strings(frame.index())
}

// ---------------------------------------------------------------------------
// Creating data
// ---------------------------------------------------------------------------

#[test]
fn integer_and_string_tables_from_mappings() {
    let records = DataFrame::from_mapping([("Yes", vec![50, 120]), ("No", vec![20, 100])], None)
        .expect("records");
    assert_eq!(records.shape(), (2, 2));
    assert_eq!(records.column("Yes").expect("yes").dtype(), DType::Int64);

    let ratings = DataFrame::from_mapping(
        [
            ("Bob", vec!["I liked it", "It was awful"]),
            ("Sue", vec!["Pretty good", "Bland"]),
        ],
        Some(vec!["Product A".into(), "Product B".into()]),
    )
    .expect("ratings");
    let cell = ratings
        .loc("Product B", "Sue")
        .expect("loc")
        .into_scalar()
        .expect("scalar");
    assert_eq!(cell, Scalar::from("Bland"));
}

#[test]
fn series_from_list_and_with_labels() {
    let plain = Series::from_vec("values", vec![1, 2, 3, 4, 5]).expect("series");
    assert_eq!(plain.index(), &Index::range(5));

    let sales = Series::from_values(
        "Product A",
        ["2015 Sales", "2016 Sales", "2017 Sales"],
        [30, 35, 40],
    )
    .expect("sales");
    assert_eq!(sales.name(), Some("Product A"));
    assert_eq!(sales.at("2016 Sales").expect("at"), &Scalar::Int64(35));
}

#[test]
fn reading_products_and_inspecting_shape() {
    let frame = products().expect("products");
    assert_eq!(frame.shape(), (3, 3));
    assert_eq!(frame.column_names(), vec!["Product A", "Product B", "Product C"]);
    assert_eq!(frame.head(None).shape(), (3, 3));
}

#[test]
fn index_column_comes_from_the_file() {
    let frame = fruits().expect("fruits");
    assert_eq!(frame.shape(), (8, 4));
    assert_eq!(frame.index(), &Index::range(8));
    assert_eq!(
        frame.column_names(),
        vec!["Country", "Apples", "Oranges", "Mangoes"]
    );

    let raw = read_csv(fixture_path("second_data.csv"), &CsvOptions::default()).expect("raw");
    assert_eq!(raw.shape(), (8, 5));
    assert_eq!(raw.column_names()[0], "");
}

#[test]
fn head_returns_first_five_rows() {
    let frame = fruits().expect("fruits");
    let head = frame.head(None);
    assert_eq!(rows_of(&head), vec!["0", "1", "2", "3", "4"]);
    assert_eq!(frame.head(3).len(), 3);
}

// ---------------------------------------------------------------------------
// Native accessors
// ---------------------------------------------------------------------------

#[test]
fn bracket_access_and_drill_down() {
    let frame = fruits().expect("fruits");
    let mangoes = frame.get("Mangoes").expect("mangoes");
    assert_eq!(mangoes.name(), Some("Mangoes"));
    assert_eq!(mangoes.len(), frame.len());
    assert_eq!(mangoes.at(0).expect("first"), &Scalar::Int64(9));
    assert_eq!(mangoes.iat(0).expect("first"), &Scalar::Int64(9));

    let err = frame.get("Best Before").expect_err("absent");
    assert_eq!(err.kind(), ErrorKind::Key);
}

#[test]
fn names_with_spaces_work_through_brackets() {
    let mut frame = fruits().expect("fruits");
    frame.set_column("Best Before", "2024-06").expect("assign");
    let column = frame.get("Best Before").expect("column with space");
    assert_eq!(column.values()[7], Scalar::from("2024-06"));
}

// ---------------------------------------------------------------------------
// iloc
// ---------------------------------------------------------------------------

#[test]
fn iloc_first_row_is_cross_section() {
    let frame = fruits().expect("fruits");
    let row = frame.iloc_rows(0).expect("iloc").into_series().expect("row");
    assert_eq!(row.name(), Some("0"));
    assert_eq!(
        label_strings(row.index()),
        vec!["Country", "Apples", "Oranges", "Mangoes"]
    );
    assert_eq!(row.dtype(), DType::Object);
    assert_eq!(row.values()[0], Scalar::from("Italy"));
    assert_eq!(row.values()[3], Scalar::Int64(9));
}

#[test]
fn iloc_column_slices() {
    let frame = fruits().expect("fruits");

    let apples = frame.iloc(.., 1).expect("iloc").into_series().expect("series");
    assert_eq!(apples.name(), Some("Apples"));
    assert_eq!(apples.len(), 8);

    let first_three = frame.iloc(..3, 1).expect("iloc").into_series().expect("series");
    assert_eq!(int_cells(&first_three), vec![Some(30), Some(35), Some(41)]);

    let mangoes = frame.iloc(1..3, 3).expect("iloc").into_series().expect("series");
    assert_eq!(int_cells(&mangoes), vec![Some(25), Some(31)]);
    let rows = frame.iloc_rows(1..3).expect("rows").into_frame().expect("frame");
    assert_eq!(rows_of(&rows), vec!["1", "2"]);
}

#[test]
fn iloc_with_position_list() {
    let frame = fruits().expect("fruits");
    let oranges = frame
        .iloc(vec![0, 1, 2, 3], 2)
        .expect("iloc")
        .into_series()
        .expect("series");
    assert_eq!(int_cells(&oranges), vec![Some(21), Some(34), Some(11), Some(40)]);

    let shuffled = frame
        .iloc(vec![3, 0, 3], 2)
        .expect("iloc")
        .into_series()
        .expect("series");
    assert_eq!(label_strings(shuffled.index()), vec!["3", "0", "3"]);
}

#[test]
fn iloc_negative_range_returns_tail() {
    let frame = fruits().expect("fruits");
    let last = frame.iloc_rows(-5..).expect("iloc").into_frame().expect("frame");
    assert_eq!(rows_of(&last), vec!["3", "4", "5", "6", "7"]);
    assert_eq!(last, frame.tail(None));
}

// ---------------------------------------------------------------------------
// loc
// ---------------------------------------------------------------------------

#[test]
fn loc_single_cell_and_reordered_columns() {
    let frame = fruits().expect("fruits");
    let cell = frame
        .loc(2, "Oranges")
        .expect("loc")
        .into_scalar()
        .expect("scalar");
    assert_eq!(cell, Scalar::Int64(11));

    let reordered = frame
        .loc(.., ["Mangoes", "Oranges", "Apples"])
        .expect("loc")
        .into_frame()
        .expect("frame");
    assert_eq!(reordered.column_names(), vec!["Mangoes", "Oranges", "Apples"]);
    assert_eq!(reordered.len(), 8);
}

#[test]
fn loc_ranges_include_the_stop_label() {
    let frame = fruits().expect("fruits");
    let by_label = frame.loc_rows(0..=5).expect("loc").into_frame().expect("frame");
    let by_position = frame.iloc_rows(0..5).expect("iloc").into_frame().expect("frame");
    assert_eq!(by_label.len(), 6);
    assert_eq!(by_position.len(), 5);
}

#[test]
fn loc_string_range_over_produce_index() {
    let stock = DataFrame::from_mapping(
        [("Qty", vec![3, 8, 1, 5])],
        Some(vec![
            "Apples".into(),
            "Carrots".into(),
            "Potatoes".into(),
            "Zucchini".into(),
        ]),
    )
    .expect("stock");
    let picked = stock
        .loc("Apples"..="Potatoes", "Qty")
        .expect("loc")
        .into_series()
        .expect("series");
    assert_eq!(
        label_strings(picked.index()),
        vec!["Apples", "Carrots", "Potatoes"]
    );

    let err = stock.loc("Bananas", "Qty").expect_err("missing label");
    assert_eq!(err.kind(), ErrorKind::Key);
}

#[test]
fn loc_column_range_follows_column_order() {
    let frame = fruits().expect("fruits");
    let sub = frame
        .loc(..=1, ColumnSpec::range("Apples", "Mangoes"))
        .expect("loc")
        .into_frame()
        .expect("frame");
    assert_eq!(sub.shape(), (2, 3));
}

// ---------------------------------------------------------------------------
// Conditional selection
// ---------------------------------------------------------------------------

#[test]
fn rows_where_country_matches() {
    let frame = fruits().expect("fruits");
    let india = frame.get("Country").expect("country").eq_scalar("India").expect("eq");
    let rows = frame.loc_rows(&india).expect("loc").into_frame().expect("frame");
    assert_eq!(rows_of(&rows), vec!["2", "7"]);
}

#[test_log::test]
fn conjunction_keeps_original_order() {
    let frame = fruits().expect("fruits");
    let brazil = frame.get("Country").expect("country").eq_scalar("Brazil").expect("eq");
    let many_mangoes = frame.get("Mangoes").expect("mangoes").gt_scalar(20).expect("gt");
    let mask = (brazil & many_mangoes).expect("and");
    let rows = frame.loc_rows(mask).expect("loc").into_frame().expect("frame");
    assert_eq!(rows_of(&rows), vec!["1", "6"]);
    assert_eq!(int_cells(&rows.get("Mangoes").expect("m")), vec![Some(25), Some(27)]);
}

#[test]
fn disjunction_skips_missing_cells() {
    let frame = fruits().expect("fruits");
    let italy = frame.get("Country").expect("country").eq_scalar("Italy").expect("eq");
    let many_apples = frame.get("Apples").expect("apples").gt_scalar(30).expect("gt");
    let mask = (&italy | &many_apples).expect("or");
    let rows = frame.loc_rows(&mask).expect("loc").into_frame().expect("frame");
    assert_eq!(rows_of(&rows), vec!["0", "1", "2", "4", "5"]);
}

#[test]
fn scalar_truth_of_a_mask_is_rejected() {
    let frame = fruits().expect("fruits");
    let mask = frame.get("Apples").expect("apples").gt_scalar(30).expect("gt");
    let err = mask.truth_value().expect_err("ambiguous");
    assert_eq!(err.kind(), ErrorKind::Type);
    assert!(matches!(err, FrameError::AmbiguousTruthValue { len: 8 }));
}

#[test]
fn isin_selects_listed_countries() {
    let frame = fruits().expect("fruits");
    let mask = frame
        .get("Country")
        .expect("country")
        .isin(["Italy", "Brazil"]);
    let rows = frame.loc_rows(&mask).expect("loc").into_frame().expect("frame");
    assert_eq!(rows_of(&rows), vec!["0", "1", "3", "4", "6"]);
}

#[test]
fn isnull_and_notnull_partition_rows() {
    let frame = fruits().expect("fruits");
    let apples = frame.get("Apples").expect("apples");

    let missing = frame
        .loc_rows(apples.isnull())
        .expect("loc")
        .into_frame()
        .expect("frame");
    assert_eq!(rows_of(&missing), vec!["3", "7"]);

    let present = frame
        .loc_rows(apples.notnull())
        .expect("loc")
        .into_frame()
        .expect("frame");
    assert_eq!(missing.len() + present.len(), frame.len());
    assert_eq!(present.len(), apples.count());
}

// ---------------------------------------------------------------------------
// Assigning data
// ---------------------------------------------------------------------------

#[test]
fn assigning_a_constant_broadcasts() {
    let mut frame = fruits().expect("fruits");
    frame.set_column("Country", "Japan").expect("assign");
    let country = frame.get("Country").expect("country");
    assert!(country.values().iter().all(|v| v == &Scalar::from("Japan")));
    assert_eq!(frame.column_names()[0], "Country");
}

#[test]
fn assigning_a_descending_range() {
    let mut frame = fruits().expect("fruits");
    let len = i64::try_from(frame.len()).expect("len fits");
    frame
        .assign_iter("Mangoes", (1..=len).rev())
        .expect("assign");
    assert_eq!(
        int_cells(&frame.get("Mangoes").expect("m")),
        (1..=8).rev().map(Some).collect::<Vec<_>>()
    );
}

#[test]
fn short_assignment_is_a_shape_error() {
    let mut frame = fruits().expect("fruits");
    let before = frame.clone();
    let err = frame
        .set_column("Mangoes", ColumnInput::from(vec![1, 2, 3]))
        .expect_err("short");
    assert_eq!(err.kind(), ErrorKind::Shape);
    assert_eq!(frame, before);
}

#[test]
fn promote_country_to_index_then_select_by_label() {
    let frame = fruits().expect("fruits").set_index("Country").expect("set_index");
    let italy = frame
        .loc("Italy", "Apples")
        .expect("loc")
        .into_series()
        .expect("two Italy rows");
    assert_eq!(int_cells(&italy), vec![Some(30), Some(28)]);
    assert_eq!(frame.index().labels()[5], IndexLabel::from("Japan"));
}

#[test]
fn table_snapshot_survives_json() {
    let mut frame = fruits().expect("fruits");
    frame.set_column("Country", "Japan").expect("assign");
    let snapshot = serde_json::to_value(&frame).expect("serialize");
    let restored: DataFrame = serde_json::from_value(snapshot).expect("deserialize");
    assert_eq!(restored, frame);
}

// ---------------------------------------------------------------------------
// Parsing edge cases through files
// ---------------------------------------------------------------------------

#[test]
fn scratch_files_round_trip_through_read_csv() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_scratch_csv(dir.path(), "semi.csv", "id;label\n7;seven\n9;nine\n")
        .expect("write");
    let options = CsvOptions::default().with_delimiter(';').with_index_col("id");
    let frame = read_csv(&path, &options).expect("read");
    assert_eq!(frame.index(), &Index::from_i64(vec![7, 9]));
    let label = frame.loc(9, "label").expect("loc").into_scalar().expect("scalar");
    assert_eq!(label, Scalar::from("nine"));
}

#[test]
fn malformed_input_never_yields_a_table() {
    for input in ["a,b\n\"x,1\n", "a,b\n1,2,3\n", "a,b\nx\"y,1\n"] {
        let err = parse_delimited(input, &CsvOptions::default()).expect_err("malformed");
        assert_eq!(err.kind(), ErrorKind::Parse, "{input:?}");
    }
}
