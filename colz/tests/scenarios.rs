use colz::{
    Backend, Column, ColumnOptions, ColumnSource, Count, EvalOptions, OpenMode, OutFlavor,
    RowsSource, Slice, Table, TableOptions, WhereOptions, eval, fromiter_column,
};
use colz_array::{Array, Scalar, StructArray};
use colz_error::ColzResult;
use rstest::{fixture, rstest};
use tempfile::TempDir;

#[fixture]
fn table() -> Table {
    Table::new(
        ColumnSource::Arrays(vec![
            Array::from(vec![0i64, 1, 2, 3, 4]),
            Array::from(vec![0i64, 2, 4, 6, 8]),
        ]),
        TableOptions::default(),
    )
    .unwrap()
}

#[rstest]
fn where_projects_matching_rows(table: Table) {
    let rows = table
        .where_("f0 >= 2", &WhereOptions::default().with_outcols(["f0"]))
        .unwrap()
        .collect::<ColzResult<Vec<_>>>()
        .unwrap();
    let f0 = rows
        .iter()
        .map(|row| *row.get("f0").unwrap())
        .collect::<Vec<_>>();
    assert_eq!(f0, [Scalar::I64(2), Scalar::I64(3), Scalar::I64(4)]);
    assert!(rows.iter().all(|row| row.len() == 1));
}

#[rstest]
fn eval_over_table_columns(table: Table) {
    let namespace = table.columns();
    let result = eval(
        "f0 * 2 + f1",
        &EvalOptions::default().with_namespace(&namespace),
    )
    .unwrap()
    .into_array()
    .unwrap();
    assert_eq!(result, Array::from(vec![0i64, 4, 8, 12, 16]));
}

#[test]
fn fromiter_with_unknown_length() {
    let column = fromiter_column(0..10i64, Count::Unknown, ColumnOptions::default()).unwrap();
    assert_eq!(column.len(), 10);
    assert_eq!(
        column.read_range(0, column.len()).unwrap(),
        (0..10i64).collect::<Array>()
    );
}

#[rstest]
fn addcol_then_delcol_restores_shape(mut table: Table) {
    let names = table.names().to_vec();
    let dtype = table.dtype().clone();
    table
        .addcol(Array::from(vec![0i64; 5]), Some("f2"), None, None)
        .unwrap();
    assert_eq!(table.ncols(), 3);
    table.delcol("f2").unwrap();
    assert_eq!(table.names(), names);
    assert_eq!(table.dtype(), &dtype);
}

fn assert_lengths(table: &Table) {
    for name in table.names() {
        assert_eq!(table.column(name).unwrap().len(), table.len(), "column {name}");
    }
}

#[rstest]
fn length_invariant_across_operations(mut table: Table) {
    assert_lengths(&table);
    table
        .append(RowsSource::Columns(vec![
            Array::from(vec![5i64, 6]).into(),
            Array::from(vec![10i64, 12]).into(),
        ]))
        .unwrap();
    assert_lengths(&table);
    table
        .addcol(Array::from(vec![1.0f64; 7]), Some("w"), Some(1), None)
        .unwrap();
    assert_lengths(&table);
    table.resize(12).unwrap();
    assert_lengths(&table);
    table.trim(4).unwrap();
    assert_lengths(&table);
    assert!(
        table
            .append(RowsSource::Columns(vec![Array::from(vec![1i64]).into()]))
            .is_err()
    );
    assert_lengths(&table);
    table.delcol(0usize).unwrap();
    assert_lengths(&table);
    assert_eq!(table.len(), 8);
}

#[rstest]
#[case(0)]
#[case(1)]
#[case(37)]
fn appended_rows_read_back(mut table: Table, #[case] k: usize) {
    let before = table.len();
    let f0 = (0..k as i64).map(|v| v * 7).collect::<Array>();
    let f1 = (0..k as i64).map(|v| -v).collect::<Array>();
    table
        .append(RowsSource::Columns(vec![f0.clone().into(), f1.clone().into()]))
        .unwrap();
    assert_eq!(table.len(), before + k);
    let tail = table
        .get(Slice::new(before as i64, table.len() as i64))
        .unwrap()
        .into_rows()
        .unwrap();
    assert_eq!(tail, StructArray::from_fields([("f0", f0), ("f1", f1)]).unwrap());
}

#[test]
fn persisted_table_round_trips() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("table");
    let mut table = Table::new(
        ColumnSource::Arrays(vec![
            (0..1000i32).collect(),
            (0..1000).map(|v| v as f64 / 3.0).collect(),
            (0..1000).map(|v| v % 7 == 0).collect(),
        ]),
        TableOptions::default()
            .with_names(["id", "value", "flag"])
            .with_root(&root)
            .with_chunklen(128),
    )
    .unwrap();
    table
        .append(RowsSource::Columns(vec![
            Scalar::I32(1000).into(),
            Scalar::F64(0.0).into(),
            Scalar::Bool(true).into(),
        ]))
        .unwrap();
    table.flush().unwrap();

    let reopened = Table::open(&root, OpenMode::Read).unwrap();
    assert_eq!(reopened.names(), table.names());
    assert_eq!(reopened.len(), 1001);
    for i in [0i64, 1, 127, 128, 500, 999, 1000] {
        assert_eq!(
            reopened.get(i).unwrap().into_row().unwrap(),
            table.get(i).unwrap().into_row().unwrap()
        );
    }
}

#[test]
fn evaluation_is_block_size_independent() {
    let n = 10_000i64;
    let column = Column::new(
        &(0..n).collect::<Array>(),
        ColumnOptions::default().with_chunklen(1000),
    )
    .unwrap();
    let namespace = colz::Namespace::from([
        ("x".to_string(), column.into()),
        ("y".to_string(), (0..n).map(|v| v as f64).collect::<Array>().into()),
    ]);
    let expression = "where(x % 3 == 0, x * 2, y - 1.5)";
    let whole = eval(
        expression,
        &EvalOptions::default()
            .with_namespace(&namespace)
            .with_blen(n as usize)
            .with_out_flavor(OutFlavor::Array),
    )
    .unwrap()
    .into_array()
    .unwrap();
    for blen in [7, 64, 999, 4096] {
        for backend in [Backend::Interpreted, Backend::Compiled] {
            let blocked = eval(
                expression,
                &EvalOptions::default()
                    .with_namespace(&namespace)
                    .with_backend(backend)
                    .with_blen(blen),
            )
            .unwrap()
            .into_array()
            .unwrap();
            assert_eq!(blocked, whole, "blen {blen}, {backend} backend");
        }
    }
}

#[rstest]
#[case(1)]
#[case(2)]
#[case(13)]
fn reductions_over_blocks(#[case] nblocks: usize) {
    let values = (1..=1000i64).collect::<Array>();
    let namespace = colz::Namespace::from([("x".to_string(), values.into())]);
    let blen = 1000usize.div_ceil(nblocks);
    let total = eval(
        "sum(x)",
        &EvalOptions::default()
            .with_namespace(&namespace)
            .with_blen(blen),
    )
    .unwrap();
    assert_eq!(total.as_scalar(), Some(Scalar::I64(500_500)));
}

#[rstest]
fn trimming_everything_keeps_schema(mut table: Table) {
    let dtype = table.dtype().clone();
    table.trim(table.len()).unwrap();
    assert!(table.is_empty());
    assert_eq!(table.dtype(), &dtype);
    let empty = table.get(Slice::new(0, 0)).unwrap().into_rows().unwrap();
    assert!(empty.is_empty());
    assert_eq!(&empty.struct_dtype(), &dtype);
}
