use colz_array::{ArrayBuilder, Element, Scalar, StructBuilder};
use colz_dtype::DType;
use colz_error::{ColzResult, colz_bail};
use itertools::Itertools;

use crate::carray::{Column, ColumnOptions};
use crate::ctable::{RowsSource, Table, TableOptions};

/// Length assumed for a source that gives no usable size hint.
const FALLBACK_LEN: usize = 1_000_000;

/// How many items to read from the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Count {
    /// Read at most this many items.
    Exact(usize),
    /// Read until the source is exhausted.
    Unknown,
}

/// One item of a bulk build: a value for a column, or one value per field for a table.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Scalar(Scalar),
    Fields(Vec<Scalar>),
}

impl From<Scalar> for Record {
    fn from(value: Scalar) -> Self {
        Record::Scalar(value)
    }
}

impl From<Vec<Scalar>> for Record {
    fn from(value: Vec<Scalar>) -> Self {
        Record::Fields(value)
    }
}

/// The result of [`fromiter`]: a column for scalar dtypes, a table for struct dtypes.
#[derive(Debug)]
pub enum Container {
    Column(Column),
    Table(Table),
}

impl Container {
    pub fn len(&self) -> usize {
        match self {
            Container::Column(c) => c.len(),
            Container::Table(t) => t.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_column(self) -> ColzResult<Column> {
        match self {
            Container::Column(column) => Ok(column),
            Container::Table(_) => colz_bail!(InvariantViolation: "expected a column, built a table"),
        }
    }

    pub fn into_table(self) -> ColzResult<Table> {
        match self {
            Container::Table(table) => Ok(table),
            Container::Column(_) => colz_bail!(InvariantViolation: "expected a table, built a column"),
        }
    }

    /// Items read per batch: the chunk length, averaged over the columns of a table.
    fn batch_len(&self) -> usize {
        match self {
            Container::Column(column) => column.chunklen(),
            Container::Table(table) => {
                let chunklens = table
                    .names()
                    .iter()
                    .filter_map(|name| table.column(name))
                    .map(|column| column.read().chunklen())
                    .collect_vec();
                (chunklens.iter().sum::<usize>() / chunklens.len().max(1)).max(1)
            }
        }
    }

    /// Append up to `max` records and return how many the source provided.
    fn append_batch(
        &mut self,
        records: impl Iterator<Item = Record>,
        max: usize,
    ) -> ColzResult<usize> {
        match self {
            Container::Column(column) => {
                let mut builder = ArrayBuilder::with_capacity(column.dtype(), max)?;
                for record in records {
                    match record {
                        Record::Scalar(value) => builder.append_scalar(&value)?,
                        Record::Fields(fields) => colz_bail!(
                            "a record of {} fields cannot be stored in a {} column",
                            fields.len(),
                            column.dtype()
                        ),
                    }
                }
                let read = builder.len();
                column.append(&builder.finish()?)?;
                Ok(read)
            }
            Container::Table(table) => {
                let mut builder = StructBuilder::with_capacity(table.dtype().clone(), max)?;
                let mut read = 0;
                for record in records {
                    match record {
                        Record::Fields(fields) => builder.append_values(&fields)?,
                        Record::Scalar(value) => {
                            colz_bail!("the scalar {value} cannot be stored as a table row")
                        }
                    }
                    read += 1;
                }
                table.append(RowsSource::Structured(&builder.finish()?))?;
                Ok(read)
            }
        }
    }

    fn flush(&mut self) -> ColzResult<()> {
        match self {
            Container::Column(column) => column.flush(),
            Container::Table(table) => table.flush(),
        }
    }
}

/// The number of items an iterator is expected to yield, used to size chunks.
fn length_hint(iter: &impl Iterator) -> usize {
    match iter.size_hint() {
        (_, Some(upper)) => upper,
        (lower, None) if lower > 0 => lower,
        _ => {
            log::debug!("source gives no length hint, sizing for {FALLBACK_LEN} items");
            FALLBACK_LEN
        }
    }
}

/// Build a column, or a table when `dtype` is a struct, from the items of `iter`.
///
/// Items are read in batches of one chunk. Reading stops after `count` items or as soon as
/// the source runs dry, so a source shorter than `count` yields a shorter container rather
/// than an error. For a table, `options` supplies the compression, chunk length and
/// persistence of every column, and the column names are the field names of `dtype`.
pub fn fromiter<I>(
    iter: I,
    dtype: &DType,
    count: Count,
    mut options: ColumnOptions,
) -> ColzResult<Container>
where
    I: IntoIterator,
    I::Item: Into<Record>,
{
    let mut iter = iter.into_iter().map(Into::<Record>::into);
    let hint = match count {
        Count::Exact(n) => n,
        Count::Unknown => length_hint(&iter),
    };
    options.expectedlen = options.expectedlen.or(Some(hint));
    let mut container = match dtype {
        DType::Struct(fields) => Container::Table(Table::empty(
            fields,
            TableOptions {
                names: None,
                cparams: options.cparams,
                root: options.root,
                mode: options.mode,
                chunklen: options.chunklen,
                expectedlen: options.expectedlen,
            },
        )?),
        _ => Container::Column(Column::empty(dtype, options)?),
    };

    let batch_len = container.batch_len();
    let mut remaining = match count {
        Count::Exact(n) => Some(n),
        Count::Unknown => None,
    };
    loop {
        let want = remaining.map_or(batch_len, |r| r.min(batch_len));
        if want == 0 {
            break;
        }
        let read = container.append_batch(iter.by_ref().take(want), want)?;
        if let Some(r) = remaining.as_mut() {
            *r -= read;
        }
        // A short batch means the source is exhausted.
        if read < want {
            break;
        }
    }
    container.flush()?;
    log::debug!("built {} values from an iterator (hint {hint})", container.len());
    Ok(container)
}

/// Build a column of `T` from the items of `iter`. See [`fromiter`].
pub fn fromiter_column<T: Element>(
    iter: impl IntoIterator<Item = T>,
    count: Count,
    options: ColumnOptions,
) -> ColzResult<Column> {
    fromiter(
        iter.into_iter().map(|v| Record::Scalar(v.into())),
        &T::DTYPE,
        count,
        options,
    )?
    .into_column()
}

#[cfg(test)]
mod test {
    use colz_array::Array;
    use colz_dtype::{PType, StructDType};
    use rstest::rstest;

    use super::*;

    #[test]
    fn unknown_length_reads_everything() {
        let column = fromiter_column(0..10i64, Count::Unknown, ColumnOptions::default()).unwrap();
        assert_eq!(column.len(), 10);
        assert_eq!(column.read_range(0, 10).unwrap(), (0..10i64).collect::<Array>());
    }

    #[test]
    fn no_hint_falls_back() {
        let mut next = 0i32;
        let source = std::iter::from_fn(|| {
            next += 1;
            (next <= 25).then_some(next)
        });
        let column = fromiter_column(
            source,
            Count::Unknown,
            ColumnOptions::default().with_chunklen(4),
        )
        .unwrap();
        assert_eq!(column.len(), 25);
        assert_eq!(column.expectedlen(), FALLBACK_LEN);
        assert_eq!(column.scalar_at(24).unwrap(), Scalar::I32(25));
    }

    #[rstest]
    #[case(Count::Exact(5), 5)]
    #[case(Count::Exact(0), 0)]
    #[case(Count::Exact(13), 13)]
    fn exact_count_stops_reading(#[case] count: Count, #[case] expected: usize) {
        let mut source = 0..100u32;
        let column = fromiter_column(
            source.by_ref(),
            count,
            ColumnOptions::default().with_chunklen(4),
        )
        .unwrap();
        assert_eq!(column.len(), expected);
        assert_eq!(source.next(), Some(expected as u32));
    }

    #[test]
    fn short_source_is_accepted() {
        let column = fromiter_column(
            [1.5f64, 2.5, 3.5],
            Count::Exact(8),
            ColumnOptions::default().with_chunklen(2),
        )
        .unwrap();
        assert_eq!(column.len(), 3);
    }

    #[test]
    fn struct_dtype_builds_table() {
        let dtype = DType::Struct(StructDType::from_fields([
            ("id", DType::I64),
            ("score", DType::Primitive(PType::F32)),
        ]));
        let records = (0..7).map(|i| vec![Scalar::I64(i), Scalar::F64(i as f64 / 2.0)]);
        let table = fromiter(
            records,
            &dtype,
            Count::Unknown,
            ColumnOptions::default().with_chunklen(3),
        )
        .unwrap()
        .into_table()
        .unwrap();
        assert_eq!(table.len(), 7);
        let row = table.get(6i64).unwrap().into_row().unwrap();
        assert_eq!(row.values(), [Scalar::I64(6), Scalar::F32(3.0)]);
    }

    #[test]
    fn record_shape_must_match() {
        let fields = vec![Record::Fields(vec![Scalar::I64(1)])];
        assert!(fromiter(fields, &DType::I64, Count::Unknown, ColumnOptions::default()).is_err());

        let dtype = DType::Struct(StructDType::from_fields([("a", DType::I64)]));
        let scalars = vec![Record::Scalar(Scalar::I64(1))];
        assert!(fromiter(scalars, &dtype, Count::Unknown, ColumnOptions::default()).is_err());
    }

    #[rstest]
    #[case((0, Some(7)), 7)]
    #[case((3, None), 3)]
    #[case((0, None), FALLBACK_LEN)]
    fn length_hints(#[case] hint: (usize, Option<usize>), #[case] expected: usize) {
        struct Hinted((usize, Option<usize>));
        impl Iterator for Hinted {
            type Item = ();
            fn next(&mut self) -> Option<()> {
                None
            }
            fn size_hint(&self) -> (usize, Option<usize>) {
                self.0
            }
        }
        assert_eq!(length_hint(&Hinted(hint)), expected);
    }
}
