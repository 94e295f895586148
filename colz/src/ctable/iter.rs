use colz_array::{Array, Row, Scalar, StructArray, StructBuilder};
use colz_dtype::{FieldNames, StructDType};
use colz_error::{ColzResult, Unnest, colz_bail};

use crate::carray::ChunkIter;

/// Yields the next value of one output field.
pub(crate) type Producer = Box<dyn Iterator<Item = ColzResult<Scalar>> + Send>;

/// Rows assembled from one producer per field, advanced in lock-step.
pub struct RowIter {
    names: FieldNames,
    producers: Vec<Producer>,
    done: bool,
}

impl RowIter {
    pub(crate) fn new(names: FieldNames, producers: Vec<Producer>) -> Self {
        Self {
            names,
            producers,
            done: false,
        }
    }

    /// The names of the fields of every row.
    pub fn names(&self) -> &FieldNames {
        &self.names
    }

    fn advance(&mut self) -> ColzResult<Option<Row>> {
        let mut values = Vec::with_capacity(self.producers.len());
        let mut exhausted = 0;
        for producer in &mut self.producers {
            match producer.next() {
                Some(value) => values.push(value?),
                None => exhausted += 1,
            }
        }
        if exhausted == self.producers.len() {
            return Ok(None);
        }
        if exhausted > 0 {
            colz_bail!(
                InvariantViolation: "{exhausted} of {} row fields ran out before the others",
                self.producers.len()
            );
        }
        Ok(Some(Row::new(self.names.clone(), values)))
    }
}

impl Iterator for RowIter {
    type Item = ColzResult<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let row = self.advance().transpose();
        if !matches!(row, Some(Ok(_))) {
            self.done = true;
        }
        row
    }
}

/// Consecutive blocks of rows, one chunk iterator per column.
pub struct TableBlocks {
    names: FieldNames,
    columns: Vec<ChunkIter>,
}

impl TableBlocks {
    pub(crate) fn new(names: FieldNames, columns: Vec<ChunkIter>) -> Self {
        Self { names, columns }
    }
}

impl Iterator for TableBlocks {
    type Item = ColzResult<StructArray>;

    fn next(&mut self) -> Option<Self::Item> {
        let fields = self
            .columns
            .iter_mut()
            .map(Iterator::next)
            .collect::<Option<ColzResult<Vec<Array>>>>()?;
        Some(
            fields
                .map(|fields| StructArray::try_new(self.names.clone(), fields))
                .unnest(),
        )
    }
}

/// The rows of a row iterator, gathered into blocks of at most `blen` rows.
pub struct RowBlocks {
    rows: RowIter,
    builder: StructBuilder,
    blen: usize,
}

impl RowBlocks {
    pub(crate) fn new(rows: RowIter, dtype: StructDType, blen: usize) -> ColzResult<Self> {
        if blen == 0 {
            colz_bail!("block length must be positive");
        }
        Ok(Self {
            rows,
            builder: StructBuilder::with_capacity(dtype, blen)?,
            blen,
        })
    }
}

impl Iterator for RowBlocks {
    type Item = ColzResult<StructArray>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.builder.len() < self.blen {
            match self.rows.next() {
                Some(Ok(row)) => {
                    if let Err(err) = self.builder.append_row(&row) {
                        return Some(Err(err));
                    }
                }
                Some(Err(err)) => return Some(Err(err)),
                None => break,
            }
        }
        if self.builder.is_empty() {
            return None;
        }
        Some(self.builder.finish())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn producer(values: Vec<i64>) -> Producer {
        Box::new(values.into_iter().map(|v| ColzResult::Ok(Scalar::I64(v))))
    }

    #[test]
    fn zips_in_lock_step() {
        let names = FieldNames::from(["a".into(), "b".into()]);
        let rows = RowIter::new(names, vec![producer(vec![1, 2]), producer(vec![10, 20])])
            .collect::<ColzResult<Vec<_>>>()
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].get("b"), Some(&Scalar::I64(20)));
    }

    #[test]
    fn out_of_sync_fields_fail() {
        let names = FieldNames::from(["a".into(), "b".into()]);
        let mut rows = RowIter::new(names, vec![producer(vec![1, 2]), producer(vec![10])]);
        assert!(rows.next().unwrap().is_ok());
        assert!(rows.next().unwrap().is_err());
        assert!(rows.next().is_none());
    }

    #[test]
    fn blocks_of_rows() {
        let names = FieldNames::from(["a".into()]);
        let dtype = StructDType::new(names.clone(), vec![colz_dtype::DType::I64]);
        let rows = RowIter::new(names, vec![producer((0..5).collect())]);
        let blocks = RowBlocks::new(rows, dtype, 2)
            .unwrap()
            .collect::<ColzResult<Vec<_>>>()
            .unwrap();
        assert_eq!(blocks.iter().map(StructArray::len).collect::<Vec<_>>(), [2, 2, 1]);
    }
}
