use std::borrow::Cow;
use std::fmt::{Display, Formatter};
use std::iter::{Skip, StepBy};
use std::ops::Range;
use std::sync::Arc;

use colz_array::{Array, Scalar};
use colz_dtype::DType;
use colz_error::{ColzResult, colz_bail};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::carray::Column;
use crate::slice::Slice;

/// A shared handle to a [`Column`].
///
/// Tables hold their columns through handles, and a projected table shares the handles of its
/// source: a mutation made through one handle is visible through every clone of it.
#[derive(Debug, Clone)]
pub struct ColumnRef(Arc<RwLock<Column>>);

impl ColumnRef {
    pub fn new(column: Column) -> Self {
        Self(Arc::new(RwLock::new(column)))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Column> {
        self.0.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Column> {
        self.0.write()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dtype(&self) -> DType {
        self.read().dtype().clone()
    }

    /// Whether both handles point at the same column.
    pub fn ptr_eq(&self, other: &ColumnRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Iterate over the values selected by `slice`, skipping the first `skip` of them and
    /// stopping after `limit`.
    pub fn iter(&self, slice: Slice, limit: Option<usize>, skip: usize) -> ColzResult<ColumnIter> {
        let column = self.read();
        let indices = slice.indices(column.len())?;
        Ok(ColumnIter {
            column: self.clone(),
            positions: (indices.start..indices.stop.max(indices.start))
                .step_by(indices.step)
                .skip(skip),
            block: None,
            blen: column.chunklen(),
            remaining: limit,
        })
    }

    /// Iterate over the values where `mask` is `true`.
    pub fn where_(
        &self,
        mask: BoolSource,
        limit: Option<usize>,
        skip: usize,
    ) -> ColzResult<WhereIter> {
        if mask.len() != self.len() {
            colz_bail!(
                "mask of length {} does not match column of length {}",
                mask.len(),
                self.len()
            );
        }
        Ok(WhereIter {
            column: self.clone(),
            positions: mask.wheretrue(limit, skip)?,
        })
    }

    /// Iterate over the positions of the `true` values of a boolean column.
    pub fn wheretrue(&self, limit: Option<usize>, skip: usize) -> ColzResult<WhereTrue> {
        BoolSource::Column(self.clone()).wheretrue(limit, skip)
    }

    /// Iterate over `start..stop` in arrays of at most `blen` values.
    pub fn iterblocks(
        &self,
        blen: Option<usize>,
        start: usize,
        stop: Option<usize>,
    ) -> ColzResult<ChunkIter> {
        let column = self.read();
        let stop = stop.unwrap_or_else(|| column.len()).min(column.len());
        let blen = blen.unwrap_or_else(|| column.chunklen());
        if blen == 0 {
            colz_bail!("block length must be positive");
        }
        Ok(ChunkIter {
            column: self.clone(),
            next: start.min(stop),
            stop,
            blen,
        })
    }
}

impl From<Column> for ColumnRef {
    fn from(column: Column) -> Self {
        Self::new(column)
    }
}

impl Display for ColumnRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&*self.read(), f)
    }
}

/// The selector of a predicate-driven iteration: a boolean column or an in-memory mask.
#[derive(Debug, Clone)]
pub enum BoolSource {
    Column(ColumnRef),
    Array(Arc<Vec<bool>>),
}

impl BoolSource {
    pub fn len(&self) -> usize {
        match self {
            BoolSource::Column(c) => c.len(),
            BoolSource::Array(a) => a.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn block(&self, start: usize, stop: usize) -> ColzResult<Cow<'_, [bool]>> {
        match self {
            BoolSource::Array(a) => Ok(Cow::Borrowed(&a[start..stop])),
            BoolSource::Column(c) => match c.read().read_range(start, stop)? {
                Array::Bool(values) => Ok(Cow::Owned(values)),
                other => colz_bail!(MismatchedTypes: DType::Bool, other.dtype()),
            },
        }
    }

    fn blen(&self) -> usize {
        match self {
            BoolSource::Column(c) => c.read().chunklen(),
            BoolSource::Array(a) => a.len().max(1),
        }
    }

    /// Iterate over the positions of the `true` values.
    pub fn wheretrue(self, limit: Option<usize>, skip: usize) -> ColzResult<WhereTrue> {
        if let BoolSource::Column(c) = &self {
            let dtype = c.dtype();
            if !dtype.is_boolean() {
                colz_bail!(MismatchedTypes: DType::Bool, dtype);
            }
        }
        Ok(WhereTrue {
            len: self.len(),
            blen: self.blen(),
            source: self,
            next_block: 0,
            pending: Vec::new().into_iter(),
            skip,
            remaining: limit,
        })
    }
}

impl From<Vec<bool>> for BoolSource {
    fn from(mask: Vec<bool>) -> Self {
        BoolSource::Array(Arc::new(mask))
    }
}

impl From<ColumnRef> for BoolSource {
    fn from(column: ColumnRef) -> Self {
        BoolSource::Column(column)
    }
}

/// The values of a column over a slice. See [`ColumnRef::iter`].
pub struct ColumnIter {
    column: ColumnRef,
    positions: Skip<StepBy<Range<usize>>>,
    block: Option<(usize, Array)>,
    blen: usize,
    remaining: Option<usize>,
}

impl Iterator for ColumnIter {
    type Item = ColzResult<Scalar>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == Some(0) {
            return None;
        }
        let pos = self.positions.next()?;
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= 1;
        }
        let loaded = matches!(&self.block, Some((start, block)) if (*start..*start + block.len()).contains(&pos));
        if !loaded {
            let column = self.column.read();
            let start = pos - pos % self.blen;
            let stop = (start + self.blen).min(column.len());
            match column.read_range(start, stop) {
                Ok(block) => self.block = Some((start, block)),
                Err(err) => return Some(Err(err)),
            }
        }
        let (start, block) = self.block.as_ref()?;
        Some(block.scalar_at(pos - start))
    }
}

/// Positions of `true` values. See [`BoolSource::wheretrue`].
pub struct WhereTrue {
    source: BoolSource,
    len: usize,
    blen: usize,
    next_block: usize,
    pending: std::vec::IntoIter<usize>,
    skip: usize,
    remaining: Option<usize>,
}

impl Iterator for WhereTrue {
    type Item = ColzResult<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.remaining == Some(0) {
                return None;
            }
            if let Some(pos) = self.pending.next() {
                if self.skip > 0 {
                    self.skip -= 1;
                    continue;
                }
                if let Some(remaining) = self.remaining.as_mut() {
                    *remaining -= 1;
                }
                return Some(Ok(pos));
            }
            if self.next_block >= self.len {
                return None;
            }
            let start = self.next_block;
            let stop = (start + self.blen).min(self.len);
            self.next_block = stop;
            match self.source.block(start, stop) {
                Ok(block) => {
                    self.pending = block
                        .iter()
                        .enumerate()
                        .filter_map(|(i, &hit)| hit.then_some(start + i))
                        .collect::<Vec<_>>()
                        .into_iter();
                }
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

/// Values of a column where a mask is `true`. See [`ColumnRef::where_`].
pub struct WhereIter {
    column: ColumnRef,
    positions: WhereTrue,
}

impl Iterator for WhereIter {
    type Item = ColzResult<Scalar>;

    fn next(&mut self) -> Option<Self::Item> {
        let pos = match self.positions.next()? {
            Ok(pos) => pos,
            Err(err) => return Some(Err(err)),
        };
        Some(self.column.read().scalar_at(pos))
    }
}

/// Consecutive blocks of a column. See [`ColumnRef::iterblocks`].
pub struct ChunkIter {
    column: ColumnRef,
    next: usize,
    stop: usize,
    blen: usize,
}

impl Iterator for ChunkIter {
    type Item = ColzResult<Array>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.stop {
            return None;
        }
        let start = self.next;
        self.next = (start + self.blen).min(self.stop);
        Some(self.column.read().read_range(start, self.next))
    }
}

#[cfg(test)]
mod test {
    use rstest::{fixture, rstest};

    use super::*;
    use crate::ColumnOptions;

    #[fixture]
    fn column() -> ColumnRef {
        Column::new(
            &(0..20i64).collect::<Array>(),
            ColumnOptions::default().with_chunklen(6),
        )
        .unwrap()
        .into()
    }

    fn collect<T>(iter: impl Iterator<Item = ColzResult<T>>) -> Vec<T> {
        iter.collect::<ColzResult<Vec<_>>>().unwrap()
    }

    #[rstest]
    #[case(Slice::full(), None, 0, (0..20).collect())]
    #[case(Slice::new(3, 18).with_step(4), None, 0, vec![3, 7, 11, 15])]
    #[case(Slice::full().with_step(5), Some(2), 1, vec![5, 10])]
    #[case(Slice::new(-2, 100), None, 0, vec![18, 19])]
    fn iter_slices(
        column: ColumnRef,
        #[case] slice: Slice,
        #[case] limit: Option<usize>,
        #[case] skip: usize,
        #[case] expected: Vec<i64>,
    ) {
        let values = collect(column.iter(slice, limit, skip).unwrap());
        assert_eq!(values, expected.into_iter().map(Scalar::I64).collect::<Vec<_>>());
    }

    #[rstest]
    fn where_with_mask(column: ColumnRef) {
        let mask = (0..20).map(|i| i % 3 == 0).collect::<Vec<_>>();
        let values = collect(column.where_(mask.clone().into(), Some(3), 1).unwrap());
        assert_eq!(values, [Scalar::I64(3), Scalar::I64(6), Scalar::I64(9)]);
        assert!(column.where_(vec![true].into(), None, 0).is_err());
    }

    #[rstest]
    fn wheretrue_on_bool_column(column: ColumnRef) {
        let flags = ColumnRef::new(
            Column::new(
                &(0..20).map(|i| i > 15).collect::<Array>(),
                ColumnOptions::default().with_chunklen(7),
            )
            .unwrap(),
        );
        assert_eq!(collect(flags.wheretrue(None, 0).unwrap()), [16, 17, 18, 19]);
        assert_eq!(collect(flags.wheretrue(Some(1), 2).unwrap()), [18]);
        assert!(column.wheretrue(None, 0).is_err());
        let values = collect(column.where_(flags.into(), None, 0).unwrap());
        assert_eq!(values.len(), 4);
    }

    #[rstest]
    fn blocks(column: ColumnRef) {
        let blocks = collect(column.iterblocks(Some(8), 2, Some(19)).unwrap());
        assert_eq!(
            blocks.iter().map(Array::len).collect::<Vec<_>>(),
            [8, 8, 1]
        );
        assert_eq!(blocks[2], Array::from(vec![18i64]));
        assert!(column.iterblocks(Some(0), 0, None).is_err());
    }

    #[rstest]
    fn handles_share_the_column(column: ColumnRef) {
        let other = column.clone();
        other.write().append(&Array::from(vec![20i64])).unwrap();
        assert_eq!(column.len(), 21);
        assert!(column.ptr_eq(&other));
    }
}
