use std::ops::{Range, RangeFrom, RangeFull, RangeTo};

use colz_error::{ColzResult, colz_bail};

/// A `start:stop:step` selection over a sequence.
///
/// Bounds follow Python slicing: negative values count from the end and out-of-range bounds
/// are clamped. Only positive steps are supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Slice {
    pub start: Option<i64>,
    pub stop: Option<i64>,
    pub step: Option<i64>,
}

/// A slice resolved against a concrete length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SliceIndices {
    pub start: usize,
    pub stop: usize,
    pub step: usize,
}

impl SliceIndices {
    /// Number of positions selected.
    pub fn len(&self) -> usize {
        if self.stop <= self.start {
            0
        } else {
            (self.stop - self.start).div_ceil(self.step)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The selected positions, in ascending order.
    pub fn positions(&self) -> impl Iterator<Item = usize> + use<> {
        (self.start..self.stop.max(self.start)).step_by(self.step)
    }
}

impl Slice {
    /// Everything.
    pub fn full() -> Self {
        Self::default()
    }

    pub fn new(start: i64, stop: i64) -> Self {
        Self {
            start: Some(start),
            stop: Some(stop),
            step: None,
        }
    }

    pub fn with_step(mut self, step: i64) -> Self {
        self.step = Some(step);
        self
    }

    /// Resolve against a sequence of `len` elements.
    pub fn indices(&self, len: usize) -> ColzResult<SliceIndices> {
        let step = self.step.unwrap_or(1);
        if step <= 0 {
            colz_bail!("slice step must be positive, got {step}");
        }
        let len_i = i64::try_from(len).unwrap_or(i64::MAX);
        let clamp = |bound: Option<i64>, default: i64| -> usize {
            let b = match bound {
                None => default,
                Some(b) if b < 0 => (b + len_i).max(0),
                Some(b) => b.min(len_i),
            };
            usize::try_from(b).unwrap_or(0)
        };
        Ok(SliceIndices {
            start: clamp(self.start, 0),
            stop: clamp(self.stop, len_i),
            step: usize::try_from(step).unwrap_or(usize::MAX),
        })
    }
}

fn to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

impl From<Range<usize>> for Slice {
    fn from(range: Range<usize>) -> Self {
        Self::new(to_i64(range.start), to_i64(range.end))
    }
}

impl From<RangeFrom<usize>> for Slice {
    fn from(range: RangeFrom<usize>) -> Self {
        Self {
            start: Some(to_i64(range.start)),
            ..Self::default()
        }
    }
}

impl From<RangeTo<usize>> for Slice {
    fn from(range: RangeTo<usize>) -> Self {
        Self {
            stop: Some(to_i64(range.end)),
            ..Self::default()
        }
    }
}

impl From<RangeFull> for Slice {
    fn from(_: RangeFull) -> Self {
        Self::full()
    }
}

#[cfg(test)]
mod test {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(Slice::full(), 10, (0, 10, 1), 10)]
    #[case(Slice::new(-3, 100), 10, (7, 10, 1), 3)]
    #[case(Slice::new(1, 8).with_step(3), 10, (1, 8, 3), 3)]
    #[case(Slice::new(5, 2), 10, (5, 2, 1), 0)]
    #[case(Slice::from(..4), 2, (0, 2, 1), 2)]
    fn resolves(
        #[case] slice: Slice,
        #[case] len: usize,
        #[case] expected: (usize, usize, usize),
        #[case] count: usize,
    ) {
        let idx = slice.indices(len).unwrap();
        assert_eq!((idx.start, idx.stop, idx.step), expected);
        assert_eq!(idx.len(), count);
        assert_eq!(idx.positions().count(), count);
    }

    #[test]
    fn rejects_non_positive_steps() {
        assert!(Slice::full().with_step(0).indices(4).is_err());
        assert!(Slice::full().with_step(-1).indices(4).is_err());
    }
}
