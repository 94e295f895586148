//! Vectorized kernels over [`Datum`] operands.
//!
//! Operands broadcast: a scalar pairs with every element of an array, and two arrays must have
//! the same length. Booleans and integers compute as `i64`, anything involving a float computes
//! as `f64`. A kernel over scalars alone returns a scalar.

use std::borrow::Cow;

pub use boolean::{BooleanOp, LogicalOp, binary_boolean, invert, logical, logical_not};
pub use compare::{Operator, compare};
pub use numeric::{NumericOp, binary_numeric};
pub use select::select;
pub use sum::sum;
pub use unary::{UnaryFn, arctan2, negate, unary_fn};

use colz_error::{ColzResult, colz_bail};

use crate::{Array, Datum, Element, match_each_array, match_each_scalar};

mod boolean;
mod compare;
mod numeric;
mod select;
mod sum;
mod unary;

/// The arithmetic domain an operation runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Domain {
    Int,
    Float,
}

impl Domain {
    fn of(datum: &Datum) -> Self {
        if datum.dtype().is_float() {
            Domain::Float
        } else {
            Domain::Int
        }
    }

    fn common(lhs: &Datum, rhs: &Datum) -> Self {
        if Self::of(lhs) == Domain::Float || Self::of(rhs) == Domain::Float {
            Domain::Float
        } else {
            Domain::Int
        }
    }
}

/// One operand, viewed in a single native type.
enum Side<'a, T: Clone> {
    Scalar(T),
    Slice(Cow<'a, [T]>),
}

impl<T: Copy> Side<'_, T> {
    fn len(&self) -> Option<usize> {
        match self {
            Side::Scalar(_) => None,
            Side::Slice(s) => Some(s.len()),
        }
    }

    #[inline]
    fn get(&self, index: usize) -> T {
        match self {
            Side::Scalar(v) => *v,
            Side::Slice(s) => s[index],
        }
    }
}

fn ints(datum: &Datum) -> Side<'_, i64> {
    match datum {
        Datum::Scalar(s) => Side::Scalar(match_each_scalar!(
            *s,
            bool: |b| i64::from(b),
            numeric: |v| v as i64
        )),
        Datum::Array(Array::I64(v)) => Side::Slice(Cow::Borrowed(v)),
        Datum::Array(a) => Side::Slice(Cow::Owned(match_each_array!(
            a,
            bool: |b| b.iter().map(|&x| i64::from(x)).collect(),
            numeric: |v| v.iter().map(|&x| x as i64).collect()
        ))),
    }
}

fn floats(datum: &Datum) -> Side<'_, f64> {
    match datum {
        Datum::Scalar(s) => Side::Scalar(s.as_f64()),
        Datum::Array(Array::F64(v)) => Side::Slice(Cow::Borrowed(v)),
        Datum::Array(a) => Side::Slice(Cow::Owned(match_each_array!(
            a,
            bool: |b| b.iter().map(|&x| if x { 1.0 } else { 0.0 }).collect(),
            numeric: |v| v.iter().map(|&x| x as f64).collect()
        ))),
    }
}

fn truths(datum: &Datum) -> Side<'_, bool> {
    match datum {
        Datum::Scalar(s) => Side::Scalar(s.is_truthy()),
        Datum::Array(Array::Bool(v)) => Side::Slice(Cow::Borrowed(v)),
        Datum::Array(a) => Side::Slice(Cow::Owned(match_each_array!(
            a,
            bool: |b| b.clone(),
            numeric: |v| v.iter().map(|&x| x as f64 != 0.0).collect()
        ))),
    }
}

/// The common length of broadcast operands, or `None` when all are scalars.
fn broadcast_len(lens: &[Option<usize>]) -> ColzResult<Option<usize>> {
    let mut common = None;
    for len in lens.iter().flatten() {
        match common {
            None => common = Some(*len),
            Some(c) if c != *len => colz_bail!(
                "operands could not be broadcast together with lengths {c} and {len}"
            ),
            Some(_) => {}
        }
    }
    Ok(common)
}

fn map_unary<A: Copy, O: Element>(
    input: &Side<'_, A>,
    f: impl Fn(A) -> ColzResult<O>,
) -> ColzResult<Datum> {
    Ok(match input.len() {
        None => Datum::Scalar(f(input.get(0))?.into()),
        Some(len) => Datum::Array(O::into_array(
            (0..len).map(|i| f(input.get(i))).collect::<ColzResult<_>>()?,
        )),
    })
}

fn map_binary<A: Copy, B: Copy, O: Element>(
    lhs: &Side<'_, A>,
    rhs: &Side<'_, B>,
    f: impl Fn(A, B) -> ColzResult<O>,
) -> ColzResult<Datum> {
    Ok(match broadcast_len(&[lhs.len(), rhs.len()])? {
        None => Datum::Scalar(f(lhs.get(0), rhs.get(0))?.into()),
        Some(len) => Datum::Array(O::into_array(
            (0..len)
                .map(|i| f(lhs.get(i), rhs.get(i)))
                .collect::<ColzResult<_>>()?,
        )),
    })
}
