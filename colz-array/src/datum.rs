use colz_dtype::DType;

use crate::{Array, Scalar};

/// An operand or result of a vectorized computation: a broadcastable scalar or an array.
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    Scalar(Scalar),
    Array(Array),
}

impl Datum {
    pub fn dtype(&self) -> DType {
        match self {
            Datum::Scalar(s) => s.dtype(),
            Datum::Array(a) => a.dtype(),
        }
    }

    /// Number of dimensions: `0` for a scalar, `1` for an array.
    pub fn ndim(&self) -> usize {
        match self {
            Datum::Scalar(_) => 0,
            Datum::Array(_) => 1,
        }
    }

    /// The number of elements, or `None` for a scalar.
    pub fn len(&self) -> Option<usize> {
        match self {
            Datum::Scalar(_) => None,
            Datum::Array(a) => Some(a.len()),
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Datum::Scalar(s) => Some(s),
            Datum::Array(_) => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Datum::Array(a) => Some(a),
            Datum::Scalar(_) => None,
        }
    }

    /// Materialize as an array of `len` elements, repeating a scalar.
    pub fn into_array(self, len: usize) -> Array {
        match self {
            Datum::Scalar(s) => Array::full(s, len),
            Datum::Array(a) => a,
        }
    }
}

impl From<Scalar> for Datum {
    fn from(value: Scalar) -> Self {
        Datum::Scalar(value)
    }
}

impl From<Array> for Datum {
    fn from(value: Array) -> Self {
        Datum::Array(value)
    }
}
