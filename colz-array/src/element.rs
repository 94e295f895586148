use std::fmt::{Debug, Display};

use colz_dtype::{DType, PType};
use colz_error::ColzResult;

use crate::{Array, Scalar};

/// A native Rust type that can be stored in an [`Array`].
///
/// Implemented for `bool` and for every native primitive type.
pub trait Element:
    Copy + Default + PartialEq + PartialOrd + Debug + Display + Send + Sync + Into<Scalar> + 'static
{
    /// The dtype of an array of this element.
    const DTYPE: DType;

    /// Convert a scalar of any dtype into this element, failing if it does not fit.
    fn from_scalar(scalar: &Scalar) -> ColzResult<Self>;

    /// Wrap a vector of elements in an [`Array`].
    fn into_array(values: Vec<Self>) -> Array;

    /// Borrow the elements of `array` if it holds this element type.
    fn slice_of(array: &Array) -> Option<&[Self]>;

    /// Mutably borrow the vector backing `array` if it holds this element type.
    fn vec_of_mut(array: &mut Array) -> Option<&mut Vec<Self>>;

    /// Append the little-endian encoding of `self` to `out`.
    fn write_le(self, out: &mut Vec<u8>);

    /// Decode an element from the first `DTYPE.byte_width()` bytes of `bytes`.
    fn read_le(bytes: &[u8]) -> Self;
}

impl Element for bool {
    const DTYPE: DType = DType::Bool;

    fn from_scalar(scalar: &Scalar) -> ColzResult<Self> {
        Ok(scalar.is_truthy())
    }

    fn into_array(values: Vec<Self>) -> Array {
        Array::Bool(values)
    }

    fn slice_of(array: &Array) -> Option<&[Self]> {
        match array {
            Array::Bool(v) => Some(v),
            _ => None,
        }
    }

    fn vec_of_mut(array: &mut Array) -> Option<&mut Vec<Self>> {
        match array {
            Array::Bool(v) => Some(v),
            _ => None,
        }
    }

    fn write_le(self, out: &mut Vec<u8>) {
        out.push(u8::from(self));
    }

    fn read_le(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }
}

macro_rules! native_element {
    ($T:ty, $variant:ident) => {
        impl Element for $T {
            const DTYPE: DType = DType::Primitive(PType::$variant);

            fn from_scalar(scalar: &Scalar) -> ColzResult<Self> {
                scalar.as_native::<$T>()
            }

            fn into_array(values: Vec<Self>) -> Array {
                Array::$variant(values)
            }

            fn slice_of(array: &Array) -> Option<&[Self]> {
                match array {
                    Array::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn vec_of_mut(array: &mut Array) -> Option<&mut Vec<Self>> {
                match array {
                    Array::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn write_le(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }

            fn read_le(bytes: &[u8]) -> Self {
                let mut buf = [0u8; size_of::<$T>()];
                buf.copy_from_slice(&bytes[..size_of::<$T>()]);
                <$T>::from_le_bytes(buf)
            }
        }

        impl From<Vec<$T>> for Array {
            fn from(values: Vec<$T>) -> Self {
                Array::$variant(values)
            }
        }

        impl FromIterator<$T> for Array {
            fn from_iter<I: IntoIterator<Item = $T>>(iter: I) -> Self {
                Array::$variant(iter.into_iter().collect())
            }
        }
    };
}

native_element!(u8, U8);
native_element!(u16, U16);
native_element!(u32, U32);
native_element!(u64, U64);
native_element!(i8, I8);
native_element!(i16, I16);
native_element!(i32, I32);
native_element!(i64, I64);
native_element!(f32, F32);
native_element!(f64, F64);

impl From<Vec<bool>> for Array {
    fn from(values: Vec<bool>) -> Self {
        Array::Bool(values)
    }
}

impl FromIterator<bool> for Array {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        Array::Bool(iter.into_iter().collect())
    }
}
