use std::fmt::{Display, Formatter};

use colz_dtype::{DType, NativePType, PType, match_each_native_ptype};
use colz_error::{ColzResult, colz_bail, colz_err};
use itertools::Itertools;
use num_traits::{NumCast, ToPrimitive};

use crate::{Element, Scalar};

/// A contiguous, in-memory run of fixed-width values.
#[derive(Debug, Clone, PartialEq)]
pub enum Array {
    Bool(Vec<bool>),
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    U64(Vec<u64>),
    I8(Vec<i8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

/// Matches on an [`Array`], binding the backing vector.
///
/// The two-armed form separates booleans from numbers for bodies that need numeric traits.
#[macro_export]
macro_rules! match_each_array {
    ($array:expr, bool: | $b:ident | $bool_body:expr, numeric: | $v:ident | $body:expr) => {
        match $array {
            $crate::Array::Bool($b) => $bool_body,
            $crate::Array::U8($v) => $body,
            $crate::Array::U16($v) => $body,
            $crate::Array::U32($v) => $body,
            $crate::Array::U64($v) => $body,
            $crate::Array::I8($v) => $body,
            $crate::Array::I16($v) => $body,
            $crate::Array::I32($v) => $body,
            $crate::Array::I64($v) => $body,
            $crate::Array::F32($v) => $body,
            $crate::Array::F64($v) => $body,
        }
    };
    ($array:expr, | $v:ident | $body:expr) => {
        $crate::match_each_array!($array, bool: |$v| $body, numeric: |$v| $body)
    };
}

impl Array {
    /// An empty array of `dtype` with room for `capacity` elements.
    pub fn with_capacity(dtype: &DType, capacity: usize) -> ColzResult<Self> {
        match dtype {
            DType::Bool => Ok(Array::Bool(Vec::with_capacity(capacity))),
            DType::Primitive(ptype) => match_each_native_ptype!(*ptype, |T| {
                Ok(Array::from(Vec::<T>::with_capacity(capacity)))
            }),
            DType::Struct(_) => colz_bail!(MismatchedTypes: "fixed-width type", dtype),
        }
    }

    pub fn empty(dtype: &DType) -> ColzResult<Self> {
        Self::with_capacity(dtype, 0)
    }

    /// An array of `len` copies of `value`.
    pub fn full(value: Scalar, len: usize) -> Self {
        crate::match_each_scalar!(value, |v| Array::from(vec![v; len]))
    }

    pub fn zeros(dtype: &DType, len: usize) -> ColzResult<Self> {
        Ok(Self::full(Scalar::zero(dtype)?, len))
    }

    /// Collect scalars into an array of `dtype`, casting each one.
    pub fn from_scalars<'a>(
        dtype: &DType,
        scalars: impl IntoIterator<Item = &'a Scalar>,
    ) -> ColzResult<Self> {
        let mut array = Self::empty(dtype)?;
        for scalar in scalars {
            array.push_scalar(scalar)?;
        }
        Ok(array)
    }

    pub fn dtype(&self) -> DType {
        match self {
            Array::Bool(_) => DType::Bool,
            Array::U8(_) => PType::U8.into(),
            Array::U16(_) => PType::U16.into(),
            Array::U32(_) => PType::U32.into(),
            Array::U64(_) => PType::U64.into(),
            Array::I8(_) => PType::I8.into(),
            Array::I16(_) => PType::I16.into(),
            Array::I32(_) => PType::I32.into(),
            Array::I64(_) => PType::I64.into(),
            Array::F32(_) => PType::F32.into(),
            Array::F64(_) => PType::F64.into(),
        }
    }

    pub fn len(&self) -> usize {
        match_each_array!(self, |v| v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Size of the values in bytes.
    pub fn nbytes(&self) -> usize {
        self.len() * self.dtype().byte_width()
    }

    /// Borrow the values as a native slice, if `T` matches the dtype.
    pub fn as_slice<T: Element>(&self) -> Option<&[T]> {
        T::slice_of(self)
    }

    pub fn scalar_at(&self, index: usize) -> ColzResult<Scalar> {
        if index >= self.len() {
            colz_bail!(OutOfBounds: index, 0, self.len());
        }
        Ok(self.scalar_unchecked(index))
    }

    fn scalar_unchecked(&self, index: usize) -> Scalar {
        match_each_array!(self, |v| v[index].into())
    }

    /// Iterate over the values as scalars.
    pub fn scalars(&self) -> impl Iterator<Item = Scalar> + '_ {
        (0..self.len()).map(|i| self.scalar_unchecked(i))
    }

    /// Copy out the values in `start..stop`.
    pub fn slice(&self, start: usize, stop: usize) -> ColzResult<Self> {
        if start > stop || stop > self.len() {
            colz_bail!(OutOfBounds: stop, start, self.len());
        }
        Ok(match_each_array!(self, |v| Array::from(v[start..stop].to_vec())))
    }

    /// Gather the values at `indices`, in order.
    pub fn take(&self, indices: &[usize]) -> ColzResult<Self> {
        let len = self.len();
        if let Some(&bad) = indices.iter().find(|&&i| i >= len) {
            colz_bail!(OutOfBounds: bad, 0, len);
        }
        Ok(match_each_array!(self, |v| indices
            .iter()
            .map(|&i| v[i])
            .collect::<Array>()))
    }

    /// Keep the values whose position in `mask` is `true`.
    pub fn filter(&self, mask: &[bool]) -> ColzResult<Self> {
        if mask.len() != self.len() {
            colz_bail!(
                "mask of length {} does not match array of length {}",
                mask.len(),
                self.len()
            );
        }
        Ok(match_each_array!(self, |v| v
            .iter()
            .zip(mask)
            .filter_map(|(x, &keep)| keep.then_some(*x))
            .collect::<Array>()))
    }

    /// Append `other`, casting it to this array's dtype first.
    pub fn extend(&mut self, other: &Array) -> ColzResult<()> {
        let dtype = self.dtype();
        let other = if other.dtype() == dtype {
            std::borrow::Cow::Borrowed(other)
        } else {
            std::borrow::Cow::Owned(other.cast(&dtype)?)
        };
        match_each_array!(self, |v| {
            v.extend_from_slice(
                Element::slice_of(other.as_ref())
                    .ok_or_else(|| colz_err!(MismatchedTypes: dtype, other.dtype()))?,
            );
        });
        Ok(())
    }

    pub fn truncate(&mut self, len: usize) {
        match_each_array!(self, |v| v.truncate(len))
    }

    pub fn clear(&mut self) {
        self.truncate(0)
    }

    /// Append one value, casting it to this array's dtype.
    pub fn push_scalar(&mut self, value: &Scalar) -> ColzResult<()> {
        match_each_array!(self, |v| v.push(Element::from_scalar(value)?));
        Ok(())
    }

    /// Overwrite the value at `index`, casting it to this array's dtype.
    pub fn set(&mut self, index: usize, value: &Scalar) -> ColzResult<()> {
        let len = self.len();
        if index >= len {
            colz_bail!(OutOfBounds: index, 0, len);
        }
        match_each_array!(self, |v| v[index] = Element::from_scalar(value)?);
        Ok(())
    }

    /// Overwrite `values.len()` values starting at `start`.
    pub fn set_range(&mut self, start: usize, values: &Array) -> ColzResult<()> {
        let stop = start + values.len();
        if stop > self.len() {
            colz_bail!(OutOfBounds: stop, 0, self.len());
        }
        let dtype = self.dtype();
        let values = values.cast(&dtype)?;
        match_each_array!(self, |v| {
            v[start..stop].copy_from_slice(
                Element::slice_of(&values)
                    .ok_or_else(|| colz_err!(MismatchedTypes: dtype, values.dtype()))?,
            );
        });
        Ok(())
    }

    /// Convert every value into `dtype`.
    ///
    /// Numbers become booleans by comparing against zero. A number that does not fit the
    /// target type is an error.
    pub fn cast(&self, dtype: &DType) -> ColzResult<Self> {
        if &self.dtype() == dtype {
            return Ok(self.clone());
        }
        match dtype {
            DType::Bool => Ok(Array::Bool(match_each_array!(
                self,
                bool: |b| b.clone(),
                numeric: |v| v
                    .iter()
                    .map(|x| x.to_f64().is_some_and(|f| f != 0.0))
                    .collect()
            ))),
            DType::Primitive(ptype) => {
                match_each_native_ptype!(*ptype, |T| { Ok(Array::from(self.cast_native::<T>()?)) })
            }
            DType::Struct(_) => colz_bail!(MismatchedTypes: "fixed-width type", dtype),
        }
    }

    fn cast_native<T: NativePType>(&self) -> ColzResult<Vec<T>> {
        match_each_array!(
            self,
            bool: |b| b
                .iter()
                .map(|&x| {
                    <T as NumCast>::from(<u8 as From<bool>>::from(x))
                        .ok_or_else(|| colz_err!("cannot represent {x} as {}", T::PTYPE))
                })
                .collect(),
            numeric: |v| v
                .iter()
                .map(|&x| {
                    <T as NumCast>::from(x)
                        .ok_or_else(|| colz_err!("cannot represent {x} as {}", T::PTYPE))
                })
                .collect()
        )
    }

    /// The values as the plain little-endian byte stream stored in chunks.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.nbytes());
        match_each_array!(self, |v| v.iter().for_each(|x| x.write_le(&mut out)));
        out
    }

    /// Decode a little-endian byte stream into an array of `dtype`.
    pub fn from_le_bytes(dtype: &DType, bytes: &[u8]) -> ColzResult<Self> {
        let width = dtype.byte_width();
        if width == 0 || bytes.len() % width != 0 {
            colz_bail!(
                InvalidSerde: "{} bytes is not a whole number of {dtype} values",
                bytes.len()
            );
        }
        match dtype {
            DType::Bool => Ok(Array::Bool(
                bytes.chunks_exact(1).map(bool::read_le).collect(),
            )),
            DType::Primitive(ptype) => match_each_native_ptype!(*ptype, |T| {
                Ok(bytes.chunks_exact(width).map(T::read_le).collect::<Array>())
            }),
            DType::Struct(_) => colz_bail!(MismatchedTypes: "fixed-width type", dtype),
        }
    }
}

impl Display for Array {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match_each_array!(self, |v| write!(f, "[{}]", v.iter().join(", ")))
    }
}

#[cfg(test)]
mod test {
    use colz_dtype::{DType, PType};
    use rstest::rstest;

    use crate::{Array, Scalar};

    #[test]
    fn take_and_filter() {
        let array = Array::from(vec![10i32, 20, 30, 40]);
        assert_eq!(array.take(&[3, 0]).unwrap(), Array::from(vec![40i32, 10]));
        assert!(array.take(&[4]).is_err());
        assert_eq!(
            array.filter(&[true, false, false, true]).unwrap(),
            Array::from(vec![10i32, 40])
        );
        assert!(array.filter(&[true]).is_err());
    }

    #[test]
    fn extend_casts() {
        let mut array = Array::from(vec![1.0f64]);
        array.extend(&Array::from(vec![2i64, 3])).unwrap();
        assert_eq!(array, Array::from(vec![1.0f64, 2.0, 3.0]));
    }

    #[test]
    fn set_range_in_place() {
        let mut array = Array::zeros(&DType::I64, 5).unwrap();
        array.set_range(1, &Array::from(vec![7u8, 8])).unwrap();
        array.set(4, &Scalar::Bool(true)).unwrap();
        assert_eq!(array, Array::from(vec![0i64, 7, 8, 0, 1]));
        assert!(array.set_range(4, &Array::from(vec![1i64, 2])).is_err());
    }

    #[rstest]
    #[case(Array::from(vec![0i16, 3]), DType::Bool, Array::from(vec![false, true]))]
    #[case(Array::from(vec![true, false]), DType::F64, Array::from(vec![1.0f64, 0.0]))]
    #[case(Array::from(vec![1.9f32]), DType::Primitive(PType::U8), Array::from(vec![1u8]))]
    fn casts(#[case] array: Array, #[case] dtype: DType, #[case] expected: Array) {
        assert_eq!(array.cast(&dtype).unwrap(), expected);
    }

    #[test]
    fn cast_rejects_overflow() {
        assert!(Array::from(vec![-1i8]).cast(&DType::Primitive(PType::U32)).is_err());
    }

    #[test]
    fn le_bytes() {
        let array = Array::from(vec![1u16, 256]);
        let bytes = array.to_le_bytes();
        assert_eq!(bytes, [1, 0, 0, 1]);
        assert_eq!(
            Array::from_le_bytes(&DType::Primitive(PType::U16), &bytes).unwrap(),
            array
        );
        assert!(Array::from_le_bytes(&DType::Primitive(PType::U16), &bytes[..3]).is_err());
    }

    #[test]
    fn display() {
        assert_eq!(Array::from(vec![1i32, 2]).to_string(), "[1, 2]");
    }
}
