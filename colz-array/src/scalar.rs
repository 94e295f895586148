use std::fmt::{Display, Formatter};

use colz_dtype::{DType, NativePType, PType, match_each_native_ptype};
use colz_error::{ColzResult, colz_bail, colz_err};
use num_traits::{NumCast, ToPrimitive};
use serde::{Deserialize, Serialize};

/// A single value of a fixed-width [`DType`].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scalar {
    Bool(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

/// Matches on a [`Scalar`], binding the inner value.
///
/// The two-armed form separates booleans from numbers for bodies that need numeric traits.
#[macro_export]
macro_rules! match_each_scalar {
    ($scalar:expr, bool: | $b:ident | $bool_body:expr, numeric: | $v:ident | $body:expr) => {
        match $scalar {
            $crate::Scalar::Bool($b) => $bool_body,
            $crate::Scalar::U8($v) => $body,
            $crate::Scalar::U16($v) => $body,
            $crate::Scalar::U32($v) => $body,
            $crate::Scalar::U64($v) => $body,
            $crate::Scalar::I8($v) => $body,
            $crate::Scalar::I16($v) => $body,
            $crate::Scalar::I32($v) => $body,
            $crate::Scalar::I64($v) => $body,
            $crate::Scalar::F32($v) => $body,
            $crate::Scalar::F64($v) => $body,
        }
    };
    ($scalar:expr, | $v:ident | $body:expr) => {
        $crate::match_each_scalar!($scalar, bool: |$v| $body, numeric: |$v| $body)
    };
}

impl Scalar {
    pub fn dtype(&self) -> DType {
        match self {
            Scalar::Bool(_) => DType::Bool,
            Scalar::U8(_) => PType::U8.into(),
            Scalar::U16(_) => PType::U16.into(),
            Scalar::U32(_) => PType::U32.into(),
            Scalar::U64(_) => PType::U64.into(),
            Scalar::I8(_) => PType::I8.into(),
            Scalar::I16(_) => PType::I16.into(),
            Scalar::I32(_) => PType::I32.into(),
            Scalar::I64(_) => PType::I64.into(),
            Scalar::F32(_) => PType::F32.into(),
            Scalar::F64(_) => PType::F64.into(),
        }
    }

    /// The zero (or `false`) value of `dtype`.
    pub fn zero(dtype: &DType) -> ColzResult<Self> {
        Scalar::Bool(false).cast(dtype)
    }

    /// Returns the boolean value if this is a boolean scalar.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Truthiness: `true` for `true` and for every non-zero number.
    pub fn is_truthy(&self) -> bool {
        match_each_scalar!(*self, bool: |b| b, numeric: |v| v.to_f64().is_some_and(|f| f != 0.0))
    }

    /// The value as a 64-bit float (booleans become `0.0` / `1.0`).
    pub fn as_f64(&self) -> f64 {
        match_each_scalar!(
            *self,
            bool: |b| if b { 1.0 } else { 0.0 },
            numeric: |v| v.to_f64().unwrap_or(f64::NAN)
        )
    }

    /// The value as a native primitive, failing if it does not fit.
    pub fn as_native<T: NativePType>(&self) -> ColzResult<T> {
        match_each_scalar!(
            *self,
            bool: |b| <T as NumCast>::from(<u8 as From<bool>>::from(b))
                .ok_or_else(|| colz_err!("cannot represent {b} as {}", T::PTYPE)),
            numeric: |v| <T as NumCast>::from(v)
                .ok_or_else(|| colz_err!("cannot represent {v} as {}", T::PTYPE))
        )
    }

    /// Convert this scalar into `dtype`.
    ///
    /// Numbers convert to booleans by comparing against zero; booleans convert to `0` / `1`.
    /// A number that does not fit the target type is an error.
    pub fn cast(&self, dtype: &DType) -> ColzResult<Self> {
        match dtype {
            DType::Bool => Ok(Scalar::Bool(self.is_truthy())),
            DType::Primitive(ptype) => {
                match_each_native_ptype!(*ptype, |T| { Ok(self.as_native::<T>()?.into()) })
            }
            DType::Struct(_) => colz_bail!(MismatchedTypes: "fixed-width type", dtype),
        }
    }
}

impl Display for Scalar {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match_each_scalar!(self, |v| write!(f, "{v}"))
    }
}

macro_rules! scalar_from {
    ($T:ty, $variant:ident) => {
        impl From<$T> for Scalar {
            fn from(value: $T) -> Self {
                Scalar::$variant(value)
            }
        }
    };
}

scalar_from!(bool, Bool);
scalar_from!(u8, U8);
scalar_from!(u16, U16);
scalar_from!(u32, U32);
scalar_from!(u64, U64);
scalar_from!(i8, I8);
scalar_from!(i16, I16);
scalar_from!(i32, I32);
scalar_from!(i64, I64);
scalar_from!(f32, F32);
scalar_from!(f64, F64);

impl From<usize> for Scalar {
    fn from(value: usize) -> Self {
        Scalar::U64(value as u64)
    }
}

#[cfg(test)]
mod test {
    use colz_dtype::{DType, PType};
    use rstest::rstest;

    use crate::Scalar;

    #[rstest]
    #[case(Scalar::I64(3), DType::F64, Scalar::F64(3.0))]
    #[case(Scalar::F64(2.9), DType::Primitive(PType::I32), Scalar::I32(2))]
    #[case(Scalar::U8(0), DType::Bool, Scalar::Bool(false))]
    #[case(Scalar::Bool(true), DType::Primitive(PType::U16), Scalar::U16(1))]
    fn casts(#[case] input: Scalar, #[case] dtype: DType, #[case] expected: Scalar) {
        assert_eq!(input.cast(&dtype).unwrap(), expected);
    }

    #[test]
    fn cast_out_of_range() {
        assert!(Scalar::I64(300).cast(&DType::Primitive(PType::U8)).is_err());
        assert!(Scalar::I64(-1).cast(&DType::Primitive(PType::U64)).is_err());
    }

    #[test]
    fn zero_and_dtype() {
        let zero = Scalar::zero(&DType::Primitive(PType::F32)).unwrap();
        assert_eq!(zero, Scalar::F32(0.0));
        assert_eq!(zero.dtype(), DType::Primitive(PType::F32));
        assert!(Scalar::zero(&DType::Bool).unwrap().as_bool() == Some(false));
    }

    #[test]
    fn serde_tagging() {
        let json = serde_json::to_string(&Scalar::I32(-4)).unwrap();
        assert_eq!(json, r#"{"i32":-4}"#);
        assert_eq!(
            serde_json::from_str::<Scalar>(&json).unwrap(),
            Scalar::I32(-4)
        );
    }
}
