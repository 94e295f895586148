use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;

use colz_error::{ColzError, colz_err};
use num_traits::{NumCast, ToPrimitive};

use crate::DType;

/// The physical, fixed-width numeric types a column can store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum PType {
    /// An 8-bit unsigned integer
    U8,
    /// A 16-bit unsigned integer
    U16,
    /// A 32-bit unsigned integer
    U32,
    /// A 64-bit unsigned integer
    U64,
    /// An 8-bit signed integer
    I8,
    /// A 16-bit signed integer
    I16,
    /// A 32-bit signed integer
    I32,
    /// A 64-bit signed integer
    I64,
    /// A 32-bit floating point number
    F32,
    /// A 64-bit floating point number
    F64,
}

/// A trait for native Rust types that correspond 1:1 to a [`PType`].
pub trait NativePType:
    Send + Sync + Clone + Copy + Debug + Display + PartialEq + PartialOrd + Default + NumCast + ToPrimitive + 'static
{
    /// The [`PType`] that corresponds to this native type.
    const PTYPE: PType;
}

macro_rules! native_ptype {
    ($T:ty, $ptype:tt) => {
        impl NativePType for $T {
            const PTYPE: PType = PType::$ptype;
        }
    };
}

native_ptype!(u8, U8);
native_ptype!(u16, U16);
native_ptype!(u32, U32);
native_ptype!(u64, U64);
native_ptype!(i8, I8);
native_ptype!(i16, I16);
native_ptype!(i32, I32);
native_ptype!(i64, I64);
native_ptype!(f32, F32);
native_ptype!(f64, F64);

/// Expands `$body` once per [`PType`], with `$tname` bound to the matching native type.
#[macro_export]
macro_rules! match_each_native_ptype {
    ($self:expr, | $tname:ident | $body:block) => {{
        use $crate::PType;
        match $self {
            PType::U8 => {
                type $tname = u8;
                $body
            }
            PType::U16 => {
                type $tname = u16;
                $body
            }
            PType::U32 => {
                type $tname = u32;
                $body
            }
            PType::U64 => {
                type $tname = u64;
                $body
            }
            PType::I8 => {
                type $tname = i8;
                $body
            }
            PType::I16 => {
                type $tname = i16;
                $body
            }
            PType::I32 => {
                type $tname = i32;
                $body
            }
            PType::I64 => {
                type $tname = i64;
                $body
            }
            PType::F32 => {
                type $tname = f32;
                $body
            }
            PType::F64 => {
                type $tname = f64;
                $body
            }
        }
    }};
}

impl PType {
    /// Returns `true` iff this PType is an unsigned integer type
    pub const fn is_unsigned_int(self) -> bool {
        matches!(self, Self::U8 | Self::U16 | Self::U32 | Self::U64)
    }

    /// Returns `true` iff this PType is a signed integer type
    pub const fn is_signed_int(self) -> bool {
        matches!(self, Self::I8 | Self::I16 | Self::I32 | Self::I64)
    }

    /// Returns `true` iff this PType is an integer type, signed or unsigned
    pub const fn is_int(self) -> bool {
        self.is_unsigned_int() || self.is_signed_int()
    }

    /// Returns `true` iff this PType is a floating point type
    pub const fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    /// Returns the number of bytes in this PType
    pub const fn byte_width(&self) -> usize {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::U16 | Self::I16 => 2,
            Self::U32 | Self::I32 | Self::F32 => 4,
            Self::U64 | Self::I64 | Self::F64 => 8,
        }
    }
}

impl Display for PType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::U8 => write!(f, "u8"),
            Self::U16 => write!(f, "u16"),
            Self::U32 => write!(f, "u32"),
            Self::U64 => write!(f, "u64"),
            Self::I8 => write!(f, "i8"),
            Self::I16 => write!(f, "i16"),
            Self::I32 => write!(f, "i32"),
            Self::I64 => write!(f, "i64"),
            Self::F32 => write!(f, "f32"),
            Self::F64 => write!(f, "f64"),
        }
    }
}

impl FromStr for PType {
    type Err = ColzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "u8" => Self::U8,
            "u16" => Self::U16,
            "u32" => Self::U32,
            "u64" => Self::U64,
            "i8" => Self::I8,
            "i16" => Self::I16,
            "i32" => Self::I32,
            "i64" => Self::I64,
            "f32" => Self::F32,
            "f64" => Self::F64,
            _ => return Err(colz_err!("unknown primitive type '{s}'")),
        })
    }
}

impl TryFrom<&DType> for PType {
    type Error = ColzError;

    fn try_from(value: &DType) -> Result<Self, Self::Error> {
        match value {
            DType::Primitive(p) => Ok(*p),
            _ => Err(colz_err!(MismatchedTypes: "primitive type", value)),
        }
    }
}

impl From<PType> for DType {
    fn from(item: PType) -> Self {
        DType::Primitive(item)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(PType::U8, 1)]
    #[case(PType::I16, 2)]
    #[case(PType::F32, 4)]
    #[case(PType::U64, 8)]
    fn byte_widths(#[case] ptype: PType, #[case] width: usize) {
        assert_eq!(ptype.byte_width(), width);
        let native_width = match_each_native_ptype!(ptype, |T| { size_of::<T>() });
        assert_eq!(native_width, width);
    }

    #[test]
    fn display_parses_back() {
        for ptype in [PType::U32, PType::I64, PType::F64] {
            assert_eq!(ptype.to_string().parse::<PType>().unwrap(), ptype);
        }
        assert!("f16".parse::<PType>().is_err());
    }
}
