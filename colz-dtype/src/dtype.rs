use std::fmt::{Display, Formatter};

use itertools::Itertools;

use crate::{PType, StructDType};

/// The logical types of elements in colz columns and tables.
///
/// Columns hold a single fixed-width element type ([`DType::Bool`] or [`DType::Primitive`]);
/// a table's rows are described by a [`DType::Struct`] over its columns.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum DType {
    /// The logical boolean type, stored one byte per element
    Bool,
    /// Primitive, fixed-width numeric types (e.g., `u8`, `i32`, `f64`)
    Primitive(PType),
    /// An ordered list of named fields, each with its own DType
    Struct(StructDType),
}

impl DType {
    /// The boolean DType
    pub const BOOL: Self = DType::Bool;
    /// The default integer DType
    pub const I64: Self = DType::Primitive(PType::I64);
    /// The default floating point DType
    pub const F64: Self = DType::Primitive(PType::F64);

    /// Check if `self` is a boolean
    pub fn is_boolean(&self) -> bool {
        matches!(self, DType::Bool)
    }

    /// Check if `self` is an integer (signed or unsigned)
    pub fn is_int(&self) -> bool {
        matches!(self, DType::Primitive(p) if p.is_int())
    }

    /// Check if `self` is a floating point number
    pub fn is_float(&self) -> bool {
        matches!(self, DType::Primitive(p) if p.is_float())
    }

    /// Check if `self` is a `StructDType`
    pub fn is_struct(&self) -> bool {
        matches!(self, DType::Struct(_))
    }

    /// Check if `self` can be stored in a single column
    pub fn is_fixed_scalar(&self) -> bool {
        matches!(self, DType::Bool | DType::Primitive(_))
    }

    /// Get the `StructDType` if `self` is a `StructDType`, otherwise `None`
    pub fn as_struct(&self) -> Option<&StructDType> {
        match self {
            DType::Struct(s) => Some(s),
            _ => None,
        }
    }

    /// Get the `PType` if `self` is primitive, otherwise `None`
    pub fn as_ptype(&self) -> Option<PType> {
        match self {
            DType::Primitive(p) => Some(*p),
            _ => None,
        }
    }

    /// The number of bytes one element of this type occupies.
    ///
    /// For a struct this is the sum over its fields, i.e. the width of one row.
    pub fn byte_width(&self) -> usize {
        match self {
            DType::Bool => 1,
            DType::Primitive(p) => p.byte_width(),
            DType::Struct(s) => s.dtypes().iter().map(DType::byte_width).sum(),
        }
    }
}

impl Display for DType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DType::Bool => write!(f, "bool"),
            DType::Primitive(pt) => write!(f, "{pt}"),
            DType::Struct(sdt) => write!(
                f,
                "{{{}}}",
                sdt.names()
                    .iter()
                    .zip(sdt.dtypes().iter())
                    .map(|(n, dt)| format!("{n}={dt}"))
                    .join(", ")
            ),
        }
    }
}
