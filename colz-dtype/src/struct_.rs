use std::sync::Arc;

use colz_error::{ColzResult, colz_bail, colz_err};

use crate::DType;

/// A name for a field in a struct
pub type FieldName = Arc<str>;
/// An ordered list of field names in a struct
pub type FieldNames = Arc<[FieldName]>;

/// Type information for a struct: the names and dtypes of its fields, in order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StructDType {
    names: FieldNames,
    dtypes: Arc<[DType]>,
}

impl StructDType {
    /// Create a new [`StructDType`] from a list of names and dtypes.
    ///
    /// The two lists must have the same length.
    pub fn new(names: FieldNames, dtypes: Vec<DType>) -> Self {
        assert_eq!(
            names.len(),
            dtypes.len(),
            "length mismatch between names and dtypes"
        );
        Self {
            names,
            dtypes: dtypes.into(),
        }
    }

    /// Build a [`StructDType`] from `(name, dtype)` pairs.
    pub fn from_fields<N: AsRef<str>>(fields: impl IntoIterator<Item = (N, DType)>) -> Self {
        let (names, dtypes): (Vec<FieldName>, Vec<DType>) = fields
            .into_iter()
            .map(|(name, dtype)| (FieldName::from(name.as_ref()), dtype))
            .unzip();
        Self {
            names: names.into(),
            dtypes: dtypes.into(),
        }
    }

    /// The names of the fields, in order.
    pub fn names(&self) -> &FieldNames {
        &self.names
    }

    /// The dtypes of the fields, in order.
    pub fn dtypes(&self) -> &[DType] {
        &self.dtypes
    }

    /// The number of fields.
    pub fn nfields(&self) -> usize {
        self.names.len()
    }

    /// Find the position of the field called `name`.
    pub fn find(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n.as_ref() == name)
    }

    /// The dtype of the field called `name`.
    pub fn field(&self, name: &str) -> ColzResult<&DType> {
        self.find(name)
            .map(|idx| &self.dtypes[idx])
            .ok_or_else(|| colz_err!(InvariantViolation: "unknown field '{name}'"))
    }

    /// A new struct dtype holding only `projection`, in the given order.
    pub fn project(&self, projection: &[FieldName]) -> ColzResult<Self> {
        let mut names = Vec::with_capacity(projection.len());
        let mut dtypes = Vec::with_capacity(projection.len());
        for name in projection {
            let Some(idx) = self.find(name) else {
                colz_bail!(InvariantViolation: "unknown field '{name}'");
            };
            names.push(self.names[idx].clone());
            dtypes.push(self.dtypes[idx].clone());
        }
        Ok(Self::new(names.into(), dtypes))
    }
}
