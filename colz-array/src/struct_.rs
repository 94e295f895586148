use colz_dtype::{DType, FieldName, FieldNames, StructDType};
use colz_error::{ColzResult, colz_bail};
use itertools::Itertools;

use crate::{Array, Row};

/// Equal-length arrays addressed by field name: the in-memory form of a block of table rows.
#[derive(Debug, Clone, PartialEq)]
pub struct StructArray {
    names: FieldNames,
    fields: Vec<Array>,
    len: usize,
}

impl StructArray {
    pub fn try_new(names: FieldNames, fields: Vec<Array>) -> ColzResult<Self> {
        if names.len() != fields.len() {
            colz_bail!(
                InvariantViolation: "{} names given for {} fields",
                names.len(),
                fields.len()
            );
        }
        if let Some(dup) = names.iter().duplicates().next() {
            colz_bail!(InvariantViolation: "duplicate field name '{dup}'");
        }
        let len = fields.first().map_or(0, Array::len);
        if let Some((name, field)) = names.iter().zip(&fields).find(|(_, f)| f.len() != len) {
            colz_bail!(
                InvariantViolation: "field '{name}' has length {} but expected {len}",
                field.len()
            );
        }
        Ok(Self { names, fields, len })
    }

    pub fn from_fields<N: AsRef<str>>(
        fields: impl IntoIterator<Item = (N, Array)>,
    ) -> ColzResult<Self> {
        let (names, arrays): (Vec<FieldName>, Vec<Array>) = fields
            .into_iter()
            .map(|(name, array)| (FieldName::from(name.as_ref()), array))
            .unzip();
        Self::try_new(names.into(), arrays)
    }

    /// A struct array with no rows.
    pub fn empty(dtype: &StructDType) -> ColzResult<Self> {
        let fields = dtype
            .dtypes()
            .iter()
            .map(Array::empty)
            .collect::<ColzResult<Vec<_>>>()?;
        Self::try_new(dtype.names().clone(), fields)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn names(&self) -> &FieldNames {
        &self.names
    }

    pub fn fields(&self) -> &[Array] {
        &self.fields
    }

    pub fn into_fields(self) -> Vec<Array> {
        self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Array> {
        self.names
            .iter()
            .position(|n| n.as_ref() == name)
            .map(|idx| &self.fields[idx])
    }

    pub fn struct_dtype(&self) -> StructDType {
        StructDType::new(
            self.names.clone(),
            self.fields.iter().map(Array::dtype).collect(),
        )
    }

    pub fn dtype(&self) -> DType {
        DType::Struct(self.struct_dtype())
    }

    /// The record at `index`.
    pub fn row(&self, index: usize) -> ColzResult<Row> {
        if index >= self.len {
            colz_bail!(OutOfBounds: index, 0, self.len);
        }
        let values = self
            .fields
            .iter()
            .map(|f| f.scalar_at(index))
            .collect::<ColzResult<Vec<_>>>()?;
        Ok(Row::new(self.names.clone(), values))
    }

    pub fn rows(&self) -> impl Iterator<Item = ColzResult<Row>> + '_ {
        (0..self.len).map(|i| self.row(i))
    }

    /// Keep only the fields named in `projection`, in that order.
    pub fn project(&self, projection: &[FieldName]) -> ColzResult<Self> {
        let mut fields = Vec::with_capacity(projection.len());
        for name in projection {
            let Some(field) = self.field(name) else {
                colz_bail!(InvariantViolation: "unknown field '{name}'");
            };
            fields.push(field.clone());
        }
        Self::try_new(projection.into(), fields)
    }

    pub fn slice(&self, start: usize, stop: usize) -> ColzResult<Self> {
        self.map_fields(|f| f.slice(start, stop))
    }

    pub fn take(&self, indices: &[usize]) -> ColzResult<Self> {
        self.map_fields(|f| f.take(indices))
    }

    pub fn filter(&self, mask: &[bool]) -> ColzResult<Self> {
        self.map_fields(|f| f.filter(mask))
    }

    fn map_fields(&self, f: impl Fn(&Array) -> ColzResult<Array>) -> ColzResult<Self> {
        let fields = self.fields.iter().map(f).collect::<ColzResult<Vec<_>>>()?;
        Self::try_new(self.names.clone(), fields)
    }
}
