use colz_dtype::{DType, StructDType};
use colz_error::{ColzResult, colz_bail};

use crate::{Array, Row, Scalar, StructArray};

/// Accumulates values of one dtype into an [`Array`].
#[derive(Debug, Clone)]
pub struct ArrayBuilder {
    values: Array,
}

impl ArrayBuilder {
    pub fn with_capacity(dtype: &DType, capacity: usize) -> ColzResult<Self> {
        Ok(Self {
            values: Array::with_capacity(dtype, capacity)?,
        })
    }

    pub fn dtype(&self) -> DType {
        self.values.dtype()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Append one value, casting it to the builder's dtype.
    pub fn append_scalar(&mut self, value: &Scalar) -> ColzResult<()> {
        self.values.push_scalar(value)
    }

    /// Append `n` zero values.
    pub fn append_zeros(&mut self, n: usize) -> ColzResult<()> {
        self.values.extend(&Array::zeros(&self.values.dtype(), n)?)
    }

    pub fn extend_from_array(&mut self, array: &Array) -> ColzResult<()> {
        self.values.extend(array)
    }

    /// Take the accumulated values, leaving the builder empty.
    pub fn finish(&mut self) -> ColzResult<Array> {
        let empty = Array::empty(&self.values.dtype())?;
        Ok(std::mem::replace(&mut self.values, empty))
    }
}

/// Accumulates rows into a [`StructArray`].
#[derive(Debug, Clone)]
pub struct StructBuilder {
    dtype: StructDType,
    fields: Vec<ArrayBuilder>,
}

impl StructBuilder {
    pub fn with_capacity(dtype: StructDType, capacity: usize) -> ColzResult<Self> {
        let fields = dtype
            .dtypes()
            .iter()
            .map(|dt| ArrayBuilder::with_capacity(dt, capacity))
            .collect::<ColzResult<Vec<_>>>()?;
        Ok(Self { dtype, fields })
    }

    pub fn dtype(&self) -> &StructDType {
        &self.dtype
    }

    pub fn len(&self) -> usize {
        self.fields.first().map_or(0, ArrayBuilder::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append one row given as a value per field, in field order.
    pub fn append_values(&mut self, values: &[Scalar]) -> ColzResult<()> {
        if values.len() != self.fields.len() {
            colz_bail!(
                InvariantViolation: "row has {} values but the struct has {} fields",
                values.len(),
                self.fields.len()
            );
        }
        // Cast everything first so a bad value leaves the builder untouched.
        let cast = values
            .iter()
            .zip(self.dtype.dtypes())
            .map(|(v, dt)| v.cast(dt))
            .collect::<ColzResult<Vec<_>>>()?;
        for (field, value) in self.fields.iter_mut().zip(&cast) {
            field.append_scalar(value)?;
        }
        Ok(())
    }

    pub fn append_row(&mut self, row: &Row) -> ColzResult<()> {
        self.append_values(row.values())
    }

    pub fn extend_from_struct(&mut self, array: &StructArray) -> ColzResult<()> {
        if array.fields().len() != self.fields.len() {
            colz_bail!(
                InvariantViolation: "struct array has {} fields but expected {}",
                array.fields().len(),
                self.fields.len()
            );
        }
        for (field, values) in self.fields.iter_mut().zip(array.fields()) {
            field.extend_from_array(values)?;
        }
        Ok(())
    }

    pub fn finish(&mut self) -> ColzResult<StructArray> {
        let fields = self
            .fields
            .iter_mut()
            .map(ArrayBuilder::finish)
            .collect::<ColzResult<Vec<_>>>()?;
        StructArray::try_new(self.dtype.names().clone(), fields)
    }
}
