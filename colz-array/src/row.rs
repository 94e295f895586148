use std::fmt::{Display, Formatter};

use colz_dtype::FieldNames;
use itertools::Itertools;

use crate::Scalar;

/// One record of a table: a value per field, in field order.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    names: FieldNames,
    values: Vec<Scalar>,
}

impl Row {
    pub fn new(names: FieldNames, values: Vec<Scalar>) -> Self {
        debug_assert_eq!(names.len(), values.len());
        Self { names, values }
    }

    pub fn names(&self) -> &FieldNames {
        &self.names
    }

    pub fn values(&self) -> &[Scalar] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Scalar> {
        self.values
    }

    /// The value of the field called `name`.
    pub fn get(&self, name: &str) -> Option<&Scalar> {
        self.names
            .iter()
            .position(|n| n.as_ref() == name)
            .map(|idx| &self.values[idx])
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Display for Row {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({})", self.values.iter().join(", "))
    }
}
