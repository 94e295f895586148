use colz_array::{Array, Row, Scalar, StructArray};

use crate::carray::{BoolSource, ColumnRef};
use crate::ctable::Table;
use crate::eval::Namespace;
use crate::slice::Slice;

/// The columns a table is built from.
#[derive(Debug, Clone)]
pub enum ColumnSource {
    /// Existing columns. In-memory tables share the handles; persisted tables copy them.
    Columns(Vec<ColumnRef>),
    Arrays(Vec<Array>),
    /// One column per field; field names are the default column names.
    Structured(StructArray),
}

impl ColumnSource {
    pub(crate) fn ncols(&self) -> usize {
        match self {
            ColumnSource::Columns(c) => c.len(),
            ColumnSource::Arrays(a) => a.len(),
            ColumnSource::Structured(s) => s.fields().len(),
        }
    }
}

/// The data for one column of an append.
#[derive(Debug, Clone)]
pub enum ColumnData {
    Column(ColumnRef),
    Array(Array),
    /// A single value, appended as one row.
    Scalar(Scalar),
}

impl ColumnData {
    pub(crate) fn to_array(&self) -> colz_error::ColzResult<Array> {
        Ok(match self {
            ColumnData::Column(c) => {
                let column = c.read();
                column.read_range(0, column.len())?
            }
            ColumnData::Array(a) => a.clone(),
            ColumnData::Scalar(s) => Array::full(*s, 1),
        })
    }
}

impl From<Array> for ColumnData {
    fn from(value: Array) -> Self {
        ColumnData::Array(value)
    }
}

impl From<Scalar> for ColumnData {
    fn from(value: Scalar) -> Self {
        ColumnData::Scalar(value)
    }
}

impl From<ColumnRef> for ColumnData {
    fn from(value: ColumnRef) -> Self {
        ColumnData::Column(value)
    }
}

/// Rows to append to a table.
#[derive(Debug, Clone)]
pub enum RowsSource<'a> {
    /// One entry per column, in column order.
    Columns(Vec<ColumnData>),
    /// Fields are matched to columns by name.
    Structured(&'a StructArray),
    /// Columns are matched by name.
    Table(&'a Table),
}

/// A column to add to a table.
#[derive(Debug, Clone)]
pub enum NewColumn {
    Column(ColumnRef),
    Array(Array),
}

impl From<Array> for NewColumn {
    fn from(value: Array) -> Self {
        NewColumn::Array(value)
    }
}

impl From<ColumnRef> for NewColumn {
    fn from(value: ColumnRef) -> Self {
        NewColumn::Column(value)
    }
}

/// Identifies a column to remove.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnId {
    Name(String),
    Pos(usize),
}

impl From<&str> for ColumnId {
    fn from(value: &str) -> Self {
        ColumnId::Name(value.to_string())
    }
}

impl From<usize> for ColumnId {
    fn from(value: usize) -> Self {
        ColumnId::Pos(value)
    }
}

/// What to read from, or write to, a table.
#[derive(Debug, Clone)]
pub enum TableKey {
    /// One row. Negative positions count from the end.
    Row(i64),
    Slice(Slice),
    /// A column name, or else a boolean expression over the columns.
    Name(String),
    /// A projection onto these columns, in this order.
    Names(Vec<String>),
    Indices(Vec<usize>),
    Mask(BoolSource),
}

impl From<i64> for TableKey {
    fn from(value: i64) -> Self {
        TableKey::Row(value)
    }
}

impl From<Slice> for TableKey {
    fn from(value: Slice) -> Self {
        TableKey::Slice(value)
    }
}

impl From<&str> for TableKey {
    fn from(value: &str) -> Self {
        TableKey::Name(value.to_string())
    }
}

/// The result of [`Table::get`].
#[derive(Debug)]
pub enum TableItem {
    Row(Row),
    Rows(StructArray),
    Column(ColumnRef),
    Table(Table),
}

impl TableItem {
    pub fn into_row(self) -> Option<Row> {
        match self {
            TableItem::Row(row) => Some(row),
            _ => None,
        }
    }

    pub fn into_rows(self) -> Option<StructArray> {
        match self {
            TableItem::Rows(rows) => Some(rows),
            _ => None,
        }
    }

    pub fn into_column(self) -> Option<ColumnRef> {
        match self {
            TableItem::Column(column) => Some(column),
            _ => None,
        }
    }

    pub fn into_table(self) -> Option<Table> {
        match self {
            TableItem::Table(table) => Some(table),
            _ => None,
        }
    }
}

/// Values written by [`Table::set`].
#[derive(Debug, Clone)]
pub enum TableValue {
    /// One value per column, broadcast to every selected row.
    Row(Vec<Scalar>),
    /// One row, broadcast, or exactly one row per selected row. Fields match columns by name.
    Rows(StructArray),
}

/// The rows a `where` selects.
#[derive(Debug, Clone)]
pub enum Condition {
    /// A boolean expression over the columns.
    Expr(String),
    Mask(Vec<bool>),
    Column(ColumnRef),
}

impl From<&str> for Condition {
    fn from(value: &str) -> Self {
        Condition::Expr(value.to_string())
    }
}

impl From<Vec<bool>> for Condition {
    fn from(value: Vec<bool>) -> Self {
        Condition::Mask(value)
    }
}

/// A field of the rows produced by a row iterator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OutputColumn {
    Named(String),
    /// The position of the row in the table, exposed under the name `nrow__`.
    RowIndex,
}

impl From<&str> for OutputColumn {
    fn from(value: &str) -> Self {
        if value == super::ROW_INDEX {
            OutputColumn::RowIndex
        } else {
            OutputColumn::Named(value.to_string())
        }
    }
}

/// Projection and paging of a row iteration.
#[derive(Debug, Clone, Default)]
pub struct WhereOptions<'a> {
    /// The fields of each row. All columns when unset.
    pub outcols: Option<Vec<OutputColumn>>,
    /// Stop after this many rows.
    pub limit: Option<usize>,
    /// Skip this many selected rows first.
    pub skip: usize,
    /// Extra variables for an expression condition. Columns shadow them.
    pub vars: Option<&'a Namespace>,
}

impl<'a> WhereOptions<'a> {
    pub fn with_outcols<C: Into<OutputColumn>>(mut self, outcols: impl IntoIterator<Item = C>) -> Self {
        self.outcols = Some(outcols.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    pub fn with_vars(mut self, vars: &'a Namespace) -> Self {
        self.vars = Some(vars);
        self
    }
}
