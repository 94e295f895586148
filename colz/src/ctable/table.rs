use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use colz_array::{Array, Datum, Row, Scalar, StructArray, StructBuilder};
use colz_dtype::{DType, FieldName, StructDType};
use colz_error::{ColzResult, colz_bail, colz_err};
use itertools::Itertools;

use super::ROW_INDEX;
use super::cols::{ColumnDirectory, ROOTDIRS, is_table_dir};
use super::iter::{Producer, RowBlocks, RowIter, TableBlocks};
use super::source::{
    ColumnData, ColumnId, ColumnSource, Condition, NewColumn, OutputColumn, RowsSource, TableItem,
    TableKey, TableValue, WhereOptions,
};
use crate::carray::{
    BoolSource, Column, ColumnOptions, ColumnRef, CompressionParams, OpenMode, check_overlap,
    prepare_root,
};
use crate::config::config;
use crate::eval::{EvalOptions, EvalResult, Namespace, column_namespace, eval};
use crate::slice::Slice;

/// Options for creating a [`Table`].
#[derive(Debug, Clone, Default)]
pub struct TableOptions {
    /// Column names. Defaults to `f0, f1, ...`, or the field names of a structured source.
    pub names: Option<Vec<String>>,
    /// Compression of columns built from in-memory data. Defaults to the process config.
    pub cparams: Option<CompressionParams>,
    /// Persist the table under this directory.
    pub root: Option<PathBuf>,
    pub mode: OpenMode,
    pub chunklen: Option<usize>,
    pub expectedlen: Option<usize>,
}

impl TableOptions {
    pub fn with_names<N: Into<String>>(mut self, names: impl IntoIterator<Item = N>) -> Self {
        self.names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_cparams(mut self, cparams: CompressionParams) -> Self {
        self.cparams = Some(cparams);
        self
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn with_mode(mut self, mode: OpenMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_chunklen(mut self, chunklen: usize) -> Self {
        self.chunklen = Some(chunklen);
        self
    }

    pub fn with_expectedlen(mut self, expectedlen: usize) -> Self {
        self.expectedlen = Some(expectedlen);
        self
    }

    fn resolve_names(
        &self,
        ncols: usize,
        defaults: impl FnOnce() -> Vec<FieldName>,
    ) -> ColzResult<Vec<FieldName>> {
        let names = match &self.names {
            Some(names) if names.len() != ncols => colz_bail!(
                InvariantViolation: "{} names given for {ncols} columns",
                names.len()
            ),
            Some(names) => names.iter().map(|n| FieldName::from(n.as_str())).collect(),
            None => defaults(),
        };
        for name in &names {
            validate_name(name)?;
        }
        if let Some(dup) = names.iter().duplicates().next() {
            colz_bail!(InvariantViolation: "duplicate column name '{dup}'");
        }
        Ok(names)
    }

    fn column_options(&self, root: Option<PathBuf>) -> ColumnOptions {
        ColumnOptions {
            cparams: self.cparams,
            chunklen: self.chunklen,
            expectedlen: self.expectedlen,
            dflt: None,
            root,
            // The table root was prepared already, so anything left under it is stale.
            mode: OpenMode::Write,
        }
    }
}

/// Column names double as directory names, and `nrow__` is reserved for row positions.
fn validate_name(name: &str) -> ColzResult<()> {
    if name.is_empty() {
        colz_bail!(InvariantViolation: "column names cannot be empty");
    }
    if name == ROW_INDEX || name == ROOTDIRS {
        colz_bail!(InvariantViolation: "'{name}' is a reserved name");
    }
    if name == "." || name == ".." || name.contains(['/', '\\']) {
        colz_bail!(InvariantViolation: "'{name}' cannot be used as a column directory name");
    }
    Ok(())
}

fn default_names(ncols: usize) -> Vec<FieldName> {
    (0..ncols).map(|i| FieldName::from(format!("f{i}"))).collect()
}

/// A column that has been validated but not yet placed in the table.
enum Pending {
    /// Shared by an in-memory table, copied into a persisted one.
    Shared(ColumnRef),
    Copied(ColumnRef),
    Data(Array),
    Empty(DType),
}

impl Pending {
    fn len(&self) -> usize {
        match self {
            Pending::Shared(c) | Pending::Copied(c) => c.len(),
            Pending::Data(a) => a.len(),
            Pending::Empty(_) => 0,
        }
    }

    fn handle(&self) -> Option<&ColumnRef> {
        match self {
            Pending::Shared(c) | Pending::Copied(c) => Some(c),
            Pending::Data(_) | Pending::Empty(_) => None,
        }
    }
}

/// Equal-length named columns.
///
/// After every public operation all columns hold exactly [`Table::len`] values. Operations
/// that touch several columns validate everything first, so a rejected call leaves the table
/// unchanged.
#[derive(Debug)]
pub struct Table {
    cols: ColumnDirectory,
    len: usize,
    cparams: CompressionParams,
    mode: OpenMode,
    dtype: OnceLock<StructDType>,
}

impl Table {
    /// A table over `source`.
    pub fn new(source: ColumnSource, options: TableOptions) -> ColzResult<Self> {
        let ncols = source.ncols();
        let names = match &source {
            ColumnSource::Structured(s) => options.resolve_names(ncols, || s.names().to_vec())?,
            _ => options.resolve_names(ncols, || default_names(ncols))?,
        };
        let pending = match source {
            ColumnSource::Columns(columns) => columns.into_iter().map(Pending::Shared).collect(),
            ColumnSource::Arrays(arrays) => arrays.into_iter().map(Pending::Data).collect(),
            ColumnSource::Structured(s) => s.into_fields().into_iter().map(Pending::Data).collect(),
        };
        Self::build(names, pending, options)
    }

    /// A table with no rows and one column per field of `dtype`.
    pub fn empty(dtype: &StructDType, options: TableOptions) -> ColzResult<Self> {
        let names = options.resolve_names(dtype.nfields(), || dtype.names().to_vec())?;
        if let Some(bad) = dtype.dtypes().iter().find(|dt| !dt.is_fixed_scalar()) {
            colz_bail!("columns hold fixed-width values, not {bad}");
        }
        let pending = dtype.dtypes().iter().cloned().map(Pending::Empty).collect();
        Self::build(names, pending, options)
    }

    fn build(
        names: Vec<FieldName>,
        pending: Vec<Pending>,
        options: TableOptions,
    ) -> ColzResult<Self> {
        let len = pending.first().map_or(0, Pending::len);
        if let Some((name, p)) = names.iter().zip(&pending).find(|(_, p)| p.len() != len) {
            colz_bail!(
                InvariantViolation: "column '{name}' has length {} but expected {len}",
                p.len()
            );
        }

        match &options.root {
            // Columns keep their own storage and are copied under the new root.
            Some(root) => {
                for handle in pending.iter().filter_map(Pending::handle) {
                    let column = handle.read();
                    if let Some(source) = column.root() {
                        check_overlap(source, root)?;
                    }
                }
            }
            None => {
                let mut shared: Vec<(&FieldName, &ColumnRef)> = Vec::new();
                for (name, p) in names.iter().zip(&pending) {
                    if let Pending::Shared(handle) = p {
                        if let Some((first, _)) = shared.iter().find(|(_, h)| h.ptr_eq(handle)) {
                            colz_bail!(
                                InvariantViolation: "columns '{first}' and '{name}' are the same column"
                            );
                        }
                        shared.push((name, handle));
                    }
                }
            }
        }

        let cparams = options.cparams.unwrap_or_else(|| config().cparams);
        if let Some(root) = &options.root {
            prepare_root(root, options.mode)?;
            fs::create_dir_all(root)?;
        }
        let mut cols = ColumnDirectory::new(options.root.clone());
        for (name, pending) in names.into_iter().zip(pending) {
            let column_options = options.column_options(cols.column_root(&name));
            let column = match pending {
                Pending::Shared(handle) if cols.root().is_none() => handle,
                Pending::Shared(handle) | Pending::Copied(handle) => {
                    handle.read().copy(column_options)?.into()
                }
                Pending::Data(array) => {
                    Column::new(&array, column_options.with_cparams(cparams))?.into()
                }
                Pending::Empty(dtype) => {
                    Column::empty(&dtype, column_options.with_cparams(cparams))?.into()
                }
            };
            cols.insert(cols.len(), name, column)?;
        }
        cols.save()?;
        if let Some(root) = cols.root() {
            log::debug!(
                "created table with {} columns and {len} rows in '{}'",
                cols.len(),
                root.display()
            );
        }
        Ok(Self {
            cols,
            len,
            cparams,
            mode: options.mode,
            dtype: OnceLock::new(),
        })
    }

    /// Open a persisted table.
    pub fn open(root: impl AsRef<Path>, mode: OpenMode) -> ColzResult<Self> {
        let root = root.as_ref();
        if mode == OpenMode::Write {
            colz_bail!(
                "'{}' cannot be opened in write mode, create a new table instead",
                root.display()
            );
        }
        if !is_table_dir(root) {
            colz_bail!("'{}' is not a table directory", root.display());
        }
        let cols = ColumnDirectory::open(root, mode)?;
        let len = cols.columns().next().map_or(0, ColumnRef::len);
        if let Some((name, column)) = cols.iter().find(|(_, c)| c.len() != len) {
            colz_bail!(
                InvariantViolation: "column '{name}' of '{}' has length {} but expected {len}",
                root.display(),
                column.len()
            );
        }
        let cparams = cols
            .columns()
            .next()
            .map_or_else(|| config().cparams, |c| c.read().cparams());
        Ok(Self {
            cols,
            len,
            cparams,
            mode,
            dtype: OnceLock::new(),
        })
    }

    pub fn names(&self) -> &[FieldName] {
        self.cols.names()
    }

    /// The type of one row.
    pub fn dtype(&self) -> &StructDType {
        self.dtype.get_or_init(|| {
            StructDType::new(
                self.cols.names().into(),
                self.cols.columns().map(ColumnRef::dtype).collect(),
            )
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn ncols(&self) -> usize {
        self.cols.len()
    }

    pub fn nbytes(&self) -> usize {
        self.cols.columns().map(|c| c.read().nbytes()).sum()
    }

    pub fn cbytes(&self) -> usize {
        self.cols.columns().map(|c| c.read().cbytes()).sum()
    }

    pub fn cparams(&self) -> CompressionParams {
        self.cparams
    }

    pub fn root(&self) -> Option<&Path> {
        self.cols.root()
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// The columns by name, ready to be used as an expression namespace.
    pub fn columns(&self) -> Namespace {
        column_namespace(self.cols.iter().map(|(name, column)| (name.as_ref(), column)))
    }

    pub fn column(&self, name: &str) -> Option<ColumnRef> {
        self.cols.get(name).cloned()
    }

    fn column_ref(&self, name: &str) -> ColzResult<&ColumnRef> {
        self.cols
            .get(name)
            .ok_or_else(|| colz_err!(InvariantViolation: "no column named '{name}'"))
    }

    fn check_writable(&self) -> ColzResult<()> {
        if !self.mode.is_writable() {
            colz_bail!(ModeViolation: "table is opened read-only");
        }
        Ok(())
    }

    /// Append rows and return the new length.
    pub fn append(&mut self, rows: RowsSource<'_>) -> ColzResult<usize> {
        self.check_writable()?;
        let arrays = match rows {
            RowsSource::Columns(data) => {
                if data.len() != self.ncols() {
                    colz_bail!(
                        InvariantViolation: "{} sequences given for {} columns",
                        data.len(),
                        self.ncols()
                    );
                }
                data.iter()
                    .map(ColumnData::to_array)
                    .collect::<ColzResult<Vec<_>>>()?
            }
            RowsSource::Structured(rows) => self
                .names()
                .iter()
                .map(|name| {
                    rows.field(name)
                        .cloned()
                        .ok_or_else(|| colz_err!(InvariantViolation: "rows have no field '{name}'"))
                })
                .collect::<ColzResult<Vec<_>>>()?,
            RowsSource::Table(other) => self
                .names()
                .iter()
                .map(|name| {
                    let column = other.column_ref(name)?.read();
                    column.read_range(0, column.len())
                })
                .collect::<ColzResult<Vec<_>>>()?,
        };

        let added = arrays.first().map_or(0, Array::len);
        let arrays = self
            .cols
            .iter()
            .zip(&arrays)
            .map(|((name, column), array)| {
                if array.len() != added {
                    colz_bail!(
                        InvariantViolation: "{} values given for column '{name}' but {added} for the first column",
                        array.len()
                    );
                }
                array.cast(&column.dtype())
            })
            .collect::<ColzResult<Vec<_>>>()?;
        for (column, array) in self.cols.columns().zip(&arrays) {
            column.write().append(array)?;
        }
        self.len += added;
        Ok(self.len)
    }

    /// Remove the last `n` rows.
    pub fn trim(&mut self, n: usize) -> ColzResult<()> {
        self.check_writable()?;
        if n > self.len {
            colz_bail!("cannot trim {n} rows from a table of {} rows", self.len);
        }
        for column in self.cols.columns() {
            column.write().trim(n)?;
        }
        self.len -= n;
        Ok(())
    }

    /// Shrink to `len` rows, or grow with each column's default value.
    pub fn resize(&mut self, len: usize) -> ColzResult<()> {
        self.check_writable()?;
        for column in self.cols.columns() {
            column.write().resize(len)?;
        }
        self.len = len;
        Ok(())
    }

    /// Insert a column at `pos` (default: last) called `name` (default: `f{pos}`).
    ///
    /// Arrays are compressed with the table's parameters unless `options` says otherwise. A
    /// persisted table always stores its own copy of the column.
    pub fn addcol(
        &mut self,
        column: impl Into<NewColumn>,
        name: Option<&str>,
        pos: Option<usize>,
        options: Option<ColumnOptions>,
    ) -> ColzResult<()> {
        self.check_writable()?;
        let column = column.into();
        let pos = pos.unwrap_or_else(|| self.ncols());
        if pos > self.ncols() {
            colz_bail!(
                InvariantViolation: "position {pos} is out of range for {} columns",
                self.ncols()
            );
        }
        let name = name.map_or_else(|| FieldName::from(format!("f{pos}")), FieldName::from);
        validate_name(&name)?;
        if self.cols.get(&name).is_some() {
            colz_bail!(InvariantViolation: "column '{name}' already exists");
        }
        let len = match &column {
            NewColumn::Column(c) => {
                if let Some((other, _)) = self.cols.iter().find(|(_, h)| h.ptr_eq(c)) {
                    colz_bail!(InvariantViolation: "the column is already in the table as '{other}'");
                }
                c.len()
            }
            NewColumn::Array(a) => a.len(),
        };
        if self.ncols() > 0 && len != self.len {
            colz_bail!(
                InvariantViolation: "column '{name}' has length {len} but the table has {} rows",
                self.len
            );
        }

        let mut options = options.unwrap_or_default();
        if let Some(root) = self.cols.column_root(&name) {
            options.root = Some(root);
            options.mode = OpenMode::Write;
        }
        let column = match column {
            NewColumn::Column(handle) if self.cols.root().is_none() => handle,
            NewColumn::Column(handle) => handle.read().copy(options)?.into(),
            NewColumn::Array(array) => {
                options.cparams = options.cparams.or(Some(self.cparams));
                Column::new(&array, options)?.into()
            }
        };
        self.cols.insert(pos, name, column)?;
        self.len = len;
        self.dtype = OnceLock::new();
        self.cols.save()
    }

    /// Remove a column, deleting its directory if the table is persisted.
    pub fn delcol(&mut self, id: impl Into<ColumnId>) -> ColzResult<()> {
        self.check_writable()?;
        let pos = match id.into() {
            ColumnId::Name(name) => self
                .cols
                .position(&name)
                .ok_or_else(|| colz_err!(InvariantViolation: "no column named '{name}'"))?,
            ColumnId::Pos(pos) => pos,
        };
        let (name, column) = self.cols.remove(pos)?;
        self.dtype = OnceLock::new();
        self.cols.save()?;
        if self.cols.root().is_some() {
            column.write().purge()?;
        }
        log::debug!("removed column '{name}'");
        Ok(())
    }

    /// A copy of every column in a new table.
    ///
    /// Unset compression parameters keep this table's. Column names are kept unless
    /// `options.names` renames them.
    pub fn copy(&self, mut options: TableOptions) -> ColzResult<Self> {
        if let (Some(from), Some(to)) = (self.root(), &options.root) {
            check_overlap(from, to)?;
        }
        options.cparams = options.cparams.or(Some(self.cparams));
        let names = options.resolve_names(self.ncols(), || self.names().to_vec())?;
        let pending = self.cols.columns().cloned().map(Pending::Copied).collect();
        Self::build(names, pending, options)
    }

    fn row_position(&self, row: i64) -> ColzResult<usize> {
        let len = self.len as i64;
        let pos = if row < 0 { row + len } else { row };
        if pos < 0 || pos >= len {
            colz_bail!("row {row} is out of range for a table of {} rows", self.len);
        }
        Ok(pos as usize)
    }

    fn row_at(&self, index: usize) -> ColzResult<Row> {
        let values = self
            .cols
            .columns()
            .map(|c| c.read().scalar_at(index))
            .collect::<ColzResult<Vec<_>>>()?;
        Ok(Row::new(self.dtype().names().clone(), values))
    }

    fn gather(&self, f: impl Fn(&Column) -> ColzResult<Array>) -> ColzResult<StructArray> {
        let fields = self
            .cols
            .columns()
            .map(|c| f(&c.read()))
            .collect::<ColzResult<Vec<_>>>()?;
        StructArray::try_new(self.dtype().names().clone(), fields)
    }

    /// A read-only table sharing the named columns of this one.
    ///
    /// The view cannot change its shape: that would resize only some columns of this table.
    fn project(&self, names: &[String]) -> ColzResult<Self> {
        let mut cols = ColumnDirectory::new(None);
        for name in names {
            cols.insert(cols.len(), name.as_str().into(), self.column_ref(name)?.clone())?;
        }
        Ok(Self {
            cols,
            len: self.len,
            cparams: self.cparams,
            mode: OpenMode::Read,
            dtype: OnceLock::new(),
        })
    }

    /// The columns, overriding the variables in `vars`.
    fn namespace_with(&self, vars: Option<&Namespace>) -> Namespace {
        let mut namespace = vars.cloned().unwrap_or_default();
        namespace.extend(self.columns());
        namespace
    }

    /// Evaluate a boolean expression over the columns into a row mask.
    fn condition_mask(&self, expression: &str, vars: Option<&Namespace>) -> ColzResult<BoolSource> {
        let namespace = self.namespace_with(vars);
        let mask = match eval(expression, &EvalOptions::default().with_namespace(&namespace))? {
            EvalResult::Column(column) if column.dtype().is_boolean() => {
                BoolSource::Column(column.into())
            }
            EvalResult::Array(Array::Bool(values)) => BoolSource::from(values),
            EvalResult::Column(column) => colz_bail!(MismatchedTypes: DType::Bool, column.dtype()),
            EvalResult::Array(array) => colz_bail!(MismatchedTypes: DType::Bool, array.dtype()),
            EvalResult::Scalar(s) => {
                colz_bail!("'{expression}' reduced to the scalar {s} instead of a row mask")
            }
        };
        if mask.len() != self.len {
            colz_bail!(
                "'{expression}' selects from {} rows but the table has {}",
                mask.len(),
                self.len
            );
        }
        Ok(mask)
    }

    fn mask_positions(&self, mask: BoolSource) -> ColzResult<Vec<usize>> {
        if mask.len() != self.len {
            colz_bail!(
                "mask of length {} does not match table of length {}",
                mask.len(),
                self.len
            );
        }
        mask.wheretrue(None, 0)?.collect()
    }

    /// Read rows, a column or a projection.
    ///
    /// A name that is not a column is evaluated as a boolean expression over the columns and
    /// selects the rows where it holds.
    pub fn get(&self, key: impl Into<TableKey>) -> ColzResult<TableItem> {
        Ok(match key.into() {
            TableKey::Row(row) => TableItem::Row(self.row_at(self.row_position(row)?)?),
            TableKey::Slice(slice) => {
                slice.indices(self.len)?;
                TableItem::Rows(self.gather(|c| c.slice(slice))?)
            }
            TableKey::Name(name) => match self.cols.get(&name) {
                Some(column) => TableItem::Column(column.clone()),
                None => {
                    let positions = self.mask_positions(self.condition_mask(&name, None)?)?;
                    TableItem::Rows(self.gather(|c| c.take(&positions))?)
                }
            },
            TableKey::Names(names) => TableItem::Table(self.project(&names)?),
            TableKey::Indices(indices) => TableItem::Rows(self.gather(|c| c.take(&indices))?),
            TableKey::Mask(mask) => {
                let positions = self.mask_positions(mask)?;
                TableItem::Rows(self.gather(|c| c.take(&positions))?)
            }
        })
    }

    /// Overwrite the rows selected by `key`.
    ///
    /// `value` is broadcast when it is a single row, and otherwise must hold one row per
    /// selected row. Rows selected by an expression are written in ascending order.
    pub fn set(&mut self, key: impl Into<TableKey>, value: TableValue) -> ColzResult<()> {
        self.check_writable()?;
        let positions = match key.into() {
            TableKey::Row(row) => vec![self.row_position(row)?],
            TableKey::Slice(slice) => slice.indices(self.len)?.positions().collect(),
            TableKey::Name(name) if self.cols.get(&name).is_some() => {
                colz_bail!("cannot assign to column '{name}', use addcol and delcol")
            }
            TableKey::Name(expression) => {
                self.mask_positions(self.condition_mask(&expression, None)?)?
            }
            TableKey::Names(_) => colz_bail!("cannot assign to a projection"),
            TableKey::Indices(indices) => indices,
            TableKey::Mask(mask) => self.mask_positions(mask)?,
        };
        if let Some(&bad) = positions.iter().find(|&&p| p >= self.len) {
            colz_bail!(OutOfBounds: bad, 0, self.len);
        }

        let values = match value {
            TableValue::Row(values) => {
                if values.len() != self.ncols() {
                    colz_bail!(
                        InvariantViolation: "{} values given for {} columns",
                        values.len(),
                        self.ncols()
                    );
                }
                values
                    .iter()
                    .zip(self.cols.columns())
                    .map(|(v, c)| v.cast(&c.dtype()).map(Datum::Scalar))
                    .collect::<ColzResult<Vec<_>>>()?
            }
            TableValue::Rows(rows) => {
                if rows.len() != 1 && rows.len() != positions.len() {
                    colz_bail!(
                        "cannot assign {} rows to {} selected rows",
                        rows.len(),
                        positions.len()
                    );
                }
                self.cols
                    .iter()
                    .map(|(name, column)| {
                        let field = rows
                            .field(name)
                            .ok_or_else(|| colz_err!(InvariantViolation: "rows have no field '{name}'"))?
                            .cast(&column.dtype())?;
                        if rows.len() == 1 {
                            field.scalar_at(0).map(Datum::Scalar)
                        } else {
                            Ok(Datum::Array(field))
                        }
                    })
                    .collect::<ColzResult<Vec<_>>>()?
            }
        };
        for (column, value) in self.cols.columns().zip(&values) {
            column.write().set_indices(&positions, value)?;
        }
        Ok(())
    }

    /// The output fields of a row iteration, with the row type they produce.
    fn output_plan(&self, options: &WhereOptions<'_>) -> ColzResult<(Vec<OutputColumn>, StructDType)> {
        let outcols = match &options.outcols {
            Some(outcols) => outcols.clone(),
            None => self
                .names()
                .iter()
                .map(|n| OutputColumn::Named(n.to_string()))
                .collect(),
        };
        let mut names = Vec::with_capacity(outcols.len());
        let mut dtypes = Vec::with_capacity(outcols.len());
        for outcol in &outcols {
            match outcol {
                OutputColumn::Named(name) => {
                    dtypes.push(self.column_ref(name)?.dtype());
                    names.push(FieldName::from(name.as_str()));
                }
                OutputColumn::RowIndex => {
                    dtypes.push(DType::I64);
                    names.push(FieldName::from(ROW_INDEX));
                }
            }
        }
        if let Some(dup) = names.iter().duplicates().next() {
            colz_bail!(InvariantViolation: "'{dup}' is requested twice");
        }
        Ok((outcols, StructDType::new(names.into(), dtypes)))
    }

    /// Iterate over the rows selected by `condition`.
    ///
    /// Each output field is produced by its own iterator over the selection, and the
    /// iterators are advanced together. `limit` and `skip` count selected rows.
    pub fn where_(
        &self,
        condition: impl Into<Condition>,
        options: &WhereOptions<'_>,
    ) -> ColzResult<RowIter> {
        let mask = match condition.into() {
            Condition::Expr(expression) => self.condition_mask(&expression, options.vars)?,
            Condition::Mask(mask) => BoolSource::from(mask),
            Condition::Column(column) => BoolSource::Column(column),
        };
        if mask.len() != self.len {
            colz_bail!(
                "mask of length {} does not match table of length {}",
                mask.len(),
                self.len
            );
        }
        let (outcols, dtype) = self.output_plan(options)?;
        let producers = outcols
            .iter()
            .map(|outcol| -> ColzResult<Producer> {
                Ok(match outcol {
                    OutputColumn::Named(name) => Box::new(self.column_ref(name)?.where_(
                        mask.clone(),
                        options.limit,
                        options.skip,
                    )?),
                    OutputColumn::RowIndex => Box::new(
                        mask.clone()
                            .wheretrue(options.limit, options.skip)?
                            .map_ok(|pos| Scalar::I64(pos as i64)),
                    ),
                })
            })
            .collect::<ColzResult<Vec<_>>>()?;
        Ok(RowIter::new(dtype.names().clone(), producers))
    }

    /// Iterate over the rows in `slice`.
    pub fn iter(&self, slice: Slice, options: &WhereOptions<'_>) -> ColzResult<RowIter> {
        let indices = slice.indices(self.len)?;
        let (outcols, dtype) = self.output_plan(options)?;
        let producers = outcols
            .iter()
            .map(|outcol| -> ColzResult<Producer> {
                Ok(match outcol {
                    OutputColumn::Named(name) => Box::new(self.column_ref(name)?.iter(
                        slice,
                        options.limit,
                        options.skip,
                    )?),
                    OutputColumn::RowIndex => Box::new(
                        indices
                            .positions()
                            .skip(options.skip)
                            .take(options.limit.unwrap_or(usize::MAX))
                            .map(|pos| ColzResult::Ok(Scalar::I64(pos as i64))),
                    ),
                })
            })
            .collect::<ColzResult<Vec<_>>>()?;
        Ok(RowIter::new(dtype.names().clone(), producers))
    }

    /// The rows of [`Table::where_`], gathered into a new in-memory table.
    ///
    /// A requested row index becomes a stored column that keeps the name `nrow__`.
    pub fn fetchwhere(
        &self,
        condition: impl Into<Condition>,
        options: &WhereOptions<'_>,
    ) -> ColzResult<Self> {
        let (_, dtype) = self.output_plan(options)?;
        let mut builder = StructBuilder::with_capacity(dtype, 0)?;
        for row in self.where_(condition, options)? {
            builder.append_row(&row?)?;
        }
        let rows = builder.finish()?;
        let names = rows.names().to_vec();
        let pending = rows.into_fields().into_iter().map(Pending::Data).collect();
        Self::build(
            names,
            pending,
            TableOptions::default().with_cparams(self.cparams),
        )
    }

    /// The block length used when none is given: the shortest column chunk.
    fn default_blen(&self) -> usize {
        self.cols
            .columns()
            .map(|c| c.read().chunklen())
            .min()
            .unwrap_or(1)
    }

    /// Iterate over rows `start..stop` in blocks of at most `blen` rows.
    pub fn iterblocks(
        &self,
        blen: Option<usize>,
        start: usize,
        stop: Option<usize>,
    ) -> ColzResult<TableBlocks> {
        let blen = blen.unwrap_or_else(|| self.default_blen());
        let columns = self
            .cols
            .columns()
            .map(|c| c.iterblocks(Some(blen), start, stop))
            .collect::<ColzResult<Vec<_>>>()?;
        Ok(TableBlocks::new(self.dtype().names().clone(), columns))
    }

    /// The rows of [`Table::where_`] in blocks of at most `blen` rows.
    pub fn whereblocks(
        &self,
        condition: impl Into<Condition>,
        blen: Option<usize>,
        options: &WhereOptions<'_>,
    ) -> ColzResult<RowBlocks> {
        let (_, dtype) = self.output_plan(options)?;
        let blen = blen.unwrap_or_else(|| self.default_blen());
        RowBlocks::new(self.where_(condition, options)?, dtype, blen)
    }

    /// Evaluate `expression` with the columns in scope.
    ///
    /// Columns shadow variables of the same name in `options.namespace`.
    pub fn eval(&self, expression: &str, options: &EvalOptions<'_>) -> ColzResult<EvalResult> {
        let namespace = self.namespace_with(options.namespace);
        let options = EvalOptions {
            namespace: Some(&namespace),
            locals: options.locals,
            globals: options.globals,
            backend: options.backend,
            out_flavor: options.out_flavor,
            blen: options.blen,
            column: options.column.clone(),
        };
        eval(expression, &options)
    }

    /// Write buffered rows and metadata of a persisted table.
    pub fn flush(&mut self) -> ColzResult<()> {
        for column in self.cols.columns() {
            column.write().flush()?;
        }
        if self.mode.is_writable() {
            self.cols.save()?;
        }
        Ok(())
    }

    /// Delete the persisted directory, leaving an empty in-memory table behind.
    pub fn purge(&mut self) -> ColzResult<()> {
        self.check_writable()?;
        for column in self.cols.columns() {
            column.write().purge()?;
        }
        let root = self.cols.root().map(Path::to_path_buf);
        self.cols = ColumnDirectory::new(None);
        self.len = 0;
        self.dtype = OnceLock::new();
        if let Some(root) = root {
            if root.exists() {
                fs::remove_dir_all(&root)?;
            }
            log::debug!("purged table '{}'", root.display());
        }
        Ok(())
    }

    fn preview(&self) -> ColzResult<String> {
        const EDGE: usize = 3;
        let rows = |range: std::ops::Range<usize>| -> ColzResult<String> {
            Ok(range
                .map(|i| self.row_at(i).map(|row| row.to_string()))
                .collect::<ColzResult<Vec<_>>>()?
                .join(", "))
        };
        if self.len <= 2 * EDGE {
            return Ok(format!("[{}]", rows(0..self.len)?));
        }
        Ok(format!(
            "[{}, ..., {}]",
            rows(0..EDGE)?,
            rows(self.len - EDGE..self.len)?
        ))
    }
}

impl Display for Table {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let ratio = if self.cbytes() == 0 {
            0.0
        } else {
            self.nbytes() as f64 / self.cbytes() as f64
        };
        writeln!(f, "ctable(({},), {})", self.len, DType::Struct(self.dtype().clone()))?;
        writeln!(
            f,
            "  nbytes: {}; cbytes: {}; ratio: {ratio:.2}",
            self.nbytes(),
            self.cbytes()
        )?;
        writeln!(f, "  {}", self.cparams)?;
        if let Some(root) = self.root() {
            writeln!(f, "  rootdir := '{}'", root.display())?;
        }
        write!(f, "{}", self.preview().map_err(|_| std::fmt::Error)?)
    }
}

#[cfg(test)]
mod test {
    use colz_dtype::PType;
    use colz_error::ColzError;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    use super::*;

    #[fixture]
    fn table() -> Table {
        Table::new(
            ColumnSource::Arrays(vec![
                (0..10i64).collect(),
                (0..10).map(|v| v as f64 * 0.5).collect(),
            ]),
            TableOptions::default().with_chunklen(4),
        )
        .unwrap()
    }

    fn values(rows: &StructArray, name: &str) -> Vec<Scalar> {
        rows.field(name).unwrap().scalars().collect()
    }

    #[rstest]
    fn default_names_and_dtype(table: Table) {
        assert_eq!(table.names(), [FieldName::from("f0"), "f1".into()]);
        assert_eq!(
            table.dtype().dtypes(),
            [DType::I64, DType::Primitive(PType::F64)]
        );
        assert_eq!(table.len(), 10);
    }

    #[rstest]
    #[case(vec!["a", "a"])]
    #[case(vec!["a", ""])]
    #[case(vec!["a", "nrow__"])]
    #[case(vec!["a", "x/y"])]
    #[case(vec!["a"])]
    fn rejects_bad_names(#[case] names: Vec<&str>) {
        let result = Table::new(
            ColumnSource::Arrays(vec![Array::from(vec![1i32]), Array::from(vec![2i32])]),
            TableOptions::default().with_names(names),
        );
        assert!(matches!(result, Err(ColzError::InvariantViolation(..))));
    }

    #[test]
    fn rejects_ragged_columns() {
        let result = Table::new(
            ColumnSource::Arrays(vec![Array::from(vec![1i32, 2]), Array::from(vec![2i32])]),
            TableOptions::default(),
        );
        assert!(matches!(result, Err(ColzError::InvariantViolation(..))));
    }

    #[test]
    fn structured_source_names() {
        let rows = StructArray::from_fields([
            ("x", Array::from(vec![1i32, 2])),
            ("y", Array::from(vec![true, false])),
        ])
        .unwrap();
        let table = Table::new(ColumnSource::Structured(rows), TableOptions::default()).unwrap();
        assert_eq!(table.names(), [FieldName::from("x"), "y".into()]);
        let row = table.get(-1i64).unwrap().into_row().unwrap();
        assert_eq!(row.values(), [Scalar::I32(2), Scalar::Bool(false)]);
    }

    #[test]
    fn shares_handles_in_memory() {
        let column = ColumnRef::new(Column::new(&Array::from(vec![1i64, 2]), ColumnOptions::default()).unwrap());
        let table = Table::new(
            ColumnSource::Columns(vec![column.clone()]),
            TableOptions::default(),
        )
        .unwrap();
        assert!(table.column("f0").unwrap().ptr_eq(&column));
    }

    #[rstest]
    fn append_validates_before_writing(mut table: Table) {
        let bad = RowsSource::Columns(vec![
            Array::from(vec![1i64, 2]).into(),
            Array::from(vec![1.0f64]).into(),
        ]);
        assert!(table.append(bad).is_err());
        assert_eq!(table.column("f0").unwrap().len(), 10);

        let len = table
            .append(RowsSource::Columns(vec![
                Scalar::I64(10).into(),
                Scalar::F64(5.0).into(),
            ]))
            .unwrap();
        assert_eq!(len, 11);
        let row = table.get(10i64).unwrap().into_row().unwrap();
        assert_eq!(row.values(), [Scalar::I64(10), Scalar::F64(5.0)]);
    }

    #[rstest]
    fn append_structured_matches_by_name(mut table: Table) {
        let rows = StructArray::from_fields([
            ("f1", Array::from(vec![9.0f64])),
            ("f0", Array::from(vec![9i32])),
        ])
        .unwrap();
        table.append(RowsSource::Structured(&rows)).unwrap();
        let row = table.get(-1i64).unwrap().into_row().unwrap();
        assert_eq!(row.values(), [Scalar::I64(9), Scalar::F64(9.0)]);
    }

    #[rstest]
    fn trim_and_resize(mut table: Table) {
        table.trim(3).unwrap();
        assert_eq!(table.len(), 7);
        assert!(table.trim(8).is_err());
        table.resize(9).unwrap();
        assert_eq!(table.len(), 9);
        for column in table.columns().values() {
            assert!(matches!(column, crate::Operand::Column(c) if c.len() == 9));
        }
        table.trim(9).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.names().len(), 2);
    }

    #[rstest]
    fn projection_is_read_only(table: Table) {
        let mut view = table
            .get(TableKey::Names(vec!["f0".into()]))
            .unwrap()
            .into_table()
            .unwrap();
        assert!(matches!(
            view.append(RowsSource::Columns(vec![Scalar::I64(9).into()])),
            Err(ColzError::ModeViolation(..))
        ));
        assert!(matches!(view.trim(1), Err(ColzError::ModeViolation(..))));
        assert!(matches!(view.resize(20), Err(ColzError::ModeViolation(..))));
        for name in table.names() {
            assert_eq!(table.column(name).unwrap().len(), table.len());
        }
    }

    #[rstest]
    fn rejects_repeated_handles(mut table: Table) {
        let f0 = table.column("f0").unwrap();
        assert!(matches!(
            table.addcol(f0.clone(), Some("g"), None, None),
            Err(ColzError::InvariantViolation(..))
        ));
        assert_eq!(table.ncols(), 2);
        table
            .append(RowsSource::Columns(vec![
                Scalar::I64(10).into(),
                Scalar::F64(5.0).into(),
            ]))
            .unwrap();
        assert_eq!(f0.len(), 11);

        assert!(matches!(
            Table::new(
                ColumnSource::Columns(vec![f0.clone(), f0.clone()]),
                TableOptions::default(),
            ),
            Err(ColzError::InvariantViolation(..))
        ));
        // A persisted table stores its own copies.
        let dir = TempDir::new().unwrap();
        let copied = Table::new(
            ColumnSource::Columns(vec![f0.clone(), f0]),
            TableOptions::default().with_root(dir.path().join("t")),
        )
        .unwrap();
        assert_eq!(copied.len(), 11);
    }

    #[rstest]
    fn addcol_and_delcol(mut table: Table) {
        let dtype = table.dtype().clone();
        table
            .addcol(Array::from(vec![0u8; 10]), Some("flag"), Some(0), None)
            .unwrap();
        assert_eq!(table.names()[0].as_ref(), "flag");
        assert!(
            table
                .addcol(Array::from(vec![0u8; 3]), Some("short"), None, None)
                .is_err()
        );
        assert!(
            table
                .addcol(Array::from(vec![0u8; 10]), Some("flag"), None, None)
                .is_err()
        );
        assert!(
            table
                .addcol(Array::from(vec![0u8; 10]), None, Some(9), None)
                .is_err()
        );
        table.addcol(Array::from(vec![1i16; 10]), None, None, None).unwrap();
        assert_eq!(table.names()[3].as_ref(), "f3");

        table.delcol("flag").unwrap();
        table.delcol(2usize).unwrap();
        assert_eq!(table.dtype(), &dtype);
        assert!(table.delcol("flag").is_err());
    }

    #[rstest]
    fn getitem_variants(table: Table) {
        let rows = table.get(Slice::new(2, 8).with_step(3)).unwrap().into_rows().unwrap();
        assert_eq!(values(&rows, "f0"), [Scalar::I64(2), Scalar::I64(5)]);

        let rows = table.get("f0 > 6").unwrap().into_rows().unwrap();
        assert_eq!(values(&rows, "f1"), [Scalar::F64(3.5), Scalar::F64(4.0), Scalar::F64(4.5)]);

        assert!(table.get("f1").unwrap().into_column().is_some());
        assert!(table.get("f0 + 1").is_err());

        let projected = table
            .get(TableKey::Names(vec!["f1".into(), "f0".into()]))
            .unwrap()
            .into_table()
            .unwrap();
        assert_eq!(projected.names(), [FieldName::from("f1"), "f0".into()]);

        let rows = table.get(TableKey::Indices(vec![9, 0])).unwrap().into_rows().unwrap();
        assert_eq!(values(&rows, "f0"), [Scalar::I64(9), Scalar::I64(0)]);

        let mask = (0..10).map(|i| i % 4 == 0).collect::<Vec<_>>();
        let rows = table.get(TableKey::Mask(mask.into())).unwrap().into_rows().unwrap();
        assert_eq!(rows.len(), 3);

        let empty = table.get(Slice::new(0, 0)).unwrap().into_rows().unwrap();
        assert!(empty.is_empty());
        assert_eq!(&empty.struct_dtype(), table.dtype());
        assert!(table.get(Slice::full().with_step(-1)).is_err());
        assert!(table.get(10i64).is_err());
    }

    #[rstest]
    fn conditional_assignment(mut table: Table) {
        table
            .set("f0 >= 8", TableValue::Row(vec![Scalar::I64(-1), Scalar::F64(0.0)]))
            .unwrap();
        let rows = table.get(Slice::new(7, 10)).unwrap().into_rows().unwrap();
        assert_eq!(values(&rows, "f0"), [Scalar::I64(7), Scalar::I64(-1), Scalar::I64(-1)]);

        let replacement = StructArray::from_fields([
            ("f0", Array::from(vec![100i64, 200])),
            ("f1", Array::from(vec![1.0f64, 2.0])),
        ])
        .unwrap();
        table.set("f0 < 0", TableValue::Rows(replacement.clone())).unwrap();
        let rows = table.get(Slice::new(8, 10)).unwrap().into_rows().unwrap();
        assert_eq!(values(&rows, "f0"), [Scalar::I64(100), Scalar::I64(200)]);

        assert!(table.set("f0 < 5", TableValue::Rows(replacement)).is_err());
        assert!(table.set("f0", TableValue::Row(vec![])).is_err());
    }

    #[rstest]
    fn where_with_row_index(table: Table) {
        let options = WhereOptions::default()
            .with_outcols(["nrow__", "f1"])
            .with_skip(1)
            .with_limit(2);
        let rows = table
            .where_("(f0 > 2) & (f0 < 9)", &options)
            .unwrap()
            .collect::<ColzResult<Vec<_>>>()
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].values(), [Scalar::I64(4), Scalar::F64(2.0)]);
        assert_eq!(rows[1].get(ROW_INDEX), Some(&Scalar::I64(5)));
    }

    #[rstest]
    fn where_uses_extra_vars(table: Table) {
        let vars = Namespace::from([
            ("cut".to_string(), crate::Operand::Scalar(Scalar::I64(7))),
            ("f0".to_string(), crate::Operand::Scalar(Scalar::I64(0))),
        ]);
        let options = WhereOptions::default().with_vars(&vars).with_outcols(["f0"]);
        let count = table.where_("f0 > cut", &options).unwrap().count();
        assert_eq!(count, 2);
        assert!(table.where_("f0 + 1", &WhereOptions::default()).is_err());
    }

    #[rstest]
    fn iter_and_blocks(table: Table) {
        let options = WhereOptions::default().with_outcols(["f0", "nrow__"]);
        let rows = table
            .iter(Slice::new(1, 9).with_step(3), &options)
            .unwrap()
            .collect::<ColzResult<Vec<_>>>()
            .unwrap();
        let firsts = rows.iter().map(|r| r.values()[1]).collect::<Vec<_>>();
        assert_eq!(firsts, [Scalar::I64(1), Scalar::I64(4), Scalar::I64(7)]);

        let lens = table
            .iterblocks(Some(4), 1, None)
            .unwrap()
            .map(|b| b.map(|b| b.len()))
            .collect::<ColzResult<Vec<_>>>()
            .unwrap();
        assert_eq!(lens, [4, 4, 1]);

        let lens = table
            .whereblocks("f0 % 2 == 0", Some(2), &WhereOptions::default())
            .unwrap()
            .map(|b| b.map(|b| b.len()))
            .collect::<ColzResult<Vec<_>>>()
            .unwrap();
        assert_eq!(lens, [2, 2, 1]);
    }

    #[rstest]
    fn fetchwhere_builds_table(table: Table) {
        let fetched = table
            .fetchwhere("f1 >= 4", &WhereOptions::default().with_outcols(["nrow__", "f1"]))
            .unwrap();
        assert_eq!(fetched.len(), 2);
        assert_eq!(fetched.names(), [FieldName::from(ROW_INDEX), "f1".into()]);
    }

    #[rstest]
    fn eval_sees_columns(table: Table) {
        let result = table
            .eval("sum(f0 * 2)", &EvalOptions::default())
            .unwrap();
        assert_eq!(result.as_scalar(), Some(Scalar::I64(90)));
    }

    #[test]
    fn persists_and_reopens() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("t");
        let mut table = Table::new(
            ColumnSource::Arrays(vec![(0..100i32).collect(), (0..100u16).collect()]),
            TableOptions::default()
                .with_names(["a", "b"])
                .with_root(&root)
                .with_chunklen(16),
        )
        .unwrap();
        table.addcol(Array::from(vec![1.5f32; 100]), Some("c"), Some(1), None).unwrap();
        table.delcol("b").unwrap();
        assert!(!root.join("b").exists());
        table.flush().unwrap();

        let reopened = Table::open(&root, OpenMode::Read).unwrap();
        assert_eq!(reopened.names(), table.names());
        assert_eq!(reopened.len(), 100);
        assert_eq!(
            reopened.get(42i64).unwrap().into_row().unwrap(),
            table.get(42i64).unwrap().into_row().unwrap()
        );
        let mut reopened = reopened;
        assert!(matches!(
            reopened.trim(1),
            Err(ColzError::ModeViolation(..))
        ));

        assert!(matches!(
            Table::new(
                ColumnSource::Arrays(vec![Array::from(vec![1i32])]),
                TableOptions::default().with_root(&root),
            ),
            Err(ColzError::PersistenceConflict(..))
        ));
        assert!(matches!(
            table.copy(TableOptions::default().with_root(&root)),
            Err(ColzError::PersistenceConflict(..))
        ));
        let copy = table
            .copy(TableOptions::default().with_root(dir.path().join("copy")))
            .unwrap();
        assert_eq!(copy.len(), 100);
        assert!(is_table_dir(&dir.path().join("copy")));

        table.purge().unwrap();
        assert!(!root.exists());
    }

    #[test]
    fn copy_rejects_overlapping_roots() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("x")).unwrap();
        let root = dir.path().join("t");
        let table = Table::new(
            ColumnSource::Arrays(vec![(0..5i64).collect()]),
            TableOptions::default().with_root(&root).with_chunklen(1),
        )
        .unwrap();
        for dest in [
            dir.path().join("x").join("..").join("t"),
            dir.path().join("y").join("..").join("t"),
            dir.path().to_path_buf(),
            root.join("f0").join("inner"),
        ] {
            assert!(
                matches!(
                    table.copy(TableOptions::default().with_root(&dest).with_mode(OpenMode::Write)),
                    Err(ColzError::PersistenceConflict(..))
                ),
                "{}",
                dest.display()
            );
        }
        assert!(is_table_dir(&root));
        assert_eq!(
            table.get(4i64).unwrap().into_row().unwrap().values(),
            [Scalar::I64(4)]
        );
    }

    #[test]
    fn new_rejects_root_over_shared_column() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("c");
        let column = ColumnRef::new(
            Column::new(
                &Array::from(vec![1i64, 2]),
                ColumnOptions::default().with_root(&source),
            )
            .unwrap(),
        );
        for dest in [dir.path().join(".").join("c"), dir.path().to_path_buf()] {
            assert!(matches!(
                Table::new(
                    ColumnSource::Columns(vec![column.clone()]),
                    TableOptions::default().with_root(&dest).with_mode(OpenMode::Write),
                ),
                Err(ColzError::PersistenceConflict(..))
            ));
        }
        assert_eq!(
            column.read().read_range(0, 2).unwrap(),
            Array::from(vec![1i64, 2])
        );
    }

    #[rstest]
    fn display_summary(table: Table) {
        let shown = table.to_string();
        assert!(shown.starts_with("ctable((10,), {f0=i64, f1=f64})"));
        assert!(shown.ends_with("[(0, 0), (1, 0.5), (2, 1), ..., (7, 3.5), (8, 4), (9, 4.5)]"));
    }
}
