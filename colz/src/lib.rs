//! Compressed, chunked columns and tables.
//!
//! A [`Column`] stores fixed-width values as independently compressed chunks, in memory or
//! under a directory. A [`Table`] groups equal-length columns under names and adds row access,
//! structural mutation and predicate-driven iteration. [`eval()`] computes expressions over
//! columns block by block, [`fromiter()`] fills a column or table from an iterator and
//! [`walk()`] discovers persisted objects below a directory.
//!
//! Process-wide settings (thread count, evaluator backend, output flavor and default
//! compression) live in a single [`Config`].

pub use carray::{
    BoolSource, ChunkIter, Column, ColumnIter, ColumnOptions, ColumnRef, CompressionParams,
    OpenMode, WhereIter, WhereTrue,
};
pub use config::*;
pub use ctable::{
    ColumnData, ColumnId, ColumnSource, Condition, NewColumn, OutputColumn, ROW_INDEX, RowBlocks,
    RowIter, RowsSource, Table, TableBlocks, TableItem, TableKey, TableOptions, TableValue,
    WhereOptions,
};
pub use eval::{Backend, EvalOptions, EvalResult, Namespace, Operand, OutFlavor, eval};
pub use fromiter::*;
pub use slice::*;
pub use walk::*;

pub mod carray;
mod config;
pub mod ctable;
pub mod eval;
mod fromiter;
mod slice;
mod walk;
