//! Tables of equal-length named columns.
//!
//! A persisted table is a directory holding one column directory per column plus a
//! `__rootdirs__` record with the column names in order:
//!
//! ```text
//! <root>/
//!   __rootdirs__          {"names": [...], "dirs": {name: relative path}}
//!   <name>/meta/...       one column directory per column
//!   <name>/data/...
//! ```

pub use iter::{RowBlocks, RowIter, TableBlocks};
pub use source::*;
pub use table::{Table, TableOptions};

pub(crate) use cols::is_table_dir;

mod cols;
mod iter;
mod source;
mod table;

/// The pseudo-column yielding row positions instead of stored values.
pub const ROW_INDEX: &str = "nrow__";
