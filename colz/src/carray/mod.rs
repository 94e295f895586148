//! The compressed column.
//!
//! Values are stored in fixed-length chunks compressed with a byte shuffle and bzip2. A column
//! is either held in memory or persisted under a root directory:
//!
//! ```text
//! <root>/meta/storage   dtype, chunk length, compression, default value (JSON)
//! <root>/meta/sizes     length, nbytes, cbytes (JSON)
//! <root>/data/__<i>.blp one file per chunk
//! ```

pub use column::Column;
pub(crate) use column::{check_overlap, is_column_dir, mask_positions, prepare_root};
pub use iter::*;
pub use options::*;

mod chunk;
mod codec;
mod column;
mod iter;
mod options;
