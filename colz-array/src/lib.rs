//! In-memory arrays for colz.
//!
//! An [`Array`] is a decompressed run of fixed-width values, the unit columns hand to callers
//! and the expression engine computes over. [`StructArray`] groups equal-length arrays into
//! rows, and the [`compute`] module holds the vectorized kernels.

pub use array::*;
pub use builder::*;
pub use datum::*;
pub use element::*;
pub use row::*;
pub use scalar::*;
pub use struct_::*;

mod array;
mod builder;
pub mod compute;
mod datum;
mod element;
mod row;
mod scalar;
mod struct_;
