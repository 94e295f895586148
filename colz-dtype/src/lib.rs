//! A type system for colz
//!
//! This crate contains the logical types of the elements stored in colz columns, and of the
//! rows of a table (a struct of named columns).

pub use dtype::*;
pub use ptype::*;
pub use struct_::*;

mod dtype;
mod ptype;
mod struct_;
