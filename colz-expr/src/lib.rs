//! Expressions over colz arrays.
//!
//! An expression string is parsed once into an [`Expr`] tree. It can then be evaluated directly
//! with [`evaluate`], resolving names lazily through a [`Bindings`], or compiled into a
//! [`Program`] whose inputs are bound up front and which runs over large operands in
//! sub-blocks.

pub use ast::*;
pub use interpret::*;
pub use parser::parse;
pub use program::*;

mod ast;
mod interpret;
mod lexer;
mod ops;
mod parser;
mod program;
