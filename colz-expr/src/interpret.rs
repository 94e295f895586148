use std::borrow::{Borrow, Cow};
use std::collections::HashMap;
use std::hash::{BuildHasher, Hash};

use colz_array::compute::LogicalOp;
use colz_array::{Datum, Scalar};
use colz_error::{ColzResult, colz_err};

use crate::ast::{BinaryOp, Expr};
use crate::ops::{apply_binary, apply_call, apply_unary, conditional};

/// Resolves variable names to operands while an expression is evaluated.
pub trait Bindings {
    fn lookup(&self, name: &str) -> Option<&Datum>;
}

impl<K, S> Bindings for HashMap<K, Datum, S>
where
    K: Borrow<str> + Hash + Eq,
    S: BuildHasher,
{
    fn lookup(&self, name: &str) -> Option<&Datum> {
        self.get(name)
    }
}

/// Bindings with no names at all.
pub struct NoBindings;

impl Bindings for NoBindings {
    fn lookup(&self, _name: &str) -> Option<&Datum> {
        None
    }
}

/// Evaluate `expr` by walking the tree.
///
/// Names are resolved only when reached, so a branch skipped by `and`, `or` or a conditional
/// with a scalar deciding operand may reference unbound names.
pub fn evaluate(expr: &Expr, bindings: &dyn Bindings) -> ColzResult<Datum> {
    eval(expr, bindings).map(Cow::into_owned)
}

fn eval<'a>(expr: &Expr, bindings: &'a dyn Bindings) -> ColzResult<Cow<'a, Datum>> {
    Ok(match expr {
        Expr::Literal(s) => Cow::Owned(Datum::Scalar(*s)),
        Expr::Ident(name) => Cow::Borrowed(
            bindings
                .lookup(name)
                .ok_or_else(|| colz_err!(UnboundVariable: "name '{name}' is not defined"))?,
        ),
        Expr::Unary(op, operand) => Cow::Owned(apply_unary(*op, &*eval(operand, bindings)?)?),
        Expr::Binary(BinaryOp::Logical(op), lhs, rhs) => {
            let lhs = eval(lhs, bindings)?;
            if let Datum::Scalar(l) = lhs.as_ref() {
                match (op, l.is_truthy()) {
                    (LogicalOp::And, false) => return Ok(Cow::Owned(Scalar::Bool(false).into())),
                    (LogicalOp::Or, true) => return Ok(Cow::Owned(Scalar::Bool(true).into())),
                    _ => {}
                }
            }
            let rhs = eval(rhs, bindings)?;
            Cow::Owned(apply_binary(BinaryOp::Logical(*op), &lhs, &rhs)?)
        }
        Expr::Binary(op, lhs, rhs) => {
            let lhs = eval(lhs, bindings)?;
            let rhs = eval(rhs, bindings)?;
            Cow::Owned(apply_binary(*op, &lhs, &rhs)?)
        }
        Expr::Call(func, args) => {
            let args = args
                .iter()
                .map(|a| eval(a, bindings))
                .collect::<ColzResult<Vec<_>>>()?;
            let args = args.iter().map(Cow::as_ref).collect::<Vec<_>>();
            Cow::Owned(apply_call(*func, &args)?)
        }
        Expr::Conditional {
            cond,
            then,
            otherwise,
        } => {
            let cond = eval(cond, bindings)?;
            if let Datum::Scalar(c) = cond.as_ref() {
                return if c.is_truthy() {
                    eval(then, bindings)
                } else {
                    eval(otherwise, bindings)
                };
            }
            let then = eval(then, bindings)?.into_owned();
            let otherwise = eval(otherwise, bindings)?.into_owned();
            Cow::Owned(conditional(&cond, then, otherwise)?)
        }
    })
}
