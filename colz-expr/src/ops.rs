use colz_array::compute::{
    arctan2, binary_boolean, binary_numeric, compare, invert, logical, logical_not, negate, select,
    sum, unary_fn,
};
use colz_array::Datum;
use colz_error::{ColzResult, colz_bail};

use crate::ast::{BinaryOp, Function, UnaryOp};

pub(crate) fn apply_unary(op: UnaryOp, operand: &Datum) -> ColzResult<Datum> {
    match op {
        UnaryOp::Neg => negate(operand),
        UnaryOp::Invert => invert(operand),
        UnaryOp::Not => logical_not(operand),
    }
}

pub(crate) fn apply_binary(op: BinaryOp, lhs: &Datum, rhs: &Datum) -> ColzResult<Datum> {
    match op {
        BinaryOp::Numeric(op) => binary_numeric(lhs, rhs, op),
        BinaryOp::Compare(op) => compare(lhs, rhs, op),
        BinaryOp::Boolean(op) => binary_boolean(lhs, rhs, op),
        BinaryOp::Logical(op) => logical(lhs, rhs, op),
    }
}

pub(crate) fn apply_call(func: Function, args: &[&Datum]) -> ColzResult<Datum> {
    match (func, args) {
        (Function::Sum, [arg]) => Ok(Datum::Scalar(sum(arg)?)),
        (Function::Unary(f), [arg]) => unary_fn(arg, f),
        (Function::Arctan2, [y, x]) => arctan2(y, x),
        (Function::Where, [cond, then, otherwise]) => select(cond, then, otherwise),
        _ => colz_bail!(
            ExpressionError: "{func}() takes {} arguments but {} were given",
            func.arity(),
            args.len()
        ),
    }
}

/// `then if cond else otherwise`: a scalar condition picks a whole branch, an array condition
/// picks per element.
pub(crate) fn conditional(cond: &Datum, then: Datum, otherwise: Datum) -> ColzResult<Datum> {
    match cond {
        Datum::Scalar(c) => Ok(if c.is_truthy() { then } else { otherwise }),
        Datum::Array(_) => select(cond, &then, &otherwise),
    }
}
