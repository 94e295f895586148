use std::fmt::{Display, Formatter};

use colz_dtype::DType;
use colz_error::{ColzResult, colz_bail};

use crate::Datum;
use crate::compute::{ints, map_binary, map_unary, truths};

/// Bitwise operators: logical on booleans, bitwise on integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BooleanOp {
    And,
    Or,
    Xor,
}

impl Display for BooleanOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let display = match self {
            BooleanOp::And => "&",
            BooleanOp::Or => "|",
            BooleanOp::Xor => "^",
        };
        Display::fmt(display, f)
    }
}

/// The `and` / `or` keywords, combining the truthiness of their operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalOp {
    And,
    Or,
}

impl Display for LogicalOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LogicalOp::And => write!(f, "and"),
            LogicalOp::Or => write!(f, "or"),
        }
    }
}

fn check_not_float(datum: &Datum, what: &str) -> ColzResult<()> {
    if datum.dtype().is_float() {
        colz_bail!(
            MismatchedTypes: "boolean or integer",
            format!("{} in '{what}'", datum.dtype())
        );
    }
    Ok(())
}

/// Point-wise `&`, `|` or `^`.
///
/// Two boolean operands produce booleans; any integer operand makes the operation bitwise over
/// `i64`. Floats are rejected.
pub fn binary_boolean(lhs: &Datum, rhs: &Datum, op: BooleanOp) -> ColzResult<Datum> {
    check_not_float(lhs, &op.to_string())?;
    check_not_float(rhs, &op.to_string())?;
    if lhs.dtype() == DType::Bool && rhs.dtype() == DType::Bool {
        let (l, r) = (truths(lhs), truths(rhs));
        return map_binary(&l, &r, |a, b| {
            Ok(match op {
                BooleanOp::And => a & b,
                BooleanOp::Or => a | b,
                BooleanOp::Xor => a ^ b,
            })
        });
    }
    let (l, r) = (ints(lhs), ints(rhs));
    map_binary(&l, &r, |a, b| {
        Ok(match op {
            BooleanOp::And => a & b,
            BooleanOp::Or => a | b,
            BooleanOp::Xor => a ^ b,
        })
    })
}

/// Point-wise `and` / `or` on truthiness, producing booleans.
pub fn logical(lhs: &Datum, rhs: &Datum, op: LogicalOp) -> ColzResult<Datum> {
    let (l, r) = (truths(lhs), truths(rhs));
    map_binary(&l, &r, |a, b| {
        Ok(match op {
            LogicalOp::And => a && b,
            LogicalOp::Or => a || b,
        })
    })
}

/// Point-wise `~`: logical negation of booleans, bitwise complement of integers.
pub fn invert(datum: &Datum) -> ColzResult<Datum> {
    check_not_float(datum, "~")?;
    if datum.dtype() == DType::Bool {
        return map_unary(&truths(datum), |a| Ok(!a));
    }
    map_unary(&ints(datum), |a| Ok(!a))
}

/// Point-wise `not`, producing booleans.
pub fn logical_not(datum: &Datum) -> ColzResult<Datum> {
    map_unary(&truths(datum), |a| Ok(!a))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{Array, Scalar};

    #[test]
    fn bools_stay_bool() {
        let result = binary_boolean(
            &Array::from(vec![true, true, false]).into(),
            &Array::from(vec![true, false, false]).into(),
            BooleanOp::Xor,
        )
        .unwrap();
        assert_eq!(result, Datum::Array(Array::from(vec![false, true, false])));
    }

    #[test]
    fn integers_are_bitwise() {
        let result = binary_boolean(
            &Array::from(vec![6i32, 5]).into(),
            &Scalar::I64(3).into(),
            BooleanOp::And,
        )
        .unwrap();
        assert_eq!(result, Datum::Array(Array::from(vec![2i64, 1])));
        assert_eq!(
            invert(&Scalar::I32(0).into()).unwrap(),
            Datum::Scalar(Scalar::I64(-1))
        );
    }

    #[test]
    fn floats_rejected() {
        assert!(
            binary_boolean(&Scalar::F64(1.0).into(), &Scalar::Bool(true).into(), BooleanOp::Or)
                .is_err()
        );
        assert!(invert(&Array::from(vec![1.0f32]).into()).is_err());
    }

    #[test]
    fn logical_uses_truthiness() {
        let result = logical(
            &Array::from(vec![0.0f64, 2.0]).into(),
            &Scalar::I64(7).into(),
            LogicalOp::And,
        )
        .unwrap();
        assert_eq!(result, Datum::Array(Array::from(vec![false, true])));
        assert_eq!(
            logical_not(&Array::from(vec![0u8, 1]).into()).unwrap(),
            Datum::Array(Array::from(vec![true, false]))
        );
    }
}
