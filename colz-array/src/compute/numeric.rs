use std::fmt::{Display, Formatter};

use colz_error::{ColzResult, colz_bail};

use crate::Datum;
use crate::compute::{Domain, floats, ints, map_binary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericOp {
    Add,
    Sub,
    Mul,
    /// True division, always producing floats
    Div,
    /// Division rounded towards negative infinity
    FloorDiv,
    /// Remainder with the sign of the divisor
    Rem,
    Pow,
}

impl Display for NumericOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let display = match self {
            NumericOp::Add => "+",
            NumericOp::Sub => "-",
            NumericOp::Mul => "*",
            NumericOp::Div => "/",
            NumericOp::FloorDiv => "//",
            NumericOp::Rem => "%",
            NumericOp::Pow => "**",
        };
        Display::fmt(display, f)
    }
}

/// Point-wise arithmetic between two broadcast operands.
///
/// Integer division and remainder by zero yield `0`; float division by zero follows IEEE 754.
pub fn binary_numeric(lhs: &Datum, rhs: &Datum, op: NumericOp) -> ColzResult<Datum> {
    if op == NumericOp::Div || Domain::common(lhs, rhs) == Domain::Float {
        let (l, r) = (floats(lhs), floats(rhs));
        return map_binary(&l, &r, |a, b| Ok(float_op(a, b, op)));
    }
    let (l, r) = (ints(lhs), ints(rhs));
    map_binary(&l, &r, |a, b| int_op(a, b, op))
}

fn float_op(a: f64, b: f64, op: NumericOp) -> f64 {
    match op {
        NumericOp::Add => a + b,
        NumericOp::Sub => a - b,
        NumericOp::Mul => a * b,
        NumericOp::Div => a / b,
        NumericOp::FloorDiv => (a / b).floor(),
        NumericOp::Rem => {
            let r = a % b;
            if r != 0.0 && (r < 0.0) != (b < 0.0) {
                r + b
            } else {
                r
            }
        }
        NumericOp::Pow => a.powf(b),
    }
}

fn int_op(a: i64, b: i64, op: NumericOp) -> ColzResult<i64> {
    Ok(match op {
        NumericOp::Add => a.wrapping_add(b),
        NumericOp::Sub => a.wrapping_sub(b),
        NumericOp::Mul => a.wrapping_mul(b),
        NumericOp::Div | NumericOp::FloorDiv => {
            if b == 0 {
                0
            } else {
                let q = a.wrapping_div(b);
                if a.wrapping_rem(b) != 0 && (a < 0) != (b < 0) {
                    q - 1
                } else {
                    q
                }
            }
        }
        NumericOp::Rem => {
            if b == 0 {
                0
            } else {
                let r = a.wrapping_rem(b);
                if r != 0 && (r < 0) != (b < 0) {
                    r + b
                } else {
                    r
                }
            }
        }
        NumericOp::Pow => {
            if b < 0 {
                colz_bail!("integers to negative integer powers are not allowed");
            }
            a.wrapping_pow(u32::try_from(b).unwrap_or(u32::MAX))
        }
    })
}

#[cfg(test)]
mod test {
    use rstest::rstest;

    use super::*;
    use crate::{Array, Scalar};

    #[rstest]
    #[case(NumericOp::FloorDiv, 7, 2, 3)]
    #[case(NumericOp::FloorDiv, -7, 2, -4)]
    #[case(NumericOp::Rem, -7, 3, 2)]
    #[case(NumericOp::Rem, 7, -3, -2)]
    #[case(NumericOp::Rem, 5, 0, 0)]
    #[case(NumericOp::Pow, 3, 4, 81)]
    fn integer_semantics(#[case] op: NumericOp, #[case] a: i64, #[case] b: i64, #[case] out: i64) {
        let result = binary_numeric(&Scalar::I64(a).into(), &Scalar::I64(b).into(), op).unwrap();
        assert_eq!(result, Datum::Scalar(Scalar::I64(out)));
    }

    #[test]
    fn true_division_promotes() {
        let result = binary_numeric(
            &Array::from(vec![1i32, 3]).into(),
            &Scalar::I64(2).into(),
            NumericOp::Div,
        )
        .unwrap();
        assert_eq!(result, Datum::Array(Array::from(vec![0.5f64, 1.5])));
    }

    #[test]
    fn mixed_types_promote_to_float() {
        let result = binary_numeric(
            &Array::from(vec![1u8, 2]).into(),
            &Array::from(vec![0.5f32, 0.25]).into(),
            NumericOp::Add,
        )
        .unwrap();
        assert_eq!(result, Datum::Array(Array::from(vec![1.5f64, 2.25])));
    }

    #[test]
    fn bools_add_as_integers() {
        let result = binary_numeric(
            &Array::from(vec![true, false]).into(),
            &Scalar::Bool(true).into(),
            NumericOp::Add,
        )
        .unwrap();
        assert_eq!(result, Datum::Array(Array::from(vec![2i64, 1])));
    }

    #[test]
    fn rejects_bad_broadcast_and_negative_power() {
        assert!(
            binary_numeric(
                &Array::from(vec![1i64, 2]).into(),
                &Array::from(vec![1i64]).into(),
                NumericOp::Mul,
            )
            .is_err()
        );
        assert!(
            binary_numeric(&Scalar::I64(2).into(), &Scalar::I64(-1).into(), NumericOp::Pow)
                .is_err()
        );
    }
}
