use core::fmt;
use std::fmt::{Display, Formatter};

use colz_error::ColzResult;

use crate::Datum;
use crate::compute::{Domain, floats, ints, map_binary};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Operator {
    Eq,
    NotEq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Display for Operator {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let display = match &self {
            Operator::Eq => "==",
            Operator::NotEq => "!=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
        };
        Display::fmt(display, f)
    }
}

impl Operator {
    pub fn inverse(self) -> Self {
        match self {
            Operator::Eq => Operator::NotEq,
            Operator::NotEq => Operator::Eq,
            Operator::Gt => Operator::Lte,
            Operator::Gte => Operator::Lt,
            Operator::Lt => Operator::Gte,
            Operator::Lte => Operator::Gt,
        }
    }

    pub fn to_fn<T: PartialEq + PartialOrd>(&self) -> fn(T, T) -> bool {
        match self {
            Operator::Eq => |l, r| l == r,
            Operator::NotEq => |l, r| l != r,
            Operator::Gt => |l, r| l > r,
            Operator::Gte => |l, r| l >= r,
            Operator::Lt => |l, r| l < r,
            Operator::Lte => |l, r| l <= r,
        }
    }
}

/// Point-wise comparison of two broadcast operands, producing booleans.
pub fn compare(lhs: &Datum, rhs: &Datum, operator: Operator) -> ColzResult<Datum> {
    match Domain::common(lhs, rhs) {
        Domain::Float => {
            let cmp = operator.to_fn::<f64>();
            map_binary(&floats(lhs), &floats(rhs), |a, b| Ok(cmp(a, b)))
        }
        Domain::Int => {
            let cmp = operator.to_fn::<i64>();
            map_binary(&ints(lhs), &ints(rhs), |a, b| Ok(cmp(a, b)))
        }
    }
}

#[cfg(test)]
mod test {
    use rstest::rstest;

    use super::*;
    use crate::{Array, Scalar};

    #[rstest]
    #[case(Operator::Lt, vec![true, false, false])]
    #[case(Operator::Gte, vec![false, true, true])]
    #[case(Operator::NotEq, vec![true, false, true])]
    fn against_scalar(#[case] operator: Operator, #[case] expected: Vec<bool>) {
        let result = compare(
            &Array::from(vec![1i32, 2, 3]).into(),
            &Scalar::F64(2.0).into(),
            operator,
        )
        .unwrap();
        assert_eq!(result, Datum::Array(Array::from(expected)));
    }

    #[test]
    fn inverse_is_complement() {
        let lhs: Datum = Array::from(vec![1i64, 5, 9]).into();
        let rhs: Datum = Scalar::I64(5).into();
        for op in [Operator::Lt, Operator::Eq, Operator::Gt] {
            let a = compare(&lhs, &rhs, op).unwrap();
            let b = compare(&lhs, &rhs, op.inverse()).unwrap();
            let (Datum::Array(Array::Bool(a)), Datum::Array(Array::Bool(b))) = (a, b) else {
                unreachable!()
            };
            assert!(a.iter().zip(&b).all(|(x, y)| x != y));
        }
    }

    #[test]
    fn scalars_stay_scalar() {
        let result = compare(&Scalar::I64(1).into(), &Scalar::I64(1).into(), Operator::Eq).unwrap();
        assert_eq!(result, Datum::Scalar(Scalar::Bool(true)));
    }
}
