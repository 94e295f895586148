use std::fmt::{Display, Formatter};
use std::str::FromStr;

use colz_error::{ColzError, ColzResult, colz_err};

use crate::Datum;
use crate::compute::{Domain, floats, ints, map_binary, map_unary};

/// Elementwise mathematical functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryFn {
    Abs,
    Sqrt,
    Exp,
    Log,
    Log10,
    Sin,
    Cos,
    Tan,
}

impl UnaryFn {
    pub fn name(&self) -> &'static str {
        match self {
            UnaryFn::Abs => "abs",
            UnaryFn::Sqrt => "sqrt",
            UnaryFn::Exp => "exp",
            UnaryFn::Log => "log",
            UnaryFn::Log10 => "log10",
            UnaryFn::Sin => "sin",
            UnaryFn::Cos => "cos",
            UnaryFn::Tan => "tan",
        }
    }

    fn apply(self, x: f64) -> f64 {
        match self {
            UnaryFn::Abs => x.abs(),
            UnaryFn::Sqrt => x.sqrt(),
            UnaryFn::Exp => x.exp(),
            UnaryFn::Log => x.ln(),
            UnaryFn::Log10 => x.log10(),
            UnaryFn::Sin => x.sin(),
            UnaryFn::Cos => x.cos(),
            UnaryFn::Tan => x.tan(),
        }
    }
}

impl Display for UnaryFn {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for UnaryFn {
    type Err = ColzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "abs" => UnaryFn::Abs,
            "sqrt" => UnaryFn::Sqrt,
            "exp" => UnaryFn::Exp,
            "log" => UnaryFn::Log,
            "log10" => UnaryFn::Log10,
            "sin" => UnaryFn::Sin,
            "cos" => UnaryFn::Cos,
            "tan" => UnaryFn::Tan,
            _ => return Err(colz_err!("unknown function '{s}'")),
        })
    }
}

/// Apply `func` point-wise. `abs` keeps integers as `i64`; everything else computes as `f64`.
pub fn unary_fn(datum: &Datum, func: UnaryFn) -> ColzResult<Datum> {
    if func == UnaryFn::Abs && Domain::of(datum) == Domain::Int {
        return map_unary(&ints(datum), |x| Ok(x.wrapping_abs()));
    }
    map_unary(&floats(datum), |x| Ok(func.apply(x)))
}

/// Point-wise arithmetic negation.
pub fn negate(datum: &Datum) -> ColzResult<Datum> {
    match Domain::of(datum) {
        Domain::Int => map_unary(&ints(datum), |x| Ok(x.wrapping_neg())),
        Domain::Float => map_unary(&floats(datum), |x| Ok(-x)),
    }
}

/// Point-wise four-quadrant arctangent of `y / x`.
pub fn arctan2(y: &Datum, x: &Datum) -> ColzResult<Datum> {
    map_binary(&floats(y), &floats(x), |a, b| Ok(a.atan2(b)))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{Array, Scalar};

    #[test]
    fn abs_keeps_integers() {
        assert_eq!(
            unary_fn(&Array::from(vec![-3i16, 4]).into(), UnaryFn::Abs).unwrap(),
            Datum::Array(Array::from(vec![3i64, 4]))
        );
        assert_eq!(
            unary_fn(&Scalar::I64(4).into(), UnaryFn::Sqrt).unwrap(),
            Datum::Scalar(Scalar::F64(2.0))
        );
    }

    #[test]
    fn negate_and_arctan2() {
        assert_eq!(
            negate(&Array::from(vec![1.5f32]).into()).unwrap(),
            Datum::Array(Array::from(vec![-1.5f64]))
        );
        let angle = arctan2(&Scalar::F64(1.0).into(), &Scalar::F64(1.0).into()).unwrap();
        let Datum::Scalar(Scalar::F64(angle)) = angle else {
            unreachable!()
        };
        assert!((angle - std::f64::consts::FRAC_PI_4).abs() < 1e-12);
    }

    #[test]
    fn names_parse() {
        assert_eq!("log10".parse::<UnaryFn>().unwrap(), UnaryFn::Log10);
        assert!("floor".parse::<UnaryFn>().is_err());
    }
}
