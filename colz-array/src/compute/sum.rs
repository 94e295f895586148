use colz_error::ColzResult;

use crate::compute::{Domain, Side, floats, ints};
use crate::{Datum, Scalar};

/// Sum all elements of `datum`.
///
/// Booleans count their `true` values and integers sum as wrapping `i64`; floats sum as `f64`.
/// The sum of a scalar is the scalar itself, promoted.
pub fn sum(datum: &Datum) -> ColzResult<Scalar> {
    Ok(match Domain::of(datum) {
        Domain::Int => Scalar::I64(match ints(datum) {
            Side::Scalar(v) => v,
            Side::Slice(s) => s.iter().fold(0i64, |acc, x| acc.wrapping_add(*x)),
        }),
        Domain::Float => Scalar::F64(match floats(datum) {
            Side::Scalar(v) => v,
            Side::Slice(s) => s.iter().sum(),
        }),
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Array;

    #[test]
    fn sums_by_domain() {
        assert_eq!(
            sum(&Array::from(vec![true, false, true]).into()).unwrap(),
            Scalar::I64(2)
        );
        assert_eq!(sum(&Array::from(vec![1u8, 255]).into()).unwrap(), Scalar::I64(256));
        assert_eq!(
            sum(&Array::from(vec![0.5f32, 0.25]).into()).unwrap(),
            Scalar::F64(0.75)
        );
        assert_eq!(sum(&Array::from(Vec::<i32>::new()).into()).unwrap(), Scalar::I64(0));
        assert_eq!(sum(&Scalar::Bool(true).into()).unwrap(), Scalar::I64(1));
    }
}
