use colz_dtype::DType;
use colz_error::ColzResult;

use crate::compute::{Domain, Side, broadcast_len, floats, ints, truths};
use crate::{Datum, Element};

/// Point-wise `where(cond, then, otherwise)`.
///
/// Two boolean branches produce booleans; otherwise the branches promote like arithmetic.
pub fn select(cond: &Datum, then: &Datum, otherwise: &Datum) -> ColzResult<Datum> {
    let mask = truths(cond);
    if then.dtype() == DType::Bool && otherwise.dtype() == DType::Bool {
        return choose(&mask, &truths(then), &truths(otherwise));
    }
    match Domain::common(then, otherwise) {
        Domain::Float => choose(&mask, &floats(then), &floats(otherwise)),
        Domain::Int => choose(&mask, &ints(then), &ints(otherwise)),
    }
}

fn choose<T: Element>(
    mask: &Side<'_, bool>,
    then: &Side<'_, T>,
    otherwise: &Side<'_, T>,
) -> ColzResult<Datum> {
    let pick = |i: usize| {
        if mask.get(i) {
            then.get(i)
        } else {
            otherwise.get(i)
        }
    };
    Ok(
        match broadcast_len(&[mask.len(), then.len(), otherwise.len()])? {
            None => Datum::Scalar(pick(0).into()),
            Some(len) => Datum::Array(T::into_array((0..len).map(pick).collect())),
        },
    )
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{Array, Scalar};

    #[test]
    fn picks_per_element() {
        let result = select(
            &Array::from(vec![true, false, true]).into(),
            &Array::from(vec![1i32, 2, 3]).into(),
            &Scalar::F64(0.5).into(),
        )
        .unwrap();
        assert_eq!(result, Datum::Array(Array::from(vec![1.0f64, 0.5, 3.0])));
    }

    #[test]
    fn scalar_condition_broadcasts() {
        let result = select(
            &Scalar::Bool(false).into(),
            &Array::from(vec![1i64, 2]).into(),
            &Array::from(vec![8i64, 9]).into(),
        )
        .unwrap();
        assert_eq!(result, Datum::Array(Array::from(vec![8i64, 9])));
        assert!(
            select(
                &Array::from(vec![true]).into(),
                &Array::from(vec![1i64, 2]).into(),
                &Scalar::I64(0).into(),
            )
            .is_err()
        );
    }
}
