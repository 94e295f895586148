use std::collections::HashMap;
use std::sync::Arc;

use colz_array::{Array, Scalar};
use colz_dtype::DType;
use colz_error::{ColzResult, colz_bail};

use crate::carray::{Column, ColumnRef};

/// A value an expression variable can be bound to.
#[derive(Debug, Clone)]
pub enum Operand {
    Scalar(Scalar),
    Array(Array),
    Column(ColumnRef),
}

/// Variables visible to an expression, by name.
pub type Namespace = HashMap<String, Operand>;

impl Operand {
    /// Number of elements, or `None` for a scalar.
    pub fn len(&self) -> Option<usize> {
        match self {
            Operand::Scalar(_) => None,
            Operand::Array(a) => Some(a.len()),
            Operand::Column(c) => Some(c.len()),
        }
    }

    pub fn dtype(&self) -> DType {
        match self {
            Operand::Scalar(s) => s.dtype(),
            Operand::Array(a) => a.dtype(),
            Operand::Column(c) => c.dtype(),
        }
    }

    /// Whether the operand has elements to iterate over in blocks.
    pub fn is_array_like(&self) -> bool {
        !matches!(self, Operand::Scalar(_))
    }
}

impl From<Scalar> for Operand {
    fn from(value: Scalar) -> Self {
        Operand::Scalar(value)
    }
}

impl From<Array> for Operand {
    fn from(value: Array) -> Self {
        Operand::Array(value)
    }
}

impl From<ColumnRef> for Operand {
    fn from(value: ColumnRef) -> Self {
        Operand::Column(value)
    }
}

impl From<Column> for Operand {
    fn from(value: Column) -> Self {
        Operand::Column(value.into())
    }
}

/// The scopes a name is looked up in, innermost first.
pub(crate) struct Scope<'a> {
    layers: [Option<&'a Namespace>; 3],
}

impl<'a> Scope<'a> {
    pub(crate) fn new(
        namespace: Option<&'a Namespace>,
        locals: Option<&'a Namespace>,
        globals: Option<&'a Namespace>,
    ) -> Self {
        Self {
            layers: [namespace, locals, globals],
        }
    }

    pub(crate) fn lookup(&self, name: &str) -> Option<&'a Operand> {
        self.layers.iter().flatten().find_map(|layer| layer.get(name))
    }
}

/// The operands an expression reads, with the shape of the data they span.
pub(crate) struct Resolved {
    pub(crate) operands: Vec<(Arc<str>, Operand)>,
    /// Bytes per row summed over the array-like operands.
    pub(crate) typesize: usize,
    /// The common length of the array-like operands, if there are any.
    pub(crate) vlen: Option<usize>,
}

/// Look up every name in `names`.
///
/// Unresolved names are an error when `strict`, and are otherwise left out so they only fail
/// if evaluation actually reaches them.
pub(crate) fn resolve(names: &[Arc<str>], scope: &Scope<'_>, strict: bool) -> ColzResult<Resolved> {
    let mut operands = Vec::with_capacity(names.len());
    let mut typesize = 0;
    let mut vlen: Option<(usize, &str)> = None;
    for name in names {
        let Some(operand) = scope.lookup(name) else {
            if strict {
                colz_bail!(UnboundVariable: "name '{name}' is not defined");
            }
            continue;
        };
        if let Some(len) = operand.len() {
            typesize += operand.dtype().byte_width();
            match vlen {
                Some((expected, first)) if expected != len => colz_bail!(
                    "operand '{name}' has length {len} but '{first}' has length {expected}"
                ),
                Some(_) => {}
                None => vlen = Some((len, name)),
            }
        }
        operands.push((name.clone(), operand.clone()));
    }
    Ok(Resolved {
        operands,
        typesize,
        vlen: vlen.map(|(len, _)| len),
    })
}

#[cfg(test)]
mod test {
    use super::*;

    fn namespace(entries: &[(&str, Operand)]) -> Namespace {
        entries
            .iter()
            .map(|(n, o)| (n.to_string(), o.clone()))
            .collect()
    }

    #[test]
    fn innermost_scope_wins() {
        let explicit = namespace(&[("a", Scalar::I64(1).into())]);
        let locals = namespace(&[("a", Scalar::I64(2).into()), ("b", Scalar::I64(3).into())]);
        let globals = namespace(&[("c", Scalar::I64(4).into())]);
        let scope = Scope::new(Some(&explicit), Some(&locals), Some(&globals));
        let resolved = resolve(&["a".into(), "b".into(), "c".into()], &scope, true).unwrap();
        let values = resolved
            .operands
            .iter()
            .map(|(_, o)| match o {
                Operand::Scalar(s) => *s,
                _ => unreachable!(),
            })
            .collect::<Vec<_>>();
        assert_eq!(values, [Scalar::I64(1), Scalar::I64(3), Scalar::I64(4)]);
        assert_eq!(resolved.vlen, None);
    }

    #[test]
    fn shapes_and_unbound_names() {
        let ns = namespace(&[
            ("x", Array::from(vec![1i32, 2]).into()),
            ("y", Array::from(vec![1.0f64, 2.0]).into()),
            ("z", Array::from(vec![true]).into()),
        ]);
        let scope = Scope::new(Some(&ns), None, None);
        let resolved = resolve(&["x".into(), "y".into()], &scope, true).unwrap();
        assert_eq!(resolved.typesize, 12);
        assert_eq!(resolved.vlen, Some(2));
        assert!(resolve(&["x".into(), "z".into()], &scope, true).is_err());
        assert!(resolve(&["nope".into()], &scope, true).is_err());
        assert!(resolve(&["nope".into()], &scope, false).unwrap().operands.is_empty());
    }
}
