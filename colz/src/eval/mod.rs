//! Block-wise expression evaluation.
//!
//! Operands are read in blocks sized to fit the cache of the selected backend, the expression
//! is evaluated per block and the results are either accumulated (when the expression reduces
//! to a scalar) or written to an output column or array.

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use colz_array::compute::{NumericOp, binary_numeric};
use colz_array::{Array, Datum, Scalar};
use colz_error::{ColzResult, colz_bail, colz_err};
use colz_expr::{Expr, Program, evaluate, parse};

pub use namespace::{Namespace, Operand};
pub(crate) use namespace::{Resolved, Scope, resolve};

use crate::carray::{Column, ColumnOptions, ColumnRef};
use crate::config::config;

mod namespace;

/// How expressions are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Backend {
    /// Walk the expression tree, resolving names as they are reached.
    Interpreted,
    /// Compile to bytecode once, binding every name up front.
    #[default]
    Compiled,
}

impl Backend {
    /// Bytes of operand data processed per block.
    fn block_budget(self) -> usize {
        match self {
            Backend::Compiled => 1 << 20,
            Backend::Interpreted => 1 << 17,
        }
    }
}

impl Display for Backend {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Interpreted => write!(f, "interpreted"),
            Backend::Compiled => write!(f, "compiled"),
        }
    }
}

/// The container elementwise results are written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OutFlavor {
    #[default]
    Column,
    Array,
}

/// Options for [`eval`]. Unset fields fall back to the process [`Config`](crate::Config).
#[derive(Debug, Clone, Default)]
pub struct EvalOptions<'a> {
    /// Looked up first.
    pub namespace: Option<&'a Namespace>,
    pub locals: Option<&'a Namespace>,
    pub globals: Option<&'a Namespace>,
    pub backend: Option<Backend>,
    pub out_flavor: Option<OutFlavor>,
    /// Overrides the computed block length.
    pub blen: Option<usize>,
    /// Construction options for a column result.
    pub column: ColumnOptions,
}

impl<'a> EvalOptions<'a> {
    pub fn with_namespace(mut self, namespace: &'a Namespace) -> Self {
        self.namespace = Some(namespace);
        self
    }

    pub fn with_locals(mut self, locals: &'a Namespace) -> Self {
        self.locals = Some(locals);
        self
    }

    pub fn with_globals(mut self, globals: &'a Namespace) -> Self {
        self.globals = Some(globals);
        self
    }

    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_out_flavor(mut self, out_flavor: OutFlavor) -> Self {
        self.out_flavor = Some(out_flavor);
        self
    }

    pub fn with_blen(mut self, blen: usize) -> Self {
        self.blen = Some(blen);
        self
    }
}

/// The outcome of an evaluation.
#[derive(Debug)]
pub enum EvalResult {
    Scalar(Scalar),
    Array(Array),
    Column(Column),
}

impl EvalResult {
    pub fn as_scalar(&self) -> Option<Scalar> {
        match self {
            EvalResult::Scalar(s) => Some(*s),
            _ => None,
        }
    }

    /// The elementwise result as an in-memory array, decompressing a column result.
    pub fn into_array(self) -> ColzResult<Array> {
        match self {
            EvalResult::Array(array) => Ok(array),
            EvalResult::Column(column) => column.read_range(0, column.len()),
            EvalResult::Scalar(s) => colz_bail!("expression reduced to the scalar {s}"),
        }
    }
}

/// Elements per block for operands of `typesize` bytes per row spanning `vlen` rows.
///
/// The backend's byte budget is divided by `typesize` and rounded down to a power of two.
/// Shorter operands get proportionally smaller blocks.
pub fn block_len(backend: Backend, typesize: usize, vlen: usize) -> usize {
    let per_row = backend.block_budget() / typesize.max(1);
    let mut blen = if per_row == 0 {
        1
    } else {
        1 << per_row.ilog2()
    };
    if vlen < 100_000 {
        blen /= 8;
    } else if vlen < 1_000_000 {
        blen /= 4;
    } else if vlen < 10_000_000 {
        blen /= 2;
    }
    blen.max(1)
}

/// The expression, ready to run under one backend.
enum Runner {
    Interpreted(Expr),
    Compiled(Program),
}

impl Runner {
    fn run(&self, bindings: &HashMap<Arc<str>, Datum>) -> ColzResult<Datum> {
        match self {
            Runner::Interpreted(expr) => evaluate(expr, bindings),
            Runner::Compiled(program) => {
                let args = program
                    .inputs()
                    .iter()
                    .map(|name| {
                        bindings.get(name).ok_or_else(
                            || colz_err!(UnboundVariable: "name '{name}' is not defined"),
                        )
                    })
                    .collect::<ColzResult<Vec<_>>>()?;
                program.run(&args)
            }
        }
    }
}

/// Where elementwise results accumulate.
enum Output {
    Reduction(Datum),
    Column(Column),
    Array(Array),
}

/// Evaluate `expression` over the operands it names.
///
/// Names are looked up in `options.namespace`, then `options.locals`, then
/// `options.globals`. Under the compiled backend every name must resolve before anything
/// runs; the interpreted backend fails only on the names it actually reaches.
pub fn eval(expression: &str, options: &EvalOptions<'_>) -> ColzResult<EvalResult> {
    let expr = parse(expression)?;
    let defaults = config();
    let backend = options.backend.unwrap_or(defaults.backend);
    let out_flavor = options.out_flavor.unwrap_or(defaults.out_flavor);
    let scope = Scope::new(options.namespace, options.locals, options.globals);
    let resolved = resolve(
        &expr.references(),
        &scope,
        backend == Backend::Compiled,
    )?;

    let runner = match backend {
        Backend::Interpreted => Runner::Interpreted(expr),
        Backend::Compiled => Runner::Compiled(Program::compile(&expr)?),
    };

    let Some(vlen) = resolved.vlen else {
        let bindings = resolved
            .operands
            .iter()
            .filter_map(|(name, operand)| match operand {
                Operand::Scalar(s) => Some((name.clone(), Datum::Scalar(*s))),
                _ => None,
            })
            .collect::<HashMap<_, _>>();
        return Ok(match runner.run(&bindings)? {
            Datum::Scalar(s) => EvalResult::Scalar(s),
            Datum::Array(a) => EvalResult::Array(a),
        });
    };

    let blen = match options.blen {
        Some(0) => colz_bail!("block length must be positive"),
        Some(blen) => blen,
        None => block_len(backend, resolved.typesize, vlen),
    };
    log::debug!(
        "evaluating '{expression}' with the {backend} backend over {vlen} rows in blocks of {blen} (typesize {})",
        resolved.typesize
    );
    run_blocks(&runner, &resolved, vlen, blen, out_flavor, &options.column)
}

fn run_blocks(
    runner: &Runner,
    resolved: &Resolved,
    vlen: usize,
    blen: usize,
    out_flavor: OutFlavor,
    column_options: &ColumnOptions,
) -> ColzResult<EvalResult> {
    let mut bindings: HashMap<Arc<str>, Datum> = HashMap::with_capacity(resolved.operands.len());
    // Operands that need a fresh slice for every block.
    let mut blocked: Vec<(Arc<str>, &Operand)> = Vec::new();
    for (name, operand) in &resolved.operands {
        match operand {
            Operand::Scalar(s) => {
                bindings.insert(name.clone(), Datum::Scalar(*s));
            }
            Operand::Array(a) if vlen <= blen => {
                bindings.insert(name.clone(), Datum::Array(a.clone()));
            }
            Operand::Column(c) if vlen <= blen => {
                let column = c.read();
                bindings.insert(name.clone(), Datum::Array(column.read_range(0, vlen)?));
            }
            Operand::Column(c) => {
                // Reused for every block.
                let buffer = Array::with_capacity(&c.dtype(), blen)?;
                bindings.insert(name.clone(), Datum::Array(buffer));
                blocked.push((name.clone(), operand));
            }
            Operand::Array(_) => blocked.push((name.clone(), operand)),
        }
    }

    let mut output: Option<Output> = None;
    // Zero-length operands still run one empty block, so the result has the right dtype.
    for start in (0..vlen.max(1)).step_by(blen) {
        let stop = (start + blen).min(vlen);
        for (name, operand) in &blocked {
            load_block(&mut bindings, name, operand, start, stop)?;
        }
        let result = runner.run(&bindings)?;
        output = Some(match (output, result) {
            (None, Datum::Scalar(s)) => Output::Reduction(Datum::Scalar(s)),
            (None, Datum::Array(block)) => match out_flavor {
                OutFlavor::Column => {
                    let mut options = column_options.clone();
                    options.expectedlen = options.expectedlen.or(Some(vlen));
                    let mut column = Column::empty(&block.dtype(), options)?;
                    column.append(&block)?;
                    Output::Column(column)
                }
                OutFlavor::Array => {
                    let mut out = Array::zeros(&block.dtype(), vlen)?;
                    out.set_range(start, &block)?;
                    Output::Array(out)
                }
            },
            (Some(Output::Reduction(acc)), block) => {
                Output::Reduction(binary_numeric(&acc, &block, NumericOp::Add)?)
            }
            (Some(Output::Column(mut column)), Datum::Array(block)) => {
                column.append(&block)?;
                Output::Column(column)
            }
            (Some(Output::Array(mut out)), Datum::Array(block)) => {
                out.set_range(start, &block)?;
                Output::Array(out)
            }
            (Some(_), Datum::Scalar(_)) => colz_bail!(
                InvariantViolation: "block at {start} reduced to a scalar but earlier blocks did not"
            ),
        });
    }

    match output {
        Some(Output::Reduction(Datum::Scalar(s))) => Ok(EvalResult::Scalar(s)),
        Some(Output::Reduction(Datum::Array(a))) | Some(Output::Array(a)) => Ok(EvalResult::Array(a)),
        Some(Output::Column(mut column)) => {
            column.flush()?;
            Ok(EvalResult::Column(column))
        }
        None => colz_bail!(InvariantViolation: "evaluation produced no blocks"),
    }
}

fn load_block(
    bindings: &mut HashMap<Arc<str>, Datum>,
    name: &Arc<str>,
    operand: &Operand,
    start: usize,
    stop: usize,
) -> ColzResult<()> {
    match operand {
        Operand::Column(column) => {
            let Some(Datum::Array(buffer)) = bindings.get_mut(name) else {
                colz_bail!(InvariantViolation: "no block buffer for '{name}'");
            };
            column.read().read_range_into(start, stop - start, buffer)
        }
        Operand::Array(array) => {
            bindings.insert(name.clone(), Datum::Array(array.slice(start, stop)?));
            Ok(())
        }
        Operand::Scalar(_) => Ok(()),
    }
}

/// Column handles keyed by name, the way tables expose their columns to expressions.
pub(crate) fn column_namespace<'a>(
    columns: impl IntoIterator<Item = (&'a str, &'a ColumnRef)>,
) -> Namespace {
    columns
        .into_iter()
        .map(|(name, column)| (name.to_string(), Operand::Column(column.clone())))
        .collect()
}

#[cfg(test)]
mod test {
    use colz_dtype::DType;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(Backend::Compiled, 8, 10_000_000, 131_072)]
    #[case(Backend::Compiled, 8, 5_000_000, 65_536)]
    #[case(Backend::Compiled, 8, 500_000, 32_768)]
    #[case(Backend::Compiled, 24, 10, 4_096)]
    #[case(Backend::Interpreted, 8, 50, 2_048)]
    #[case(Backend::Interpreted, 1 << 20, 50, 1)]
    fn block_lengths(
        #[case] backend: Backend,
        #[case] typesize: usize,
        #[case] vlen: usize,
        #[case] expected: usize,
    ) {
        assert_eq!(block_len(backend, typesize, vlen), expected);
    }

    fn namespace() -> Namespace {
        Namespace::from([
            ("a".to_string(), Operand::Array((0..1000i64).collect())),
            (
                "c".to_string(),
                Operand::Column(
                    Column::new(
                        &(0..1000).map(|v| v as f64 / 2.0).collect::<Array>(),
                        ColumnOptions::default().with_chunklen(64),
                    )
                    .unwrap()
                    .into(),
                ),
            ),
            ("k".to_string(), Operand::Scalar(Scalar::I64(3))),
        ])
    }

    #[rstest]
    fn elementwise_is_block_independent(
        #[values(Backend::Interpreted, Backend::Compiled)] backend: Backend,
        #[values(OutFlavor::Array, OutFlavor::Column)] out_flavor: OutFlavor,
        #[values(None, Some(1), Some(7), Some(100), Some(5000))] blen: Option<usize>,
    ) {
        let ns = namespace();
        let mut options = EvalOptions::default()
            .with_namespace(&ns)
            .with_backend(backend)
            .with_out_flavor(out_flavor);
        options.blen = blen;
        let result = eval("a * k + c", &options).unwrap();
        assert!(matches!(
            (&result, out_flavor),
            (EvalResult::Array(_), OutFlavor::Array) | (EvalResult::Column(_), OutFlavor::Column)
        ));
        let expected = (0..1000).map(|v| v as f64 * 3.0 + v as f64 / 2.0).collect::<Array>();
        assert_eq!(result.into_array().unwrap(), expected);
    }

    #[rstest]
    #[case(Some(1000))]
    #[case(Some(500))]
    #[case(Some(77))]
    fn reductions_accumulate(#[case] blen: Option<usize>) {
        let ns = namespace();
        let mut options = EvalOptions::default().with_namespace(&ns);
        options.blen = blen;
        let result = eval("sum(a)", &options).unwrap();
        assert_eq!(result.as_scalar(), Some(Scalar::I64(499_500)));
    }

    #[test]
    fn scalar_fast_path() {
        let ns = Namespace::from([("k".to_string(), Operand::Scalar(Scalar::I64(3)))]);
        let result = eval("k ** 2 + 1", &EvalOptions::default().with_namespace(&ns)).unwrap();
        assert_eq!(result.as_scalar(), Some(Scalar::I64(10)));
    }

    #[test]
    fn unbound_names_by_backend() {
        let ns = namespace();
        let compiled = EvalOptions::default()
            .with_namespace(&ns)
            .with_backend(Backend::Compiled);
        assert!(matches!(
            eval("k > 0 or missing", &compiled),
            Err(colz_error::ColzError::UnboundVariable(..))
        ));
        let interpreted = EvalOptions::default()
            .with_namespace(&ns)
            .with_backend(Backend::Interpreted);
        assert_eq!(
            eval("k > 0 or missing", &interpreted).unwrap().as_scalar(),
            Some(Scalar::Bool(true))
        );
        assert!(eval("a + missing", &interpreted).is_err());
    }

    #[test]
    fn lengths_must_agree() {
        let mut ns = namespace();
        ns.insert("short".to_string(), Operand::Array(Array::from(vec![1i64])));
        let options = EvalOptions::default().with_namespace(&ns);
        assert!(eval("a + short", &options).is_err());
    }

    #[test]
    fn empty_operands_keep_dtype() {
        let ns = Namespace::from([("e".to_string(), Operand::Array(Array::from(Vec::<i32>::new())))]);
        let options = EvalOptions::default().with_namespace(&ns);
        let result = eval("e > 1", &options).unwrap().into_array().unwrap();
        assert_eq!(result, Array::from(Vec::<bool>::new()));
        assert_eq!(eval("sum(e)", &options).unwrap().as_scalar(), Some(Scalar::I64(0)));
    }

    #[test]
    fn boolean_results_keep_dtype() {
        let ns = namespace();
        let options = EvalOptions::default()
            .with_namespace(&ns)
            .with_out_flavor(OutFlavor::Array)
            .with_blen(300);
        let mask = eval("(a >= 10) & (c < 10)", &options).unwrap().into_array().unwrap();
        assert_eq!(mask.dtype(), DType::Bool);
        assert_eq!(mask.as_slice::<bool>().unwrap().iter().filter(|&&b| b).count(), 10);
    }
}
