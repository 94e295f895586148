use std::borrow::Cow;
use std::sync::Arc;

use colz_array::{Array, Datum};
use colz_error::{ColzResult, colz_bail, colz_err};

use crate::ast::{BinaryOp, Expr, Function, UnaryOp};
use crate::interpret::{NoBindings, evaluate};
use crate::ops::{apply_binary, apply_call, apply_unary, conditional};

/// Elementwise programs run over their inputs in slices of this many elements.
pub const SUB_BLOCK_LEN: usize = 4096;

#[derive(Debug, Clone, PartialEq)]
enum Instr {
    /// Push a constant from the pool
    Const(usize),
    /// Push input slot `n`
    Load(usize),
    Unary(UnaryOp),
    Binary(BinaryOp),
    Call(Function),
    /// Pops otherwise, then, cond
    Conditional,
}

/// An expression compiled to stack bytecode.
///
/// Constant subexpressions are folded at compile time, and every variable becomes an input slot
/// that must be bound before the program runs.
#[derive(Debug, Clone)]
pub struct Program {
    code: Vec<Instr>,
    constants: Vec<Datum>,
    inputs: Vec<Arc<str>>,
    has_reduction: bool,
}

impl Program {
    pub fn compile(expr: &Expr) -> ColzResult<Self> {
        let folded = fold(expr);
        let mut program = Self {
            code: Vec::new(),
            constants: Vec::new(),
            inputs: folded.references(),
            has_reduction: folded.has_reduction(),
        };
        program.emit(&folded)?;
        log::debug!(
            "compiled '{folded}' to {} instructions over {} inputs",
            program.code.len(),
            program.inputs.len()
        );
        Ok(program)
    }

    /// Names of the input slots, in slot order.
    pub fn inputs(&self) -> &[Arc<str>] {
        &self.inputs
    }

    pub fn has_reduction(&self) -> bool {
        self.has_reduction
    }

    fn emit(&mut self, expr: &Expr) -> ColzResult<()> {
        match expr {
            Expr::Literal(s) => {
                self.constants.push(Datum::Scalar(*s));
                self.code.push(Instr::Const(self.constants.len() - 1));
            }
            Expr::Ident(name) => {
                let slot = self
                    .inputs
                    .iter()
                    .position(|n| n == name)
                    .ok_or_else(|| colz_err!(InvariantViolation: "no input slot for '{name}'"))?;
                self.code.push(Instr::Load(slot));
            }
            Expr::Unary(op, operand) => {
                self.emit(operand)?;
                self.code.push(Instr::Unary(*op));
            }
            Expr::Binary(op, lhs, rhs) => {
                self.emit(lhs)?;
                self.emit(rhs)?;
                self.code.push(Instr::Binary(*op));
            }
            Expr::Call(func, args) => {
                for arg in args {
                    self.emit(arg)?;
                }
                self.code.push(Instr::Call(*func));
            }
            Expr::Conditional {
                cond,
                then,
                otherwise,
            } => {
                self.emit(cond)?;
                self.emit(then)?;
                self.emit(otherwise)?;
                self.code.push(Instr::Conditional);
            }
        }
        Ok(())
    }

    /// Run the program with `args` bound to its input slots.
    ///
    /// Programs without a reduction run over array inputs in sub-blocks of [`SUB_BLOCK_LEN`]
    /// elements and concatenate the results.
    pub fn run(&self, args: &[&Datum]) -> ColzResult<Datum> {
        if args.len() != self.inputs.len() {
            colz_bail!(
                "program takes {} inputs but {} were given",
                self.inputs.len(),
                args.len()
            );
        }
        let len = args.iter().find_map(|a| a.len());
        let len = match len {
            Some(len) if !self.has_reduction && len > SUB_BLOCK_LEN => len,
            _ => return self.exec(args),
        };

        let mut out: Option<Array> = None;
        for start in (0..len).step_by(SUB_BLOCK_LEN) {
            let stop = (start + SUB_BLOCK_LEN).min(len);
            let sliced = args
                .iter()
                .map(|a| match a {
                    Datum::Array(array) => array.slice(start, stop).map(Datum::Array),
                    Datum::Scalar(s) => Ok(Datum::Scalar(*s)),
                })
                .collect::<ColzResult<Vec<_>>>()?;
            let sliced = sliced.iter().collect::<Vec<_>>();
            let part = match self.exec(&sliced)? {
                result @ Datum::Scalar(_) => return Ok(result),
                Datum::Array(part) => part,
            };
            if let Some(acc) = out.as_mut() {
                acc.extend(&part)?;
            } else {
                out = Some(part);
            }
        }
        out.map(Datum::Array)
            .ok_or_else(|| colz_err!(InvariantViolation: "program produced no output"))
    }

    fn exec(&self, args: &[&Datum]) -> ColzResult<Datum> {
        let mut stack: Vec<Cow<'_, Datum>> = Vec::with_capacity(self.code.len());
        for instr in &self.code {
            let value = match instr {
                Instr::Const(idx) => Cow::Borrowed(&self.constants[*idx]),
                Instr::Load(slot) => Cow::Borrowed(args[*slot]),
                Instr::Unary(op) => {
                    let operand = pop(&mut stack)?;
                    Cow::Owned(apply_unary(*op, &operand)?)
                }
                Instr::Binary(op) => {
                    let rhs = pop(&mut stack)?;
                    let lhs = pop(&mut stack)?;
                    Cow::Owned(apply_binary(*op, &lhs, &rhs)?)
                }
                Instr::Call(func) => {
                    let at = stack.len().checked_sub(func.arity()).ok_or_else(underflow)?;
                    let operands = stack.split_off(at);
                    let operands = operands.iter().map(Cow::as_ref).collect::<Vec<_>>();
                    Cow::Owned(apply_call(*func, &operands)?)
                }
                Instr::Conditional => {
                    let otherwise = pop(&mut stack)?;
                    let then = pop(&mut stack)?;
                    let cond = pop(&mut stack)?;
                    Cow::Owned(conditional(&cond, then.into_owned(), otherwise.into_owned())?)
                }
            };
            stack.push(value);
        }
        let result = pop(&mut stack)?;
        if !stack.is_empty() {
            colz_bail!(InvariantViolation: "{} values left on the stack", stack.len());
        }
        Ok(result.into_owned())
    }
}

fn underflow() -> colz_error::ColzError {
    colz_err!(InvariantViolation: "bytecode stack underflow")
}

fn pop<'a>(stack: &mut Vec<Cow<'a, Datum>>) -> ColzResult<Cow<'a, Datum>> {
    stack.pop().ok_or_else(underflow)
}

/// Replace every subexpression that reads no variables with its value.
///
/// A constant subexpression that fails to evaluate is left in place so the error surfaces
/// when the program runs.
fn fold(expr: &Expr) -> Expr {
    let folded = match expr {
        Expr::Literal(_) | Expr::Ident(_) => return expr.clone(),
        Expr::Unary(op, operand) => Expr::Unary(*op, Box::new(fold(operand))),
        Expr::Binary(op, lhs, rhs) => Expr::Binary(*op, Box::new(fold(lhs)), Box::new(fold(rhs))),
        Expr::Call(func, args) => Expr::Call(*func, args.iter().map(fold).collect()),
        Expr::Conditional {
            cond,
            then,
            otherwise,
        } => Expr::Conditional {
            cond: Box::new(fold(cond)),
            then: Box::new(fold(then)),
            otherwise: Box::new(fold(otherwise)),
        },
    };
    let constant = match &folded {
        Expr::Unary(_, operand) => operand.is_literal(),
        Expr::Binary(_, lhs, rhs) => lhs.is_literal() && rhs.is_literal(),
        Expr::Call(_, args) => args.iter().all(Expr::is_literal),
        Expr::Conditional {
            cond,
            then,
            otherwise,
        } => cond.is_literal() && then.is_literal() && otherwise.is_literal(),
        Expr::Literal(_) | Expr::Ident(_) => false,
    };
    if !constant {
        return folded;
    }
    match evaluate(&folded, &NoBindings) {
        Ok(Datum::Scalar(s)) => Expr::Literal(s),
        _ => folded,
    }
}
