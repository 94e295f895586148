use std::fmt::{Display, Formatter};
use std::sync::Arc;

use colz_array::Scalar;
use colz_array::compute::{BooleanOp, LogicalOp, NumericOp, Operator, UnaryFn};
use colz_error::{ColzResult, colz_bail};
use itertools::Itertools;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// `-x`
    Neg,
    /// `~x`
    Invert,
    /// `not x`
    Not,
}

impl Display for UnaryOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            UnaryOp::Neg => write!(f, "-"),
            UnaryOp::Invert => write!(f, "~"),
            UnaryOp::Not => write!(f, "not "),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Numeric(NumericOp),
    Compare(Operator),
    Boolean(BooleanOp),
    Logical(LogicalOp),
}

impl Display for BinaryOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            BinaryOp::Numeric(op) => write!(f, "{op}"),
            BinaryOp::Compare(op) => write!(f, "{op}"),
            BinaryOp::Boolean(op) => write!(f, "{op}"),
            BinaryOp::Logical(op) => write!(f, "{op}"),
        }
    }
}

/// A builtin function callable from an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    /// Reduces its argument to a single scalar.
    Sum,
    Unary(UnaryFn),
    Arctan2,
    Where,
}

impl Function {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sum" => Some(Function::Sum),
            "arctan2" => Some(Function::Arctan2),
            "where" => Some(Function::Where),
            _ => name.parse().ok().map(Function::Unary),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Function::Sum => "sum",
            Function::Unary(f) => f.name(),
            Function::Arctan2 => "arctan2",
            Function::Where => "where",
        }
    }

    pub fn arity(&self) -> usize {
        match self {
            Function::Sum | Function::Unary(_) => 1,
            Function::Arctan2 => 2,
            Function::Where => 3,
        }
    }

    pub fn is_reduction(&self) -> bool {
        matches!(self, Function::Sum)
    }
}

impl Display for Function {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Scalar),
    Ident(Arc<str>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Call(Function, Vec<Expr>),
    /// `then if cond else otherwise`
    Conditional {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
}

impl Expr {
    pub fn call(func: Function, args: Vec<Expr>) -> ColzResult<Self> {
        if args.len() != func.arity() {
            colz_bail!(
                ExpressionError: "{func}() takes {} arguments but {} were given",
                func.arity(),
                args.len()
            );
        }
        Ok(Expr::Call(func, args))
    }

    /// The variable names this expression reads, in order of first appearance.
    pub fn references(&self) -> Vec<Arc<str>> {
        let mut names = Vec::new();
        self.visit(&mut |e| {
            if let Expr::Ident(name) = e {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
        });
        names
    }

    /// Whether evaluating this expression reduces an operand to a scalar.
    pub fn has_reduction(&self) -> bool {
        let mut found = false;
        self.visit(&mut |e| {
            if matches!(e, Expr::Call(f, _) if f.is_reduction()) {
                found = true;
            }
        });
        found
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Expr::Literal(_))
    }

    /// Pre-order traversal, children left to right.
    fn visit(&self, f: &mut impl FnMut(&Expr)) {
        f(self);
        match self {
            Expr::Literal(_) | Expr::Ident(_) => {}
            Expr::Unary(_, child) => child.visit(f),
            Expr::Binary(_, lhs, rhs) => {
                lhs.visit(f);
                rhs.visit(f);
            }
            Expr::Call(_, args) => args.iter().for_each(|a| a.visit(f)),
            Expr::Conditional {
                cond,
                then,
                otherwise,
            } => {
                then.visit(f);
                cond.visit(f);
                otherwise.visit(f);
            }
        }
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Literal(Scalar::Bool(true)) => write!(f, "True"),
            Expr::Literal(Scalar::Bool(false)) => write!(f, "False"),
            Expr::Literal(s) => write!(f, "{s}"),
            Expr::Ident(name) => write!(f, "{name}"),
            Expr::Unary(op, child) => write!(f, "({op}{child})"),
            Expr::Binary(op, lhs, rhs) => write!(f, "({lhs} {op} {rhs})"),
            Expr::Call(func, args) => write!(f, "{func}({})", args.iter().join(", ")),
            Expr::Conditional {
                cond,
                then,
                otherwise,
            } => write!(f, "({then} if {cond} else {otherwise})"),
        }
    }
}
