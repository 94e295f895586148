use colz_array::Scalar;
use colz_array::compute::{BooleanOp, LogicalOp, NumericOp, Operator};
use colz_error::ColzResult;

use crate::ast::{BinaryOp, Expr, Function, UnaryOp};
use crate::lexer::{Keyword, Span, Token, TokenKind, expr_err, tokenize};

/// Parse an expression string.
///
/// The grammar follows Python's operator precedence, from loosest to tightest: conditional
/// (`a if c else b`), `or`, `and`, `not`, comparisons (chainable), `|`, `^`, `&`, `+ -`,
/// `* / // %`, unary `- + ~`, and the right-associative `**`.
pub fn parse(input: &str) -> ColzResult<Expr> {
    let tokens = tokenize(input)?;
    let mut parser = Parser::new(input, &tokens);
    let expr = parser.parse_conditional()?;
    if let Some(t) = parser.peek() {
        return Err(expr_err(
            input,
            t.span,
            format!("unexpected {} after expression", t.kind.describe()),
        ));
    }
    Ok(expr)
}

struct Parser<'a> {
    input: &'a str,
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str, tokens: &'a [Token]) -> Self {
        Self {
            input,
            tokens,
            pos: 0,
        }
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<&'a TokenKind> {
        self.peek().map(|t| &t.kind)
    }

    fn advance(&mut self) -> Option<&'a Token> {
        let t = self.tokens.get(self.pos);
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn at_keyword(&self, kw: Keyword) -> bool {
        matches!(self.peek_kind(), Some(TokenKind::Keyword(k)) if *k == kw)
    }

    fn end_span(&self) -> Span {
        Span {
            start: self.input.len(),
            end: self.input.len(),
        }
    }

    fn expect(&mut self, expected: TokenKind, what: &str) -> ColzResult<()> {
        match self.advance() {
            Some(t) if t.kind == expected => Ok(()),
            Some(t) => Err(expr_err(
                self.input,
                t.span,
                format!("expected {what}, got {}", t.kind.describe()),
            )),
            None => Err(expr_err(
                self.input,
                self.end_span(),
                format!("expected {what}, got end of input"),
            )),
        }
    }

    fn expect_keyword(&mut self, kw: Keyword, what: &str) -> ColzResult<()> {
        self.expect(TokenKind::Keyword(kw), what)
    }

    fn parse_conditional(&mut self) -> ColzResult<Expr> {
        let then = self.parse_or()?;
        if !self.at_keyword(Keyword::If) {
            return Ok(then);
        }
        self.advance();
        let cond = self.parse_or()?;
        self.expect_keyword(Keyword::Else, "'else'")?;
        let otherwise = self.parse_conditional()?;
        Ok(Expr::Conditional {
            cond: Box::new(cond),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    fn parse_or(&mut self) -> ColzResult<Expr> {
        let mut lhs = self.parse_and()?;
        while self.at_keyword(Keyword::Or) {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = binary(BinaryOp::Logical(LogicalOp::Or), lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> ColzResult<Expr> {
        let mut lhs = self.parse_not()?;
        while self.at_keyword(Keyword::And) {
            self.advance();
            let rhs = self.parse_not()?;
            lhs = binary(BinaryOp::Logical(LogicalOp::And), lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> ColzResult<Expr> {
        if self.at_keyword(Keyword::Not) {
            self.advance();
            let operand = self.parse_not()?;
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(operand)));
        }
        self.parse_comparison()
    }

    /// `a < b < c` means `(a < b) and (b < c)`.
    fn parse_comparison(&mut self) -> ColzResult<Expr> {
        let mut lhs = self.parse_bitor()?;
        let mut chain: Option<Expr> = None;
        while let Some(op) = self.peek_kind().and_then(comparison_op) {
            self.advance();
            let rhs = self.parse_bitor()?;
            let link = binary(BinaryOp::Compare(op), lhs, rhs.clone());
            chain = Some(match chain {
                None => link,
                Some(prev) => binary(BinaryOp::Logical(LogicalOp::And), prev, link),
            });
            lhs = rhs;
        }
        Ok(chain.unwrap_or(lhs))
    }

    fn parse_bitor(&mut self) -> ColzResult<Expr> {
        let mut lhs = self.parse_bitxor()?;
        while matches!(self.peek_kind(), Some(TokenKind::Pipe)) {
            self.advance();
            let rhs = self.parse_bitxor()?;
            lhs = binary(BinaryOp::Boolean(BooleanOp::Or), lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_bitxor(&mut self) -> ColzResult<Expr> {
        let mut lhs = self.parse_bitand()?;
        while matches!(self.peek_kind(), Some(TokenKind::Caret)) {
            self.advance();
            let rhs = self.parse_bitand()?;
            lhs = binary(BinaryOp::Boolean(BooleanOp::Xor), lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_bitand(&mut self) -> ColzResult<Expr> {
        let mut lhs = self.parse_add()?;
        while matches!(self.peek_kind(), Some(TokenKind::Amp)) {
            self.advance();
            let rhs = self.parse_add()?;
            lhs = binary(BinaryOp::Boolean(BooleanOp::And), lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_add(&mut self) -> ColzResult<Expr> {
        let mut lhs = self.parse_mul()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Plus) => NumericOp::Add,
                Some(TokenKind::Minus) => NumericOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_mul()?;
            lhs = binary(BinaryOp::Numeric(op), lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_mul(&mut self) -> ColzResult<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Star) => NumericOp::Mul,
                Some(TokenKind::Slash) => NumericOp::Div,
                Some(TokenKind::DoubleSlash) => NumericOp::FloorDiv,
                Some(TokenKind::Percent) => NumericOp::Rem,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = binary(BinaryOp::Numeric(op), lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> ColzResult<Expr> {
        let op = match self.peek_kind() {
            Some(TokenKind::Minus) => UnaryOp::Neg,
            Some(TokenKind::Tilde) => UnaryOp::Invert,
            Some(TokenKind::Plus) => {
                self.advance();
                return self.parse_unary();
            }
            _ => return self.parse_power(),
        };
        self.advance();
        let operand = self.parse_unary()?;
        Ok(match (op, operand) {
            (UnaryOp::Neg, Expr::Literal(Scalar::I64(v))) => Expr::Literal(Scalar::I64(-v)),
            (UnaryOp::Neg, Expr::Literal(Scalar::F64(v))) => Expr::Literal(Scalar::F64(-v)),
            (op, operand) => Expr::Unary(op, Box::new(operand)),
        })
    }

    /// `**` binds tighter than a unary operator on its left, looser than one on its right.
    fn parse_power(&mut self) -> ColzResult<Expr> {
        let base = self.parse_atom()?;
        if matches!(self.peek_kind(), Some(TokenKind::DoubleStar)) {
            self.advance();
            let exponent = self.parse_unary()?;
            return Ok(binary(BinaryOp::Numeric(NumericOp::Pow), base, exponent));
        }
        Ok(base)
    }

    fn parse_atom(&mut self) -> ColzResult<Expr> {
        let Some(token) = self.advance() else {
            return Err(expr_err(
                self.input,
                self.end_span(),
                "unexpected end of input",
            ));
        };
        match &token.kind {
            TokenKind::Int(v) => Ok(Expr::Literal(Scalar::I64(*v))),
            TokenKind::Float(v) => Ok(Expr::Literal(Scalar::F64(*v))),
            TokenKind::Keyword(Keyword::True) => Ok(Expr::Literal(Scalar::Bool(true))),
            TokenKind::Keyword(Keyword::False) => Ok(Expr::Literal(Scalar::Bool(false))),
            TokenKind::LParen => {
                let inner = self.parse_conditional()?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(inner)
            }
            TokenKind::Ident(name) => {
                if !matches!(self.peek_kind(), Some(TokenKind::LParen)) {
                    return Ok(Expr::Ident(name.as_str().into()));
                }
                let Some(func) = Function::from_name(name) else {
                    return Err(expr_err(
                        self.input,
                        token.span,
                        format!("unknown function '{name}'"),
                    ));
                };
                self.advance();
                let args = self.parse_args()?;
                Expr::call(func, args).map_err(|e| expr_err(self.input, token.span, e.to_string()))
            }
            other => Err(expr_err(
                self.input,
                token.span,
                format!("unexpected {}", other.describe()),
            )),
        }
    }

    /// Arguments after the opening parenthesis, through the closing one.
    fn parse_args(&mut self) -> ColzResult<Vec<Expr>> {
        let mut args = Vec::new();
        if matches!(self.peek_kind(), Some(TokenKind::RParen)) {
            self.advance();
            return Ok(args);
        }
        loop {
            args.push(self.parse_conditional()?);
            match self.advance() {
                Some(Token {
                    kind: TokenKind::Comma,
                    ..
                }) => {}
                Some(Token {
                    kind: TokenKind::RParen,
                    ..
                }) => return Ok(args),
                Some(t) => {
                    return Err(expr_err(
                        self.input,
                        t.span,
                        format!("expected ',' or ')', got {}", t.kind.describe()),
                    ));
                }
                None => {
                    return Err(expr_err(
                        self.input,
                        self.end_span(),
                        "expected ')', got end of input",
                    ));
                }
            }
        }
    }
}

fn comparison_op(kind: &TokenKind) -> Option<Operator> {
    Some(match kind {
        TokenKind::Lt => Operator::Lt,
        TokenKind::Le => Operator::Lte,
        TokenKind::Gt => Operator::Gt,
        TokenKind::Ge => Operator::Gte,
        TokenKind::EqEq => Operator::Eq,
        TokenKind::Ne => Operator::NotEq,
        _ => return None,
    })
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary(op, Box::new(lhs), Box::new(rhs))
}
