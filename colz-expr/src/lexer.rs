use colz_error::{ColzError, ColzResult, colz_err};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Span {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Keyword {
    And,
    Or,
    Not,
    If,
    Else,
    True,
    False,
}

impl Keyword {
    fn from_ident(ident: &str) -> Option<Self> {
        Some(match ident {
            "and" => Keyword::And,
            "or" => Keyword::Or,
            "not" => Keyword::Not,
            "if" => Keyword::If,
            "else" => Keyword::Else,
            "True" => Keyword::True,
            "False" => Keyword::False,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Int(i64),
    Float(f64),
    Ident(String),
    Keyword(Keyword),
    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,
    DoubleSlash,
    Percent,
    LParen,
    RParen,
    Comma,
    Lt,
    Le,
    Gt,
    Ge,
    EqEq,
    Ne,
    Amp,
    Pipe,
    Caret,
    Tilde,
}

impl TokenKind {
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Int(v) => format!("number {v}"),
            TokenKind::Float(v) => format!("number {v}"),
            TokenKind::Ident(name) => format!("name '{name}'"),
            TokenKind::Keyword(kw) => format!("keyword '{}'", keyword_text(*kw)),
            other => format!("'{}'", punct_text(other)),
        }
    }
}

fn keyword_text(kw: Keyword) -> &'static str {
    match kw {
        Keyword::And => "and",
        Keyword::Or => "or",
        Keyword::Not => "not",
        Keyword::If => "if",
        Keyword::Else => "else",
        Keyword::True => "True",
        Keyword::False => "False",
    }
}

fn punct_text(kind: &TokenKind) -> &'static str {
    match kind {
        TokenKind::Plus => "+",
        TokenKind::Minus => "-",
        TokenKind::Star => "*",
        TokenKind::DoubleStar => "**",
        TokenKind::Slash => "/",
        TokenKind::DoubleSlash => "//",
        TokenKind::Percent => "%",
        TokenKind::LParen => "(",
        TokenKind::RParen => ")",
        TokenKind::Comma => ",",
        TokenKind::Lt => "<",
        TokenKind::Le => "<=",
        TokenKind::Gt => ">",
        TokenKind::Ge => ">=",
        TokenKind::EqEq => "==",
        TokenKind::Ne => "!=",
        TokenKind::Amp => "&",
        TokenKind::Pipe => "|",
        TokenKind::Caret => "^",
        TokenKind::Tilde => "~",
        TokenKind::Int(_) | TokenKind::Float(_) | TokenKind::Ident(_) | TokenKind::Keyword(_) => "",
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

pub(crate) fn expr_err(input: &str, span: Span, msg: impl AsRef<str>) -> ColzError {
    colz_err!(
        ExpressionError: "invalid expression '{input}' at offset {}: {}",
        span.start,
        msg.as_ref()
    )
}

pub(crate) fn tokenize(input: &str) -> ColzResult<Vec<Token>> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if b.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        if i + 1 < bytes.len() {
            let kind = match &bytes[i..i + 2] {
                b"**" => Some(TokenKind::DoubleStar),
                b"//" => Some(TokenKind::DoubleSlash),
                b"<=" => Some(TokenKind::Le),
                b">=" => Some(TokenKind::Ge),
                b"==" => Some(TokenKind::EqEq),
                b"!=" => Some(TokenKind::Ne),
                _ => None,
            };
            if let Some(kind) = kind {
                tokens.push(Token {
                    kind,
                    span: Span {
                        start: i,
                        end: i + 2,
                    },
                });
                i += 2;
                continue;
            }
        }

        let start = i;
        let single = match b {
            b'+' => Some(TokenKind::Plus),
            b'-' => Some(TokenKind::Minus),
            b'*' => Some(TokenKind::Star),
            b'/' => Some(TokenKind::Slash),
            b'%' => Some(TokenKind::Percent),
            b'(' => Some(TokenKind::LParen),
            b')' => Some(TokenKind::RParen),
            b',' => Some(TokenKind::Comma),
            b'<' => Some(TokenKind::Lt),
            b'>' => Some(TokenKind::Gt),
            b'&' => Some(TokenKind::Amp),
            b'|' => Some(TokenKind::Pipe),
            b'^' => Some(TokenKind::Caret),
            b'~' => Some(TokenKind::Tilde),
            _ => None,
        };
        let kind = if let Some(kind) = single {
            i += 1;
            kind
        } else if b.is_ascii_digit()
            || (b == b'.' && bytes.get(i + 1).is_some_and(u8::is_ascii_digit))
        {
            i = scan_number(bytes, i);
            number(input, Span { start, end: i })?
        } else if b.is_ascii_alphabetic() || b == b'_' {
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            let ident = &input[start..i];
            match Keyword::from_ident(ident) {
                Some(kw) => TokenKind::Keyword(kw),
                None => TokenKind::Ident(ident.to_string()),
            }
        } else {
            let ch = input[i..].chars().next().unwrap_or('?');
            return Err(expr_err(
                input,
                Span {
                    start: i,
                    end: i + ch.len_utf8(),
                },
                format!("unexpected character '{ch}'"),
            ));
        };

        tokens.push(Token {
            kind,
            span: Span { start, end: i },
        });
    }

    Ok(tokens)
}

/// Returns the end of the numeric literal starting at `start`.
fn scan_number(bytes: &[u8], start: usize) -> usize {
    let mut i = start;
    while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
        i += 1;
    }
    if i < bytes.len() && matches!(bytes[i], b'e' | b'E') {
        let mut j = i + 1;
        if j < bytes.len() && matches!(bytes[j], b'+' | b'-') {
            j += 1;
        }
        if j < bytes.len() && bytes[j].is_ascii_digit() {
            while j < bytes.len() && bytes[j].is_ascii_digit() {
                j += 1;
            }
            i = j;
        }
    }
    i
}

fn number(input: &str, span: Span) -> ColzResult<TokenKind> {
    let text = &input[span.start..span.end];
    if text.bytes().all(|b| b.is_ascii_digit()) {
        return text
            .parse::<i64>()
            .map(TokenKind::Int)
            .map_err(|_| expr_err(input, span, format!("integer literal {text} is too large")));
    }
    text.parse::<f64>()
        .map(TokenKind::Float)
        .map_err(|_| expr_err(input, span, format!("invalid number '{text}'")))
}

#[cfg(test)]
mod test {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn operators_and_keywords() {
        assert_eq!(
            kinds("a**2 // b != not True"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::DoubleStar,
                TokenKind::Int(2),
                TokenKind::DoubleSlash,
                TokenKind::Ident("b".into()),
                TokenKind::Ne,
                TokenKind::Keyword(Keyword::Not),
                TokenKind::Keyword(Keyword::True),
            ]
        );
    }

    #[test]
    fn numbers() {
        assert_eq!(
            kinds("1 2.5 .5 1e3 2.E-2 7."),
            vec![
                TokenKind::Int(1),
                TokenKind::Float(2.5),
                TokenKind::Float(0.5),
                TokenKind::Float(1000.0),
                TokenKind::Float(0.02),
                TokenKind::Float(7.0),
            ]
        );
        assert!(tokenize("1.2.3").is_err());
        assert!(tokenize("99999999999999999999").is_err());
    }

    #[test]
    fn spans_and_errors() {
        let tokens = tokenize("ab  + c_1").unwrap();
        assert_eq!(tokens[0].span, Span { start: 0, end: 2 });
        assert_eq!(tokens[2].span, Span { start: 6, end: 9 });
        let err = tokenize("a $ b").unwrap_err();
        assert!(err.to_string().contains("offset 2"));
    }
}
