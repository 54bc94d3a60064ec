//! Compiled arithmetic / boolean expressions.
//!
//! An expression is parsed once into a tree whose operands are positions
//! in its own operand table ([`Expression::sources`]).  Callers resolve
//! each source to a vector slot once, then per cycle fill a scratch slice
//! in source order and call [`Expression::evaluate`].  Nothing allocates
//! on the evaluation path.
//!
//! ```text
//!   "if(a > 2, b * 2, 0)"
//!        │ parse
//!        ▼
//!   If(Gt(Op0, 2), Mul(Op1, 2), 0)      sources = ["a", "b"]
//!        │ evaluate(&[a, b])
//!        ▼
//!       f64
//! ```
//!
//! Grammar, lowest precedence first:
//!
//! | level | operators                        |
//! |-------|----------------------------------|
//! | 1     | `\|\|` `or`                      |
//! | 2     | `&&` `and`                       |
//! | 3     | `==` `=` `!=` `<>`               |
//! | 4     | `<` `<=` `>` `>=`                |
//! | 5     | `+` `-`                          |
//! | 6     | `*` `/` `%`                      |
//! | 7     | unary `-` `!` `not`              |
//!
//! Identifiers are `[A-Za-z_][A-Za-z0-9_]*` or any text inside `[...]`.
//! Function names and the keywords `and`, `or`, `not`, `true`, `false`
//! are case-insensitive.

use crate::error::ExpressionError;

type ParseResult<T> = core::result::Result<T, ExpressionError>;

// ═══════════════════════════════════════════════════════════════
//  Public type
// ═══════════════════════════════════════════════════════════════

/// A parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    text: String,
    sources: Vec<String>,
    root: Node,
}

impl Expression {
    pub fn parse(text: &str) -> ParseResult<Self> {
        let tokens = lex(text)?;
        let mut parser = Parser {
            text,
            tokens,
            pos: 0,
            sources: Vec::new(),
        };
        let root = parser.expression(1)?;
        if let Some((offset, tok)) = parser.tokens.get(parser.pos) {
            return Err(parser.error(*offset, format!("unexpected {tok:?}")));
        }
        Ok(Self {
            text: text.to_string(),
            sources: parser.sources,
            root,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Distinct field names referenced, in order of first appearance.
    /// `evaluate` expects operands in this order.
    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    /// Whether the expression yields a truth value.
    pub fn is_boolean(&self) -> bool {
        self.root.is_boolean()
    }

    /// Evaluate with `operands[i]` bound to `sources()[i]`.
    /// Truth values come back as `1.0` / `0.0`.
    pub fn evaluate(&self, operands: &[f64]) -> f64 {
        self.root.eval(operands)
    }

    pub fn evaluate_bool(&self, operands: &[f64]) -> bool {
        truthy(self.evaluate(operands))
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tree
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinOp {
    fn precedence(self) -> u8 {
        match self {
            Self::Or => 1,
            Self::And => 2,
            Self::Eq | Self::Ne => 3,
            Self::Lt | Self::Le | Self::Gt | Self::Ge => 4,
            Self::Add | Self::Sub => 5,
            Self::Mul | Self::Div | Self::Rem => 6,
        }
    }

    fn is_boolean(self) -> bool {
        self.precedence() <= 4
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Func {
    Abs,
    Min,
    Max,
    Round,
    Floor,
    Ceiling,
    Truncate,
    Sqrt,
    Pow,
    Exp,
    Log,
    Sin,
    Cos,
    Tan,
}

impl Func {
    fn lookup(name: &str) -> Option<Self> {
        let f = match name.to_ascii_lowercase().as_str() {
            "abs" => Self::Abs,
            "min" => Self::Min,
            "max" => Self::Max,
            "round" => Self::Round,
            "floor" => Self::Floor,
            "ceiling" => Self::Ceiling,
            "truncate" => Self::Truncate,
            "sqrt" => Self::Sqrt,
            "pow" => Self::Pow,
            "exp" => Self::Exp,
            "log" => Self::Log,
            "sin" => Self::Sin,
            "cos" => Self::Cos,
            "tan" => Self::Tan,
            _ => return None,
        };
        Some(f)
    }

    fn accepts(self, argc: usize) -> bool {
        match self {
            Self::Min | Self::Max | Self::Pow | Self::Log => argc == 2,
            Self::Round => argc == 1 || argc == 2,
            _ => argc == 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Const(f64),
    Bool(bool),
    Operand(usize),
    Neg(Box<Node>),
    Not(Box<Node>),
    Binary(BinOp, Box<Node>, Box<Node>),
    Call(Func, Vec<Node>),
    If(Box<Node>, Box<Node>, Box<Node>),
}

fn binary(op: BinOp, x: f64, y: f64) -> f64 {
    match op {
        BinOp::Or => from_bool(truthy(x) || truthy(y)),
        BinOp::And => from_bool(truthy(x) && truthy(y)),
        BinOp::Eq => from_bool(x == y),
        BinOp::Ne => from_bool(x != y),
        BinOp::Lt => from_bool(x < y),
        BinOp::Le => from_bool(x <= y),
        BinOp::Gt => from_bool(x > y),
        BinOp::Ge => from_bool(x >= y),
        BinOp::Add => x + y,
        BinOp::Sub => x - y,
        BinOp::Mul => x * y,
        BinOp::Div => x / y,
        BinOp::Rem => x % y,
    }
}

fn truthy(v: f64) -> bool {
    v != 0.0 && !v.is_nan()
}

fn from_bool(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

impl Node {
    fn is_boolean(&self) -> bool {
        match self {
            Self::Bool(_) | Self::Not(_) => true,
            Self::Binary(op, _, _) => op.is_boolean(),
            Self::If(_, a, b) => a.is_boolean() && b.is_boolean(),
            _ => false,
        }
    }

    fn eval(&self, ops: &[f64]) -> f64 {
        match self {
            Self::Const(v) => *v,
            Self::Bool(b) => from_bool(*b),
            Self::Operand(i) => ops[*i],
            Self::Neg(n) => -n.eval(ops),
            Self::Not(n) => from_bool(!truthy(n.eval(ops))),
            Self::If(c, a, b) => {
                if truthy(c.eval(ops)) {
                    a.eval(ops)
                } else {
                    b.eval(ops)
                }
            }
            Self::Binary(op, a, b) => binary(*op, a.eval(ops), b.eval(ops)),
            Self::Call(f, args) => {
                let x = args[0].eval(ops);
                match f {
                    Func::Abs => x.abs(),
                    Func::Min => x.min(args[1].eval(ops)),
                    Func::Max => x.max(args[1].eval(ops)),
                    Func::Round => match args.get(1) {
                        None => x.round_ties_even(),
                        Some(digits) => {
                            let scale = 10f64.powi(digits.eval(ops) as i32);
                            (x * scale).round_ties_even() / scale
                        }
                    },
                    Func::Floor => x.floor(),
                    Func::Ceiling => x.ceil(),
                    Func::Truncate => x.trunc(),
                    Func::Sqrt => x.sqrt(),
                    Func::Pow => x.powf(args[1].eval(ops)),
                    Func::Exp => x.exp(),
                    Func::Log => x.log(args[1].eval(ops)),
                    Func::Sin => x.sin(),
                    Func::Cos => x.cos(),
                    Func::Tan => x.tan(),
                }
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Lexer
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Op(BinOp),
    Minus,
    Bang,
    LParen,
    RParen,
    Comma,
}

fn lex(text: &str) -> ParseResult<Vec<(usize, Token)>> {
    let bytes = text.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;
    let err = |offset: usize, reason: &str| ExpressionError::Parse {
        expression: text.to_string(),
        offset,
        reason: reason.to_string(),
    };

    while i < bytes.len() {
        let c = bytes[i];
        let start = i;
        let next = bytes.get(i + 1).copied();
        let tok = match c {
            b' ' | b'\t' | b'\r' | b'\n' => {
                i += 1;
                continue;
            }
            b'0'..=b'9' | b'.' => {
                while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                    i += 1;
                }
                if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
                    let mut j = i + 1;
                    if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
                        j += 1;
                    }
                    if j < bytes.len() && bytes[j].is_ascii_digit() {
                        i = j;
                        while i < bytes.len() && bytes[i].is_ascii_digit() {
                            i += 1;
                        }
                    }
                }
                let literal = &text[start..i];
                let value = literal
                    .parse::<f64>()
                    .map_err(|_| err(start, "malformed number"))?;
                out.push((start, Token::Number(value)));
                continue;
            }
            b'A'..=b'Z' | b'a'..=b'z' | b'_' => {
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                out.push((start, Token::Ident(text[start..i].to_string())));
                continue;
            }
            b'[' => {
                let close = text[start..]
                    .find(']')
                    .ok_or_else(|| err(start, "unterminated '['"))?;
                let name = &text[start + 1..start + close];
                if name.is_empty() {
                    return Err(err(start, "empty field name"));
                }
                i = start + close + 1;
                out.push((start, Token::Ident(name.to_string())));
                continue;
            }
            b'+' => Token::Op(BinOp::Add),
            b'-' => Token::Minus,
            b'*' => Token::Op(BinOp::Mul),
            b'/' => Token::Op(BinOp::Div),
            b'%' => Token::Op(BinOp::Rem),
            b'(' => Token::LParen,
            b')' => Token::RParen,
            b',' => Token::Comma,
            b'<' if next == Some(b'=') => Token::Op(BinOp::Le),
            b'<' if next == Some(b'>') => Token::Op(BinOp::Ne),
            b'<' => Token::Op(BinOp::Lt),
            b'>' if next == Some(b'=') => Token::Op(BinOp::Ge),
            b'>' => Token::Op(BinOp::Gt),
            b'=' => Token::Op(BinOp::Eq),
            b'!' if next == Some(b'=') => Token::Op(BinOp::Ne),
            b'!' => Token::Bang,
            b'&' if next == Some(b'&') => Token::Op(BinOp::And),
            b'|' if next == Some(b'|') => Token::Op(BinOp::Or),
            _ => return Err(err(start, "unexpected character")),
        };
        let two_chars = matches!(
            (c, next),
            (b'<', Some(b'=' | b'>'))
                | (b'>' | b'=' | b'!', Some(b'='))
                | (b'&', Some(b'&'))
                | (b'|', Some(b'|'))
        );
        i += if two_chars { 2 } else { 1 };
        out.push((start, tok));
    }
    Ok(out)
}

// ═══════════════════════════════════════════════════════════════
//  Parser (precedence climbing)
// ═══════════════════════════════════════════════════════════════

struct Parser<'a> {
    text: &'a str,
    tokens: Vec<(usize, Token)>,
    pos: usize,
    sources: Vec<String>,
}

impl Parser<'_> {
    fn error(&self, offset: usize, reason: impl Into<String>) -> ExpressionError {
        ExpressionError::Parse {
            expression: self.text.to_string(),
            offset,
            reason: reason.into(),
        }
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.text.len(), |(o, _)| *o)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn keyword(&self) -> Option<String> {
        match self.peek() {
            Some(Token::Ident(name)) => Some(name.to_ascii_lowercase()),
            _ => None,
        }
    }

    fn peek_binop(&self) -> Option<BinOp> {
        match self.peek() {
            Some(Token::Op(op)) => Some(*op),
            Some(Token::Minus) => Some(BinOp::Sub),
            Some(Token::Ident(_)) => match self.keyword().as_deref() {
                Some("and") => Some(BinOp::And),
                Some("or") => Some(BinOp::Or),
                _ => None,
            },
            _ => None,
        }
    }

    fn expect(&mut self, want: &Token, what: &str) -> ParseResult<()> {
        if self.peek() == Some(want) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(self.offset(), format!("expected {what}")))
        }
    }

    fn expression(&mut self, min_prec: u8) -> ParseResult<Node> {
        let mut lhs = self.unary()?;
        while let Some(op) = self.peek_binop() {
            let prec = op.precedence();
            if prec < min_prec {
                break;
            }
            self.pos += 1;
            let rhs = self.expression(prec + 1)?;
            lhs = Node::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> ParseResult<Node> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                Ok(Node::Neg(Box::new(self.unary()?)))
            }
            Some(Token::Bang) => {
                self.pos += 1;
                Ok(Node::Not(Box::new(self.unary()?)))
            }
            Some(Token::Ident(_)) if self.keyword().as_deref() == Some("not") => {
                self.pos += 1;
                Ok(Node::Not(Box::new(self.unary()?)))
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> ParseResult<Node> {
        let offset = self.offset();
        let Some(tok) = self.peek().cloned() else {
            return Err(self.error(offset, "unexpected end of expression"));
        };
        self.pos += 1;
        match tok {
            Token::Number(v) => Ok(Node::Const(v)),
            Token::LParen => {
                let inner = self.expression(1)?;
                self.expect(&Token::RParen, "')'")?;
                Ok(inner)
            }
            Token::Ident(name) => {
                if self.peek() == Some(&Token::LParen) {
                    self.pos += 1;
                    return self.call(&name, offset);
                }
                match name.to_ascii_lowercase().as_str() {
                    "true" => Ok(Node::Bool(true)),
                    "false" => Ok(Node::Bool(false)),
                    _ => Ok(Node::Operand(self.operand(name))),
                }
            }
            other => Err(self.error(offset, format!("unexpected {other:?}"))),
        }
    }

    fn call(&mut self, name: &str, offset: usize) -> ParseResult<Node> {
        let mut args = Vec::new();
        if self.peek() == Some(&Token::RParen) {
            self.pos += 1;
        } else {
            loop {
                args.push(self.expression(1)?);
                match self.peek() {
                    Some(Token::Comma) => self.pos += 1,
                    Some(Token::RParen) => {
                        self.pos += 1;
                        break;
                    }
                    _ => return Err(self.error(self.offset(), "expected ',' or ')'")),
                }
            }
        }

        let function_error = |reason: String| ExpressionError::Function {
            expression: self.text.to_string(),
            reason,
        };

        if name.eq_ignore_ascii_case("if") {
            let argc = args.len();
            let [c, a, b]: [Node; 3] = args.try_into().map_err(|_| {
                function_error(format!("if expects 3 arguments, got {argc} at offset {offset}"))
            })?;
            return Ok(Node::If(Box::new(c), Box::new(a), Box::new(b)));
        }

        let func = Func::lookup(name)
            .ok_or_else(|| function_error(format!("unknown function {name} at offset {offset}")))?;
        if !func.accepts(args.len()) {
            return Err(function_error(format!(
                "{name} does not take {} arguments",
                args.len()
            )));
        }
        Ok(Node::Call(func, args))
    }

    fn operand(&mut self, name: String) -> usize {
        if let Some(i) = self.sources.iter().position(|s| *s == name) {
            return i;
        }
        self.sources.push(name);
        self.sources.len() - 1
    }
}
