//! Table calculation expression language.
//!
//! A small, row-local expression language over `${...}` references to
//! already-selected columns: arithmetic, comparisons, and a fixed set of
//! scalar functions. Calculations compile to SQL derived columns when the
//! target dialect can express every function used; otherwise the parsed
//! expression is evaluated by the result mapper instead.

pub mod eval;

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::model::FieldId;

/// Pattern for `${table.field}` / `${calculation}` references.
static REFERENCE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z0-9_.]+)\}").expect("reference pattern"));

/// Scalar functions the language understands.
///
/// Keep this list in sync with the dialect function tables and the row-local
/// interpreter.
pub const KNOWN_FUNCTIONS: &[&str] = &[
    "abs", "round", "floor", "ceil", "coalesce", "nullif", "greatest", "least", "power", "sqrt",
    "ln", "exp", "concat", "upper", "lower", "initcap", "if",
];

/// Errors produced while parsing a calculation expression.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CalcParseError {
    #[error("unexpected character '{found}' at offset {offset}")]
    UnexpectedChar { found: char, offset: usize },

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("expected {expected}, found '{found}'")]
    UnexpectedToken { expected: &'static str, found: String },

    #[error("unknown function '{name}'")]
    UnknownFunction { name: String },

    #[error("function '{name}' expects {expected} argument(s), got {got}")]
    ArityMismatch {
        name: String,
        expected: &'static str,
        got: usize,
    },

    #[error("unterminated string literal")]
    UnterminatedString,
}

pub type CalcResult<T> = Result<T, CalcParseError>;

/// Binary operators, in SQL spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalcBinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl fmt::Display for CalcBinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CalcBinaryOp::Add => "+",
            CalcBinaryOp::Sub => "-",
            CalcBinaryOp::Mul => "*",
            CalcBinaryOp::Div => "/",
            CalcBinaryOp::Mod => "%",
            CalcBinaryOp::Eq => "=",
            CalcBinaryOp::Ne => "<>",
            CalcBinaryOp::Lt => "<",
            CalcBinaryOp::Lte => "<=",
            CalcBinaryOp::Gt => ">",
            CalcBinaryOp::Gte => ">=",
        };
        f.write_str(s)
    }
}

/// Parsed calculation expression.
#[derive(Debug, Clone, PartialEq)]
pub enum CalcExpr {
    /// Reference to a selected column or an earlier calculation.
    Ref(FieldId),
    Number(f64),
    String(String),
    Binary {
        left: Box<CalcExpr>,
        op: CalcBinaryOp,
        right: Box<CalcExpr>,
    },
    Neg(Box<CalcExpr>),
    Func {
        name: String,
        args: Vec<CalcExpr>,
    },
}

impl CalcExpr {
    /// Every reference in the expression, in first-appearance order.
    pub fn references(&self) -> Vec<&FieldId> {
        let mut refs = Vec::new();
        self.collect_references(&mut refs);
        refs
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a FieldId>) {
        match self {
            CalcExpr::Ref(id) => {
                if !out.contains(&id) {
                    out.push(id);
                }
            }
            CalcExpr::Number(_) | CalcExpr::String(_) => {}
            CalcExpr::Binary { left, right, .. } => {
                left.collect_references(out);
                right.collect_references(out);
            }
            CalcExpr::Neg(inner) => inner.collect_references(out),
            CalcExpr::Func { args, .. } => {
                for arg in args {
                    arg.collect_references(out);
                }
            }
        }
    }

    /// Names of every function used anywhere in the expression.
    pub fn functions(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_functions(&mut names);
        names
    }

    fn collect_functions<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            CalcExpr::Func { name, args } => {
                if !out.contains(&name.as_str()) {
                    out.push(name);
                }
                for arg in args {
                    arg.collect_functions(out);
                }
            }
            CalcExpr::Binary { left, right, .. } => {
                left.collect_functions(out);
                right.collect_functions(out);
            }
            CalcExpr::Neg(inner) => inner.collect_functions(out),
            _ => {}
        }
    }
}

/// Quick reference scan without a full parse. Used by validation error
/// reporting when the expression itself fails to parse.
pub fn scan_references(sql: &str) -> Vec<FieldId> {
    REFERENCE_PATTERN
        .captures_iter(sql)
        .map(|cap| FieldId::from(&cap[1]))
        .collect()
}

/// Replace every `${...}` reference in a fragment. References the resolver
/// returns `None` for are left untouched.
pub fn replace_references(sql: &str, resolve: impl Fn(&FieldId) -> Option<String>) -> String {
    let mut result = String::with_capacity(sql.len());
    let mut last = 0;
    for cap in REFERENCE_PATTERN.captures_iter(sql) {
        let whole = cap.get(0).expect("capture 0");
        result.push_str(&sql[last..whole.start()]);
        let id = FieldId::from(&cap[1]);
        match resolve(&id) {
            Some(replacement) => result.push_str(&replacement),
            None => result.push_str(whole.as_str()),
        }
        last = whole.end();
    }
    result.push_str(&sql[last..]);
    result
}

/// Parse a calculation expression.
pub fn parse(sql: &str) -> CalcResult<CalcExpr> {
    let tokens = tokenize(sql)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.comparison()?;
    match parser.peek() {
        None => Ok(expr),
        Some(tok) => Err(CalcParseError::UnexpectedToken {
            expected: "end of expression",
            found: tok.describe(),
        }),
    }
}

// =============================================================================
// Lexer
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Number(f64),
    Str(String),
    Reference(String),
    Ident(String),
    Op(CalcBinaryOp),
    LParen,
    RParen,
    Comma,
}

impl Tok {
    fn describe(&self) -> String {
        match self {
            Tok::Number(n) => n.to_string(),
            Tok::Str(s) => format!("'{}'", s),
            Tok::Reference(r) => format!("${{{}}}", r),
            Tok::Ident(i) => i.clone(),
            Tok::Op(op) => op.to_string(),
            Tok::LParen => "(".into(),
            Tok::RParen => ")".into(),
            Tok::Comma => ",".into(),
        }
    }
}

fn tokenize(sql: &str) -> CalcResult<Vec<Tok>> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = sql.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '(' => {
                tokens.push(Tok::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Tok::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Tok::Comma);
                i += 1;
            }
            '+' => {
                tokens.push(Tok::Op(CalcBinaryOp::Add));
                i += 1;
            }
            '-' => {
                tokens.push(Tok::Op(CalcBinaryOp::Sub));
                i += 1;
            }
            '*' => {
                tokens.push(Tok::Op(CalcBinaryOp::Mul));
                i += 1;
            }
            '/' => {
                tokens.push(Tok::Op(CalcBinaryOp::Div));
                i += 1;
            }
            '%' => {
                tokens.push(Tok::Op(CalcBinaryOp::Mod));
                i += 1;
            }
            '=' => {
                tokens.push(Tok::Op(CalcBinaryOp::Eq));
                i += 1;
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Tok::Op(CalcBinaryOp::Ne));
                i += 2;
            }
            '<' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Tok::Op(CalcBinaryOp::Lte));
                    i += 2;
                } else if chars.get(i + 1) == Some(&'>') {
                    tokens.push(Tok::Op(CalcBinaryOp::Ne));
                    i += 2;
                } else {
                    tokens.push(Tok::Op(CalcBinaryOp::Lt));
                    i += 1;
                }
            }
            '>' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Tok::Op(CalcBinaryOp::Gte));
                    i += 2;
                } else {
                    tokens.push(Tok::Op(CalcBinaryOp::Gt));
                    i += 1;
                }
            }
            '\'' => {
                let mut s = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        Some('\'') if chars.get(i + 1) == Some(&'\'') => {
                            s.push('\'');
                            i += 2;
                        }
                        Some('\'') => {
                            i += 1;
                            break;
                        }
                        Some(&ch) => {
                            s.push(ch);
                            i += 1;
                        }
                        None => return Err(CalcParseError::UnterminatedString),
                    }
                }
                tokens.push(Tok::Str(s));
            }
            '$' if chars.get(i + 1) == Some(&'{') => {
                let mut name = String::new();
                i += 2;
                loop {
                    match chars.get(i) {
                        Some('}') => {
                            i += 1;
                            break;
                        }
                        Some(&ch) => {
                            name.push(ch);
                            i += 1;
                        }
                        None => return Err(CalcParseError::UnexpectedEnd),
                    }
                }
                tokens.push(Tok::Reference(name));
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let value = text.parse().map_err(|_| CalcParseError::UnexpectedChar {
                    found: c,
                    offset: start,
                })?;
                tokens.push(Tok::Number(value));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let name: String = chars[start..i].iter().collect();
                tokens.push(Tok::Ident(name.to_ascii_lowercase()));
            }
            other => {
                return Err(CalcParseError::UnexpectedChar {
                    found: other,
                    offset: i,
                })
            }
        }
    }

    Ok(tokens)
}

// =============================================================================
// Parser
// =============================================================================

struct Parser {
    tokens: Vec<Tok>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Tok> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, expected: &'static str, tok: Tok) -> CalcResult<()> {
        match self.next() {
            Some(found) if found == tok => Ok(()),
            Some(found) => Err(CalcParseError::UnexpectedToken {
                expected,
                found: found.describe(),
            }),
            None => Err(CalcParseError::UnexpectedEnd),
        }
    }

    fn comparison(&mut self) -> CalcResult<CalcExpr> {
        let left = self.additive()?;
        if let Some(Tok::Op(op)) = self.peek() {
            let op = *op;
            if matches!(
                op,
                CalcBinaryOp::Eq
                    | CalcBinaryOp::Ne
                    | CalcBinaryOp::Lt
                    | CalcBinaryOp::Lte
                    | CalcBinaryOp::Gt
                    | CalcBinaryOp::Gte
            ) {
                self.pos += 1;
                let right = self.additive()?;
                return Ok(CalcExpr::Binary {
                    left: Box::new(left),
                    op,
                    right: Box::new(right),
                });
            }
        }
        Ok(left)
    }

    fn additive(&mut self) -> CalcResult<CalcExpr> {
        let mut expr = self.multiplicative()?;
        while let Some(Tok::Op(op @ (CalcBinaryOp::Add | CalcBinaryOp::Sub))) = self.peek() {
            let op = *op;
            self.pos += 1;
            let right = self.multiplicative()?;
            expr = CalcExpr::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn multiplicative(&mut self) -> CalcResult<CalcExpr> {
        let mut expr = self.unary()?;
        while let Some(Tok::Op(op @ (CalcBinaryOp::Mul | CalcBinaryOp::Div | CalcBinaryOp::Mod))) =
            self.peek()
        {
            let op = *op;
            self.pos += 1;
            let right = self.unary()?;
            expr = CalcExpr::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn unary(&mut self) -> CalcResult<CalcExpr> {
        if let Some(Tok::Op(CalcBinaryOp::Sub)) = self.peek() {
            self.pos += 1;
            let inner = self.unary()?;
            return Ok(CalcExpr::Neg(Box::new(inner)));
        }
        self.primary()
    }

    fn primary(&mut self) -> CalcResult<CalcExpr> {
        match self.next() {
            Some(Tok::Number(n)) => Ok(CalcExpr::Number(n)),
            Some(Tok::Str(s)) => Ok(CalcExpr::String(s)),
            Some(Tok::Reference(name)) => Ok(CalcExpr::Ref(FieldId::from(name.as_str()))),
            Some(Tok::LParen) => {
                // Grouping is not kept as a node; the SQL renderer
                // parenthesizes nested binary operands itself.
                let expr = self.comparison()?;
                self.expect("closing parenthesis", Tok::RParen)?;
                Ok(expr)
            }
            Some(Tok::Ident(name)) => self.function(name),
            Some(other) => Err(CalcParseError::UnexpectedToken {
                expected: "value, reference, or function",
                found: other.describe(),
            }),
            None => Err(CalcParseError::UnexpectedEnd),
        }
    }

    fn function(&mut self, name: String) -> CalcResult<CalcExpr> {
        if !KNOWN_FUNCTIONS.contains(&name.as_str()) {
            return Err(CalcParseError::UnknownFunction { name });
        }
        self.expect("opening parenthesis", Tok::LParen)?;

        let mut args = Vec::new();
        if self.peek() != Some(&Tok::RParen) {
            loop {
                args.push(self.comparison()?);
                match self.peek() {
                    Some(Tok::Comma) => {
                        self.pos += 1;
                    }
                    _ => break,
                }
            }
        }
        self.expect("closing parenthesis", Tok::RParen)?;

        check_arity(&name, args.len())?;
        Ok(CalcExpr::Func { name, args })
    }
}

fn check_arity(name: &str, got: usize) -> CalcResult<()> {
    let ok = match name {
        "abs" | "floor" | "ceil" | "sqrt" | "ln" | "exp" | "upper" | "lower" | "initcap" => {
            got == 1
        }
        "round" => got == 1 || got == 2,
        "nullif" | "power" => got == 2,
        "if" => got == 3,
        "coalesce" | "greatest" | "least" | "concat" => got >= 1,
        _ => true,
    };
    if ok {
        Ok(())
    } else {
        Err(CalcParseError::ArityMismatch {
            name: name.to_string(),
            expected: match name {
                "round" => "1 or 2",
                "nullif" | "power" => "2",
                "if" => "3",
                "coalesce" | "greatest" | "least" | "concat" => "at least 1",
                _ => "1",
            },
            got,
        })
    }
}
