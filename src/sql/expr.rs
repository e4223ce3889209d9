//! SQL expression AST.
//!
//! A strongly typed tree for everything the compiler emits: filter
//! comparisons, aggregate calls, CASE bucketing, and trusted fragments from
//! the governed model. Exhaustive matching in `to_tokens_for_dialect` keeps
//! new variants from slipping through unserialized.

use super::dialect::Dialect;
use super::token::{Token, TokenStream};

/// A SQL expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Alias or column reference, quoted per dialect.
    Column(String),

    Literal(Literal),

    BinaryOp {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },

    UnaryOp {
        op: UnaryOperator,
        expr: Box<Expr>,
    },

    Function {
        name: String,
        args: Vec<Expr>,
        distinct: bool,
    },

    Case {
        when_clauses: Vec<(Expr, Expr)>,
        else_clause: Option<Box<Expr>>,
    },

    In {
        expr: Box<Expr>,
        values: Vec<Expr>,
        negated: bool,
    },

    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negated: bool,
    },

    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },

    Like {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        negated: bool,
    },

    Paren(Box<Expr>),

    /// Trusted SQL fragment (compiled field expression, join condition).
    /// Never built from end-user input; literals always go through
    /// [`Expr::Literal`].
    Raw(String),
}

/// Literal values.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    String(String),
    Bool(bool),
    Date(String),
    Timestamp(String),
    Null,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Eq,
    Ne,
    Lt,
    Gt,
    Lte,
    Gte,
    And,
    Or,
    Plus,
    Minus,
    Mul,
    Div,
    Mod,
    Concat,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Minus,
}

impl Expr {
    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        match self {
            Expr::Column(name) => {
                ts.push(Token::Ident(name.clone()));
            }

            Expr::Literal(lit) => {
                ts.push(match lit {
                    Literal::Int(n) => Token::LitInt(*n),
                    Literal::Float(f) => Token::LitFloat(*f),
                    Literal::String(s) => Token::LitString(s.clone()),
                    Literal::Bool(b) => Token::LitBool(*b),
                    Literal::Date(d) => Token::LitDate(d.clone()),
                    Literal::Timestamp(t) => Token::LitTimestamp(t.clone()),
                    Literal::Null => Token::Null,
                });
            }

            Expr::BinaryOp { left, op, right } => {
                use super::dialect::SqlDialect;
                if *op == BinaryOperator::Concat && !dialect.supports_concat_operator() {
                    ts.push(Token::FunctionName("CONCAT".into()));
                    ts.lparen();
                    ts.append(&left.to_tokens_for_dialect(dialect));
                    ts.comma().space();
                    ts.append(&right.to_tokens_for_dialect(dialect));
                    ts.rparen();
                } else {
                    ts.append(&left.to_tokens_for_dialect(dialect));
                    ts.space();
                    ts.push(binary_op_token(*op));
                    ts.space();
                    ts.append(&right.to_tokens_for_dialect(dialect));
                }
            }

            Expr::UnaryOp { op, expr } => {
                ts.push(match op {
                    UnaryOperator::Not => Token::Not,
                    UnaryOperator::Minus => Token::Minus,
                });
                if *op == UnaryOperator::Not {
                    ts.space();
                }
                ts.append(&expr.to_tokens_for_dialect(dialect));
            }

            Expr::Function {
                name,
                args,
                distinct,
            } => {
                ts.push(Token::FunctionName(name.clone()));
                ts.lparen();
                if *distinct {
                    ts.push(Token::Distinct).space();
                }
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        ts.comma().space();
                    }
                    ts.append(&arg.to_tokens_for_dialect(dialect));
                }
                ts.rparen();
            }

            Expr::Case {
                when_clauses,
                else_clause,
            } => {
                ts.push(Token::Case);
                for (when, then) in when_clauses {
                    ts.space().push(Token::When).space();
                    ts.append(&when.to_tokens_for_dialect(dialect));
                    ts.space().push(Token::Then).space();
                    ts.append(&then.to_tokens_for_dialect(dialect));
                }
                if let Some(else_expr) = else_clause {
                    ts.space().push(Token::Else).space();
                    ts.append(&else_expr.to_tokens_for_dialect(dialect));
                }
                ts.space().push(Token::End);
            }

            Expr::In {
                expr,
                values,
                negated,
            } => {
                // `x IN ()` is invalid SQL; an empty list is always false
                // (or always true, negated).
                if values.is_empty() {
                    ts.push(if *negated { Token::True } else { Token::False });
                } else {
                    ts.append(&expr.to_tokens_for_dialect(dialect));
                    if *negated {
                        ts.space().push(Token::Not);
                    }
                    ts.space().push(Token::In).space().lparen();
                    for (i, value) in values.iter().enumerate() {
                        if i > 0 {
                            ts.comma().space();
                        }
                        ts.append(&value.to_tokens_for_dialect(dialect));
                    }
                    ts.rparen();
                }
            }

            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => {
                ts.append(&expr.to_tokens_for_dialect(dialect));
                if *negated {
                    ts.space().push(Token::Not);
                }
                ts.space().push(Token::Between).space();
                ts.append(&low.to_tokens_for_dialect(dialect));
                ts.space().push(Token::And).space();
                ts.append(&high.to_tokens_for_dialect(dialect));
            }

            Expr::IsNull { expr, negated } => {
                ts.append(&expr.to_tokens_for_dialect(dialect));
                ts.space();
                ts.push(if *negated {
                    Token::IsNotNull
                } else {
                    Token::IsNull
                });
            }

            Expr::Like {
                expr,
                pattern,
                negated,
            } => {
                ts.append(&expr.to_tokens_for_dialect(dialect));
                if *negated {
                    ts.space().push(Token::Not);
                }
                ts.space().push(Token::Like).space();
                ts.append(&pattern.to_tokens_for_dialect(dialect));
            }

            Expr::Paren(inner) => {
                ts.lparen();
                ts.append(&inner.to_tokens_for_dialect(dialect));
                ts.rparen();
            }

            Expr::Raw(sql) => {
                ts.push(Token::Raw(sql.clone()));
            }
        }

        ts
    }
}

fn binary_op_token(op: BinaryOperator) -> Token {
    match op {
        BinaryOperator::Eq => Token::Eq,
        BinaryOperator::Ne => Token::Ne,
        BinaryOperator::Lt => Token::Lt,
        BinaryOperator::Gt => Token::Gt,
        BinaryOperator::Lte => Token::Lte,
        BinaryOperator::Gte => Token::Gte,
        BinaryOperator::And => Token::And,
        BinaryOperator::Or => Token::Or,
        BinaryOperator::Plus => Token::Plus,
        BinaryOperator::Minus => Token::Minus,
        BinaryOperator::Mul => Token::Mul,
        BinaryOperator::Div => Token::Div,
        BinaryOperator::Mod => Token::Mod,
        BinaryOperator::Concat => Token::Concat,
    }
}

// =============================================================================
// Constructors
// =============================================================================

/// Alias/column reference.
pub fn col(name: &str) -> Expr {
    Expr::Column(name.to_string())
}

/// Trusted SQL fragment.
pub fn raw(sql: &str) -> Expr {
    Expr::Raw(sql.to_string())
}

pub fn lit_int(n: i64) -> Expr {
    Expr::Literal(Literal::Int(n))
}

pub fn lit_float(f: f64) -> Expr {
    Expr::Literal(Literal::Float(f))
}

pub fn lit_str(s: &str) -> Expr {
    Expr::Literal(Literal::String(s.to_string()))
}

pub fn lit_bool(b: bool) -> Expr {
    Expr::Literal(Literal::Bool(b))
}

pub fn lit_null() -> Expr {
    Expr::Literal(Literal::Null)
}

/// Helper methods for combining expressions.
pub trait ExprExt: Sized {
    fn into_expr(self) -> Expr;

    fn and(self, other: Expr) -> Expr {
        Expr::BinaryOp {
            left: Box::new(self.into_expr()),
            op: BinaryOperator::And,
            right: Box::new(other),
        }
    }

    fn or(self, other: Expr) -> Expr {
        Expr::BinaryOp {
            left: Box::new(self.into_expr()),
            op: BinaryOperator::Or,
            right: Box::new(other),
        }
    }

    fn eq(self, other: Expr) -> Expr {
        self.binary(BinaryOperator::Eq, other)
    }

    fn ne(self, other: Expr) -> Expr {
        self.binary(BinaryOperator::Ne, other)
    }

    fn lt(self, other: Expr) -> Expr {
        self.binary(BinaryOperator::Lt, other)
    }

    fn lte(self, other: Expr) -> Expr {
        self.binary(BinaryOperator::Lte, other)
    }

    fn gt(self, other: Expr) -> Expr {
        self.binary(BinaryOperator::Gt, other)
    }

    fn gte(self, other: Expr) -> Expr {
        self.binary(BinaryOperator::Gte, other)
    }

    fn is_null(self) -> Expr {
        Expr::IsNull {
            expr: Box::new(self.into_expr()),
            negated: false,
        }
    }

    fn is_not_null(self) -> Expr {
        Expr::IsNull {
            expr: Box::new(self.into_expr()),
            negated: true,
        }
    }

    fn binary(self, op: BinaryOperator, other: Expr) -> Expr {
        Expr::BinaryOp {
            left: Box::new(self.into_expr()),
            op,
            right: Box::new(other),
        }
    }
}

impl ExprExt for Expr {
    fn into_expr(self) -> Expr {
        self
    }
}
