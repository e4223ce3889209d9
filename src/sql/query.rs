//! SELECT query builder.
//!
//! The compiler assembles a [`Query`] value and serializes it per dialect.
//! Only the constructs metric queries need are modeled: joins, WHERE/HAVING,
//! GROUP BY, ORDER BY, LIMIT, and a single optional CTE layer for table
//! calculations.

use super::dialect::{Dialect, SqlDialect};
use super::expr::Expr;
use super::token::{Token, TokenStream};

/// A SELECT list item: expression plus alias.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectExpr {
    pub expr: Expr,
    pub alias: String,
}

impl SelectExpr {
    pub fn new(expr: Expr, alias: &str) -> Self {
        Self {
            expr,
            alias: alias.to_string(),
        }
    }

    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = self.expr.to_tokens_for_dialect(dialect);
        ts.space()
            .push(Token::As)
            .space()
            .push(Token::Ident(self.alias.clone()));
        ts
    }
}

/// A physical table reference with its query alias.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRef {
    pub schema: Option<String>,
    pub table: String,
    /// Alias the compiled field expressions are qualified with.
    pub alias: String,
}

impl TableRef {
    pub fn to_tokens(&self) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::QualifiedTable {
            schema: self.schema.clone(),
            table: self.table.clone(),
        });
        if self.alias != self.table {
            ts.space()
                .push(Token::As)
                .space()
                .push(Token::Ident(self.alias.clone()));
        }
        ts
    }
}

/// Join kind in the generated SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlJoinKind {
    Left,
    Inner,
}

/// A JOIN clause.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    pub kind: SqlJoinKind,
    pub table: TableRef,
    pub on: Expr,
}

impl JoinClause {
    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(match self.kind {
            SqlJoinKind::Left => Token::Left,
            SqlJoinKind::Inner => Token::Inner,
        });
        ts.space().push(Token::Join).space();
        ts.append(&self.table.to_tokens());
        ts.space().push(Token::On).space();
        ts.append(&self.on.to_tokens_for_dialect(dialect));
        ts
    }
}

/// An ORDER BY entry over an output alias.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderByExpr {
    pub alias: String,
    pub descending: bool,
}

impl OrderByExpr {
    pub fn to_tokens(&self) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Ident(self.alias.clone()));
        ts.space().push(if self.descending {
            Token::Desc
        } else {
            Token::Asc
        });
        ts
    }
}

/// A single non-recursive CTE.
#[derive(Debug, Clone, PartialEq)]
pub struct Cte {
    pub name: String,
    pub query: Box<Query>,
}

impl Cte {
    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Ident(self.name.clone()))
            .space()
            .push(Token::As)
            .space()
            .lparen()
            .newline();
        ts.append(&self.query.to_tokens_for_dialect(dialect));
        ts.newline().rparen();
        ts
    }
}

/// What the query selects FROM.
#[derive(Debug, Clone, PartialEq)]
pub enum FromClause {
    Table(TableRef),
    /// Select from a CTE declared in `Query::with`.
    Cte(String),
}

/// A SELECT query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub with: Option<Cte>,
    pub select: Vec<SelectExpr>,
    pub from: Option<FromClause>,
    pub joins: Vec<JoinClause>,
    pub where_clause: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
    pub order_by: Vec<OrderByExpr>,
    pub limit: Option<u64>,
}

impl Query {
    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        if let Some(cte) = &self.with {
            ts.push(Token::With).space();
            ts.append(&cte.to_tokens_for_dialect(dialect));
            ts.newline();
        }

        ts.push(Token::Select);
        for (i, item) in self.select.iter().enumerate() {
            if i > 0 {
                ts.comma();
            }
            ts.newline().indent(1);
            ts.append(&item.to_tokens_for_dialect(dialect));
        }

        match &self.from {
            Some(FromClause::Table(table)) => {
                ts.newline().push(Token::From).space();
                ts.append(&table.to_tokens());
            }
            Some(FromClause::Cte(name)) => {
                ts.newline().push(Token::From).space();
                ts.push(Token::Ident(name.clone()));
            }
            None => {}
        }

        for join in &self.joins {
            ts.newline();
            ts.append(&join.to_tokens_for_dialect(dialect));
        }

        if let Some(where_clause) = &self.where_clause {
            ts.newline().push(Token::Where).space();
            ts.append(&where_clause.to_tokens_for_dialect(dialect));
        }

        if !self.group_by.is_empty() {
            ts.newline().push(Token::GroupBy).space();
            for (i, expr) in self.group_by.iter().enumerate() {
                if i > 0 {
                    ts.comma().space();
                }
                ts.append(&expr.to_tokens_for_dialect(dialect));
            }
        }

        if let Some(having) = &self.having {
            ts.newline().push(Token::Having).space();
            ts.append(&having.to_tokens_for_dialect(dialect));
        }

        if !self.order_by.is_empty() {
            ts.newline().push(Token::OrderBy).space();
            for (i, order) in self.order_by.iter().enumerate() {
                if i > 0 {
                    ts.comma().space();
                }
                ts.append(&order.to_tokens());
            }
        }

        if let Some(limit) = self.limit {
            ts.newline();
            ts.append(&dialect.emit_limit(limit));
        }

        ts
    }

    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens_for_dialect(dialect).serialize(dialect)
    }
}
