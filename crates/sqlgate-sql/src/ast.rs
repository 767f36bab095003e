//! The query model.
//!
//! A closed sum-type tree the rewrite rules pattern-match over. Every
//! node is an owned value; rewrites consume a tree and produce a fresh
//! one, never mutating shared state. The model deliberately covers only
//! what admission control needs: locating tables, columns, predicates
//! and LIMIT clauses.

use serde::{Deserialize, Serialize};

/// An identifier with its quoting preserved.
///
/// Quoting is an explicit case-preservation request: quoted identifiers
/// are never re-cased or case-folded for comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ident {
    pub value: String,
    pub quoted: bool,
}

impl Ident {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            quoted: false,
        }
    }

    pub fn quoted(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            quoted: true,
        }
    }

    /// Name equality under SQL folding rules: unquoted identifiers compare
    /// case-insensitively, quoted identifiers compare exactly.
    pub fn matches(&self, other: &str) -> bool {
        if self.quoted {
            self.value == other
        } else {
            self.value.eq_ignore_ascii_case(other)
        }
    }

    /// Lookup key for catalog and policy maps.
    pub fn lookup(&self) -> String {
        if self.quoted {
            self.value.clone()
        } else {
            self.value.to_lowercase()
        }
    }
}

/// Set operation connecting compound query arms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetOperator {
    Union,
    Intersect,
    Except,
}

/// A common table expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cte {
    pub name: Ident,
    pub query: Query,
}

/// One full query: optional CTEs, a body, and trailing clauses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub ctes: Vec<Cte>,
    pub body: QueryBody,
    pub order_by: Vec<OrderByItem>,
    pub limit: Option<LimitClause>,
    pub offset: Option<Expr>,
}

impl Query {
    /// A bare query around a body, with no CTEs or trailing clauses.
    pub fn bare(body: QueryBody) -> Self {
        Self {
            ctes: Vec::new(),
            body,
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// SELECT nodes reachable without entering subqueries or CTE bodies.
    pub fn top_level_selects(&self) -> Vec<&Select> {
        let mut out = Vec::new();
        collect_selects(&self.body, &mut out);
        out
    }

    /// Mutable variant of [`Query::top_level_selects`].
    pub fn top_level_selects_mut(&mut self) -> Vec<&mut Select> {
        let mut out = Vec::new();
        collect_selects_mut(&mut self.body, &mut out);
        out
    }
}

fn collect_selects<'a>(body: &'a QueryBody, out: &mut Vec<&'a Select>) {
    match body {
        QueryBody::Select(select) => out.push(select),
        QueryBody::Compound { left, right, .. } => {
            collect_selects(left, out);
            collect_selects(right, out);
        }
        QueryBody::Nested(query) => collect_selects(&query.body, out),
    }
}

fn collect_selects_mut<'a>(body: &'a mut QueryBody, out: &mut Vec<&'a mut Select>) {
    match body {
        QueryBody::Select(select) => out.push(select),
        QueryBody::Compound { left, right, .. } => {
            collect_selects_mut(left, out);
            collect_selects_mut(right, out);
        }
        QueryBody::Nested(query) => collect_selects_mut(&mut query.body, out),
    }
}

/// Query body: a single SELECT, a set operation, or a parenthesized query
/// carrying its own trailing clauses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryBody {
    Select(Box<Select>),
    Compound {
        op: SetOperator,
        all: bool,
        left: Box<QueryBody>,
        right: Box<QueryBody>,
    },
    Nested(Box<Query>),
}

/// A SELECT block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Select {
    pub distinct: bool,
    pub projection: Vec<SelectItem>,
    pub from: Vec<TableWithJoins>,
    pub selection: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
}

/// One projected item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SelectItem {
    Wildcard,
    QualifiedWildcard(Ident),
    Expr { expr: Expr, alias: Option<Ident> },
}

/// A FROM entry: one relation plus its joins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableWithJoins {
    pub relation: TableFactor,
    pub joins: Vec<Join>,
}

/// A relation in a FROM clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TableFactor {
    Table(TableRef),
    Derived { subquery: Box<Query>, alias: Ident },
}

/// A named table reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRef {
    pub schema: Option<Ident>,
    pub name: Ident,
    pub alias: Option<Ident>,
}

impl TableRef {
    /// The identifier that qualifies columns of this table: the alias when
    /// present, the table name otherwise.
    pub fn qualifier(&self) -> &Ident {
        self.alias.as_ref().unwrap_or(&self.name)
    }
}

/// Join kinds the model supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

/// One join: kind, relation, and an optional ON constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Join {
    pub kind: JoinKind,
    pub relation: TableFactor,
    pub on: Option<Expr>,
}

/// A LIMIT clause: `ALL` or an expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LimitClause {
    All,
    Expr(Expr),
}

impl LimitClause {
    /// The literal numeric value, when the clause is a plain number.
    pub fn literal_value(&self) -> Option<u64> {
        match self {
            LimitClause::Expr(Expr::Literal(Literal::Number(raw))) => raw.parse().ok(),
            _ => None,
        }
    }
}

/// One ORDER BY item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderByItem {
    pub expr: Expr,
    pub asc: Option<bool>,
}

/// Scalar and boolean expressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// A column reference, optionally qualified by a table or alias.
    Column {
        qualifier: Option<Ident>,
        name: Ident,
    },
    /// An inline literal value.
    Literal(Literal),
    /// A bind placeholder carrying its out-of-band value.
    Bind(Literal),
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    Function {
        name: Ident,
        args: Vec<Expr>,
        star: bool,
    },
    /// Explicit parentheses preserved from the source.
    Nested(Box<Expr>),
    Like {
        negated: bool,
        expr: Box<Expr>,
        pattern: Box<Expr>,
    },
    InList {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
    },
    InSubquery {
        expr: Box<Expr>,
        subquery: Box<Query>,
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
    Exists {
        subquery: Box<Query>,
        negated: bool,
    },
    Subquery(Box<Query>),
}

impl Expr {
    /// Equality predicate `left = right`.
    pub fn eq(left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            left: Box::new(left),
            op: BinaryOp::Eq,
            right: Box::new(right),
        }
    }

    /// Conjunction `left AND right`.
    pub fn and(left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            left: Box::new(left),
            op: BinaryOp::And,
            right: Box::new(right),
        }
    }

    /// A qualified column reference.
    pub fn column(qualifier: Ident, name: Ident) -> Expr {
        Expr::Column {
            qualifier: Some(qualifier),
            name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Minus,
    Plus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    And,
    Or,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
}

/// Literal values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    /// Numeric literal kept in source form.
    Number(String),
    String(String),
    Boolean(bool),
    Null,
}

impl Literal {
    /// Out-of-band parameter value for this literal.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Literal::Number(raw) => {
                if let Ok(n) = raw.parse::<i64>() {
                    serde_json::Value::from(n)
                } else if let Ok(f) = raw.parse::<f64>() {
                    serde_json::Value::from(f)
                } else {
                    serde_json::Value::String(raw.clone())
                }
            }
            Literal::String(s) => serde_json::Value::String(s.clone()),
            Literal::Boolean(b) => serde_json::Value::Bool(*b),
            Literal::Null => serde_json::Value::Null,
        }
    }
}

/// A parsed statement, classified for validation.
///
/// Only queries flow through the rewrite chain; DDL and DML are carried
/// as classified keywords so the validator can rule on them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParsedStatement {
    Query(Query),
    Ddl { keyword: String },
    Dml { keyword: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unquoted_ident_matches_case_insensitively() {
        assert!(Ident::new("Users").matches("users"));
        assert!(!Ident::quoted("Users").matches("users"));
        assert!(Ident::quoted("Users").matches("Users"));
    }

    #[test]
    fn qualifier_prefers_alias() {
        let table = TableRef {
            schema: None,
            name: Ident::new("orders"),
            alias: Some(Ident::new("o")),
        };
        assert_eq!(table.qualifier().value, "o");
    }

    #[test]
    fn limit_literal_value() {
        let limit = LimitClause::Expr(Expr::Literal(Literal::Number("42".to_string())));
        assert_eq!(limit.literal_value(), Some(42));
        assert_eq!(LimitClause::All.literal_value(), None);
    }

    #[test]
    fn top_level_selects_cross_compound_arms() {
        let select = |name: &str| {
            Box::new(Select {
                distinct: false,
                projection: vec![SelectItem::Wildcard],
                from: vec![TableWithJoins {
                    relation: TableFactor::Table(TableRef {
                        schema: None,
                        name: Ident::new(name),
                        alias: None,
                    }),
                    joins: vec![],
                }],
                selection: None,
                group_by: vec![],
                having: None,
            })
        };
        let query = Query::bare(QueryBody::Compound {
            op: SetOperator::Union,
            all: false,
            left: Box::new(QueryBody::Select(select("a"))),
            right: Box::new(QueryBody::Nested(Box::new(Query::bare(
                QueryBody::Select(select("b")),
            )))),
        });
        assert_eq!(query.top_level_selects().len(), 2);
    }

    #[test]
    fn number_literal_param_values() {
        assert_eq!(
            Literal::Number("7".to_string()).to_json(),
            serde_json::json!(7)
        );
        assert_eq!(
            Literal::Number("1.5".to_string()).to_json(),
            serde_json::json!(1.5)
        );
    }
}
