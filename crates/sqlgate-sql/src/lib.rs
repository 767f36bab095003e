//! # sqlgate-sql
//!
//! The SQL surface of the middleware: a closed query model, strict
//! dialect-keyed parsing on top of `sqlparser`, deterministic rendering
//! with optional bind-parameter extraction, and shape fingerprints.
//!
//! Everything downstream (validation, rewriting, decisions) operates on
//! the model in [`ast`], never on raw SQL text.

pub mod ast;
pub mod error;
pub mod fingerprint;
pub mod parser;
pub mod render;

pub use ast::{
    BinaryOp, Cte, Expr, Ident, Join, JoinKind, LimitClause, Literal, OrderByItem,
    ParsedStatement, Query, QueryBody, Select, SelectItem, SetOperator, TableFactor, TableRef,
    TableWithJoins, UnaryOp,
};
pub use error::SqlError;
pub use fingerprint::{fingerprint, fingerprint_text};
pub use parser::{DialectParser, SqlQueryParser};
pub use render::{DialectRenderer, RenderedSql, SqlQueryRenderer};
