//! Rendering the query model back to SQL text.
//!
//! The renderer is the single place query text is produced: uppercase
//! keywords, single spaces, explicit AS for aliases, and parentheses
//! driven by operator precedence rather than by source text. Two
//! queries that differ only in formatting therefore render identically.

use sqlgate_core::{ExecutionContext, ParameterizationMode};

use crate::ast::{
    BinaryOp, Expr, Ident, Join, JoinKind, LimitClause, Literal, OrderByItem, Query, QueryBody,
    Select, SelectItem, SetOperator, TableFactor, TableRef, TableWithJoins, UnaryOp,
};
use crate::error::SqlError;

/// Rendered SQL text plus the out-of-band parameter values, in
/// placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedSql {
    pub sql: String,
    pub params: Vec<serde_json::Value>,
}

/// Renders a query for the dialect the parser accepted it under.
pub trait SqlQueryRenderer {
    fn render(&self, query: &Query, ctx: &ExecutionContext) -> Result<RenderedSql, SqlError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlaceholderStyle {
    /// `$1`, `$2`, ...
    Numbered,
    /// `?`
    Question,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RenderMode {
    /// Literals stay inline; bind nodes become placeholders.
    Inline,
    /// Every literal and bind node becomes a placeholder.
    Bind,
    /// Normalized text for fingerprinting: all values become `?` and
    /// unquoted identifiers are lowercased.
    Canonical,
}

/// Dialect-keyed renderer.
#[derive(Debug, Clone)]
pub struct DialectRenderer {
    placeholder: PlaceholderStyle,
}

impl DialectRenderer {
    pub fn new(dialect: &str) -> Result<Self, SqlError> {
        let placeholder = match dialect.trim().to_lowercase().as_str() {
            "postgresql" | "postgres" => PlaceholderStyle::Numbered,
            "ansi" => PlaceholderStyle::Question,
            other => return Err(SqlError::UnsupportedDialect(other.to_string())),
        };
        Ok(Self { placeholder })
    }

    /// Canonical text used as fingerprint input. Parameter values are
    /// erased so logically identical queries canonicalize identically.
    pub fn canonical_text(&self, query: &Query) -> Result<String, SqlError> {
        let mut writer = SqlWriter::new(RenderMode::Canonical, self.placeholder);
        writer.query(query)?;
        Ok(writer.out)
    }
}

impl SqlQueryRenderer for DialectRenderer {
    fn render(&self, query: &Query, ctx: &ExecutionContext) -> Result<RenderedSql, SqlError> {
        let mode = match ctx.parameterization {
            ParameterizationMode::Off => RenderMode::Inline,
            ParameterizationMode::Bind => RenderMode::Bind,
        };
        let mut writer = SqlWriter::new(mode, self.placeholder);
        writer.query(query)?;
        Ok(RenderedSql {
            sql: writer.out,
            params: writer.params,
        })
    }
}

struct SqlWriter {
    mode: RenderMode,
    placeholder: PlaceholderStyle,
    out: String,
    params: Vec<serde_json::Value>,
}

impl SqlWriter {
    fn new(mode: RenderMode, placeholder: PlaceholderStyle) -> Self {
        Self {
            mode,
            placeholder,
            out: String::new(),
            params: Vec::new(),
        }
    }

    fn push(&mut self, text: &str) {
        self.out.push_str(text);
    }

    fn query(&mut self, query: &Query) -> Result<(), SqlError> {
        if !query.ctes.is_empty() {
            self.push("WITH ");
            for (i, cte) in query.ctes.iter().enumerate() {
                if i > 0 {
                    self.push(", ");
                }
                self.ident(&cte.name);
                self.push(" AS (");
                self.query(&cte.query)?;
                self.push(")");
            }
            self.push(" ");
        }
        self.body(&query.body)?;
        if !query.order_by.is_empty() {
            self.push(" ORDER BY ");
            for (i, item) in query.order_by.iter().enumerate() {
                if i > 0 {
                    self.push(", ");
                }
                self.order_item(item)?;
            }
        }
        if let Some(limit) = &query.limit {
            match limit {
                LimitClause::All => self.push(" LIMIT ALL"),
                LimitClause::Expr(expr) => {
                    self.push(" LIMIT ");
                    self.expr(expr, 0)?;
                }
            }
        }
        if let Some(offset) = &query.offset {
            self.push(" OFFSET ");
            self.expr(offset, 0)?;
        }
        Ok(())
    }

    fn body(&mut self, body: &QueryBody) -> Result<(), SqlError> {
        match body {
            QueryBody::Select(select) => self.select(select),
            QueryBody::Compound {
                op,
                all,
                left,
                right,
            } => {
                self.body(left)?;
                self.push(match op {
                    SetOperator::Union => " UNION ",
                    SetOperator::Intersect => " INTERSECT ",
                    SetOperator::Except => " EXCEPT ",
                });
                if *all {
                    self.push("ALL ");
                }
                self.body(right)
            }
            QueryBody::Nested(query) => {
                self.push("(");
                self.query(query)?;
                self.push(")");
                Ok(())
            }
        }
    }

    fn select(&mut self, select: &Select) -> Result<(), SqlError> {
        self.push("SELECT ");
        if select.distinct {
            self.push("DISTINCT ");
        }
        for (i, item) in select.projection.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.select_item(item)?;
        }
        if !select.from.is_empty() {
            self.push(" FROM ");
            for (i, entry) in select.from.iter().enumerate() {
                if i > 0 {
                    self.push(", ");
                }
                self.table_with_joins(entry)?;
            }
        }
        if let Some(selection) = &select.selection {
            self.push(" WHERE ");
            self.expr(selection, 0)?;
        }
        if !select.group_by.is_empty() {
            self.push(" GROUP BY ");
            for (i, expr) in select.group_by.iter().enumerate() {
                if i > 0 {
                    self.push(", ");
                }
                self.expr(expr, 0)?;
            }
        }
        if let Some(having) = &select.having {
            self.push(" HAVING ");
            self.expr(having, 0)?;
        }
        Ok(())
    }

    fn select_item(&mut self, item: &SelectItem) -> Result<(), SqlError> {
        match item {
            SelectItem::Wildcard => {
                self.push("*");
                Ok(())
            }
            SelectItem::QualifiedWildcard(qualifier) => {
                self.ident(qualifier);
                self.push(".*");
                Ok(())
            }
            SelectItem::Expr { expr, alias } => {
                self.expr(expr, 0)?;
                if let Some(alias) = alias {
                    self.push(" AS ");
                    self.ident(alias);
                }
                Ok(())
            }
        }
    }

    fn table_with_joins(&mut self, entry: &TableWithJoins) -> Result<(), SqlError> {
        self.table_factor(&entry.relation)?;
        for join in &entry.joins {
            self.join(join)?;
        }
        Ok(())
    }

    fn join(&mut self, join: &Join) -> Result<(), SqlError> {
        self.push(match join.kind {
            JoinKind::Inner => " JOIN ",
            JoinKind::Left => " LEFT JOIN ",
            JoinKind::Right => " RIGHT JOIN ",
            JoinKind::Full => " FULL JOIN ",
            JoinKind::Cross => " CROSS JOIN ",
        });
        self.table_factor(&join.relation)?;
        if let Some(on) = &join.on {
            self.push(" ON ");
            self.expr(on, 0)?;
        }
        Ok(())
    }

    fn table_factor(&mut self, factor: &TableFactor) -> Result<(), SqlError> {
        match factor {
            TableFactor::Table(table) => {
                self.table_ref(table);
                Ok(())
            }
            TableFactor::Derived { subquery, alias } => {
                self.push("(");
                self.query(subquery)?;
                self.push(") AS ");
                self.ident(alias);
                Ok(())
            }
        }
    }

    fn table_ref(&mut self, table: &TableRef) {
        if let Some(schema) = &table.schema {
            self.ident(schema);
            self.push(".");
        }
        self.ident(&table.name);
        if let Some(alias) = &table.alias {
            self.push(" AS ");
            self.ident(alias);
        }
    }

    fn order_item(&mut self, item: &OrderByItem) -> Result<(), SqlError> {
        self.expr(&item.expr, 0)?;
        match item.asc {
            Some(true) => self.push(" ASC"),
            Some(false) => self.push(" DESC"),
            None => {}
        }
        Ok(())
    }

    /// Renders an expression, parenthesizing when its precedence is too
    /// low for the surrounding context.
    fn expr(&mut self, expr: &Expr, min_prec: u8) -> Result<(), SqlError> {
        let prec = precedence(expr);
        let needs_parens = prec < min_prec;
        if needs_parens {
            self.push("(");
        }
        match expr {
            Expr::Column { qualifier, name } => {
                if let Some(qualifier) = qualifier {
                    self.ident(qualifier);
                    self.push(".");
                }
                self.ident(name);
            }
            Expr::Literal(literal) => self.literal(literal),
            Expr::Bind(literal) => self.bind_value(literal),
            Expr::Unary { op, expr } => {
                match op {
                    UnaryOp::Not => self.push("NOT "),
                    UnaryOp::Minus => self.push("-"),
                    UnaryOp::Plus => self.push("+"),
                }
                self.expr(expr, prec)?;
            }
            Expr::Binary { left, op, right } => {
                self.expr(left, prec)?;
                self.push(binary_op_text(*op));
                // Subtraction, division and modulo do not associate; the
                // right operand keeps its parentheses at equal precedence.
                let right_min = match op {
                    BinaryOp::Minus | BinaryOp::Divide | BinaryOp::Modulo => prec + 1,
                    _ => prec,
                };
                self.expr(right, right_min)?;
            }
            Expr::Function { name, args, star } => {
                self.ident(name);
                self.push("(");
                if *star {
                    self.push("*");
                } else {
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            self.push(", ");
                        }
                        self.expr(arg, 0)?;
                    }
                }
                self.push(")");
            }
            Expr::Nested(inner) => {
                self.push("(");
                self.expr(inner, 0)?;
                self.push(")");
            }
            Expr::Like {
                negated,
                expr,
                pattern,
            } => {
                self.expr(expr, prec + 1)?;
                self.push(if *negated { " NOT LIKE " } else { " LIKE " });
                self.expr(pattern, prec + 1)?;
            }
            Expr::InList {
                expr,
                list,
                negated,
            } => {
                self.expr(expr, prec + 1)?;
                self.push(if *negated { " NOT IN (" } else { " IN (" });
                for (i, item) in list.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.expr(item, 0)?;
                }
                self.push(")");
            }
            Expr::InSubquery {
                expr,
                subquery,
                negated,
            } => {
                self.expr(expr, prec + 1)?;
                self.push(if *negated { " NOT IN (" } else { " IN (" });
                self.query(subquery)?;
                self.push(")");
            }
            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => {
                self.expr(expr, prec + 1)?;
                self.push(if *negated {
                    " NOT BETWEEN "
                } else {
                    " BETWEEN "
                });
                self.expr(low, prec + 1)?;
                self.push(" AND ");
                self.expr(high, prec + 1)?;
            }
            Expr::IsNull { expr, negated } => {
                self.expr(expr, prec + 1)?;
                self.push(if *negated { " IS NOT NULL" } else { " IS NULL" });
            }
            Expr::Exists { subquery, negated } => {
                if *negated {
                    self.push("NOT ");
                }
                self.push("EXISTS (");
                self.query(subquery)?;
                self.push(")");
            }
            Expr::Subquery(subquery) => {
                self.push("(");
                self.query(subquery)?;
                self.push(")");
            }
        }
        if needs_parens {
            self.push(")");
        }
        Ok(())
    }

    fn literal(&mut self, literal: &Literal) {
        match self.mode {
            RenderMode::Inline => self.literal_text(literal),
            RenderMode::Bind => self.param(literal),
            RenderMode::Canonical => self.push("?"),
        }
    }

    /// Bind nodes carry out-of-band values and never inline, regardless
    /// of the parameterization mode the query renders under.
    fn bind_value(&mut self, literal: &Literal) {
        match self.mode {
            RenderMode::Inline | RenderMode::Bind => self.param(literal),
            RenderMode::Canonical => self.push("?"),
        }
    }

    fn param(&mut self, literal: &Literal) {
        self.params.push(literal.to_json());
        match self.placeholder {
            PlaceholderStyle::Numbered => {
                let n = self.params.len();
                self.push(&format!("${n}"));
            }
            PlaceholderStyle::Question => self.push("?"),
        }
    }

    fn literal_text(&mut self, literal: &Literal) {
        match literal {
            Literal::Number(raw) => self.push(raw),
            Literal::String(s) => {
                self.push("'");
                self.push(&s.replace('\'', "''"));
                self.push("'");
            }
            Literal::Boolean(true) => self.push("TRUE"),
            Literal::Boolean(false) => self.push("FALSE"),
            Literal::Null => self.push("NULL"),
        }
    }

    fn ident(&mut self, ident: &Ident) {
        if ident.quoted {
            self.push("\"");
            self.push(&ident.value.replace('"', "\"\""));
            self.push("\"");
        } else if self.mode == RenderMode::Canonical {
            self.push(&ident.value.to_lowercase());
        } else {
            self.push(&ident.value);
        }
    }
}

fn binary_op_text(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::And => " AND ",
        BinaryOp::Or => " OR ",
        BinaryOp::Eq => " = ",
        BinaryOp::NotEq => " <> ",
        BinaryOp::Lt => " < ",
        BinaryOp::LtEq => " <= ",
        BinaryOp::Gt => " > ",
        BinaryOp::GtEq => " >= ",
        BinaryOp::Plus => " + ",
        BinaryOp::Minus => " - ",
        BinaryOp::Multiply => " * ",
        BinaryOp::Divide => " / ",
        BinaryOp::Modulo => " % ",
    }
}

fn precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::Binary { op, .. } => match op {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::Eq
            | BinaryOp::NotEq
            | BinaryOp::Lt
            | BinaryOp::LtEq
            | BinaryOp::Gt
            | BinaryOp::GtEq => 4,
            BinaryOp::Plus | BinaryOp::Minus => 5,
            BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Modulo => 6,
        },
        Expr::Unary {
            op: UnaryOp::Not, ..
        } => 3,
        Expr::Unary { .. } => 7,
        Expr::Like { .. }
        | Expr::InList { .. }
        | Expr::InSubquery { .. }
        | Expr::Between { .. }
        | Expr::IsNull { .. } => 4,
        _ => 8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{DialectParser, SqlQueryParser};
    use pretty_assertions::assert_eq;
    use sqlgate_core::ExecutionContext;

    fn parse(sql: &str) -> Query {
        match DialectParser::new("postgresql").unwrap().parse(sql).unwrap() {
            crate::ast::ParsedStatement::Query(query) => query,
            other => panic!("expected query, got {other:?}"),
        }
    }

    fn ctx() -> ExecutionContext {
        ExecutionContext::new("postgresql").unwrap()
    }

    fn bind_ctx() -> ExecutionContext {
        ctx().with_parameterization(ParameterizationMode::Bind)
    }

    #[test]
    fn renders_simple_select() {
        let query = parse("select id, name from users where id = 7");
        let rendered = DialectRenderer::new("postgresql")
            .unwrap()
            .render(&query, &ctx())
            .unwrap();
        assert_eq!(rendered.sql, "SELECT id, name FROM users WHERE id = 7");
        assert!(rendered.params.is_empty());
    }

    #[test]
    fn renders_join_and_alias() {
        let query = parse("SELECT o.id FROM orders o LEFT JOIN users u ON o.user_id = u.id");
        let rendered = DialectRenderer::new("postgresql")
            .unwrap()
            .render(&query, &ctx())
            .unwrap();
        assert_eq!(
            rendered.sql,
            "SELECT o.id FROM orders AS o LEFT JOIN users AS u ON o.user_id = u.id"
        );
    }

    #[test]
    fn bind_mode_collects_params_left_to_right() {
        let query = parse("SELECT id FROM users WHERE id = 7 AND name = 'ann' LIMIT 10");
        let rendered = DialectRenderer::new("postgresql")
            .unwrap()
            .render(&query, &bind_ctx())
            .unwrap();
        assert_eq!(
            rendered.sql,
            "SELECT id FROM users WHERE id = $1 AND name = $2 LIMIT $3"
        );
        assert_eq!(
            rendered.params,
            vec![
                serde_json::json!(7),
                serde_json::json!("ann"),
                serde_json::json!(10)
            ]
        );
    }

    #[test]
    fn ansi_placeholders_are_question_marks() {
        let query = parse("SELECT id FROM users WHERE id = 7");
        let rendered = DialectRenderer::new("ansi")
            .unwrap()
            .render(&query, &bind_ctx())
            .unwrap();
        assert_eq!(rendered.sql, "SELECT id FROM users WHERE id = ?");
    }

    #[test]
    fn bind_nodes_parameterize_even_inline() {
        let query = Query {
            ctes: vec![],
            body: QueryBody::Select(Box::new(Select {
                distinct: false,
                projection: vec![SelectItem::Wildcard],
                from: vec![TableWithJoins {
                    relation: TableFactor::Table(TableRef {
                        schema: None,
                        name: Ident::new("users"),
                        alias: None,
                    }),
                    joins: vec![],
                }],
                selection: Some(Expr::eq(
                    Expr::Column {
                        qualifier: None,
                        name: Ident::new("tenant_id"),
                    },
                    Expr::Bind(Literal::String("t-1".to_string())),
                )),
                group_by: vec![],
                having: None,
            })),
            order_by: vec![],
            limit: None,
            offset: None,
        };
        let rendered = DialectRenderer::new("postgresql")
            .unwrap()
            .render(&query, &ctx())
            .unwrap();
        assert_eq!(rendered.sql, "SELECT * FROM users WHERE tenant_id = $1");
        assert_eq!(rendered.params, vec![serde_json::json!("t-1")]);
    }

    #[test]
    fn preserves_explicit_parentheses() {
        let query = parse("SELECT id FROM t WHERE (a = 1 OR b = 2) AND c = 3");
        let rendered = DialectRenderer::new("postgresql")
            .unwrap()
            .render(&query, &ctx())
            .unwrap();
        assert_eq!(
            rendered.sql,
            "SELECT id FROM t WHERE (a = 1 OR b = 2) AND c = 3"
        );
    }

    #[test]
    fn escapes_string_literals() {
        let query = parse("SELECT id FROM users WHERE name = 'O''Brien'");
        let rendered = DialectRenderer::new("postgresql")
            .unwrap()
            .render(&query, &ctx())
            .unwrap();
        assert_eq!(
            rendered.sql,
            "SELECT id FROM users WHERE name = 'O''Brien'"
        );
    }

    #[test]
    fn renders_union_and_order() {
        let query = parse("SELECT id FROM a UNION ALL SELECT id FROM b ORDER BY id DESC LIMIT 5");
        let rendered = DialectRenderer::new("postgresql")
            .unwrap()
            .render(&query, &ctx())
            .unwrap();
        assert_eq!(
            rendered.sql,
            "SELECT id FROM a UNION ALL SELECT id FROM b ORDER BY id DESC LIMIT 5"
        );
    }

    #[test]
    fn canonical_text_erases_values_and_case() {
        let renderer = DialectRenderer::new("postgresql").unwrap();
        let a = renderer
            .canonical_text(&parse("SELECT ID FROM Users WHERE id = 7"))
            .unwrap();
        let b = renderer
            .canonical_text(&parse("select id from users where id = 99"))
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(a, "SELECT id FROM users WHERE id = ?");
    }

    #[test]
    fn quoted_identifiers_keep_case_in_canonical_text() {
        let renderer = DialectRenderer::new("postgresql").unwrap();
        let text = renderer
            .canonical_text(&parse("SELECT \"Id\" FROM \"Users\""))
            .unwrap();
        assert_eq!(text, "SELECT \"Id\" FROM \"Users\"");
    }
}
