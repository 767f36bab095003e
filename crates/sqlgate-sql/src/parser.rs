//! Dialect-keyed parsing into the query model.
//!
//! Parsing is strict by construction: any construct the model cannot
//! represent is rejected with [`SqlError::Unsupported`] instead of being
//! silently dropped. An admission decision must only ever be made on a
//! query the middleware fully understands.

use sqlparser::ast as sp;
use sqlparser::dialect::{AnsiDialect, Dialect, PostgreSqlDialect};
use sqlparser::keywords::Keyword;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::{Token, Tokenizer};

use crate::ast::{
    BinaryOp, Cte, Expr, Ident, Join, JoinKind, LimitClause, Literal, OrderByItem,
    ParsedStatement, Query, QueryBody, Select, SelectItem, SetOperator, TableFactor, TableRef,
    TableWithJoins, UnaryOp,
};
use crate::error::SqlError;

/// Parses raw SQL text into a [`ParsedStatement`].
pub trait SqlQueryParser {
    fn parse(&self, sql: &str) -> Result<ParsedStatement, SqlError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DialectKind {
    Ansi,
    Postgres,
}

/// Parser keyed by a dialect name from configuration.
#[derive(Debug, Clone)]
pub struct DialectParser {
    kind: DialectKind,
}

impl DialectParser {
    /// Build a parser for the given dialect key.
    ///
    /// Accepted keys are `ansi`, `postgresql` and `postgres`, compared
    /// case-insensitively.
    pub fn new(dialect: &str) -> Result<Self, SqlError> {
        let kind = match dialect.trim().to_lowercase().as_str() {
            "ansi" => DialectKind::Ansi,
            "postgresql" | "postgres" => DialectKind::Postgres,
            other => return Err(SqlError::UnsupportedDialect(other.to_string())),
        };
        Ok(Self { kind })
    }

    fn dialect(&self) -> Box<dyn Dialect> {
        match self.kind {
            DialectKind::Ansi => Box::new(AnsiDialect {}),
            DialectKind::Postgres => Box::new(PostgreSqlDialect {}),
        }
    }
}

impl SqlQueryParser for DialectParser {
    fn parse(&self, sql: &str) -> Result<ParsedStatement, SqlError> {
        let dialect = self.dialect();
        let tokens = Tokenizer::new(&*dialect, sql)
            .tokenize()
            .map_err(|e| SqlError::Parse(e.to_string()))?;
        let mut statements = Parser::new(&*dialect)
            .with_tokens(mark_unbounded_limits(tokens))
            .parse_statements()
            .map_err(|e| SqlError::Parse(e.to_string()))?;
        if statements.len() != 1 {
            return Err(SqlError::StatementCount(statements.len()));
        }
        let statement = statements.remove(0);
        tracing::debug!(kind = statement_kind(&statement), "parsed statement");
        classify(statement)
    }
}

/// Turn each `LIMIT ALL` into `LIMIT NULL` at the token level.
///
/// `sqlparser` drops a plain `LIMIT ALL` clause from the AST entirely,
/// which would make it indistinguishable from a query with no LIMIT at
/// all. `LIMIT NULL` is the same unbounded limit but survives parsing
/// as a null literal, which [`convert_limit`] maps to
/// [`LimitClause::All`].
fn mark_unbounded_limits(mut tokens: Vec<Token>) -> Vec<Token> {
    let mut after_limit = false;
    for token in &mut tokens {
        match token {
            Token::Word(word) if word.keyword == Keyword::LIMIT => after_limit = true,
            Token::Word(word) if after_limit && word.keyword == Keyword::ALL => {
                *token = Token::make_keyword("NULL");
                after_limit = false;
            }
            Token::Whitespace(_) => {}
            _ => after_limit = false,
        }
    }
    tokens
}

fn statement_kind(statement: &sp::Statement) -> &'static str {
    match statement {
        sp::Statement::Query(_) => "query",
        sp::Statement::Insert(_) | sp::Statement::Update { .. } | sp::Statement::Delete(_) => {
            "dml"
        }
        _ => "other",
    }
}

fn classify(statement: sp::Statement) -> Result<ParsedStatement, SqlError> {
    match statement {
        sp::Statement::Query(query) => Ok(ParsedStatement::Query(convert_query(*query)?)),
        sp::Statement::Insert { .. } => Ok(ParsedStatement::Dml {
            keyword: "INSERT".to_string(),
        }),
        sp::Statement::Update { .. } => Ok(ParsedStatement::Dml {
            keyword: "UPDATE".to_string(),
        }),
        sp::Statement::Delete { .. } => Ok(ParsedStatement::Dml {
            keyword: "DELETE".to_string(),
        }),
        sp::Statement::CreateTable { .. } => Ok(ParsedStatement::Ddl {
            keyword: "CREATE TABLE".to_string(),
        }),
        sp::Statement::CreateView { .. } => Ok(ParsedStatement::Ddl {
            keyword: "CREATE VIEW".to_string(),
        }),
        sp::Statement::CreateIndex { .. } => Ok(ParsedStatement::Ddl {
            keyword: "CREATE INDEX".to_string(),
        }),
        sp::Statement::AlterTable { .. } => Ok(ParsedStatement::Ddl {
            keyword: "ALTER TABLE".to_string(),
        }),
        sp::Statement::Drop { .. } => Ok(ParsedStatement::Ddl {
            keyword: "DROP".to_string(),
        }),
        sp::Statement::Truncate { .. } => Ok(ParsedStatement::Ddl {
            keyword: "TRUNCATE".to_string(),
        }),
        other => Err(SqlError::unsupported(format!("statement: {other}"))),
    }
}

fn convert_query(query: sp::Query) -> Result<Query, SqlError> {
    if query.fetch.is_some() {
        return Err(SqlError::unsupported("FETCH clause"));
    }
    if !query.locks.is_empty() {
        return Err(SqlError::unsupported("locking clause"));
    }

    let mut ctes = Vec::new();
    if let Some(with) = query.with {
        for cte in with.cte_tables {
            if !cte.alias.columns.is_empty() {
                return Err(SqlError::unsupported("CTE column list"));
            }
            if cte.from.is_some() || cte.materialized.is_some() {
                return Err(SqlError::unsupported("CTE modifiers"));
            }
            ctes.push(Cte {
                name: convert_ident(cte.alias.name),
                query: convert_query(*cte.query)?,
            });
        }
    }

    let body = convert_body(*query.body)?;
    let order_by = convert_order_by(query.order_by)?;
    let (limit, offset) = convert_limit(query.limit_clause)?;

    Ok(Query {
        ctes,
        body,
        order_by,
        limit,
        offset,
    })
}

fn convert_body(body: sp::SetExpr) -> Result<QueryBody, SqlError> {
    match body {
        sp::SetExpr::Select(select) => Ok(QueryBody::Select(Box::new(convert_select(*select)?))),
        sp::SetExpr::Query(query) => Ok(QueryBody::Nested(Box::new(convert_query(*query)?))),
        sp::SetExpr::SetOperation {
            op,
            set_quantifier,
            left,
            right,
        } => {
            let op = match op {
                sp::SetOperator::Union => SetOperator::Union,
                sp::SetOperator::Intersect => SetOperator::Intersect,
                sp::SetOperator::Except => SetOperator::Except,
                other => return Err(SqlError::unsupported(format!("set operator {other}"))),
            };
            let all = match set_quantifier {
                sp::SetQuantifier::All => true,
                sp::SetQuantifier::None | sp::SetQuantifier::Distinct => false,
                other => {
                    return Err(SqlError::unsupported(format!("set quantifier {other}")));
                }
            };
            Ok(QueryBody::Compound {
                op,
                all,
                left: Box::new(convert_body(*left)?),
                right: Box::new(convert_body(*right)?),
            })
        }
        other => Err(SqlError::unsupported(format!("query body: {other}"))),
    }
}

fn convert_select(select: sp::Select) -> Result<Select, SqlError> {
    if select.top.is_some() {
        return Err(SqlError::unsupported("TOP clause"));
    }
    if select.into.is_some() {
        return Err(SqlError::unsupported("SELECT INTO"));
    }
    if !select.lateral_views.is_empty() {
        return Err(SqlError::unsupported("lateral views"));
    }
    if !select.named_window.is_empty() || select.qualify.is_some() {
        return Err(SqlError::unsupported("window clauses"));
    }
    if !select.sort_by.is_empty() || !select.cluster_by.is_empty() || !select.distribute_by.is_empty()
    {
        return Err(SqlError::unsupported("distribution clauses"));
    }

    let distinct = match select.distinct {
        None => false,
        Some(sp::Distinct::Distinct) => true,
        Some(sp::Distinct::On(_)) => return Err(SqlError::unsupported("DISTINCT ON")),
    };

    let mut projection = Vec::with_capacity(select.projection.len());
    for item in select.projection {
        projection.push(convert_select_item(item)?);
    }

    let mut from = Vec::with_capacity(select.from.len());
    for entry in select.from {
        from.push(convert_table_with_joins(entry)?);
    }

    let selection = select.selection.map(convert_expr).transpose()?;

    let group_by = match select.group_by {
        sp::GroupByExpr::Expressions(exprs, modifiers) => {
            if !modifiers.is_empty() {
                return Err(SqlError::unsupported("GROUP BY modifiers"));
            }
            exprs
                .into_iter()
                .map(convert_expr)
                .collect::<Result<Vec<_>, _>>()?
        }
        sp::GroupByExpr::All(_) => return Err(SqlError::unsupported("GROUP BY ALL")),
    };

    let having = select.having.map(convert_expr).transpose()?;

    Ok(Select {
        distinct,
        projection,
        from,
        selection,
        group_by,
        having,
    })
}

fn convert_select_item(item: sp::SelectItem) -> Result<SelectItem, SqlError> {
    match item {
        sp::SelectItem::UnnamedExpr(expr) => Ok(SelectItem::Expr {
            expr: convert_expr(expr)?,
            alias: None,
        }),
        sp::SelectItem::ExprWithAlias { expr, alias } => Ok(SelectItem::Expr {
            expr: convert_expr(expr)?,
            alias: Some(convert_ident(alias)),
        }),
        sp::SelectItem::Wildcard(options) => {
            check_wildcard_options(&options)?;
            Ok(SelectItem::Wildcard)
        }
        sp::SelectItem::QualifiedWildcard(kind, options) => {
            check_wildcard_options(&options)?;
            let rendered = kind.to_string();
            let mut parts: Vec<&str> = rendered.split('.').collect();
            if parts.len() != 1 {
                return Err(SqlError::unsupported(format!(
                    "qualified wildcard {rendered}.*"
                )));
            }
            let part = parts.remove(0);
            let trimmed = part.trim_matches('"');
            Ok(SelectItem::QualifiedWildcard(if trimmed.len() < part.len() {
                Ident::quoted(trimmed)
            } else {
                Ident::new(part)
            }))
        }
    }
}

fn check_wildcard_options(options: &sp::WildcardAdditionalOptions) -> Result<(), SqlError> {
    if options.opt_ilike.is_some()
        || options.opt_exclude.is_some()
        || options.opt_except.is_some()
        || options.opt_replace.is_some()
        || options.opt_rename.is_some()
    {
        return Err(SqlError::unsupported("wildcard modifiers"));
    }
    Ok(())
}

fn convert_table_with_joins(entry: sp::TableWithJoins) -> Result<TableWithJoins, SqlError> {
    let relation = convert_table_factor(entry.relation)?;
    let mut joins = Vec::with_capacity(entry.joins.len());
    for join in entry.joins {
        if join.global {
            return Err(SqlError::unsupported("GLOBAL join"));
        }
        let (kind, constraint) = convert_join_operator(join.join_operator)?;
        joins.push(Join {
            kind,
            relation: convert_table_factor(join.relation)?,
            on: constraint,
        });
    }
    Ok(TableWithJoins { relation, joins })
}

fn convert_join_operator(op: sp::JoinOperator) -> Result<(JoinKind, Option<Expr>), SqlError> {
    let (kind, constraint) = match op {
        sp::JoinOperator::Join(c) | sp::JoinOperator::Inner(c) => (JoinKind::Inner, c),
        sp::JoinOperator::Left(c) | sp::JoinOperator::LeftOuter(c) => (JoinKind::Left, c),
        sp::JoinOperator::Right(c) | sp::JoinOperator::RightOuter(c) => (JoinKind::Right, c),
        sp::JoinOperator::FullOuter(c) => (JoinKind::Full, c),
        sp::JoinOperator::CrossJoin(c) => (JoinKind::Cross, c),
        other => {
            return Err(SqlError::unsupported(format!("join operator {other:?}")));
        }
    };
    let on = match constraint {
        sp::JoinConstraint::On(expr) => Some(convert_expr(expr)?),
        sp::JoinConstraint::None => None,
        sp::JoinConstraint::Using(_) => return Err(SqlError::unsupported("USING join")),
        sp::JoinConstraint::Natural => return Err(SqlError::unsupported("NATURAL join")),
    };
    Ok((kind, on))
}

fn convert_table_factor(factor: sp::TableFactor) -> Result<TableFactor, SqlError> {
    match factor {
        sp::TableFactor::Table {
            name,
            alias,
            args,
            with_hints,
            ..
        } => {
            if args.is_some() {
                return Err(SqlError::unsupported("table function"));
            }
            if !with_hints.is_empty() {
                return Err(SqlError::unsupported("table hints"));
            }
            let mut parts = Vec::with_capacity(name.0.len());
            for part in name.0 {
                match part {
                    sp::ObjectNamePart::Identifier(ident) => parts.push(convert_ident(ident)),
                    other => {
                        return Err(SqlError::unsupported(format!("table name part {other}")));
                    }
                }
            }
            let (schema, table) = match parts.len() {
                1 => (None, parts.remove(0)),
                2 => {
                    let table = parts.remove(1);
                    (Some(parts.remove(0)), table)
                }
                n => {
                    return Err(SqlError::unsupported(format!(
                        "table name with {n} parts"
                    )));
                }
            };
            Ok(TableFactor::Table(TableRef {
                schema,
                name: table,
                alias: convert_table_alias(alias)?,
            }))
        }
        sp::TableFactor::Derived {
            lateral,
            subquery,
            alias,
        } => {
            if lateral {
                return Err(SqlError::unsupported("LATERAL subquery"));
            }
            let alias = convert_table_alias(alias)?
                .ok_or_else(|| SqlError::unsupported("derived table without alias"))?;
            Ok(TableFactor::Derived {
                subquery: Box::new(convert_query(*subquery)?),
                alias,
            })
        }
        other => Err(SqlError::unsupported(format!("table factor: {other}"))),
    }
}

fn convert_table_alias(alias: Option<sp::TableAlias>) -> Result<Option<Ident>, SqlError> {
    match alias {
        None => Ok(None),
        Some(alias) => {
            if !alias.columns.is_empty() {
                return Err(SqlError::unsupported("alias column list"));
            }
            Ok(Some(convert_ident(alias.name)))
        }
    }
}

fn convert_order_by(order_by: Option<sp::OrderBy>) -> Result<Vec<OrderByItem>, SqlError> {
    let Some(order_by) = order_by else {
        return Ok(Vec::new());
    };
    if order_by.interpolate.is_some() {
        return Err(SqlError::unsupported("ORDER BY interpolation"));
    }
    let exprs = match order_by.kind {
        sp::OrderByKind::Expressions(exprs) => exprs,
        sp::OrderByKind::All(_) => return Err(SqlError::unsupported("ORDER BY ALL")),
    };
    let mut items = Vec::with_capacity(exprs.len());
    for item in exprs {
        if item.with_fill.is_some() {
            return Err(SqlError::unsupported("ORDER BY WITH FILL"));
        }
        if item.options.nulls_first.is_some() {
            return Err(SqlError::unsupported("NULLS FIRST/LAST"));
        }
        items.push(OrderByItem {
            expr: convert_expr(item.expr)?,
            asc: item.options.asc,
        });
    }
    Ok(items)
}

fn convert_limit(
    clause: Option<sp::LimitClause>,
) -> Result<(Option<LimitClause>, Option<Expr>), SqlError> {
    let Some(clause) = clause else {
        return Ok((None, None));
    };
    match clause {
        sp::LimitClause::LimitOffset {
            limit,
            offset,
            limit_by,
        } => {
            if !limit_by.is_empty() {
                return Err(SqlError::unsupported("LIMIT BY"));
            }
            let limit = match limit {
                None => None,
                Some(sp::Expr::Value(value)) if matches!(value.value, sp::Value::Null) => {
                    Some(LimitClause::All)
                }
                Some(expr) => Some(LimitClause::Expr(convert_expr(expr)?)),
            };
            let offset = offset.map(|o| convert_expr(o.value)).transpose()?;
            Ok((limit, offset))
        }
        sp::LimitClause::OffsetCommaLimit { offset, limit } => Ok((
            Some(LimitClause::Expr(convert_expr(limit)?)),
            Some(convert_expr(offset)?),
        )),
    }
}

fn convert_expr(expr: sp::Expr) -> Result<Expr, SqlError> {
    match expr {
        sp::Expr::Identifier(ident) => Ok(Expr::Column {
            qualifier: None,
            name: convert_ident(ident),
        }),
        sp::Expr::CompoundIdentifier(mut idents) => match idents.len() {
            1 => Ok(Expr::Column {
                qualifier: None,
                name: convert_ident(idents.remove(0)),
            }),
            2 => {
                let name = convert_ident(idents.remove(1));
                Ok(Expr::Column {
                    qualifier: Some(convert_ident(idents.remove(0))),
                    name,
                })
            }
            n => Err(SqlError::unsupported(format!(
                "column reference with {n} parts"
            ))),
        },
        sp::Expr::Value(value) => convert_value(value.value).map(Expr::Literal),
        sp::Expr::BinaryOp { left, op, right } => Ok(Expr::Binary {
            left: Box::new(convert_expr(*left)?),
            op: convert_binary_op(op)?,
            right: Box::new(convert_expr(*right)?),
        }),
        sp::Expr::UnaryOp { op, expr } => {
            let op = match op {
                sp::UnaryOperator::Not => UnaryOp::Not,
                sp::UnaryOperator::Minus => UnaryOp::Minus,
                sp::UnaryOperator::Plus => UnaryOp::Plus,
                other => {
                    return Err(SqlError::unsupported(format!("unary operator {other}")));
                }
            };
            Ok(Expr::Unary {
                op,
                expr: Box::new(convert_expr(*expr)?),
            })
        }
        sp::Expr::Nested(inner) => Ok(Expr::Nested(Box::new(convert_expr(*inner)?))),
        sp::Expr::Function(function) => convert_function(function),
        sp::Expr::Like {
            negated,
            any,
            expr,
            pattern,
            escape_char,
        } => {
            if any {
                return Err(SqlError::unsupported("LIKE ANY"));
            }
            if escape_char.is_some() {
                return Err(SqlError::unsupported("LIKE ESCAPE"));
            }
            Ok(Expr::Like {
                negated,
                expr: Box::new(convert_expr(*expr)?),
                pattern: Box::new(convert_expr(*pattern)?),
            })
        }
        sp::Expr::InList {
            expr,
            list,
            negated,
        } => Ok(Expr::InList {
            expr: Box::new(convert_expr(*expr)?),
            list: list
                .into_iter()
                .map(convert_expr)
                .collect::<Result<Vec<_>, _>>()?,
            negated,
        }),
        sp::Expr::InSubquery {
            expr,
            subquery,
            negated,
        } => Ok(Expr::InSubquery {
            expr: Box::new(convert_expr(*expr)?),
            subquery: Box::new(convert_query(*subquery)?),
            negated,
        }),
        sp::Expr::Between {
            expr,
            negated,
            low,
            high,
        } => Ok(Expr::Between {
            expr: Box::new(convert_expr(*expr)?),
            low: Box::new(convert_expr(*low)?),
            high: Box::new(convert_expr(*high)?),
            negated,
        }),
        sp::Expr::IsNull(inner) => Ok(Expr::IsNull {
            expr: Box::new(convert_expr(*inner)?),
            negated: false,
        }),
        sp::Expr::IsNotNull(inner) => Ok(Expr::IsNull {
            expr: Box::new(convert_expr(*inner)?),
            negated: true,
        }),
        sp::Expr::Exists { subquery, negated } => Ok(Expr::Exists {
            subquery: Box::new(convert_query(*subquery)?),
            negated,
        }),
        sp::Expr::Subquery(subquery) => {
            Ok(Expr::Subquery(Box::new(convert_query(*subquery)?)))
        }
        other => Err(SqlError::unsupported(format!("expression: {other}"))),
    }
}

fn convert_function(function: sp::Function) -> Result<Expr, SqlError> {
    if function.over.is_some() {
        return Err(SqlError::unsupported("window function"));
    }
    if function.filter.is_some() || function.null_treatment.is_some() {
        return Err(SqlError::unsupported("function modifiers"));
    }
    if !function.within_group.is_empty() {
        return Err(SqlError::unsupported("WITHIN GROUP"));
    }
    if !matches!(function.parameters, sp::FunctionArguments::None) {
        return Err(SqlError::unsupported("parameterized function"));
    }

    let mut name_parts = function.name.0;
    if name_parts.len() != 1 {
        return Err(SqlError::unsupported("qualified function name"));
    }
    let name = match name_parts.remove(0) {
        sp::ObjectNamePart::Identifier(ident) => convert_ident(ident),
        other => return Err(SqlError::unsupported(format!("function name {other}"))),
    };

    let mut args = Vec::new();
    let mut star = false;
    match function.args {
        sp::FunctionArguments::None => {}
        sp::FunctionArguments::List(list) => {
            if list.duplicate_treatment.is_some() {
                return Err(SqlError::unsupported("DISTINCT in function call"));
            }
            if !list.clauses.is_empty() {
                return Err(SqlError::unsupported("function argument clauses"));
            }
            for arg in list.args {
                match arg {
                    sp::FunctionArg::Unnamed(sp::FunctionArgExpr::Expr(expr)) => {
                        args.push(convert_expr(expr)?);
                    }
                    sp::FunctionArg::Unnamed(sp::FunctionArgExpr::Wildcard) => {
                        star = true;
                    }
                    other => {
                        return Err(SqlError::unsupported(format!(
                            "function argument {other}"
                        )));
                    }
                }
            }
            if star && !args.is_empty() {
                return Err(SqlError::unsupported("mixed wildcard function arguments"));
            }
        }
        sp::FunctionArguments::Subquery(_) => {
            return Err(SqlError::unsupported("subquery function arguments"));
        }
    }

    Ok(Expr::Function { name, args, star })
}

fn convert_value(value: sp::Value) -> Result<Literal, SqlError> {
    match value {
        sp::Value::Number(raw, _) => Ok(Literal::Number(raw)),
        sp::Value::SingleQuotedString(s) | sp::Value::DoubleQuotedString(s) => {
            Ok(Literal::String(s))
        }
        sp::Value::Boolean(b) => Ok(Literal::Boolean(b)),
        sp::Value::Null => Ok(Literal::Null),
        sp::Value::Placeholder(p) => Err(SqlError::unsupported(format!("placeholder {p}"))),
        other => Err(SqlError::unsupported(format!("literal {other}"))),
    }
}

fn convert_ident(ident: sp::Ident) -> Ident {
    Ident {
        value: ident.value,
        quoted: ident.quote_style.is_some(),
    }
}

fn convert_binary_op(op: sp::BinaryOperator) -> Result<BinaryOp, SqlError> {
    Ok(match op {
        sp::BinaryOperator::And => BinaryOp::And,
        sp::BinaryOperator::Or => BinaryOp::Or,
        sp::BinaryOperator::Eq => BinaryOp::Eq,
        sp::BinaryOperator::NotEq => BinaryOp::NotEq,
        sp::BinaryOperator::Lt => BinaryOp::Lt,
        sp::BinaryOperator::LtEq => BinaryOp::LtEq,
        sp::BinaryOperator::Gt => BinaryOp::Gt,
        sp::BinaryOperator::GtEq => BinaryOp::GtEq,
        sp::BinaryOperator::Plus => BinaryOp::Plus,
        sp::BinaryOperator::Minus => BinaryOp::Minus,
        sp::BinaryOperator::Multiply => BinaryOp::Multiply,
        sp::BinaryOperator::Divide => BinaryOp::Divide,
        sp::BinaryOperator::Modulo => BinaryOp::Modulo,
        other => return Err(SqlError::unsupported(format!("operator {other}"))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(sql: &str) -> ParsedStatement {
        DialectParser::new("postgresql").unwrap().parse(sql).unwrap()
    }

    fn parse_query(sql: &str) -> Query {
        match parse(sql) {
            ParsedStatement::Query(query) => query,
            other => panic!("expected query, got {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_dialect() {
        assert!(matches!(
            DialectParser::new("oracle"),
            Err(SqlError::UnsupportedDialect(_))
        ));
    }

    #[test]
    fn parses_simple_select() {
        let query = parse_query("SELECT id, name FROM users WHERE id = 7");
        let selects = query.top_level_selects();
        assert_eq!(selects.len(), 1);
        let select = selects[0];
        assert_eq!(select.projection.len(), 2);
        assert_eq!(select.from.len(), 1);
        match &select.from[0].relation {
            TableFactor::Table(table) => {
                assert_eq!(table.name.value, "users");
                assert!(table.schema.is_none());
            }
            other => panic!("unexpected relation {other:?}"),
        }
        match select.selection.as_ref().unwrap() {
            Expr::Binary { op, right, .. } => {
                assert_eq!(*op, BinaryOp::Eq);
                assert_eq!(
                    **right,
                    Expr::Literal(Literal::Number("7".to_string()))
                );
            }
            other => panic!("unexpected selection {other:?}"),
        }
    }

    #[test]
    fn parses_join_with_alias() {
        let query = parse_query(
            "SELECT o.id FROM orders o LEFT JOIN public.users u ON o.user_id = u.id",
        );
        let select = query.top_level_selects()[0];
        assert_eq!(select.from[0].joins.len(), 1);
        let join = &select.from[0].joins[0];
        assert_eq!(join.kind, JoinKind::Left);
        assert!(join.on.is_some());
        match &join.relation {
            TableFactor::Table(table) => {
                assert_eq!(table.schema.as_ref().unwrap().value, "public");
                assert_eq!(table.qualifier().value, "u");
            }
            other => panic!("unexpected relation {other:?}"),
        }
    }

    #[test]
    fn parses_limit_and_offset() {
        let query = parse_query("SELECT id FROM users LIMIT 10 OFFSET 5");
        assert_eq!(query.limit.as_ref().unwrap().literal_value(), Some(10));
        assert_eq!(
            query.offset,
            Some(Expr::Literal(Literal::Number("5".to_string())))
        );
    }

    #[test]
    fn parses_limit_all() {
        let query = parse_query("SELECT id FROM users LIMIT ALL");
        assert_eq!(query.limit, Some(LimitClause::All));

        let query = parse_query("SELECT id FROM users LIMIT ALL OFFSET 5");
        assert_eq!(query.limit, Some(LimitClause::All));
        assert_eq!(
            query.offset,
            Some(Expr::Literal(Literal::Number("5".to_string())))
        );
    }

    #[test]
    fn offset_without_limit_is_not_limit_all() {
        let query = parse_query("SELECT id FROM users OFFSET 5");
        assert_eq!(query.limit, None);
        assert!(query.offset.is_some());
    }

    #[test]
    fn limit_all_in_a_string_literal_stays_a_literal() {
        let query = parse_query("SELECT id FROM notes WHERE body = 'LIMIT ALL'");
        assert_eq!(query.limit, None);
        let select = query.top_level_selects()[0];
        match select.selection.as_ref().unwrap() {
            Expr::Binary { right, .. } => {
                assert_eq!(
                    **right,
                    Expr::Literal(Literal::String("LIMIT ALL".to_string()))
                );
            }
            other => panic!("unexpected selection {other:?}"),
        }
    }

    #[test]
    fn parses_cross_join() {
        let query = parse_query("SELECT a.id FROM a CROSS JOIN b");
        let select = query.top_level_selects()[0];
        assert_eq!(select.from[0].joins.len(), 1);
        let join = &select.from[0].joins[0];
        assert_eq!(join.kind, JoinKind::Cross);
        assert!(join.on.is_none());
    }

    #[test]
    fn parses_union() {
        let query = parse_query("SELECT id FROM a UNION ALL SELECT id FROM b");
        match &query.body {
            QueryBody::Compound { op, all, .. } => {
                assert_eq!(*op, SetOperator::Union);
                assert!(*all);
            }
            other => panic!("unexpected body {other:?}"),
        }
        assert_eq!(query.top_level_selects().len(), 2);
    }

    #[test]
    fn parses_cte() {
        let query =
            parse_query("WITH recent AS (SELECT id FROM events LIMIT 10) SELECT id FROM recent");
        assert_eq!(query.ctes.len(), 1);
        assert_eq!(query.ctes[0].name.value, "recent");
        assert_eq!(query.ctes[0].query.limit.as_ref().unwrap().literal_value(), Some(10));
    }

    #[test]
    fn classifies_ddl() {
        assert_eq!(
            parse("DROP TABLE users"),
            ParsedStatement::Ddl {
                keyword: "DROP".to_string()
            }
        );
        assert_eq!(
            parse("CREATE TABLE t (id INT)"),
            ParsedStatement::Ddl {
                keyword: "CREATE TABLE".to_string()
            }
        );
    }

    #[test]
    fn classifies_dml() {
        assert_eq!(
            parse("DELETE FROM users WHERE id = 1"),
            ParsedStatement::Dml {
                keyword: "DELETE".to_string()
            }
        );
        assert_eq!(
            parse("INSERT INTO users (id) VALUES (1)"),
            ParsedStatement::Dml {
                keyword: "INSERT".to_string()
            }
        );
    }

    #[test]
    fn rejects_multiple_statements() {
        let parser = DialectParser::new("ansi").unwrap();
        assert!(matches!(
            parser.parse("SELECT 1; SELECT 2"),
            Err(SqlError::StatementCount(2))
        ));
    }

    #[test]
    fn rejects_placeholders() {
        let parser = DialectParser::new("postgresql").unwrap();
        assert!(matches!(
            parser.parse("SELECT id FROM users WHERE id = $1"),
            Err(SqlError::Unsupported(_))
        ));
    }

    #[test]
    fn preserves_quoted_identifiers() {
        let query = parse_query("SELECT \"Id\" FROM \"Users\"");
        let select = query.top_level_selects()[0];
        match &select.projection[0] {
            SelectItem::Expr {
                expr: Expr::Column { name, .. },
                ..
            } => {
                assert_eq!(name.value, "Id");
                assert!(name.quoted);
            }
            other => panic!("unexpected projection {other:?}"),
        }
    }
}
