//! Statement validation against the configured policy.

use std::collections::BTreeSet;

use sqlgate_core::{ExecutionContext, ReasonCode, ValidatorConfig};
use sqlgate_sql::{
    Expr, ParsedStatement, Query, QueryBody, Select, TableFactor, TableRef, TableWithJoins,
};

/// A validation verdict that denies the statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    pub reason: ReasonCode,
    pub message: String,
}

impl ValidationFailure {
    pub fn new(reason: ReasonCode, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }
}

/// Validates a parsed statement before and after rewriting. Validators
/// are pure and must give the same verdict for the same inputs.
pub trait SqlQueryValidator: Send + Sync {
    fn validate(
        &self,
        statement: &ParsedStatement,
        ctx: &ExecutionContext,
    ) -> Result<(), ValidationFailure>;
}

/// The default validator, driven entirely by [`ValidatorConfig`].
///
/// DDL is always denied. DML is denied unless `allow_dml` is set.
/// Queries are checked against the table allow list, the denied
/// function list, and the join and projection ceilings.
pub struct PolicyValidator {
    allow_dml: bool,
    allowed_tables: Option<BTreeSet<String>>,
    denied_functions: BTreeSet<String>,
    max_join_count: Option<usize>,
    max_select_columns: Option<usize>,
}

impl PolicyValidator {
    pub fn new(config: &ValidatorConfig) -> Self {
        Self {
            allow_dml: config.allow_dml,
            allowed_tables: config
                .allowed_tables
                .as_ref()
                .map(|tables| tables.iter().map(|t| t.to_lowercase()).collect()),
            denied_functions: config
                .denied_functions
                .iter()
                .map(|f| f.to_lowercase())
                .collect(),
            max_join_count: config.max_join_count,
            max_select_columns: config.max_select_columns,
        }
    }

    fn check_query(&self, query: &Query) -> Result<(), ValidationFailure> {
        let mut stats = QueryStats::default();
        collect_query(query, &mut Vec::new(), &mut stats);

        if let Some(allowed) = &self.allowed_tables {
            for table in &stats.tables {
                if !table.permitted_by(allowed) {
                    return Err(ValidationFailure::new(
                        ReasonCode::DenyTable,
                        format!("table {} is not in the allowed table list", table.display()),
                    ));
                }
            }
        }
        for function in &stats.functions {
            if self.denied_functions.contains(function) {
                return Err(ValidationFailure::new(
                    ReasonCode::DenyFunction,
                    format!("function {function} is denied by policy"),
                ));
            }
        }
        if let Some(max) = self.max_join_count {
            if stats.join_count > max {
                return Err(ValidationFailure::new(
                    ReasonCode::DenyTable,
                    format!("query uses {} joins, at most {max} allowed", stats.join_count),
                ));
            }
        }
        if let Some(max) = self.max_select_columns {
            if stats.max_projection > max {
                return Err(ValidationFailure::new(
                    ReasonCode::DenyColumn,
                    format!(
                        "query selects {} columns, at most {max} allowed",
                        stats.max_projection
                    ),
                ));
            }
        }
        Ok(())
    }
}

impl SqlQueryValidator for PolicyValidator {
    fn validate(
        &self,
        statement: &ParsedStatement,
        _ctx: &ExecutionContext,
    ) -> Result<(), ValidationFailure> {
        match statement {
            ParsedStatement::Ddl { keyword } => Err(ValidationFailure::new(
                ReasonCode::DenyDdl,
                format!("DDL statement {keyword} is not allowed"),
            )),
            ParsedStatement::Dml { keyword } => {
                if self.allow_dml {
                    Ok(())
                } else {
                    Err(ValidationFailure::new(
                        ReasonCode::DenyDml,
                        format!("DML statement {keyword} is not allowed"),
                    ))
                }
            }
            ParsedStatement::Query(query) => self.check_query(query),
        }
    }
}

/// A table reference seen while walking a query, lower-cased for policy
/// lookup. CTE references are excluded before this is built.
struct SeenTable {
    schema: Option<String>,
    name: String,
}

impl SeenTable {
    fn permitted_by(&self, allowed: &BTreeSet<String>) -> bool {
        if allowed.contains(&self.name) {
            return true;
        }
        match &self.schema {
            Some(schema) => allowed.contains(&format!("{schema}.{}", self.name)),
            None => false,
        }
    }

    fn display(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{schema}.{}", self.name),
            None => self.name.clone(),
        }
    }
}

#[derive(Default)]
struct QueryStats {
    tables: Vec<SeenTable>,
    functions: Vec<String>,
    join_count: usize,
    max_projection: usize,
}

fn collect_query(query: &Query, cte_scope: &mut Vec<String>, stats: &mut QueryStats) {
    let depth = cte_scope.len();
    for cte in &query.ctes {
        collect_query(&cte.query, cte_scope, stats);
        cte_scope.push(cte.name.lookup());
    }
    collect_body(&query.body, cte_scope, stats);
    for item in &query.order_by {
        collect_expr(&item.expr, cte_scope, stats);
    }
    cte_scope.truncate(depth);
}

fn collect_body(body: &QueryBody, cte_scope: &mut Vec<String>, stats: &mut QueryStats) {
    match body {
        QueryBody::Select(select) => collect_select(select, cte_scope, stats),
        QueryBody::Compound { left, right, .. } => {
            collect_body(left, cte_scope, stats);
            collect_body(right, cte_scope, stats);
        }
        QueryBody::Nested(query) => collect_query(query, cte_scope, stats),
    }
}

fn collect_select(select: &Select, cte_scope: &mut Vec<String>, stats: &mut QueryStats) {
    stats.max_projection = stats.max_projection.max(select.projection.len());
    for item in &select.projection {
        if let sqlgate_sql::SelectItem::Expr { expr, .. } = item {
            collect_expr(expr, cte_scope, stats);
        }
    }
    for twj in &select.from {
        collect_table_with_joins(twj, cte_scope, stats);
    }
    if let Some(selection) = &select.selection {
        collect_expr(selection, cte_scope, stats);
    }
    for expr in &select.group_by {
        collect_expr(expr, cte_scope, stats);
    }
    if let Some(having) = &select.having {
        collect_expr(having, cte_scope, stats);
    }
}

fn collect_table_with_joins(
    twj: &TableWithJoins,
    cte_scope: &mut Vec<String>,
    stats: &mut QueryStats,
) {
    collect_factor(&twj.relation, cte_scope, stats);
    stats.join_count += twj.joins.len();
    for join in &twj.joins {
        collect_factor(&join.relation, cte_scope, stats);
        if let Some(on) = &join.on {
            collect_expr(on, cte_scope, stats);
        }
    }
}

fn collect_factor(factor: &TableFactor, cte_scope: &mut Vec<String>, stats: &mut QueryStats) {
    match factor {
        TableFactor::Table(table) => collect_table(table, cte_scope, stats),
        TableFactor::Derived { subquery, .. } => collect_query(subquery, cte_scope, stats),
    }
}

fn collect_table(table: &TableRef, cte_scope: &[String], stats: &mut QueryStats) {
    if table.schema.is_none() && cte_scope.contains(&table.name.lookup()) {
        return;
    }
    stats.tables.push(SeenTable {
        schema: table.schema.as_ref().map(|s| s.lookup()),
        name: table.name.lookup(),
    });
}

fn collect_expr(expr: &Expr, cte_scope: &mut Vec<String>, stats: &mut QueryStats) {
    match expr {
        Expr::Column { .. } | Expr::Literal(_) | Expr::Bind(_) => {}
        Expr::Unary { expr, .. } | Expr::Nested(expr) => collect_expr(expr, cte_scope, stats),
        Expr::Binary { left, right, .. } => {
            collect_expr(left, cte_scope, stats);
            collect_expr(right, cte_scope, stats);
        }
        Expr::Function { name, args, .. } => {
            stats.functions.push(name.lookup());
            for arg in args {
                collect_expr(arg, cte_scope, stats);
            }
        }
        Expr::Like { expr, pattern, .. } => {
            collect_expr(expr, cte_scope, stats);
            collect_expr(pattern, cte_scope, stats);
        }
        Expr::InList { expr, list, .. } => {
            collect_expr(expr, cte_scope, stats);
            for item in list {
                collect_expr(item, cte_scope, stats);
            }
        }
        Expr::InSubquery { expr, subquery, .. } => {
            collect_expr(expr, cte_scope, stats);
            collect_query(subquery, cte_scope, stats);
        }
        Expr::Between {
            expr, low, high, ..
        } => {
            collect_expr(expr, cte_scope, stats);
            collect_expr(low, cte_scope, stats);
            collect_expr(high, cte_scope, stats);
        }
        Expr::IsNull { expr, .. } => collect_expr(expr, cte_scope, stats),
        Expr::Exists { subquery, .. } | Expr::Subquery(subquery) => {
            collect_query(subquery, cte_scope, stats)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sqlgate_sql::{DialectParser, SqlQueryParser};

    fn parse(sql: &str) -> ParsedStatement {
        DialectParser::new("postgresql").unwrap().parse(sql).unwrap()
    }

    fn ctx() -> ExecutionContext {
        ExecutionContext::new("postgresql").unwrap()
    }

    fn validator(config: ValidatorConfig) -> PolicyValidator {
        PolicyValidator::new(&config)
    }

    #[test]
    fn ddl_is_always_denied() {
        let v = validator(ValidatorConfig {
            allow_dml: true,
            ..ValidatorConfig::default()
        });
        let failure = v.validate(&parse("DROP TABLE users"), &ctx()).unwrap_err();
        assert_eq!(failure.reason, ReasonCode::DenyDdl);
        assert!(failure.message.contains("DROP"));
    }

    #[test]
    fn dml_denied_unless_allowed() {
        let v = validator(ValidatorConfig::default());
        let failure = v
            .validate(&parse("DELETE FROM users WHERE id = 1"), &ctx())
            .unwrap_err();
        assert_eq!(failure.reason, ReasonCode::DenyDml);

        let permissive = validator(ValidatorConfig {
            allow_dml: true,
            ..ValidatorConfig::default()
        });
        assert!(
            permissive
                .validate(&parse("DELETE FROM users WHERE id = 1"), &ctx())
                .is_ok()
        );
    }

    #[test]
    fn table_allow_list_matches_bare_and_qualified_names() {
        let v = validator(ValidatorConfig {
            allowed_tables: Some(
                ["public.users".to_string(), "orders".to_string()]
                    .into_iter()
                    .collect(),
            ),
            ..ValidatorConfig::default()
        });
        assert!(
            v.validate(&parse("SELECT id FROM public.users"), &ctx())
                .is_ok()
        );
        assert!(v.validate(&parse("SELECT id FROM orders"), &ctx()).is_ok());
        let failure = v
            .validate(&parse("SELECT id FROM secrets"), &ctx())
            .unwrap_err();
        assert_eq!(failure.reason, ReasonCode::DenyTable);
        assert!(failure.message.contains("secrets"));
    }

    #[test]
    fn allow_list_sees_subquery_tables() {
        let v = validator(ValidatorConfig {
            allowed_tables: Some(["users".to_string()].into_iter().collect()),
            ..ValidatorConfig::default()
        });
        let failure = v
            .validate(
                &parse("SELECT id FROM users WHERE id IN (SELECT user_id FROM secrets)"),
                &ctx(),
            )
            .unwrap_err();
        assert_eq!(failure.reason, ReasonCode::DenyTable);
    }

    #[test]
    fn allow_list_sees_exists_subquery_tables() {
        let v = validator(ValidatorConfig {
            allowed_tables: Some(["users".to_string()].into_iter().collect()),
            ..ValidatorConfig::default()
        });
        let failure = v
            .validate(
                &parse(
                    "SELECT id FROM users u \
                     WHERE EXISTS (SELECT 1 FROM secrets s WHERE s.user_id = u.id)",
                ),
                &ctx(),
            )
            .unwrap_err();
        assert_eq!(failure.reason, ReasonCode::DenyTable);
    }

    #[test]
    fn cte_names_are_not_tables() {
        let v = validator(ValidatorConfig {
            allowed_tables: Some(["users".to_string()].into_iter().collect()),
            ..ValidatorConfig::default()
        });
        assert!(
            v.validate(
                &parse("WITH recent AS (SELECT id FROM users) SELECT id FROM recent"),
                &ctx(),
            )
            .is_ok()
        );
    }

    #[test]
    fn denied_functions_are_case_insensitive() {
        let v = validator(ValidatorConfig {
            denied_functions: ["pg_sleep".to_string()].into_iter().collect(),
            ..ValidatorConfig::default()
        });
        let failure = v
            .validate(&parse("SELECT PG_SLEEP(10)"), &ctx())
            .unwrap_err();
        assert_eq!(failure.reason, ReasonCode::DenyFunction);
        assert!(failure.message.contains("pg_sleep"));
    }

    #[test]
    fn join_count_ceiling() {
        let v = validator(ValidatorConfig {
            max_join_count: Some(1),
            ..ValidatorConfig::default()
        });
        assert!(
            v.validate(
                &parse("SELECT u.id FROM users u JOIN orders o ON o.user_id = u.id"),
                &ctx(),
            )
            .is_ok()
        );
        let failure = v
            .validate(
                &parse(
                    "SELECT u.id FROM users u \
                     JOIN orders o ON o.user_id = u.id \
                     JOIN items i ON i.order_id = o.id",
                ),
                &ctx(),
            )
            .unwrap_err();
        assert_eq!(failure.reason, ReasonCode::DenyTable);
    }

    #[test]
    fn projection_ceiling() {
        let v = validator(ValidatorConfig {
            max_select_columns: Some(2),
            ..ValidatorConfig::default()
        });
        assert!(v.validate(&parse("SELECT a, b FROM t"), &ctx()).is_ok());
        let failure = v
            .validate(&parse("SELECT a, b, c FROM t"), &ctx())
            .unwrap_err();
        assert_eq!(failure.reason, ReasonCode::DenyColumn);
    }
}
