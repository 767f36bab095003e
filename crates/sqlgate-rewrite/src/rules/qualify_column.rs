//! Column qualification against the visible table scope.

use sqlgate_core::{CatalogSchema, ExecutionContext, QualificationFailureMode, ReasonCode};
use sqlgate_sql::{Expr, Ident, Query, QueryBody, Select, SelectItem, TableFactor};

use crate::result::QueryRewriteResult;
use crate::rule::{QueryRewriteRule, RewriteDeny};

const ID: &str = "column-qualification";

/// A table visible to a SELECT, with the columns the catalog declares
/// for it. Derived tables contribute nothing: their columns are unknown.
struct ScopeTable {
    qualifier: Ident,
    columns: Vec<String>,
}

/// Qualifies unqualified column references with the unique visible table
/// declaring them. Zero or several owners are governed by the configured
/// failure mode.
pub struct ColumnQualificationRule {
    catalog: CatalogSchema,
    failure_mode: QualificationFailureMode,
}

impl ColumnQualificationRule {
    pub fn new(catalog: CatalogSchema, failure_mode: QualificationFailureMode) -> Self {
        Self {
            catalog,
            failure_mode,
        }
    }

    fn scope_of(&self, select: &Select) -> Vec<ScopeTable> {
        let mut scope = Vec::new();
        let mut add = |factor: &TableFactor| {
            if let TableFactor::Table(table) = factor {
                let schema = table.schema.as_ref().map(|s| s.lookup());
                if let Some(entry) = self.catalog.resolve(schema.as_deref(), &table.name.lookup())
                {
                    scope.push(ScopeTable {
                        qualifier: table.qualifier().clone(),
                        columns: entry.columns.clone(),
                    });
                }
            }
        };
        for entry in &select.from {
            add(&entry.relation);
            for join in &entry.joins {
                add(&join.relation);
            }
        }
        scope
    }

    fn visit_query(&self, query: &mut Query) -> Result<bool, RewriteDeny> {
        let mut changed = false;
        for cte in &mut query.ctes {
            changed |= self.visit_query(&mut cte.query)?;
        }
        changed |= self.visit_body(&mut query.body)?;

        // ORDER BY resolves against the body's scope only when the body
        // is a single SELECT; references to projection aliases are not
        // column references and stay as written.
        if let QueryBody::Select(select) = &query.body {
            let scope = self.scope_of(select);
            let aliases: Vec<Ident> = select
                .projection
                .iter()
                .filter_map(|item| match item {
                    SelectItem::Expr {
                        alias: Some(alias), ..
                    } => Some(alias.clone()),
                    _ => None,
                })
                .collect();
            for item in &mut query.order_by {
                if let Expr::Column {
                    qualifier: None,
                    name,
                } = &item.expr
                {
                    if aliases.iter().any(|a| a.matches(&name.value)) {
                        continue;
                    }
                }
                changed |= self.qualify_expr(&mut item.expr, &scope)?;
            }
        }
        Ok(changed)
    }

    fn visit_body(&self, body: &mut QueryBody) -> Result<bool, RewriteDeny> {
        match body {
            QueryBody::Select(select) => self.visit_select(select),
            QueryBody::Compound { left, right, .. } => {
                let l = self.visit_body(left)?;
                let r = self.visit_body(right)?;
                Ok(l || r)
            }
            QueryBody::Nested(query) => self.visit_query(query),
        }
    }

    fn visit_select(&self, select: &mut Select) -> Result<bool, RewriteDeny> {
        let mut changed = false;
        for entry in &mut select.from {
            if let TableFactor::Derived { subquery, .. } = &mut entry.relation {
                changed |= self.visit_query(subquery)?;
            }
            for join in &mut entry.joins {
                if let TableFactor::Derived { subquery, .. } = &mut join.relation {
                    changed |= self.visit_query(subquery)?;
                }
            }
        }

        let scope = self.scope_of(select);
        for item in &mut select.projection {
            if let SelectItem::Expr { expr, .. } = item {
                changed |= self.qualify_expr(expr, &scope)?;
            }
        }
        for entry in &mut select.from {
            for join in &mut entry.joins {
                if let Some(on) = &mut join.on {
                    changed |= self.qualify_expr(on, &scope)?;
                }
            }
        }
        if let Some(selection) = &mut select.selection {
            changed |= self.qualify_expr(selection, &scope)?;
        }
        for expr in &mut select.group_by {
            changed |= self.qualify_expr(expr, &scope)?;
        }
        if let Some(having) = &mut select.having {
            changed |= self.qualify_expr(having, &scope)?;
        }
        Ok(changed)
    }

    fn qualify_expr(&self, expr: &mut Expr, scope: &[ScopeTable]) -> Result<bool, RewriteDeny> {
        match expr {
            Expr::Column {
                qualifier: qualifier @ None,
                name,
            } => {
                let owners: Vec<&ScopeTable> = scope
                    .iter()
                    .filter(|t| t.columns.iter().any(|c| name.matches(c)))
                    .collect();
                if owners.len() == 1 {
                    *qualifier = Some(owners[0].qualifier.clone());
                    return Ok(true);
                }
                match self.failure_mode {
                    QualificationFailureMode::Skip => Ok(false),
                    QualificationFailureMode::Deny => Err(RewriteDeny::new(
                        ReasonCode::DenyColumn,
                        if owners.is_empty() {
                            format!("column {} is not declared by any visible table", name.value)
                        } else {
                            format!(
                                "column {} is declared by several visible tables",
                                name.value
                            )
                        },
                    )),
                }
            }
            Expr::Column { .. } | Expr::Literal(_) | Expr::Bind(_) => Ok(false),
            Expr::Unary { expr, .. } | Expr::Nested(expr) | Expr::IsNull { expr, .. } => {
                self.qualify_expr(expr, scope)
            }
            Expr::Binary { left, right, .. } => {
                let l = self.qualify_expr(left, scope)?;
                let r = self.qualify_expr(right, scope)?;
                Ok(l || r)
            }
            Expr::Function { args, .. } => {
                let mut changed = false;
                for arg in args {
                    changed |= self.qualify_expr(arg, scope)?;
                }
                Ok(changed)
            }
            Expr::Like { expr, pattern, .. } => {
                let l = self.qualify_expr(expr, scope)?;
                let r = self.qualify_expr(pattern, scope)?;
                Ok(l || r)
            }
            Expr::InList { expr, list, .. } => {
                let mut changed = self.qualify_expr(expr, scope)?;
                for item in list {
                    changed |= self.qualify_expr(item, scope)?;
                }
                Ok(changed)
            }
            Expr::InSubquery { expr, subquery, .. } => {
                let l = self.qualify_expr(expr, scope)?;
                let r = self.visit_query(subquery)?;
                Ok(l || r)
            }
            Expr::Between {
                expr, low, high, ..
            } => {
                let mut changed = self.qualify_expr(expr, scope)?;
                changed |= self.qualify_expr(low, scope)?;
                changed |= self.qualify_expr(high, scope)?;
                Ok(changed)
            }
            Expr::Exists { subquery, .. } | Expr::Subquery(subquery) => self.visit_query(subquery),
        }
    }
}

impl QueryRewriteRule for ColumnQualificationRule {
    fn id(&self) -> &str {
        ID
    }

    fn apply(
        &self,
        mut query: Query,
        _ctx: &ExecutionContext,
    ) -> Result<QueryRewriteResult, RewriteDeny> {
        if self.visit_query(&mut query)? {
            Ok(QueryRewriteResult::applied(
                query,
                ID,
                ReasonCode::RewriteQualification,
            ))
        } else {
            Ok(QueryRewriteResult::unchanged(query))
        }
    }
}
