//! Schema qualification of unqualified table references.

use sqlgate_core::{CatalogSchema, ExecutionContext, ReasonCode};
use sqlgate_sql::{Expr, Ident, Query, QueryBody, Select, SelectItem, TableFactor};

use crate::result::QueryRewriteResult;
use crate::rule::{QueryRewriteRule, RewriteDeny};

const ID: &str = "schema-qualification";

/// Resolves unqualified table references against the catalog.
///
/// Qualification is opportunistic: a name the catalog does not know is
/// left alone. A name the catalog knows in several schemas is always an
/// error; picking one silently would change which data the query reads.
pub struct SchemaQualificationRule {
    catalog: CatalogSchema,
}

impl SchemaQualificationRule {
    pub fn new(catalog: CatalogSchema) -> Self {
        Self { catalog }
    }

    fn qualify_query(
        &self,
        query: &mut Query,
        cte_scope: &mut Vec<String>,
    ) -> Result<bool, RewriteDeny> {
        let mut changed = false;
        let pushed = query.ctes.len();
        for cte in &mut query.ctes {
            changed |= self.qualify_query(&mut cte.query, cte_scope)?;
            cte_scope.push(cte.name.lookup());
        }
        changed |= self.qualify_body(&mut query.body, cte_scope)?;
        for item in &mut query.order_by {
            changed |= self.qualify_expr(&mut item.expr, cte_scope)?;
        }
        cte_scope.truncate(cte_scope.len() - pushed);
        Ok(changed)
    }

    fn qualify_body(
        &self,
        body: &mut QueryBody,
        cte_scope: &mut Vec<String>,
    ) -> Result<bool, RewriteDeny> {
        match body {
            QueryBody::Select(select) => self.qualify_select(select, cte_scope),
            QueryBody::Compound { left, right, .. } => {
                let l = self.qualify_body(left, cte_scope)?;
                let r = self.qualify_body(right, cte_scope)?;
                Ok(l || r)
            }
            QueryBody::Nested(query) => self.qualify_query(query, cte_scope),
        }
    }

    fn qualify_select(
        &self,
        select: &mut Select,
        cte_scope: &mut Vec<String>,
    ) -> Result<bool, RewriteDeny> {
        let mut changed = false;
        for entry in &mut select.from {
            changed |= self.qualify_factor(&mut entry.relation, cte_scope)?;
            for join in &mut entry.joins {
                changed |= self.qualify_factor(&mut join.relation, cte_scope)?;
                if let Some(on) = &mut join.on {
                    changed |= self.qualify_expr(on, cte_scope)?;
                }
            }
        }
        for item in &mut select.projection {
            if let SelectItem::Expr { expr, .. } = item {
                changed |= self.qualify_expr(expr, cte_scope)?;
            }
        }
        if let Some(selection) = &mut select.selection {
            changed |= self.qualify_expr(selection, cte_scope)?;
        }
        for expr in &mut select.group_by {
            changed |= self.qualify_expr(expr, cte_scope)?;
        }
        if let Some(having) = &mut select.having {
            changed |= self.qualify_expr(having, cte_scope)?;
        }
        Ok(changed)
    }

    fn qualify_factor(
        &self,
        factor: &mut TableFactor,
        cte_scope: &mut Vec<String>,
    ) -> Result<bool, RewriteDeny> {
        match factor {
            TableFactor::Table(table) => {
                if table.schema.is_some() || cte_scope.contains(&table.name.lookup()) {
                    return Ok(false);
                }
                let candidates = self.catalog.tables_named(&table.name.lookup());
                match candidates.len() {
                    0 => Ok(false),
                    1 => {
                        table.schema = Some(Ident::new(candidates[0].schema.clone()));
                        Ok(true)
                    }
                    _ => Err(RewriteDeny::new(
                        ReasonCode::DenyTable,
                        format!(
                            "table {} exists in several schemas and cannot be qualified",
                            table.name.value
                        ),
                    )),
                }
            }
            TableFactor::Derived { subquery, .. } => self.qualify_query(subquery, cte_scope),
        }
    }

    /// Descends into subqueries embedded in expressions; plain column
    /// references are not this rule's concern.
    fn qualify_expr(
        &self,
        expr: &mut Expr,
        cte_scope: &mut Vec<String>,
    ) -> Result<bool, RewriteDeny> {
        match expr {
            Expr::Column { .. } | Expr::Literal(_) | Expr::Bind(_) => Ok(false),
            Expr::Unary { expr, .. } | Expr::Nested(expr) | Expr::IsNull { expr, .. } => {
                self.qualify_expr(expr, cte_scope)
            }
            Expr::Binary { left, right, .. } => {
                let l = self.qualify_expr(left, cte_scope)?;
                let r = self.qualify_expr(right, cte_scope)?;
                Ok(l || r)
            }
            Expr::Function { args, .. } => {
                let mut changed = false;
                for arg in args {
                    changed |= self.qualify_expr(arg, cte_scope)?;
                }
                Ok(changed)
            }
            Expr::Like { expr, pattern, .. } => {
                let l = self.qualify_expr(expr, cte_scope)?;
                let r = self.qualify_expr(pattern, cte_scope)?;
                Ok(l || r)
            }
            Expr::InList { expr, list, .. } => {
                let mut changed = self.qualify_expr(expr, cte_scope)?;
                for item in list {
                    changed |= self.qualify_expr(item, cte_scope)?;
                }
                Ok(changed)
            }
            Expr::InSubquery { expr, subquery, .. } => {
                let l = self.qualify_expr(expr, cte_scope)?;
                let r = self.qualify_query(subquery, cte_scope)?;
                Ok(l || r)
            }
            Expr::Between {
                expr, low, high, ..
            } => {
                let mut changed = self.qualify_expr(expr, cte_scope)?;
                changed |= self.qualify_expr(low, cte_scope)?;
                changed |= self.qualify_expr(high, cte_scope)?;
                Ok(changed)
            }
            Expr::Exists { subquery, .. } | Expr::Subquery(subquery) => {
                self.qualify_query(subquery, cte_scope)
            }
        }
    }
}

impl QueryRewriteRule for SchemaQualificationRule {
    fn id(&self) -> &str {
        ID
    }

    fn apply(
        &self,
        mut query: Query,
        _ctx: &ExecutionContext,
    ) -> Result<QueryRewriteResult, RewriteDeny> {
        let mut cte_scope = Vec::new();
        if self.qualify_query(&mut query, &mut cte_scope)? {
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
