//! Tenant predicate injection.
//!
//! For every top-level table reference governed by a tenant policy, the
//! rule guarantees a `qualifier.tenant_column = tenant` predicate in the
//! WHERE clause, injecting one when absent. Duplicate detection is
//! deliberately strict: injection is only skipped when an equivalent
//! predicate is unconditionally required, i.e. reachable through
//! top-level AND-conjuncts. A predicate inside an OR branch does not
//! constrain every row and never suppresses injection.

use std::collections::BTreeMap;

use sqlgate_core::{
    BuiltInRewriteSettings, ExecutionContext, ParameterizationMode, ReasonCode, TenantPolicyMode,
    TenantRewriteAmbiguityMode, TenantRewriteFallbackMode, TenantRewriteTablePolicy,
};
use sqlgate_sql::{BinaryOp, Expr, Ident, Literal, Query, Select, TableFactor, TableRef};

use crate::result::QueryRewriteResult;
use crate::rule::{QueryRewriteRule, RewriteDeny};

const ID: &str = "tenant-predicate";

pub struct TenantPredicateRule {
    policies: BTreeMap<String, TenantRewriteTablePolicy>,
    default_schema: Option<String>,
    fallback_mode: TenantRewriteFallbackMode,
    ambiguity_mode: TenantRewriteAmbiguityMode,
}

impl TenantPredicateRule {
    pub fn new(settings: &BuiltInRewriteSettings) -> Self {
        Self {
            policies: settings.tenant_tables.clone(),
            default_schema: settings
                .qualification_default_schema
                .as_ref()
                .map(|s| s.to_lowercase()),
            fallback_mode: settings.tenant_fallback_mode,
            ambiguity_mode: settings.tenant_ambiguity_mode,
        }
    }

    /// Policy resolution per table reference. Qualified references use
    /// exact `schema.table` lookup; unqualified references match by
    /// table name with default-schema disambiguation. `Ok(None)` means
    /// the table stays unscoped under a SKIP mode.
    fn resolve_policy(
        &self,
        table: &TableRef,
    ) -> Result<Option<&TenantRewriteTablePolicy>, RewriteDeny> {
        let name = table.name.lookup();
        if let Some(schema) = &table.schema {
            let key = format!("{}.{}", schema.lookup(), name);
            return match self.policies.get(&key) {
                Some(policy) => Ok(Some(policy)),
                None => self.fallback(&key),
            };
        }

        let candidates: Vec<(&String, &TenantRewriteTablePolicy)> = self
            .policies
            .iter()
            .filter(|(key, _)| key.split('.').nth(1) == Some(name.as_str()))
            .collect();
        match candidates.len() {
            0 => self.fallback(&name),
            1 => Ok(Some(candidates[0].1)),
            _ => {
                if let Some(default_schema) = &self.default_schema {
                    let preferred = format!("{default_schema}.{name}");
                    if let Some((_, policy)) =
                        candidates.iter().find(|(key, _)| **key == preferred)
                    {
                        return Ok(Some(policy));
                    }
                }
                match self.ambiguity_mode {
                    TenantRewriteAmbiguityMode::Deny => Err(RewriteDeny::new(
                        ReasonCode::DenyTenantMappingAmbiguous,
                        format!("table {name} matches several tenant mappings"),
                    )),
                    TenantRewriteAmbiguityMode::Skip => Ok(None),
                }
            }
        }
    }

    fn fallback(&self, table: &str) -> Result<Option<&TenantRewriteTablePolicy>, RewriteDeny> {
        match self.fallback_mode {
            TenantRewriteFallbackMode::Deny => Err(RewriteDeny::new(
                ReasonCode::DenyTenantMappingMissing,
                format!("table {table} has no tenant mapping"),
            )),
            TenantRewriteFallbackMode::Skip => Ok(None),
        }
    }

    fn scope_select(
        &self,
        select: &mut Select,
        ctx: &ExecutionContext,
    ) -> Result<bool, RewriteDeny> {
        let single_table = select.from.len() == 1 && select.from[0].joins.is_empty();

        let mut tables = Vec::new();
        for entry in &select.from {
            if let TableFactor::Table(table) = &entry.relation {
                tables.push(table.clone());
            }
            for join in &entry.joins {
                if let TableFactor::Table(table) = &join.relation {
                    tables.push(table.clone());
                }
            }
        }

        let mut injections: Vec<(Ident, String)> = Vec::new();
        for table in &tables {
            let Some(policy) = self.resolve_policy(table)? else {
                continue;
            };
            let tenant = match (policy.mode, ctx.tenant.as_deref()) {
                (TenantPolicyMode::Skip, _) => continue,
                (TenantPolicyMode::Optional, None) => continue,
                (TenantPolicyMode::Required, None) => {
                    return Err(RewriteDeny::new(
                        ReasonCode::DenyTenantRequired,
                        format!(
                            "table {} requires a tenant context and none was provided",
                            table.name.value
                        ),
                    ));
                }
                (_, Some(tenant)) => tenant,
            };

            let qualifier = table.qualifier();
            if let Some(selection) = &select.selection {
                if has_tenant_conjunct(
                    selection,
                    qualifier,
                    &policy.tenant_column,
                    tenant,
                    single_table,
                ) {
                    continue;
                }
            }
            let pending = (qualifier.lookup(), policy.tenant_column.to_lowercase());
            if injections
                .iter()
                .any(|(q, c)| (q.lookup(), c.to_lowercase()) == pending)
            {
                continue;
            }
            injections.push((qualifier.clone(), policy.tenant_column.clone()));
        }

        if injections.is_empty() {
            return Ok(false);
        }
        let tenant = ctx.tenant.as_deref().unwrap_or_default().to_string();
        for (qualifier, column) in injections {
            let value = match ctx.parameterization {
                ParameterizationMode::Off => Expr::Literal(Literal::String(tenant.clone())),
                ParameterizationMode::Bind => Expr::Bind(Literal::String(tenant.clone())),
            };
            let predicate = Expr::eq(Expr::column(qualifier, Ident::new(column)), value);
            select.selection = Some(match select.selection.take() {
                Some(existing) => Expr::and(existing, predicate),
                None => predicate,
            });
        }
        Ok(true)
    }
}

/// Whether an equivalent tenant predicate already holds unconditionally:
/// reachable from the WHERE root through AND nodes (and redundant
/// parentheses) only.
fn has_tenant_conjunct(
    selection: &Expr,
    qualifier: &Ident,
    tenant_column: &str,
    tenant: &str,
    single_table: bool,
) -> bool {
    match selection {
        Expr::Binary {
            left,
            op: BinaryOp::And,
            right,
        } => {
            has_tenant_conjunct(left, qualifier, tenant_column, tenant, single_table)
                || has_tenant_conjunct(right, qualifier, tenant_column, tenant, single_table)
        }
        Expr::Nested(inner) => {
            has_tenant_conjunct(inner, qualifier, tenant_column, tenant, single_table)
        }
        Expr::Binary {
            left,
            op: BinaryOp::Eq,
            right,
        } => {
            is_tenant_column(left, qualifier, tenant_column, single_table)
                && is_tenant_value(right, tenant)
                || is_tenant_column(right, qualifier, tenant_column, single_table)
                    && is_tenant_value(left, tenant)
        }
        _ => false,
    }
}

fn is_tenant_column(expr: &Expr, qualifier: &Ident, tenant_column: &str, single_table: bool) -> bool {
    let Expr::Column {
        qualifier: col_qualifier,
        name,
    } = expr
    else {
        return false;
    };
    if !name.matches(tenant_column) {
        return false;
    }
    match col_qualifier {
        Some(q) => q.lookup() == qualifier.lookup(),
        // An unqualified column only provably belongs to the governed
        // table when it is the sole table in scope.
        None => single_table,
    }
}

fn is_tenant_value(expr: &Expr, tenant: &str) -> bool {
    matches!(
        expr,
        Expr::Literal(Literal::String(v)) | Expr::Bind(Literal::String(v)) if v == tenant
    )
}

impl QueryRewriteRule for TenantPredicateRule {
    fn id(&self) -> &str {
        ID
    }

    fn apply(
        &self,
        mut query: Query,
        ctx: &ExecutionContext,
    ) -> Result<QueryRewriteResult, RewriteDeny> {
        // No policies configured: the rule does not constrain anything.
        if self.policies.is_empty() {
            return Ok(QueryRewriteResult::unchanged(query));
        }
        let mut changed = false;
        for select in query.top_level_selects_mut() {
            changed |= self.scope_select(select, ctx)?;
        }
        if changed {
            Ok(QueryRewriteResult::applied(
                query,
                ID,
                ReasonCode::RewriteTenantPredicate,
            ))
        } else {
            Ok(QueryRewriteResult::unchanged(query))
        }
    }
}
