//! The built-in rewrite rules.

pub mod canonicalize;
pub mod limit;
pub mod normalize;
pub mod qualify_column;
pub mod qualify_schema;
pub mod tenant;

use sqlgate_sql::{Expr, Ident, Query, QueryBody, Select, SelectItem, TableFactor};

/// Applies `f` bottom-up to every expression in the query, including
/// expressions inside CTE bodies, derived tables and subqueries.
pub(crate) fn walk_query_exprs(query: &mut Query, f: &mut dyn FnMut(&mut Expr)) {
    for cte in &mut query.ctes {
        walk_query_exprs(&mut cte.query, f);
    }
    walk_body_exprs(&mut query.body, f);
    for item in &mut query.order_by {
        walk_expr(&mut item.expr, f);
    }
    if let Some(sqlgate_sql::LimitClause::Expr(expr)) = &mut query.limit {
        walk_expr(expr, f);
    }
    if let Some(offset) = &mut query.offset {
        walk_expr(offset, f);
    }
}

fn walk_body_exprs(body: &mut QueryBody, f: &mut dyn FnMut(&mut Expr)) {
    match body {
        QueryBody::Select(select) => walk_select_exprs(select, f),
        QueryBody::Compound { left, right, .. } => {
            walk_body_exprs(left, f);
            walk_body_exprs(right, f);
        }
        QueryBody::Nested(query) => walk_query_exprs(query, f),
    }
}

fn walk_select_exprs(select: &mut Select, f: &mut dyn FnMut(&mut Expr)) {
    for item in &mut select.projection {
        if let SelectItem::Expr { expr, .. } = item {
            walk_expr(expr, f);
        }
    }
    for entry in &mut select.from {
        walk_factor_exprs(&mut entry.relation, f);
        for join in &mut entry.joins {
            walk_factor_exprs(&mut join.relation, f);
            if let Some(on) = &mut join.on {
                walk_expr(on, f);
            }
        }
    }
    if let Some(selection) = &mut select.selection {
        walk_expr(selection, f);
    }
    for expr in &mut select.group_by {
        walk_expr(expr, f);
    }
    if let Some(having) = &mut select.having {
        walk_expr(having, f);
    }
}

fn walk_factor_exprs(factor: &mut TableFactor, f: &mut dyn FnMut(&mut Expr)) {
    if let TableFactor::Derived { subquery, .. } = factor {
        walk_query_exprs(subquery, f);
    }
}

pub(crate) fn walk_expr(expr: &mut Expr, f: &mut dyn FnMut(&mut Expr)) {
    match expr {
        Expr::Column { .. } | Expr::Literal(_) | Expr::Bind(_) => {}
        Expr::Unary { expr, .. } => walk_expr(expr, f),
        Expr::Binary { left, right, .. } => {
            walk_expr(left, f);
            walk_expr(right, f);
        }
        Expr::Function { args, .. } => {
            for arg in args {
                walk_expr(arg, f);
            }
        }
        Expr::Nested(inner) => walk_expr(inner, f),
        Expr::Like { expr, pattern, .. } => {
            walk_expr(expr, f);
            walk_expr(pattern, f);
        }
        Expr::InList { expr, list, .. } => {
            walk_expr(expr, f);
            for item in list {
                walk_expr(item, f);
            }
        }
        Expr::InSubquery { expr, subquery, .. } => {
            walk_expr(expr, f);
            walk_query_exprs(subquery, f);
        }
        Expr::Between {
            expr, low, high, ..
        } => {
            walk_expr(expr, f);
            walk_expr(low, f);
            walk_expr(high, f);
        }
        Expr::IsNull { expr, .. } => walk_expr(expr, f),
        Expr::Exists { subquery, .. } => walk_query_exprs(subquery, f),
        Expr::Subquery(subquery) => walk_query_exprs(subquery, f),
    }
    f(expr);
}

/// Applies `f` to every identifier in the query except function names:
/// table names and schemas, aliases, CTE names, column qualifiers and
/// column names, recursing into subqueries.
pub(crate) fn walk_query_idents(query: &mut Query, f: &mut dyn FnMut(&mut Ident)) {
    for cte in &mut query.ctes {
        f(&mut cte.name);
        walk_query_idents(&mut cte.query, f);
    }
    walk_body_idents(&mut query.body, f);
    for item in &mut query.order_by {
        walk_expr_idents(&mut item.expr, f);
    }
    if let Some(sqlgate_sql::LimitClause::Expr(expr)) = &mut query.limit {
        walk_expr_idents(expr, f);
    }
    if let Some(offset) = &mut query.offset {
        walk_expr_idents(offset, f);
    }
}

fn walk_body_idents(body: &mut QueryBody, f: &mut dyn FnMut(&mut Ident)) {
    match body {
        QueryBody::Select(select) => walk_select_idents(select, f),
        QueryBody::Compound { left, right, .. } => {
            walk_body_idents(left, f);
            walk_body_idents(right, f);
        }
        QueryBody::Nested(query) => walk_query_idents(query, f),
    }
}

fn walk_select_idents(select: &mut Select, f: &mut dyn FnMut(&mut Ident)) {
    for item in &mut select.projection {
        match item {
            SelectItem::Wildcard => {}
            SelectItem::QualifiedWildcard(qualifier) => f(qualifier),
            SelectItem::Expr { expr, alias } => {
                walk_expr_idents(expr, f);
                if let Some(alias) = alias {
                    f(alias);
                }
            }
        }
    }
    for entry in &mut select.from {
        walk_factor_idents(&mut entry.relation, f);
        for join in &mut entry.joins {
            walk_factor_idents(&mut join.relation, f);
            if let Some(on) = &mut join.on {
                walk_expr_idents(on, f);
            }
        }
    }
    if let Some(selection) = &mut select.selection {
        walk_expr_idents(selection, f);
    }
    for expr in &mut select.group_by {
        walk_expr_idents(expr, f);
    }
    if let Some(having) = &mut select.having {
        walk_expr_idents(having, f);
    }
}

fn walk_factor_idents(factor: &mut TableFactor, f: &mut dyn FnMut(&mut Ident)) {
    match factor {
        TableFactor::Table(table) => {
            if let Some(schema) = &mut table.schema {
                f(schema);
            }
            f(&mut table.name);
            if let Some(alias) = &mut table.alias {
                f(alias);
            }
        }
        TableFactor::Derived { subquery, alias } => {
            walk_query_idents(subquery, f);
            f(alias);
        }
    }
}

fn walk_expr_idents(expr: &mut Expr, f: &mut dyn FnMut(&mut Ident)) {
    match expr {
        Expr::Column { qualifier, name } => {
            if let Some(qualifier) = qualifier {
                f(qualifier);
            }
            f(name);
        }
        Expr::Literal(_) | Expr::Bind(_) => {}
        Expr::Unary { expr, .. } => walk_expr_idents(expr, f),
        Expr::Binary { left, right, .. } => {
            walk_expr_idents(left, f);
            walk_expr_idents(right, f);
        }
        Expr::Function { args, .. } => {
            for arg in args {
                walk_expr_idents(arg, f);
            }
        }
        Expr::Nested(inner) => walk_expr_idents(inner, f),
        Expr::Like { expr, pattern, .. } => {
            walk_expr_idents(expr, f);
            walk_expr_idents(pattern, f);
        }
        Expr::InList { expr, list, .. } => {
            walk_expr_idents(expr, f);
            for item in list {
                walk_expr_idents(item, f);
            }
        }
        Expr::InSubquery { expr, subquery, .. } => {
            walk_expr_idents(expr, f);
            walk_query_idents(subquery, f);
        }
        Expr::Between {
            expr, low, high, ..
        } => {
            walk_expr_idents(expr, f);
            walk_expr_idents(low, f);
            walk_expr_idents(high, f);
        }
        Expr::IsNull { expr, .. } => walk_expr_idents(expr, f),
        Expr::Exists { subquery, .. } => walk_query_idents(subquery, f),
        Expr::Subquery(subquery) => walk_query_idents(subquery, f),
    }
}
