//! Semantics-preserving expression simplification.

use sqlgate_core::{ExecutionContext, ReasonCode};
use sqlgate_sql::{BinaryOp, Expr, Literal, Query, UnaryOp};

use crate::result::QueryRewriteResult;
use crate::rule::{QueryRewriteRule, RewriteDeny};
use crate::rules::walk_query_exprs;

const ID: &str = "canonicalization";

/// Folds boolean constants out of predicates, strips redundant nesting
/// around atoms, and folds exact integer arithmetic. Never changes what
/// a query returns.
pub struct CanonicalizationRule;

impl QueryRewriteRule for CanonicalizationRule {
    fn id(&self) -> &str {
        ID
    }

    fn apply(
        &self,
        mut query: Query,
        _ctx: &ExecutionContext,
    ) -> Result<QueryRewriteResult, RewriteDeny> {
        let mut changed = false;
        walk_query_exprs(&mut query, &mut |expr| {
            changed |= simplify(expr);
        });
        if changed {
            Ok(QueryRewriteResult::applied(
                query,
                ID,
                ReasonCode::RewriteCanonicalization,
            ))
        } else {
            Ok(QueryRewriteResult::unchanged(query))
        }
    }
}

/// One local simplification step. Children are already simplified when
/// this runs (the walk is bottom-up), so a single pass converges.
fn simplify(expr: &mut Expr) -> bool {
    let replacement = match expr {
        Expr::Binary {
            left,
            op: BinaryOp::And,
            right,
        } => {
            if is_bool(left, true) {
                Some(take(right))
            } else if is_bool(right, true) {
                Some(take(left))
            } else if is_bool(left, false) || is_bool(right, false) {
                Some(Expr::Literal(Literal::Boolean(false)))
            } else {
                None
            }
        }
        Expr::Binary {
            left,
            op: BinaryOp::Or,
            right,
        } => {
            if is_bool(left, false) {
                Some(take(right))
            } else if is_bool(right, false) {
                Some(take(left))
            } else if is_bool(left, true) || is_bool(right, true) {
                Some(Expr::Literal(Literal::Boolean(true)))
            } else {
                None
            }
        }
        Expr::Binary { left, op, right } => fold_arithmetic(left, *op, right),
        Expr::Unary {
            op: UnaryOp::Not,
            expr: inner,
        } => match inner.as_ref() {
            Expr::Literal(Literal::Boolean(value)) => {
                Some(Expr::Literal(Literal::Boolean(!value)))
            }
            _ => None,
        },
        Expr::Nested(inner) => match inner.as_ref() {
            Expr::Column { .. } | Expr::Literal(_) | Expr::Bind(_) => Some(take(inner)),
            _ => None,
        },
        _ => None,
    };
    match replacement {
        Some(simplified) => {
            *expr = simplified;
            true
        }
        None => false,
    }
}

fn fold_arithmetic(left: &Expr, op: BinaryOp, right: &Expr) -> Option<Expr> {
    let (a, b) = match (left, right) {
        (Expr::Literal(Literal::Number(a)), Expr::Literal(Literal::Number(b))) => {
            (a.parse::<i64>().ok()?, b.parse::<i64>().ok()?)
        }
        _ => return None,
    };
    // Only exact results are folded; overflow keeps the expression.
    let folded = match op {
        BinaryOp::Plus => a.checked_add(b)?,
        BinaryOp::Minus => a.checked_sub(b)?,
        BinaryOp::Multiply => a.checked_mul(b)?,
        _ => return None,
    };
    Some(Expr::Literal(Literal::Number(folded.to_string())))
}

fn is_bool(expr: &Expr, value: bool) -> bool {
    matches!(expr, Expr::Literal(Literal::Boolean(v)) if *v == value)
}

fn take(slot: &mut Box<Expr>) -> Expr {
    std::mem::replace(slot.as_mut(), Expr::Literal(Literal::Null))
}
