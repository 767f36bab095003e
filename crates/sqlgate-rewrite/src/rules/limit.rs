//! LIMIT injection and enforcement.

use sqlgate_core::{BuiltInRewriteSettings, ExecutionContext, LimitExcessMode, ReasonCode};
use sqlgate_sql::{Expr, LimitClause, Literal, Query, QueryBody};

use crate::result::QueryRewriteResult;
use crate::rule::{QueryRewriteRule, RewriteDeny};

const ID: &str = "limit-injection";

/// Guarantees every query level carries a bounded LIMIT: the outer
/// query, parenthesized compound arms, and every CTE body.
pub struct LimitInjectionRule {
    default_limit: u64,
    max_limit: Option<u64>,
    excess_mode: LimitExcessMode,
}

impl LimitInjectionRule {
    pub fn new(settings: &BuiltInRewriteSettings) -> Self {
        Self {
            default_limit: settings.default_limit,
            max_limit: settings.max_limit,
            excess_mode: settings.limit_excess_mode,
        }
    }

    fn ensure_query(&self, query: &mut Query) -> Result<bool, RewriteDeny> {
        let mut changed = false;
        for cte in &mut query.ctes {
            changed |= self.ensure_query(&mut cte.query)?;
        }
        changed |= self.ensure_body(&mut query.body)?;
        changed |= self.ensure_limit(&mut query.limit)?;
        Ok(changed)
    }

    fn ensure_body(&self, body: &mut QueryBody) -> Result<bool, RewriteDeny> {
        match body {
            QueryBody::Select(_) => Ok(false),
            QueryBody::Compound { left, right, .. } => {
                let l = self.ensure_body(left)?;
                let r = self.ensure_body(right)?;
                Ok(l || r)
            }
            QueryBody::Nested(query) => self.ensure_query(query),
        }
    }

    fn ensure_limit(&self, limit: &mut Option<LimitClause>) -> Result<bool, RewriteDeny> {
        match limit {
            None => {
                *limit = Some(literal_limit(self.default_limit));
                Ok(true)
            }
            Some(LimitClause::All) => match (self.max_limit, self.excess_mode) {
                (Some(_), LimitExcessMode::Deny) => Err(RewriteDeny::new(
                    ReasonCode::DenyMaxRows,
                    "LIMIT ALL is unbounded and a maximum row limit is enforced",
                )),
                (Some(max), LimitExcessMode::Clamp) => {
                    *limit = Some(literal_limit(max));
                    Ok(true)
                }
                (None, _) => Ok(false),
            },
            Some(LimitClause::Expr(expr)) => {
                let Some(max) = self.max_limit else {
                    return Ok(false);
                };
                let literal = match expr {
                    Expr::Literal(Literal::Number(raw)) => raw.parse::<u64>().ok(),
                    _ => None,
                };
                match literal {
                    Some(value) if value <= max => Ok(false),
                    Some(value) => match self.excess_mode {
                        LimitExcessMode::Deny => Err(RewriteDeny::new(
                            ReasonCode::DenyMaxRows,
                            format!("LIMIT {value} exceeds the maximum of {max}"),
                        )),
                        LimitExcessMode::Clamp => {
                            *limit = Some(literal_limit(max));
                            Ok(true)
                        }
                    },
                    None => match self.excess_mode {
                        LimitExcessMode::Deny => Err(RewriteDeny::new(
                            ReasonCode::DenyMaxRows,
                            "LIMIT is not a literal value and a maximum row limit is enforced",
                        )),
                        LimitExcessMode::Clamp => {
                            *limit = Some(literal_limit(max));
                            Ok(true)
                        }
                    },
                }
            }
        }
    }
}

fn literal_limit(value: u64) -> LimitClause {
    LimitClause::Expr(Expr::Literal(Literal::Number(value.to_string())))
}

impl QueryRewriteRule for LimitInjectionRule {
    fn id(&self) -> &str {
        ID
    }

    fn apply(
        &self,
        mut query: Query,
        _ctx: &ExecutionContext,
    ) -> Result<QueryRewriteResult, RewriteDeny> {
        if self.ensure_query(&mut query)? {
            Ok(QueryRewriteResult::applied(
                query,
                ID,
                ReasonCode::RewriteLimit,
            ))
        } else {
            Ok(QueryRewriteResult::unchanged(query))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sqlgate_sql::{DialectParser, ParsedStatement, SqlQueryParser};

    fn parse(sql: &str) -> Query {
        match DialectParser::new("postgresql").unwrap().parse(sql).unwrap() {
            ParsedStatement::Query(query) => query,
            other => panic!("expected query, got {other:?}"),
        }
    }

    fn ctx() -> ExecutionContext {
        ExecutionContext::new("postgresql").unwrap()
    }

    fn rule(default: u64, max: Option<u64>, mode: LimitExcessMode) -> LimitInjectionRule {
        let mut settings = BuiltInRewriteSettings::default();
        settings.default_limit = default;
        settings.max_limit = max;
        settings.limit_excess_mode = mode;
        LimitInjectionRule::new(&settings)
    }

    #[test]
    fn injects_default_limit() {
        let result = rule(1000, None, LimitExcessMode::Deny)
            .apply(parse("SELECT id FROM users"), &ctx())
            .unwrap();
        assert!(result.rewritten);
        assert_eq!(result.primary_reason, ReasonCode::RewriteLimit);
        assert_eq!(result.query.limit.unwrap().literal_value(), Some(1000));
    }

    #[test]
    fn literal_within_max_is_untouched() {
        let result = rule(1000, Some(5000), LimitExcessMode::Deny)
            .apply(parse("SELECT id FROM users LIMIT 10"), &ctx())
            .unwrap();
        assert!(!result.rewritten);
        assert_eq!(result.query.limit.unwrap().literal_value(), Some(10));
    }

    #[test]
    fn literal_above_max_denies() {
        let err = rule(5, Some(10), LimitExcessMode::Deny)
            .apply(parse("SELECT 1 LIMIT 99"), &ctx())
            .unwrap_err();
        assert_eq!(err.reason, ReasonCode::DenyMaxRows);
        assert!(err.message.contains("99"));
    }

    #[test]
    fn literal_above_max_clamps_idempotently() {
        let rule = rule(5, Some(10), LimitExcessMode::Clamp);
        let once = rule.apply(parse("SELECT 1 LIMIT 99"), &ctx()).unwrap();
        assert!(once.rewritten);
        assert_eq!(once.query.limit.as_ref().unwrap().literal_value(), Some(10));

        let twice = rule.apply(once.query, &ctx()).unwrap();
        assert!(!twice.rewritten);
        assert_eq!(twice.query.limit.unwrap().literal_value(), Some(10));
    }

    #[test]
    fn limit_all_denies_under_max() {
        let err = rule(5, Some(10), LimitExcessMode::Deny)
            .apply(parse("SELECT id FROM users LIMIT ALL"), &ctx())
            .unwrap_err();
        assert_eq!(err.reason, ReasonCode::DenyMaxRows);
        assert!(err.message.contains("ALL"));
    }

    #[test]
    fn limit_all_clamps_under_clamp_mode() {
        let result = rule(5, Some(10), LimitExcessMode::Clamp)
            .apply(parse("SELECT id FROM users LIMIT ALL"), &ctx())
            .unwrap();
        assert!(result.rewritten);
        assert_eq!(result.query.limit.unwrap().literal_value(), Some(10));
    }

    #[test]
    fn limit_all_without_max_is_untouched() {
        let result = rule(5, None, LimitExcessMode::Deny)
            .apply(parse("SELECT id FROM users LIMIT ALL"), &ctx())
            .unwrap();
        assert!(!result.rewritten);
        assert_eq!(result.query.limit, Some(LimitClause::All));
    }

    #[test]
    fn union_gets_one_outer_limit() {
        let result = rule(100, None, LimitExcessMode::Deny)
            .apply(parse("SELECT id FROM a UNION ALL SELECT id FROM b"), &ctx())
            .unwrap();
        assert!(result.rewritten);
        assert_eq!(result.query.limit.unwrap().literal_value(), Some(100));
    }

    #[test]
    fn recurses_into_cte_bodies() {
        let result = rule(100, None, LimitExcessMode::Deny)
            .apply(
                parse("WITH recent AS (SELECT id FROM events) SELECT id FROM recent LIMIT 5"),
                &ctx(),
            )
            .unwrap();
        assert!(result.rewritten);
        assert_eq!(
            result.query.ctes[0].query.limit.as_ref().unwrap().literal_value(),
            Some(100)
        );
        assert_eq!(result.query.limit.unwrap().literal_value(), Some(5));
    }
}
