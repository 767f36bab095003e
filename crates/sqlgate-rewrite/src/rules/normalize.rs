//! Identifier case normalization.

use sqlgate_core::{ExecutionContext, IdentifierCaseMode, ReasonCode};
use sqlgate_sql::Query;

use crate::result::QueryRewriteResult;
use crate::rule::{QueryRewriteRule, RewriteDeny};
use crate::rules::walk_query_idents;

const ID: &str = "identifier-normalization";

/// Re-cases unquoted identifiers to the configured case. Quoted
/// identifiers are an explicit case-preservation request and are never
/// touched.
pub struct IdentifierNormalizationRule {
    case: IdentifierCaseMode,
}

impl IdentifierNormalizationRule {
    pub fn new(case: IdentifierCaseMode) -> Self {
        Self { case }
    }
}

impl QueryRewriteRule for IdentifierNormalizationRule {
    fn id(&self) -> &str {
        ID
    }

    fn apply(
        &self,
        mut query: Query,
        _ctx: &ExecutionContext,
    ) -> Result<QueryRewriteResult, RewriteDeny> {
        if self.case == IdentifierCaseMode::Preserve {
            return Ok(QueryRewriteResult::unchanged(query));
        }
        let mut changed = false;
        walk_query_idents(&mut query, &mut |ident| {
            if ident.quoted {
                return;
            }
            let recased = match self.case {
                IdentifierCaseMode::Lower => ident.value.to_lowercase(),
                IdentifierCaseMode::Upper => ident.value.to_uppercase(),
                IdentifierCaseMode::Preserve => return,
            };
            if recased != ident.value {
                ident.value = recased;
                changed = true;
            }
        });
        if changed {
            Ok(QueryRewriteResult::applied(
                query,
                ID,
                ReasonCode::RewriteIdentifierNormalization,
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
    use sqlgate_sql::{
        DialectParser, DialectRenderer, ParsedStatement, SqlQueryParser, SqlQueryRenderer,
    };

    fn parse(sql: &str) -> Query {
        match DialectParser::new("postgresql").unwrap().parse(sql).unwrap() {
            ParsedStatement::Query(query) => query,
            other => panic!("expected query, got {other:?}"),
        }
    }

    fn ctx() -> ExecutionContext {
        ExecutionContext::new("postgresql").unwrap()
    }

    fn render(query: &Query) -> String {
        DialectRenderer::new("postgresql")
            .unwrap()
            .render(query, &ctx())
            .unwrap()
            .sql
    }

    #[test]
    fn lowercases_unquoted_identifiers() {
        let rule = IdentifierNormalizationRule::new(IdentifierCaseMode::Lower);
        let result = rule
            .apply(parse("SELECT U.Name FROM Users AS U WHERE U.Org = 'a'"), &ctx())
            .unwrap();
        assert!(result.rewritten);
        assert_eq!(result.primary_reason, ReasonCode::RewriteIdentifierNormalization);
        assert_eq!(
            render(&result.query),
            "SELECT u.name FROM users AS u WHERE u.org = 'a'"
        );
    }

    #[test]
    fn quoted_identifiers_are_untouched() {
        let rule = IdentifierNormalizationRule::new(IdentifierCaseMode::Lower);
        let result = rule.apply(parse("SELECT \"Name\" FROM \"Users\""), &ctx()).unwrap();
        assert!(!result.rewritten);
        assert_eq!(render(&result.query), "SELECT \"Name\" FROM \"Users\"");
    }

    #[test]
    fn already_normalized_query_is_a_noop() {
        let rule = IdentifierNormalizationRule::new(IdentifierCaseMode::Lower);
        let result = rule.apply(parse("SELECT id FROM users"), &ctx()).unwrap();
        assert!(!result.rewritten);
    }

    #[test]
    fn preserve_mode_never_rewrites() {
        let rule = IdentifierNormalizationRule::new(IdentifierCaseMode::Preserve);
        let result = rule.apply(parse("SELECT Id FROM Users"), &ctx()).unwrap();
        assert!(!result.rewritten);
    }
}
