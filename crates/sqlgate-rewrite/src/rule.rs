//! Rule abstraction, chain composition, and built-in rule selection.

use thiserror::Error;

use sqlgate_core::{BuiltInRewriteSettings, CatalogSchema, ExecutionContext, ReasonCode};
use sqlgate_sql::Query;

use crate::result::QueryRewriteResult;
use crate::rules::canonicalize::CanonicalizationRule;
use crate::rules::limit::LimitInjectionRule;
use crate::rules::normalize::IdentifierNormalizationRule;
use crate::rules::qualify_column::ColumnQualificationRule;
use crate::rules::qualify_schema::SchemaQualificationRule;
use crate::rules::tenant::TenantPredicateRule;

/// A rule-level denial. Short-circuits the chain; the engine turns it
/// into a DENY decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteDeny {
    pub reason: ReasonCode,
    pub message: String,
}

impl RewriteDeny {
    pub fn new(reason: ReasonCode, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }
}

/// One rewrite rule. Rules are pure: same query and context, same result.
pub trait QueryRewriteRule: Send + Sync {
    /// Stable rule id, as it appears in `applied_rule_ids`.
    fn id(&self) -> &str;

    /// Apply the rule, consuming the query.
    fn apply(
        &self,
        query: Query,
        ctx: &ExecutionContext,
    ) -> Result<QueryRewriteResult, RewriteDeny>;
}

/// An ordered chain of rewrite rules.
pub struct Rewriter {
    rules: Vec<Box<dyn QueryRewriteRule>>,
}

impl Rewriter {
    /// The identity rewriter.
    pub fn noop() -> Self {
        Self { rules: Vec::new() }
    }

    /// A chain applying `rules` in the given order.
    pub fn chain(rules: Vec<Box<dyn QueryRewriteRule>>) -> Self {
        Self { rules }
    }

    /// Ids of the rules in this chain, in order.
    pub fn rule_ids(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.id()).collect()
    }

    /// Feed the query through every rule. Each rule receives the output
    /// of the previous one; applied ids accumulate in order and the
    /// first rewriting rule supplies the primary reason.
    pub fn rewrite(
        &self,
        query: Query,
        ctx: &ExecutionContext,
    ) -> Result<QueryRewriteResult, RewriteDeny> {
        let mut current = query;
        let mut applied_rule_ids = Vec::new();
        let mut primary_reason = ReasonCode::None;
        for rule in &self.rules {
            let result = rule.apply(current, ctx)?;
            if result.rewritten {
                if primary_reason == ReasonCode::None {
                    primary_reason = result.primary_reason;
                }
                applied_rule_ids.extend(result.applied_rule_ids);
                tracing::debug!(rule = rule.id(), "rewrite applied");
            }
            current = result.query;
        }
        if applied_rule_ids.is_empty() {
            Ok(QueryRewriteResult::unchanged(current))
        } else {
            Ok(QueryRewriteResult {
                query: current,
                rewritten: true,
                applied_rule_ids,
                primary_reason,
            })
        }
    }
}

/// Configuration failures while building a rule chain. These are
/// fail-fast errors, never runtime denies.
#[derive(Debug, Error)]
pub enum RuleSetupError {
    #[error("unknown rewrite rule: {0}")]
    UnknownRule(String),

    #[error("rule {rule} requires a catalog schema")]
    MissingCatalog { rule: String },
}

/// The built-in rules, in their fixed definition order. Chains built by
/// [`BuiltInRule::selected`] always follow this order, not the caller's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BuiltInRule {
    LimitInjection,
    SchemaQualification,
    ColumnQualification,
    IdentifierNormalization,
    Canonicalization,
    TenantPredicate,
}

impl BuiltInRule {
    pub const ALL: [BuiltInRule; 6] = [
        BuiltInRule::LimitInjection,
        BuiltInRule::SchemaQualification,
        BuiltInRule::ColumnQualification,
        BuiltInRule::IdentifierNormalization,
        BuiltInRule::Canonicalization,
        BuiltInRule::TenantPredicate,
    ];

    /// Stable rule id.
    pub fn id(self) -> &'static str {
        match self {
            BuiltInRule::LimitInjection => "limit-injection",
            BuiltInRule::SchemaQualification => "schema-qualification",
            BuiltInRule::ColumnQualification => "column-qualification",
            BuiltInRule::IdentifierNormalization => "identifier-normalization",
            BuiltInRule::Canonicalization => "canonicalization",
            BuiltInRule::TenantPredicate => "tenant-predicate",
        }
    }

    /// Rule for a given id.
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|rule| rule.id() == id)
    }

    /// The rewrite reason this rule reports when it applies.
    pub fn reason(self) -> ReasonCode {
        match self {
            BuiltInRule::LimitInjection => ReasonCode::RewriteLimit,
            BuiltInRule::SchemaQualification | BuiltInRule::ColumnQualification => {
                ReasonCode::RewriteQualification
            }
            BuiltInRule::IdentifierNormalization => ReasonCode::RewriteIdentifierNormalization,
            BuiltInRule::Canonicalization => ReasonCode::RewriteCanonicalization,
            BuiltInRule::TenantPredicate => ReasonCode::RewriteTenantPredicate,
        }
    }

    /// Whether the rule needs a catalog schema to operate.
    pub fn requires_catalog(self) -> bool {
        matches!(
            self,
            BuiltInRule::SchemaQualification
                | BuiltInRule::ColumnQualification
                | BuiltInRule::TenantPredicate
        )
    }

    fn build(
        self,
        settings: &BuiltInRewriteSettings,
        catalog: Option<&CatalogSchema>,
    ) -> Result<Box<dyn QueryRewriteRule>, RuleSetupError> {
        if self.requires_catalog() && catalog.is_none() {
            return Err(RuleSetupError::MissingCatalog {
                rule: self.id().to_string(),
            });
        }
        Ok(match self {
            BuiltInRule::LimitInjection => Box::new(LimitInjectionRule::new(settings)),
            BuiltInRule::SchemaQualification => Box::new(SchemaQualificationRule::new(
                catalog.cloned().unwrap_or_default(),
            )),
            BuiltInRule::ColumnQualification => Box::new(ColumnQualificationRule::new(
                catalog.cloned().unwrap_or_default(),
                settings.qualification_failure_mode,
            )),
            BuiltInRule::IdentifierNormalization => {
                Box::new(IdentifierNormalizationRule::new(settings.identifier_case))
            }
            BuiltInRule::Canonicalization => Box::new(CanonicalizationRule),
            BuiltInRule::TenantPredicate => Box::new(TenantPredicateRule::new(settings)),
        })
    }

    /// Chain of every rule buildable with the given inputs, in definition
    /// order. Schema-dependent rules are included only when a catalog is
    /// supplied.
    pub fn all_available(
        settings: &BuiltInRewriteSettings,
        catalog: Option<&CatalogSchema>,
    ) -> Result<Rewriter, RuleSetupError> {
        let mut rules = Vec::new();
        for rule in Self::ALL {
            if rule.requires_catalog() && catalog.is_none() {
                continue;
            }
            rules.push(rule.build(settings, catalog)?);
        }
        Ok(Rewriter::chain(rules))
    }

    /// Chain of the named rules, ordered by definition order regardless
    /// of the caller's order. Unknown ids and schema-dependent rules
    /// without a catalog fail fast.
    pub fn selected(
        ids: &[String],
        settings: &BuiltInRewriteSettings,
        catalog: Option<&CatalogSchema>,
    ) -> Result<Rewriter, RuleSetupError> {
        let mut picked = Vec::new();
        for id in ids {
            let rule = Self::from_id(id.trim())
                .ok_or_else(|| RuleSetupError::UnknownRule(id.clone()))?;
            if !picked.contains(&rule) {
                picked.push(rule);
            }
        }
        picked.sort();
        let mut rules = Vec::with_capacity(picked.len());
        for rule in picked {
            rules.push(rule.build(settings, catalog)?);
        }
        Ok(Rewriter::chain(rules))
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

    struct Tag {
        id: &'static str,
        rewrite: bool,
        reason: ReasonCode,
    }

    impl QueryRewriteRule for Tag {
        fn id(&self) -> &str {
            self.id
        }

        fn apply(
            &self,
            query: Query,
            _ctx: &ExecutionContext,
        ) -> Result<QueryRewriteResult, RewriteDeny> {
            if self.rewrite {
                Ok(QueryRewriteResult::applied(query, self.id, self.reason))
            } else {
                Ok(QueryRewriteResult::unchanged(query))
            }
        }
    }

    #[test]
    fn noop_is_identity() {
        let query = parse("SELECT 1");
        let result = Rewriter::noop().rewrite(query.clone(), &ctx()).unwrap();
        assert!(!result.rewritten);
        assert_eq!(result.query, query);
        assert_eq!(result.primary_reason, ReasonCode::None);
    }

    #[test]
    fn chain_accumulates_ids_and_takes_first_reason() {
        let chain = Rewriter::chain(vec![
            Box::new(Tag {
                id: "a",
                rewrite: false,
                reason: ReasonCode::RewriteLimit,
            }),
            Box::new(Tag {
                id: "b",
                rewrite: true,
                reason: ReasonCode::RewriteQualification,
            }),
            Box::new(Tag {
                id: "c",
                rewrite: true,
                reason: ReasonCode::RewriteCanonicalization,
            }),
        ]);
        let result = chain.rewrite(parse("SELECT 1"), &ctx()).unwrap();
        assert!(result.rewritten);
        assert_eq!(result.applied_rule_ids, vec!["b", "c"]);
        assert_eq!(result.primary_reason, ReasonCode::RewriteQualification);
    }

    #[test]
    fn selection_orders_by_definition_order() {
        let settings = BuiltInRewriteSettings::default();
        let catalog = CatalogSchema::default();
        let chain = BuiltInRule::selected(
            &[
                "tenant-predicate".to_string(),
                "limit-injection".to_string(),
                "schema-qualification".to_string(),
            ],
            &settings,
            Some(&catalog),
        )
        .unwrap();
        assert_eq!(
            chain.rule_ids(),
            vec!["limit-injection", "schema-qualification", "tenant-predicate"]
        );
    }

    #[test]
    fn unknown_rule_fails_fast() {
        let settings = BuiltInRewriteSettings::default();
        assert!(matches!(
            BuiltInRule::selected(&["no-such-rule".to_string()], &settings, None),
            Err(RuleSetupError::UnknownRule(_))
        ));
    }

    #[test]
    fn schema_dependent_rule_without_catalog_fails_fast() {
        let settings = BuiltInRewriteSettings::default();
        assert!(matches!(
            BuiltInRule::selected(&["tenant-predicate".to_string()], &settings, None),
            Err(RuleSetupError::MissingCatalog { .. })
        ));
    }

    #[test]
    fn all_available_skips_schema_rules_without_catalog() {
        let settings = BuiltInRewriteSettings::default();
        let chain = BuiltInRule::all_available(&settings, None).unwrap();
        assert_eq!(
            chain.rule_ids(),
            vec!["limit-injection", "identifier-normalization", "canonicalization"]
        );
    }
}
