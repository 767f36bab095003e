//! The decision pipeline: validate, rewrite, re-validate, render.

use sqlgate_core::{DecisionResult, ExecutionContext};
use sqlgate_rewrite::Rewriter;
use sqlgate_sql::{DialectRenderer, ParsedStatement, Query, SqlQueryRenderer, fingerprint};

use crate::error::EngineError;
use crate::validator::SqlQueryValidator;

/// The outcome of one pipeline run. Alongside the decision it exposes
/// the applied rule ids and the final query so guardrails and auditing
/// can inspect what the decision was made about.
pub struct EngineDecision {
    pub decision: DecisionResult,
    pub applied_rule_ids: Vec<String>,
    /// The query the decision covers, post-rewrite. Absent for non-query
    /// statements.
    pub final_query: Option<Query>,
}

impl EngineDecision {
    fn terminal(decision: DecisionResult) -> Self {
        Self {
            decision,
            applied_rule_ids: Vec::new(),
            final_query: None,
        }
    }
}

/// Validator, rewriter and renderer composed into one deterministic
/// pipeline. The engine holds no per-request state; one instance serves
/// concurrent callers.
pub struct SqlDecisionEngine {
    validator: Box<dyn SqlQueryValidator>,
    rewriter: Rewriter,
    renderer: DialectRenderer,
}

impl SqlDecisionEngine {
    pub fn new(
        validator: Box<dyn SqlQueryValidator>,
        rewriter: Rewriter,
        renderer: DialectRenderer,
    ) -> Self {
        Self {
            validator,
            rewriter,
            renderer,
        }
    }

    /// Decide on one parsed statement.
    ///
    /// Validation failures and rule denies become DENY decisions.
    /// A rewritten query is validated again before rendering, so no
    /// rewrite can smuggle a policy violation past the validator.
    /// Renderer misbehavior surfaces as [`EngineError`]; the facade is
    /// responsible for mapping that to a deny.
    pub fn decide(
        &self,
        statement: &ParsedStatement,
        ctx: &ExecutionContext,
    ) -> Result<EngineDecision, EngineError> {
        if let Err(failure) = self.validator.validate(statement, ctx) {
            return Ok(EngineDecision::terminal(DecisionResult::deny(
                failure.reason,
                failure.message,
            )));
        }

        let query = match statement {
            ParsedStatement::Query(query) => query.clone(),
            // Validated non-query statements pass through untouched.
            ParsedStatement::Ddl { .. } | ParsedStatement::Dml { .. } => {
                return Ok(EngineDecision::terminal(DecisionResult::allow(None)));
            }
        };

        let result = match self.rewriter.rewrite(query, ctx) {
            Ok(result) => result,
            Err(deny) => {
                return Ok(EngineDecision::terminal(DecisionResult::deny(
                    deny.reason,
                    deny.message,
                )));
            }
        };

        if !result.rewritten {
            let fp = fingerprint(&self.renderer, &result.query)?;
            return Ok(EngineDecision {
                decision: DecisionResult::allow(Some(fp)),
                applied_rule_ids: Vec::new(),
                final_query: Some(result.query),
            });
        }

        let rewritten = ParsedStatement::Query(result.query.clone());
        if let Err(failure) = self.validator.validate(&rewritten, ctx) {
            return Ok(EngineDecision::terminal(DecisionResult::deny(
                failure.reason,
                failure.message,
            )));
        }

        let rendered = self.renderer.render(&result.query, ctx)?;
        if rendered.sql.trim().is_empty() {
            return Err(EngineError::Contract(
                "renderer produced blank SQL for a rewritten query".to_string(),
            ));
        }
        let fp = fingerprint(&self.renderer, &result.query)?;

        tracing::debug!(
            rules = result.applied_rule_ids.join(","),
            fingerprint = %fp,
            "query rewritten"
        );

        let message = format!(
            "query rewritten by rules: {}",
            result.applied_rule_ids.join(", ")
        );
        Ok(EngineDecision {
            decision: DecisionResult::rewrite(
                result.primary_reason,
                message,
                rendered.sql,
                rendered.params,
                Some(fp),
            ),
            applied_rule_ids: result.applied_rule_ids,
            final_query: Some(result.query),
        })
    }
}
