//! The public facade: parse, decide, apply guardrails, audit.

use std::sync::Arc;
use std::time::Instant;

use sqlgate_audit::{AuditEvent, AuditPublisher, NoopAuditPublisher};
use sqlgate_core::{
    DecisionKind, DecisionResult, ExecutionContext, ExecutionMode, ReasonCode, SqlGateConfig,
};
use sqlgate_rewrite::{BuiltInRule, Rewriter};
use sqlgate_sql::{DialectParser, DialectRenderer, SqlQueryParser, SqlQueryRenderer};

use crate::engine::SqlDecisionEngine;
use crate::error::ServiceBuildError;
use crate::explain::DecisionExplainer;
use crate::guardrails::RuntimeGuardrails;
use crate::validator::PolicyValidator;

/// The admission-control entry point.
///
/// Every internal failure is converted here into a deterministic DENY
/// with DENY_PIPELINE_ERROR; callers never see an error type. Exactly
/// one audit event is published per call, after the decision is final.
pub struct SqlAdmissionService {
    parser: DialectParser,
    engine: SqlDecisionEngine,
    renderer: DialectRenderer,
    guardrails: RuntimeGuardrails,
    audit: Arc<dyn AuditPublisher>,
}

impl SqlAdmissionService {
    /// Assemble a service from configuration. The rule chain is built
    /// from `config.rules`; an empty list means no rewriting.
    pub fn from_config(config: &SqlGateConfig) -> Result<Self, ServiceBuildError> {
        let parser = DialectParser::new(&config.dialect)?;
        let renderer = DialectRenderer::new(&config.dialect)?;
        let settings = config.rewrite_settings()?;
        let rewriter = if config.rules.is_empty() {
            Rewriter::noop()
        } else {
            BuiltInRule::selected(&config.rules, &settings, config.catalog.as_ref())?
        };
        let validator = PolicyValidator::new(&config.validator);
        let engine = SqlDecisionEngine::new(Box::new(validator), rewriter, renderer.clone());
        Ok(Self {
            parser,
            engine,
            renderer,
            guardrails: RuntimeGuardrails::new(&config.guardrails),
            audit: Arc::new(NoopAuditPublisher),
        })
    }

    /// Replace the audit publisher.
    pub fn with_audit(mut self, audit: Arc<dyn AuditPublisher>) -> Self {
        self.audit = audit;
        self
    }

    /// Decide without execute intent. Guardrails do not apply.
    pub fn analyze(&self, sql: &str, ctx: &ExecutionContext) -> DecisionResult {
        let ctx = ctx.with_mode(ExecutionMode::Analyze);
        self.run(sql, &ctx, false)
    }

    /// Decide with execute intent, applying runtime guardrails.
    pub fn enforce(&self, sql: &str, ctx: &ExecutionContext) -> DecisionResult {
        let ctx = ctx.with_mode(ExecutionMode::Execute);
        self.run(sql, &ctx, true)
    }

    /// Analyze plus a human-readable explanation of the decision.
    pub fn explain_decision(&self, sql: &str, ctx: &ExecutionContext) -> (DecisionResult, String) {
        let decision = self.analyze(sql, ctx);
        let explanation = DecisionExplainer::new().explain(&decision);
        (decision, explanation)
    }

    fn run(&self, sql: &str, ctx: &ExecutionContext, enforce: bool) -> DecisionResult {
        let started = Instant::now();
        let (decision, applied_rule_ids) = self.decide_guarded(sql, ctx, enforce);
        let applied_rules: Vec<ReasonCode> = applied_rule_ids
            .iter()
            .filter_map(|id| BuiltInRule::from_id(id))
            .map(BuiltInRule::reason)
            .collect();
        let event = AuditEvent::record(sql, &decision, applied_rules, ctx, started.elapsed());
        self.audit.publish(&event);
        decision
    }

    fn decide_guarded(
        &self,
        sql: &str,
        ctx: &ExecutionContext,
        enforce: bool,
    ) -> (DecisionResult, Vec<String>) {
        if enforce {
            if let Some(deny) = self.guardrails.sql_length_violation(sql) {
                return (deny, Vec::new());
            }
        }

        let statement = match self.parser.parse(sql) {
            Ok(statement) => statement,
            Err(error) => {
                tracing::warn!(%error, "statement rejected before validation");
                return (
                    DecisionResult::deny(
                        ReasonCode::DenyPipelineError,
                        format!("unable to process statement: {error}"),
                    ),
                    Vec::new(),
                );
            }
        };

        let outcome = match self.engine.decide(&statement, ctx) {
            Ok(outcome) => outcome,
            Err(error) => {
                tracing::error!(%error, "decision pipeline failed");
                return (
                    DecisionResult::deny(
                        ReasonCode::DenyPipelineError,
                        "internal pipeline failure",
                    ),
                    Vec::new(),
                );
            }
        };

        let mut decision = outcome.decision;
        if enforce && decision.is_actionable() {
            if let Some(query) = &outcome.final_query {
                if let Some(deny) = self.guardrails.max_rows_violation(query) {
                    return (deny, outcome.applied_rule_ids);
                }
            }
            if self.guardrails.explain_dry_run() && decision.kind == DecisionKind::Allow {
                decision = match &outcome.final_query {
                    Some(query) => match self.renderer.render(query, ctx) {
                        Ok(rendered) => DecisionResult::rewrite(
                            ReasonCode::RewriteExplainDryRun,
                            "query wrapped in EXPLAIN for dry run",
                            format!("EXPLAIN {}", rendered.sql),
                            rendered.params,
                            decision.fingerprint.clone(),
                        ),
                        Err(error) => {
                            tracing::error!(%error, "dry-run render failed");
                            DecisionResult::deny(
                                ReasonCode::DenyPipelineError,
                                "internal pipeline failure",
                            )
                        }
                    },
                    // Non-query statements carry no model; wrap the raw text.
                    None => DecisionResult::rewrite(
                        ReasonCode::RewriteExplainDryRun,
                        "statement wrapped in EXPLAIN for dry run",
                        format!("EXPLAIN {sql}"),
                        Vec::new(),
                        None,
                    ),
                };
            }
        }
        (decision, outcome.applied_rule_ids)
    }
}
