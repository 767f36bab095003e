//! Runtime guardrails applied around the engine for execute intent.

use std::time::Duration;

use sqlgate_core::{DecisionResult, GuardrailsConfig, ReasonCode};
use sqlgate_sql::Query;

/// Operational limits enforced by the facade on `enforce` calls only.
/// `analyze` runs the pipeline without them.
#[derive(Debug, Clone, Default)]
pub struct RuntimeGuardrails {
    max_sql_length: Option<usize>,
    timeout_millis: Option<u64>,
    max_rows: Option<u64>,
    explain_dry_run: bool,
}

impl RuntimeGuardrails {
    pub fn new(config: &GuardrailsConfig) -> Self {
        Self {
            max_sql_length: config.max_sql_length,
            timeout_millis: config.timeout_millis,
            max_rows: config.max_rows,
            explain_dry_run: config.explain_dry_run,
        }
    }

    /// Pre-parse length check on the raw SQL text.
    pub fn sql_length_violation(&self, sql: &str) -> Option<DecisionResult> {
        let max = self.max_sql_length?;
        if sql.len() <= max {
            return None;
        }
        Some(DecisionResult::deny(
            ReasonCode::DenyPipelineError,
            format!("SQL length {} exceeds the maximum of {max}", sql.len()),
        ))
    }

    /// Row ceiling over the final query. The ceiling demands a literal
    /// LIMIT at or below `max_rows`; anything else is denied because the
    /// row count cannot be proven.
    pub fn max_rows_violation(&self, query: &Query) -> Option<DecisionResult> {
        let max = self.max_rows?;
        match query.limit.as_ref().and_then(|limit| limit.literal_value()) {
            Some(value) if value <= max => None,
            Some(value) => Some(DecisionResult::deny(
                ReasonCode::DenyMaxRows,
                format!("LIMIT {value} exceeds the maximum of {max} rows"),
            )),
            None => Some(DecisionResult::deny(
                ReasonCode::DenyMaxRows,
                format!("query must carry a literal LIMIT of at most {max} rows"),
            )),
        }
    }

    /// Declared time budget for one call. The caller owns enforcement;
    /// the middleware never measures elapsed time against it.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_millis.map(Duration::from_millis)
    }

    /// Whether would-be-allowed execute-intent queries are wrapped in
    /// EXPLAIN instead of being executed.
    pub fn explain_dry_run(&self) -> bool {
        self.explain_dry_run
    }
}
