//! The audit record emitted once per decision.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sqlgate_core::{DecisionKind, DecisionResult, ExecutionContext, ExecutionMode, ReasonCode};

/// One decision, flattened for downstream consumers. Built exactly once
/// per call, after the decision is final.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    /// The SQL exactly as submitted.
    pub raw_sql: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    /// Rewrite reasons of the rules that applied, in chain order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub applied_rules: Vec<ReasonCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rewritten_sql: Option<String>,
    pub decision: DecisionKind,
    pub reason_code: ReasonCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub dialect: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
    pub mode: ExecutionMode,
    pub duration_nanos: u64,
}

impl AuditEvent {
    /// Record a finalized decision.
    pub fn record(
        raw_sql: &str,
        decision: &DecisionResult,
        applied_rules: Vec<ReasonCode>,
        ctx: &ExecutionContext,
        duration: std::time::Duration,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            raw_sql: raw_sql.to_string(),
            fingerprint: decision.fingerprint.clone(),
            applied_rules,
            rewritten_sql: decision.rewritten_sql.clone(),
            decision: decision.kind,
            reason_code: decision.reason_code,
            message: decision.message.clone(),
            dialect: ctx.dialect().to_string(),
            principal: ctx.principal.clone(),
            tenant: ctx.tenant.clone(),
            mode: ctx.mode,
            duration_nanos: u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX),
        }
    }
}
