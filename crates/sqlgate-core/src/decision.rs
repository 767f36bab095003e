//! The decision returned for every analyzed or enforced request.

use serde::{Deserialize, Serialize};

use crate::guidance::{DecisionGuidance, guidance_for};
use crate::reason::ReasonCode;

/// Terminal decision kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionKind {
    Allow,
    Deny,
    Rewrite,
}

/// Machine-actionable decision for one request.
///
/// Cross-field invariants are enforced by the constructors:
/// ALLOW carries reason NONE; `rewritten_sql` is set only for REWRITE and is
/// never blank; guidance is present iff the decision is a DENY.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionResult {
    pub kind: DecisionKind,
    pub reason_code: ReasonCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rewritten_sql: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sql_params: Vec<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guidance: Option<DecisionGuidance>,
}

impl DecisionResult {
    /// An ALLOW decision with an optional query fingerprint.
    pub fn allow(fingerprint: Option<String>) -> Self {
        Self {
            kind: DecisionKind::Allow,
            reason_code: ReasonCode::None,
            message: None,
            rewritten_sql: None,
            sql_params: Vec::new(),
            fingerprint: fingerprint.filter(|f| !f.is_empty()),
            guidance: None,
        }
    }

    /// A DENY decision; guidance is looked up from the static catalog.
    pub fn deny(reason: ReasonCode, message: impl Into<String>) -> Self {
        Self {
            kind: DecisionKind::Deny,
            reason_code: reason,
            message: Some(message.into()),
            rewritten_sql: None,
            sql_params: Vec::new(),
            fingerprint: None,
            guidance: guidance_for(reason),
        }
    }

    /// A REWRITE decision carrying the substituted SQL and its parameters.
    ///
    /// The rewritten SQL must be non-blank; callers are expected to have
    /// checked renderer output before constructing the decision.
    pub fn rewrite(
        reason: ReasonCode,
        message: impl Into<String>,
        rewritten_sql: impl Into<String>,
        sql_params: Vec<serde_json::Value>,
        fingerprint: Option<String>,
    ) -> Self {
        Self {
            kind: DecisionKind::Rewrite,
            reason_code: reason,
            message: Some(message.into()),
            rewritten_sql: Some(rewritten_sql.into()),
            sql_params,
            fingerprint: fingerprint.filter(|f| !f.is_empty()),
            guidance: None,
        }
    }

    /// Whether the caller may proceed with execution (possibly of the
    /// rewritten SQL).
    pub fn is_actionable(&self) -> bool {
        !matches!(self.kind, DecisionKind::Deny)
    }
}
