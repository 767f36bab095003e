//! Remediation guidance for deny decisions.
//!
//! Guidance feeds automated retry loops: `retryable` says whether
//! regenerating the SQL is likely to succeed, `suggested_action` is a
//! short machine-readable verb, and the retry instruction (retryable
//! denials only) is a compact natural-language hint for the generator.

use serde::{Deserialize, Serialize};

use crate::reason::ReasonCode;

/// Remediation guidance attached to a DENY decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionGuidance {
    /// Whether an automated retry (regenerated SQL) is likely to succeed.
    pub retryable: bool,
    /// Human-readable explanation of what went wrong.
    pub remediation_hint: String,
    /// Short machine-readable action identifier.
    pub suggested_action: String,
    /// Retry instruction for the SQL generator; present iff retryable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_instruction_hint: Option<String>,
}

impl DecisionGuidance {
    fn retryable(hint: &str, action: &str, retry: &str) -> Self {
        Self {
            retryable: true,
            remediation_hint: hint.to_string(),
            suggested_action: action.to_string(),
            retry_instruction_hint: Some(retry.to_string()),
        }
    }

    fn terminal(hint: &str, action: &str) -> Self {
        Self {
            retryable: false,
            remediation_hint: hint.to_string(),
            suggested_action: action.to_string(),
            retry_instruction_hint: None,
        }
    }
}

/// Look up the guidance for a deny reason. Returns `None` for reasons that
/// are not denials.
pub fn guidance_for(reason: ReasonCode) -> Option<DecisionGuidance> {
    let guidance = match reason {
        ReasonCode::DenyDdl => DecisionGuidance::retryable(
            "DDL statements are not permitted through this gateway",
            "remove_ddl",
            "Regenerate the query without CREATE, ALTER, DROP or TRUNCATE.",
        ),
        ReasonCode::DenyDml => DecisionGuidance::retryable(
            "Data-modifying statements are not permitted for this policy",
            "remove_dml",
            "Regenerate the request as a read-only SELECT query.",
        ),
        ReasonCode::DenyTable => DecisionGuidance::retryable(
            "A referenced table is not allowed or could not be resolved uniquely",
            "use_allowed_tables",
            "Reference only permitted tables and qualify ambiguous names with a schema.",
        ),
        ReasonCode::DenyColumn => DecisionGuidance::retryable(
            "A referenced column is not allowed or could not be resolved uniquely",
            "use_allowed_columns",
            "Reference only known columns and qualify them with their table or alias.",
        ),
        ReasonCode::DenyFunction => DecisionGuidance::retryable(
            "A called function is blocked by policy",
            "remove_denied_function",
            "Regenerate the query without the blocked function call.",
        ),
        ReasonCode::DenyMaxRows => DecisionGuidance::retryable(
            "The query's row limit exceeds the configured maximum",
            "lower_limit",
            "Add or lower the LIMIT clause to a literal value within the allowed maximum.",
        ),
        ReasonCode::DenyTenantRequired => DecisionGuidance::terminal(
            "The query touches a tenant-scoped table but the request carries no tenant",
            "provide_tenant_context",
        ),
        ReasonCode::DenyTenantMappingMissing => DecisionGuidance::terminal(
            "No tenant-column mapping is configured for a referenced table",
            "configure_tenant_mapping",
        ),
        ReasonCode::DenyTenantMappingAmbiguous => DecisionGuidance::retryable(
            "The table name matches more than one configured tenant mapping",
            "qualify_table_reference",
            "Qualify the table reference with an explicit schema.",
        ),
        ReasonCode::DenyPipelineError => DecisionGuidance::terminal(
            "The request could not be processed; this is not recoverable by retrying",
            "escalate",
        ),
        _ => return None,
    };
    Some(guidance)
}
