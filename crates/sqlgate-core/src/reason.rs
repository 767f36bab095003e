//! Stable reason codes attached to every non-trivial decision.
//!
//! The wire identifiers are consumed by automated retry/remediation loops
//! and must never be renamed or renumbered.

use serde::{Deserialize, Serialize};

/// Closed set of machine-readable decision reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    /// No rewrite applied and no denial.
    None,

    // ===== Validation denials =====
    /// DDL statements are forbidden by policy.
    DenyDdl,
    /// DML statements are forbidden by policy.
    DenyDml,
    /// A referenced table is not permitted (or is ambiguous).
    DenyTable,
    /// A referenced column is not permitted or not resolvable.
    DenyColumn,
    /// A called function is forbidden by policy.
    DenyFunction,

    // ===== Guardrail denials =====
    /// Row limit exceeds the configured maximum, or no bounded limit exists.
    DenyMaxRows,
    /// A tenant-scoped table requires a tenant but none was provided.
    DenyTenantRequired,
    /// No tenant mapping is configured for a referenced table.
    DenyTenantMappingMissing,
    /// Multiple tenant mappings match a referenced table.
    DenyTenantMappingAmbiguous,

    // ===== Pipeline denials =====
    /// Parse failure, unsupported dialect, or unexpected internal fault.
    DenyPipelineError,

    // ===== Rewrite reasons =====
    /// A LIMIT was injected or clamped.
    RewriteLimit,
    /// A table or column reference was qualified.
    RewriteQualification,
    /// Unquoted identifiers were re-cased.
    RewriteIdentifierNormalization,
    /// Structure-preserving simplification was applied.
    RewriteCanonicalization,
    /// A tenant predicate was injected.
    RewriteTenantPredicate,
    /// An execute-intent query was wrapped in EXPLAIN.
    RewriteExplainDryRun,
}

impl ReasonCode {
    /// Stable wire-level identifier.
    pub fn wire_code(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::DenyDdl => "DENY_DDL",
            Self::DenyDml => "DENY_DML",
            Self::DenyTable => "DENY_TABLE",
            Self::DenyColumn => "DENY_COLUMN",
            Self::DenyFunction => "DENY_FUNCTION",
            Self::DenyMaxRows => "DENY_MAX_ROWS",
            Self::DenyTenantRequired => "DENY_TENANT_REQUIRED",
            Self::DenyTenantMappingMissing => "DENY_TENANT_MAPPING_MISSING",
            Self::DenyTenantMappingAmbiguous => "DENY_TENANT_MAPPING_AMBIGUOUS",
            Self::DenyPipelineError => "DENY_PIPELINE_ERROR",
            Self::RewriteLimit => "REWRITE_LIMIT",
            Self::RewriteQualification => "REWRITE_QUALIFICATION",
            Self::RewriteIdentifierNormalization => "REWRITE_IDENTIFIER_NORMALIZATION",
            Self::RewriteCanonicalization => "REWRITE_CANONICALIZATION",
            Self::RewriteTenantPredicate => "REWRITE_TENANT_PREDICATE",
            Self::RewriteExplainDryRun => "REWRITE_EXPLAIN_DRY_RUN",
        }
    }

    /// Whether this reason denotes a denial.
    pub fn is_deny(&self) -> bool {
        self.wire_code().starts_with("DENY_")
    }

    /// Whether this reason denotes a rewrite.
    pub fn is_rewrite(&self) -> bool {
        self.wire_code().starts_with("REWRITE_")
    }
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_codes_match_serde_representation() {
        for code in [
            ReasonCode::None,
            ReasonCode::DenyDdl,
            ReasonCode::DenyTenantMappingAmbiguous,
            ReasonCode::RewriteLimit,
            ReasonCode::RewriteExplainDryRun,
        ] {
            let json = serde_json::to_string(&code).unwrap();
            assert_eq!(json, format!("\"{}\"", code.wire_code()));
        }
    }

    #[test]
    fn deny_and_rewrite_classification() {
        assert!(ReasonCode::DenyMaxRows.is_deny());
        assert!(!ReasonCode::DenyMaxRows.is_rewrite());
        assert!(ReasonCode::RewriteTenantPredicate.is_rewrite());
        assert!(!ReasonCode::None.is_deny());
        assert!(!ReasonCode::None.is_rewrite());
    }
}
