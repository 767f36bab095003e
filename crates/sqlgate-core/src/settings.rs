//! Settings for the built-in rewrite rules.
//!
//! Settings are plain immutable structs validated once at construction.
//! Tenant table policies are keyed by normalized `schema.table` strings.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// What to do when an explicit LIMIT exceeds the configured maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitExcessMode {
    /// Deny the query.
    #[default]
    Deny,
    /// Rewrite the literal down to the maximum.
    Clamp,
}

/// What to do when a column reference cannot be qualified uniquely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualificationFailureMode {
    /// Deny the query.
    Deny,
    /// Leave the reference unchanged.
    #[default]
    Skip,
}

/// Target case for unquoted identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierCaseMode {
    /// Leave identifiers as written.
    Preserve,
    /// Lower-case unquoted identifiers.
    #[default]
    Lower,
    /// Upper-case unquoted identifiers.
    Upper,
}

/// What to do when a table has no configured tenant mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantRewriteFallbackMode {
    /// Deny the query.
    #[default]
    Deny,
    /// Leave the table unscoped.
    Skip,
}

/// What to do when an unqualified table matches several tenant mappings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantRewriteAmbiguityMode {
    /// Deny the query.
    #[default]
    Deny,
    /// Leave the table unscoped.
    Skip,
}

/// Enforcement mode of a single table's tenant policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TenantPolicyMode {
    /// The tenant predicate is mandatory; a missing tenant denies the query.
    #[default]
    Required,
    /// Inject only when the context carries a tenant.
    Optional,
    /// Never inject for this table.
    Skip,
}

/// Per-table tenant rewrite policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantRewriteTablePolicy {
    /// Column holding the tenant identifier.
    pub tenant_column: String,
    /// Enforcement mode, REQUIRED when unset.
    #[serde(default)]
    pub mode: TenantPolicyMode,
}

impl TenantRewriteTablePolicy {
    /// Create a policy; the tenant column is trimmed and must be non-blank.
    pub fn new(tenant_column: &str, mode: TenantPolicyMode) -> Result<Self, ConfigError> {
        let tenant_column = tenant_column.trim();
        if tenant_column.is_empty() {
            return Err(ConfigError::invalid("tenant column must not be blank"));
        }
        Ok(Self {
            tenant_column: tenant_column.to_string(),
            mode,
        })
    }
}

/// Configuration root for the built-in rewrite rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuiltInRewriteSettings {
    /// LIMIT value injected when a query has none.
    #[serde(default = "default_limit")]
    pub default_limit: u64,
    /// Maximum allowed LIMIT, if any.
    #[serde(default)]
    pub max_limit: Option<u64>,
    /// Behavior when an explicit LIMIT exceeds `max_limit`.
    #[serde(default)]
    pub limit_excess_mode: LimitExcessMode,
    /// Target case for identifier normalization.
    #[serde(default)]
    pub identifier_case: IdentifierCaseMode,
    /// Schema used to disambiguate unqualified references.
    #[serde(default)]
    pub qualification_default_schema: Option<String>,
    /// Behavior when a column cannot be qualified uniquely.
    #[serde(default)]
    pub qualification_failure_mode: QualificationFailureMode,
    /// Tenant policies keyed by normalized `schema.table`.
    #[serde(default)]
    pub tenant_tables: BTreeMap<String, TenantRewriteTablePolicy>,
    /// Behavior when a table has no tenant mapping.
    #[serde(default)]
    pub tenant_fallback_mode: TenantRewriteFallbackMode,
    /// Behavior when a table name matches several tenant mappings.
    #[serde(default)]
    pub tenant_ambiguity_mode: TenantRewriteAmbiguityMode,
}

impl Default for BuiltInRewriteSettings {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: None,
            limit_excess_mode: LimitExcessMode::default(),
            identifier_case: IdentifierCaseMode::default(),
            qualification_default_schema: None,
            qualification_failure_mode: QualificationFailureMode::default(),
            tenant_tables: BTreeMap::new(),
            tenant_fallback_mode: TenantRewriteFallbackMode::default(),
            tenant_ambiguity_mode: TenantRewriteAmbiguityMode::default(),
        }
    }
}

fn default_limit() -> u64 {
    1000
}

impl BuiltInRewriteSettings {
    /// Validate the settings and normalize tenant table keys.
    ///
    /// Checks: limits are positive; with a max limit and DENY excess mode
    /// the default injection value must not exceed the max; every tenant
    /// table key normalizes to lower-case `schema.table` with exactly one
    /// non-edge dot.
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        if self.default_limit == 0 {
            return Err(ConfigError::invalid("default limit must be positive"));
        }
        if let Some(max) = self.max_limit {
            if max == 0 {
                return Err(ConfigError::invalid("max limit must be positive"));
            }
            if self.limit_excess_mode == LimitExcessMode::Deny && self.default_limit > max {
                return Err(ConfigError::invalid(format!(
                    "default limit {} exceeds max limit {} with deny excess mode",
                    self.default_limit, max
                )));
            }
        }

        let mut normalized = BTreeMap::new();
        for (key, policy) in std::mem::take(&mut self.tenant_tables) {
            let key = normalize_table_key(&key)?;
            let policy = TenantRewriteTablePolicy::new(&policy.tenant_column, policy.mode)?;
            normalized.insert(key, policy);
        }
        self.tenant_tables = normalized;
        Ok(self)
    }

    /// Register a tenant policy under a normalized `schema.table` key.
    pub fn with_tenant_table(
        mut self,
        table_key: &str,
        policy: TenantRewriteTablePolicy,
    ) -> Result<Self, ConfigError> {
        let key = normalize_table_key(table_key)?;
        self.tenant_tables.insert(key, policy);
        Ok(self)
    }

    /// Tenant policies whose table part (ignoring schema) matches `table`.
    pub fn tenant_policies_for_table(
        &self,
        table: &str,
    ) -> Vec<(&str, &TenantRewriteTablePolicy)> {
        let table = table.to_lowercase();
        self.tenant_tables
            .iter()
            .filter(|(key, _)| key.split('.').nth(1) == Some(table.as_str()))
            .map(|(key, policy)| (key.as_str(), policy))
            .collect()
    }
}

/// Normalize a `schema.table` key: lower-case, exactly one non-edge dot.
pub fn normalize_table_key(key: &str) -> Result<String, ConfigError> {
    let key = key.trim().to_lowercase();
    let mut parts = key.split('.');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(schema), Some(table), None) if !schema.is_empty() && !table.is_empty() => {
            Ok(format!("{schema}.{table}"))
        }
        _ => Err(ConfigError::invalid(format!(
            "tenant table key '{key}' must have the form schema.table"
        ))),
    }
}

/// Parse the configuration string form
/// `schema.table:tenant_column[:REQUIRED|OPTIONAL|SKIP]`.
pub fn parse_tenant_table_spec(
    spec: &str,
) -> Result<(String, TenantRewriteTablePolicy), ConfigError> {
    let mut parts = spec.trim().splitn(3, ':');
    let key = parts
        .next()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ConfigError::invalid(format!("empty tenant table spec '{spec}'")))?;
    let column = parts.next().ok_or_else(|| {
        ConfigError::invalid(format!("tenant table spec '{spec}' is missing a tenant column"))
    })?;
    let mode = match parts.next() {
        None => TenantPolicyMode::Required,
        Some(raw) => match raw.trim().to_uppercase().as_str() {
            "REQUIRED" => TenantPolicyMode::Required,
            "OPTIONAL" => TenantPolicyMode::Optional,
            "SKIP" => TenantPolicyMode::Skip,
            other => {
                return Err(ConfigError::invalid(format!(
                    "unknown tenant policy mode '{other}' in spec '{spec}'"
                )));
            }
        },
    };
    Ok((
        normalize_table_key(key)?,
        TenantRewriteTablePolicy::new(column, mode)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_settings_validate() {
        let settings = BuiltInRewriteSettings::default().validated().unwrap();
        assert_eq!(settings.default_limit, 1000);
    }

    #[test]
    fn zero_limits_rejected() {
        let mut settings = BuiltInRewriteSettings::default();
        settings.default_limit = 0;
        assert!(settings.validated().is_err());

        let mut settings = BuiltInRewriteSettings::default();
        settings.max_limit = Some(0);
        assert!(settings.validated().is_err());
    }

    #[test]
    fn default_above_max_with_deny_mode_rejected() {
        let mut settings = BuiltInRewriteSettings::default();
        settings.default_limit = 5000;
        settings.max_limit = Some(100);
        settings.limit_excess_mode = LimitExcessMode::Deny;
        assert!(settings.validated().is_err());

        // Clamp mode tolerates the same combination.
        let mut settings = BuiltInRewriteSettings::default();
        settings.default_limit = 5000;
        settings.max_limit = Some(100);
        settings.limit_excess_mode = LimitExcessMode::Clamp;
        assert!(settings.validated().is_ok());
    }

    #[test]
    fn table_keys_normalized_to_lowercase() {
        let settings = BuiltInRewriteSettings::default()
            .with_tenant_table(
                "Public.Users",
                TenantRewriteTablePolicy::new("tenant_id", TenantPolicyMode::Required).unwrap(),
            )
            .unwrap();
        assert!(settings.tenant_tables.contains_key("public.users"));
    }

    #[test]
    fn malformed_table_keys_rejected() {
        for key in ["users", ".users", "public.", "a.b.c", ""] {
            assert!(normalize_table_key(key).is_err(), "key {key:?} should fail");
        }
    }

    #[test]
    fn blank_tenant_column_rejected() {
        assert!(TenantRewriteTablePolicy::new("  ", TenantPolicyMode::Required).is_err());
    }

    #[test]
    fn parse_spec_with_default_mode() {
        let (key, policy) = parse_tenant_table_spec("public.users:tenant_id").unwrap();
        assert_eq!(key, "public.users");
        assert_eq!(policy.tenant_column, "tenant_id");
        assert_eq!(policy.mode, TenantPolicyMode::Required);
    }

    #[test]
    fn parse_spec_with_explicit_mode() {
        let (_, policy) = parse_tenant_table_spec("sales.orders:org_id:OPTIONAL").unwrap();
        assert_eq!(policy.mode, TenantPolicyMode::Optional);
        assert!(parse_tenant_table_spec("sales.orders:org_id:SOMETIMES").is_err());
    }

    #[test]
    fn policies_for_table_ignores_schema() {
        let settings = BuiltInRewriteSettings::default()
            .with_tenant_table(
                "public.users",
                TenantRewriteTablePolicy::new("tenant_id", TenantPolicyMode::Required).unwrap(),
            )
            .unwrap()
            .with_tenant_table(
                "archive.users",
                TenantRewriteTablePolicy::new("tenant_id", TenantPolicyMode::Required).unwrap(),
            )
            .unwrap();
        assert_eq!(settings.tenant_policies_for_table("USERS").len(), 2);
        assert_eq!(settings.tenant_policies_for_table("orders").len(), 0);
    }
}
