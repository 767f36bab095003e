//! Configuration loading for the middleware.
//!
//! Configuration can come from a YAML file, from `SQLGATE_*` environment
//! variables, or both (environment overrides file values). The loaded
//! config is raw material; rewrite settings are validated via
//! [`SqlGateConfig::rewrite_settings`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use crate::error::ConfigError;
use crate::schema::CatalogSchema;
use crate::settings::{
    BuiltInRewriteSettings, IdentifierCaseMode, LimitExcessMode, QualificationFailureMode,
    TenantRewriteAmbiguityMode, TenantRewriteFallbackMode, parse_tenant_table_spec,
};

/// Runtime guardrail configuration applied around the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardrailsConfig {
    /// Maximum raw SQL length accepted for execute intent.
    #[serde(default)]
    pub max_sql_length: Option<usize>,
    /// Declared time budget for one call; enforced by the caller.
    #[serde(default)]
    pub timeout_millis: Option<u64>,
    /// Maximum rows an executed query may request.
    #[serde(default)]
    pub max_rows: Option<u64>,
    /// Wrap would-be-allowed execute-intent queries in EXPLAIN.
    #[serde(default)]
    pub explain_dry_run: bool,
}

/// Validation policy configuration for the default validator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorConfig {
    /// Permit INSERT/UPDATE/DELETE statements.
    #[serde(default)]
    pub allow_dml: bool,
    /// When set, every referenced table must appear in this list.
    #[serde(default)]
    pub allowed_tables: Option<BTreeSet<String>>,
    /// Function names that deny the query when called.
    #[serde(default)]
    pub denied_functions: BTreeSet<String>,
    /// Maximum number of joins across the query.
    #[serde(default)]
    pub max_join_count: Option<usize>,
    /// Maximum number of projected columns in any SELECT.
    #[serde(default)]
    pub max_select_columns: Option<usize>,
}

/// Raw rewrite section as written in configuration files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewriteConfig {
    #[serde(default = "default_limit")]
    pub default_limit: u64,
    #[serde(default)]
    pub max_limit: Option<u64>,
    #[serde(default)]
    pub limit_excess_mode: LimitExcessMode,
    #[serde(default)]
    pub identifier_case: IdentifierCaseMode,
    #[serde(default)]
    pub qualification_default_schema: Option<String>,
    #[serde(default)]
    pub qualification_failure_mode: QualificationFailureMode,
    /// Tenant policies in `schema.table:tenant_column[:MODE]` form.
    #[serde(default)]
    pub tenant_tables: Vec<String>,
    #[serde(default)]
    pub tenant_fallback_mode: TenantRewriteFallbackMode,
    #[serde(default)]
    pub tenant_ambiguity_mode: TenantRewriteAmbiguityMode,
}

fn default_limit() -> u64 {
    1000
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: None,
            limit_excess_mode: LimitExcessMode::default(),
            identifier_case: IdentifierCaseMode::default(),
            qualification_default_schema: None,
            qualification_failure_mode: QualificationFailureMode::default(),
            tenant_tables: Vec::new(),
            tenant_fallback_mode: TenantRewriteFallbackMode::default(),
            tenant_ambiguity_mode: TenantRewriteAmbiguityMode::default(),
        }
    }
}

/// Complete middleware configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlGateConfig {
    /// SQL dialect key (`ansi`, `postgresql`, `postgres`).
    #[serde(default = "default_dialect")]
    pub dialect: String,

    /// Enabled rewrite rule ids, in any order; the built-in definition
    /// order is applied when building the chain.
    #[serde(default)]
    pub rules: Vec<String>,

    /// Built-in rewrite rule settings.
    #[serde(default)]
    pub rewrite: RewriteConfig,

    /// Runtime guardrails.
    #[serde(default)]
    pub guardrails: GuardrailsConfig,

    /// Default validator policy.
    #[serde(default)]
    pub validator: ValidatorConfig,

    /// Inline catalog schema used by schema-dependent rules.
    #[serde(default)]
    pub catalog: Option<CatalogSchema>,
}

fn default_dialect() -> String {
    "ansi".to_string()
}

impl Default for SqlGateConfig {
    fn default() -> Self {
        Self {
            dialect: default_dialect(),
            rules: Vec::new(),
            rewrite: RewriteConfig::default(),
            guardrails: GuardrailsConfig::default(),
            validator: ValidatorConfig::default(),
            catalog: None,
        }
    }
}

impl SqlGateConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    /// Apply `SQLGATE_*` environment overrides on top of this config.
    pub fn apply_env(mut self) -> Result<Self, ConfigError> {
        if let Ok(dialect) = std::env::var("SQLGATE_DIALECT") {
            self.dialect = dialect;
        }
        if let Ok(rules) = std::env::var("SQLGATE_RULES") {
            self.rules = split_list(&rules);
        }
        if let Some(value) = env_parse::<u64>("SQLGATE_REWRITE_DEFAULT_LIMIT")? {
            self.rewrite.default_limit = value;
        }
        if let Some(value) = env_parse::<u64>("SQLGATE_REWRITE_MAX_LIMIT")? {
            self.rewrite.max_limit = Some(value);
        }
        if let Ok(tables) = std::env::var("SQLGATE_TENANT_TABLES") {
            self.rewrite.tenant_tables = split_list(&tables);
        }
        if let Some(value) = env_parse::<usize>("SQLGATE_MAX_SQL_LENGTH")? {
            self.guardrails.max_sql_length = Some(value);
        }
        if let Some(value) = env_parse::<u64>("SQLGATE_TIMEOUT_MILLIS")? {
            self.guardrails.timeout_millis = Some(value);
        }
        if let Some(value) = env_parse::<u64>("SQLGATE_MAX_ROWS")? {
            self.guardrails.max_rows = Some(value);
        }
        if let Some(value) = env_parse::<bool>("SQLGATE_EXPLAIN_DRY_RUN")? {
            self.guardrails.explain_dry_run = value;
        }
        Ok(self)
    }

    /// Build validated rewrite settings from the raw rewrite section.
    pub fn rewrite_settings(&self) -> Result<BuiltInRewriteSettings, ConfigError> {
        let mut settings = BuiltInRewriteSettings {
            default_limit: self.rewrite.default_limit,
            max_limit: self.rewrite.max_limit,
            limit_excess_mode: self.rewrite.limit_excess_mode,
            identifier_case: self.rewrite.identifier_case,
            qualification_default_schema: self.rewrite.qualification_default_schema.clone(),
            qualification_failure_mode: self.rewrite.qualification_failure_mode,
            tenant_tables: Default::default(),
            tenant_fallback_mode: self.rewrite.tenant_fallback_mode,
            tenant_ambiguity_mode: self.rewrite.tenant_ambiguity_mode,
        };
        for spec in &self.rewrite.tenant_tables {
            let (key, policy) = parse_tenant_table_spec(spec)?;
            settings.tenant_tables.insert(key, policy);
        }
        settings.validated()
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::invalid(format!("cannot parse {key}={raw}"))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::TenantPolicyMode;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_full_yaml_config() {
        let yaml = r#"
dialect: postgresql
rules: [limit-injection, tenant-predicate]
rewrite:
  default_limit: 500
  max_limit: 10000
  limit_excess_mode: clamp
  qualification_default_schema: public
  tenant_tables:
    - public.users:tenant_id
    - sales.orders:org_id:OPTIONAL
guardrails:
  max_sql_length: 20000
  max_rows: 100000
  explain_dry_run: true
validator:
  allow_dml: false
  denied_functions: [pg_sleep]
catalog:
  tables:
    - schema: public
      name: users
      columns: [id, tenant_id]
"#;
        let config = SqlGateConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.dialect, "postgresql");
        assert_eq!(config.rules.len(), 2);
        assert!(config.guardrails.explain_dry_run);
        assert!(config.validator.denied_functions.contains("pg_sleep"));

        let settings = config.rewrite_settings().unwrap();
        assert_eq!(settings.default_limit, 500);
        assert_eq!(
            settings.tenant_tables["public.users"].mode,
            TenantPolicyMode::Required
        );
        assert_eq!(
            settings.tenant_tables["sales.orders"].mode,
            TenantPolicyMode::Optional
        );
        assert!(config.catalog.unwrap().table("public", "users").is_some());
    }

    #[test]
    fn invalid_tenant_spec_fails_settings_build() {
        let mut config = SqlGateConfig::default();
        config.rewrite.tenant_tables = vec!["users-without-column".to_string()];
        assert!(config.rewrite_settings().is_err());
    }

    #[test]
    fn defaults_are_usable() {
        let config = SqlGateConfig::default();
        assert_eq!(config.dialect, "ansi");
        let settings = config.rewrite_settings().unwrap();
        assert_eq!(settings.default_limit, 1000);
        assert!(settings.tenant_tables.is_empty());
    }
}
