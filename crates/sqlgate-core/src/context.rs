//! Per-request execution context.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Whether the caller intends to execute the SQL or only inspect the decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Dry-run: decide without execute intent.
    Analyze,
    /// The caller will execute the SQL if allowed.
    Execute,
}

/// How literal values are emitted in rewritten SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterizationMode {
    /// Inline values as SQL literals.
    Off,
    /// Emit placeholders and return values out of band.
    Bind,
}

/// Immutable per-request context threaded through the whole pipeline.
///
/// Constructed once per request; "updates" produce a derived copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionContext {
    /// SQL dialect key, always present and lower-cased.
    dialect: String,
    /// Authenticated principal, if known.
    pub principal: Option<String>,
    /// Tenant identifier used for tenant-predicate injection.
    pub tenant: Option<String>,
    /// Analyze vs. execute intent.
    pub mode: ExecutionMode,
    /// Literal emission mode for rewritten SQL.
    pub parameterization: ParameterizationMode,
}

impl ExecutionContext {
    /// Create a context for the given dialect. The dialect must be non-blank
    /// and is lower-cased for lookup.
    pub fn new(dialect: &str) -> Result<Self, ConfigError> {
        let dialect = dialect.trim();
        if dialect.is_empty() {
            return Err(ConfigError::invalid("dialect must not be blank"));
        }
        Ok(Self {
            dialect: dialect.to_lowercase(),
            principal: None,
            tenant: None,
            mode: ExecutionMode::Analyze,
            parameterization: ParameterizationMode::Off,
        })
    }

    /// The lower-cased dialect key.
    pub fn dialect(&self) -> &str {
        &self.dialect
    }

    /// Derived copy with the given principal.
    pub fn with_principal(&self, principal: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.principal = Some(principal.into());
        next
    }

    /// Derived copy with the given tenant.
    pub fn with_tenant(&self, tenant: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.tenant = Some(tenant.into());
        next
    }

    /// Derived copy with the given execution mode.
    pub fn with_mode(&self, mode: ExecutionMode) -> Self {
        let mut next = self.clone();
        next.mode = mode;
        next
    }

    /// Derived copy with the given parameterization mode.
    pub fn with_parameterization(&self, mode: ParameterizationMode) -> Self {
        let mut next = self.clone();
        next.parameterization = mode;
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dialect_is_lowercased() {
        let ctx = ExecutionContext::new("PostgreSQL").unwrap();
        assert_eq!(ctx.dialect(), "postgresql");
    }

    #[test]
    fn blank_dialect_rejected() {
        assert!(ExecutionContext::new("  ").is_err());
    }

    #[test]
    fn derivations_do_not_mutate_original() {
        let ctx = ExecutionContext::new("ansi").unwrap();
        let derived = ctx
            .with_tenant("acme")
            .with_mode(ExecutionMode::Execute)
            .with_parameterization(ParameterizationMode::Bind);
        assert_eq!(ctx.tenant, None);
        assert_eq!(ctx.mode, ExecutionMode::Analyze);
        assert_eq!(derived.tenant.as_deref(), Some("acme"));
        assert_eq!(derived.mode, ExecutionMode::Execute);
        assert_eq!(derived.parameterization, ParameterizationMode::Bind);
    }
}
