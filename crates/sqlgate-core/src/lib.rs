//! # sqlgate-core
//!
//! Shared types for the sqlgate admission-control middleware: the
//! execution context, reason codes, decision results, remediation
//! guidance, rewrite settings, the catalog schema model, and
//! configuration loading.
//!
//! Everything here is a value object: created per request or per
//! configuration load and never mutated afterward.

pub mod config;
pub mod context;
pub mod decision;
pub mod error;
pub mod guidance;
pub mod reason;
pub mod schema;
pub mod settings;

pub use config::{GuardrailsConfig, RewriteConfig, SqlGateConfig, ValidatorConfig};
pub use context::{ExecutionContext, ExecutionMode, ParameterizationMode};
pub use decision::{DecisionKind, DecisionResult};
pub use error::ConfigError;
pub use guidance::{DecisionGuidance, guidance_for};
pub use reason::ReasonCode;
pub use schema::{CatalogSchema, CatalogTable};
pub use settings::{
    BuiltInRewriteSettings, IdentifierCaseMode, LimitExcessMode, QualificationFailureMode,
    TenantPolicyMode, TenantRewriteAmbiguityMode, TenantRewriteFallbackMode,
    TenantRewriteTablePolicy, parse_tenant_table_spec,
};
