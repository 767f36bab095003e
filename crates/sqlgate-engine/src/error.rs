use thiserror::Error;

use sqlgate_core::ConfigError;
use sqlgate_rewrite::RuleSetupError;
use sqlgate_sql::SqlError;

/// Programming-contract violations inside the decision pipeline. These
/// are not denials; the facade maps them to DENY_PIPELINE_ERROR at the
/// outermost boundary.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine contract violation: {0}")]
    Contract(String),

    #[error(transparent)]
    Sql(#[from] SqlError),
}

/// Failures while assembling a service from configuration.
#[derive(Debug, Error)]
pub enum ServiceBuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Dialect(#[from] SqlError),

    #[error(transparent)]
    Rules(#[from] RuleSetupError),
}
