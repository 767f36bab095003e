//! # sqlgate-engine
//!
//! The decision side of the middleware: statement validation, the
//! validate/rewrite/re-validate/render pipeline, runtime guardrails,
//! and the [`SqlAdmissionService`] facade that callers interact with.

pub mod engine;
pub mod error;
pub mod explain;
pub mod guardrails;
pub mod service;
pub mod validator;

pub use engine::{EngineDecision, SqlDecisionEngine};
pub use error::{EngineError, ServiceBuildError};
pub use explain::DecisionExplainer;
pub use guardrails::RuntimeGuardrails;
pub use service::SqlAdmissionService;
pub use validator::{PolicyValidator, SqlQueryValidator, ValidationFailure};
