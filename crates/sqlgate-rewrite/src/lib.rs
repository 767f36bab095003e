//! # sqlgate-rewrite
//!
//! The rewrite layer: a rule trait with an explicit deny channel, chain
//! composition with accumulating rule ids, and the six built-in
//! guardrail rules (limit injection, schema and column qualification,
//! identifier normalization, canonicalization, tenant predicate
//! injection).
//!
//! Rules consume and return owned query trees; a denial from any rule
//! short-circuits the chain and becomes a DENY decision upstream.

pub mod result;
pub mod rule;
pub mod rules;

pub use result::QueryRewriteResult;
pub use rule::{BuiltInRule, QueryRewriteRule, RewriteDeny, Rewriter, RuleSetupError};
