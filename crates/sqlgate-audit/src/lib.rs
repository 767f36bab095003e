//! # sqlgate-audit
//!
//! Audit trail for admission decisions: one serializable event per
//! decision and a publisher trait with tracing-backed, in-memory and
//! no-op implementations.

pub mod event;
pub mod publisher;

pub use event::AuditEvent;
pub use publisher::{AuditPublisher, MemoryAuditPublisher, NoopAuditPublisher, TracingAuditPublisher};
