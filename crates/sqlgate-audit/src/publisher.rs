//! Audit publishers.

use std::sync::Mutex;

use crate::event::AuditEvent;

/// Fire-and-forget sink for audit events. Publishing happens after the
/// decision is final; a misbehaving publisher must never change it.
pub trait AuditPublisher: Send + Sync {
    fn publish(&self, event: &AuditEvent);
}

/// Emits every event as a structured tracing record.
#[derive(Debug, Default)]
pub struct TracingAuditPublisher;

impl AuditPublisher for TracingAuditPublisher {
    fn publish(&self, event: &AuditEvent) {
        tracing::info!(
            event_id = %event.event_id,
            decision = ?event.decision,
            reason = event.reason_code.wire_code(),
            dialect = %event.dialect,
            tenant = event.tenant.as_deref().unwrap_or(""),
            fingerprint = event.fingerprint.as_deref().unwrap_or(""),
            duration_nanos = event.duration_nanos,
            "sql decision"
        );
    }
}

/// Collects events in memory; test support.
#[derive(Debug, Default)]
pub struct MemoryAuditPublisher {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything published so far.
    pub fn events(&self) -> Vec<AuditEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl AuditPublisher for MemoryAuditPublisher {
    fn publish(&self, event: &AuditEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

/// Discards every event.
#[derive(Debug, Default)]
pub struct NoopAuditPublisher;

impl AuditPublisher for NoopAuditPublisher {
    fn publish(&self, _event: &AuditEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sqlgate_core::{DecisionResult, ExecutionContext, ReasonCode};

    fn sample_event() -> AuditEvent {
        let ctx = ExecutionContext::new("ansi").unwrap();
        AuditEvent::record(
            "SELECT 1",
            &DecisionResult::allow(None),
            vec![ReasonCode::RewriteLimit],
            &ctx,
            std::time::Duration::ZERO,
        )
    }

    #[test]
    fn memory_publisher_collects_events() {
        let publisher = MemoryAuditPublisher::new();
        let event = sample_event();
        publisher.publish(&event);
        publisher.publish(&event);
        let events = publisher.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].raw_sql, "SELECT 1");
    }

    #[test]
    fn noop_publisher_discards() {
        NoopAuditPublisher.publish(&sample_event());
    }
}
