//! Human-readable rendering of a decision.

use sqlgate_core::DecisionResult;

/// Renders a [`DecisionResult`] as multi-line text for humans reviewing
/// why a statement was admitted, rewritten or denied.
#[derive(Debug, Default)]
pub struct DecisionExplainer;

impl DecisionExplainer {
    pub fn new() -> Self {
        Self
    }

    pub fn explain(&self, decision: &DecisionResult) -> String {
        let mut lines = vec![format!("decision: {:?}", decision.kind).to_uppercase()];
        if decision.reason_code.wire_code() != "NONE" {
            lines.push(format!("reason: {}", decision.reason_code.wire_code()));
        }
        if let Some(message) = &decision.message {
            lines.push(format!("message: {message}"));
        }
        if let Some(sql) = &decision.rewritten_sql {
            lines.push(format!("rewritten sql: {sql}"));
        }
        if !decision.sql_params.is_empty() {
            let params: Vec<String> = decision
                .sql_params
                .iter()
                .map(|value| value.to_string())
                .collect();
            lines.push(format!("parameters: [{}]", params.join(", ")));
        }
        if let Some(fingerprint) = &decision.fingerprint {
            lines.push(format!("fingerprint: {fingerprint}"));
        }
        if let Some(guidance) = &decision.guidance {
            lines.push(format!(
                "guidance: {} (retryable: {})",
                guidance.suggested_action, guidance.retryable
            ));
            if let Some(hint) = &guidance.retry_instruction_hint {
                lines.push(format!("retry hint: {hint}"));
            }
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sqlgate_core::ReasonCode;

    #[test]
    fn explains_a_deny_with_guidance() {
        let decision = DecisionResult::deny(ReasonCode::DenyDdl, "DDL statement DROP is not allowed");
        let text = DecisionExplainer::new().explain(&decision);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "DECISION: DENY");
        assert_eq!(lines[1], "reason: DENY_DDL");
        assert_eq!(lines[2], "message: DDL statement DROP is not allowed");
        assert_eq!(lines[3], "guidance: remove_ddl (retryable: true)");
    }

    #[test]
    fn explains_a_rewrite_with_params() {
        let decision = DecisionResult::rewrite(
            ReasonCode::RewriteLimit,
            "query rewritten by rules: limit-injection",
            "SELECT id FROM users WHERE id = $1 LIMIT $2",
            vec![serde_json::json!(7), serde_json::json!(1000)],
            Some("deadbeef".to_string()),
        );
        let text = DecisionExplainer::new().explain(&decision);
        assert!(text.starts_with("DECISION: REWRITE\n"));
        assert!(text.contains("reason: REWRITE_LIMIT"));
        assert!(text.contains("rewritten sql: SELECT id FROM users WHERE id = $1 LIMIT $2"));
        assert!(text.contains("parameters: [7, 1000]"));
        assert!(text.contains("fingerprint: deadbeef"));
    }

    #[test]
    fn explains_an_allow_minimally() {
        let decision = DecisionResult::allow(Some("cafe".to_string()));
        let text = DecisionExplainer::new().explain(&decision);
        assert_eq!(text, "DECISION: ALLOW\nfingerprint: cafe");
    }
}
