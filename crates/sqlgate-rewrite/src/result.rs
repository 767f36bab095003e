use sqlgate_core::ReasonCode;
use sqlgate_sql::Query;

/// Outcome of one rule application or of a whole chain.
///
/// `rewritten` is the source of truth: a rule may return a new but
/// equivalent tree without claiming a rewrite.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRewriteResult {
    /// The (possibly rewritten) query.
    pub query: Query,
    /// Whether any change with observable effect was made.
    pub rewritten: bool,
    /// Ids of the rules that rewrote, in application order.
    pub applied_rule_ids: Vec<String>,
    /// Reason of the first rule that rewrote; `None` when unchanged.
    pub primary_reason: ReasonCode,
}

impl QueryRewriteResult {
    /// The query passed through untouched.
    pub fn unchanged(query: Query) -> Self {
        Self {
            query,
            rewritten: false,
            applied_rule_ids: Vec::new(),
            primary_reason: ReasonCode::None,
        }
    }

    /// A single rule rewrote the query.
    pub fn applied(query: Query, rule_id: &str, reason: ReasonCode) -> Self {
        Self {
            query,
            rewritten: true,
            applied_rule_ids: vec![rule_id.to_string()],
            primary_reason: reason,
        }
    }
}
