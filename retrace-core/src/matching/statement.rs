//! Statement matcher

use super::{Resolved, StatementCall, StatementOutcome};
use crate::span::{QueryResult, RecordedCall, RecordedStatement};

/// Length of the longest common prefix of `a` and `b`, in characters.
///
/// The scan stops as soon as either string is exhausted.
pub fn common_prefix_len(a: &str, b: &str) -> usize {
    a.chars()
        .zip(b.chars())
        .take_while(|(x, y)| x == y)
        .count()
}

/// Pick the recorded child answering a live statement.
///
/// Every child carrying statement text is a candidate. The one sharing the
/// longest prefix with the live text wins; on ties the earliest candidate is
/// kept. Bound values are not consulted.
pub fn match_statement(calls: &[RecordedCall], live: &StatementCall) -> Resolved<StatementOutcome> {
    let mut best: Option<(&str, &RecordedStatement, usize)> = None;
    let mut candidates = 0usize;

    for call in calls {
        let Some(statement) = call.statement.as_ref() else {
            continue;
        };
        candidates += 1;

        let score = common_prefix_len(&live.text, &statement.text);
        if best.is_none_or(|(_, _, best_score)| score > best_score) {
            best = Some((call.span_id.as_str(), statement, score));
        }
    }

    let Some((span_id, statement, score)) = best else {
        tracing::error!(
            statement = %live.text,
            "No recorded span for statement, returning empty result"
        );
        return Resolved::synthesized(Ok(QueryResult::empty()));
    };

    tracing::info!(
        statement = %live.text,
        candidates,
        "Found recorded spans for statement"
    );
    tracing::debug!(
        best = %statement.text,
        score,
        values = live.values.len(),
        "Best statement match"
    );

    Resolved::recorded(span_id, statement.outcome.clone())
}
