//! Named-call matcher

use super::{NamedCall, Resolved};
use crate::span::{CallResponse, RecordedCall, RecordedNamedCall};

/// Pick the recorded child answering a live named call.
///
/// Candidates carry the same call name; the first with an identical request
/// body wins, otherwise the first candidate.
pub fn match_call(calls: &[RecordedCall], live: &NamedCall) -> Resolved<CallResponse> {
    let candidates: Vec<(&str, &RecordedNamedCall)> = calls
        .iter()
        .filter_map(|call| call.call.as_ref().map(|named| (call.span_id.as_str(), named)))
        .filter(|(_, named)| named.name == live.name)
        .collect();

    let Some(&first) = candidates.first() else {
        tracing::error!(
            name = %live.name,
            "No recorded span for outbound call, returning empty response"
        );
        return Resolved::synthesized(CallResponse::empty());
    };

    tracing::info!(
        name = %live.name,
        candidates = candidates.len(),
        "Found recorded spans for outbound call"
    );

    let (span_id, chosen) = candidates
        .iter()
        .copied()
        .find(|(_, named)| named.request_body == live.body)
        .unwrap_or(first);

    Resolved::recorded(span_id, chosen.response.clone())
}
