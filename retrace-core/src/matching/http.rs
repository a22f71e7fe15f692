//! Request/response matcher

use super::{HttpCall, Resolved};
use crate::span::{HttpResponse, RecordedCall, RecordedHttp};

/// Number of leading characters of the URL compared when selecting candidates.
///
/// Recorded and live URLs often differ only in trailing noise such as query
/// parameter order.
pub const URL_PREFIX_LEN: usize = 50;

/// Pick the recorded child answering a live HTTP call.
///
/// Candidates share the first [`URL_PREFIX_LEN`] characters of the URL. Among
/// them, the first whose method and body both equal the live call wins;
/// otherwise the first candidate in recorded order.
pub fn match_http(calls: &[RecordedCall], live: &HttpCall) -> Resolved<HttpResponse> {
    let candidates: Vec<(&str, &RecordedHttp)> = calls
        .iter()
        .filter_map(|call| call.http.as_ref().map(|http| (call.span_id.as_str(), http)))
        .filter(|(_, http)| same_prefix(&http.url, &live.url, URL_PREFIX_LEN))
        .collect();

    let Some(&first) = candidates.first() else {
        tracing::error!(
            url = %live.url,
            method = %live.method,
            "No recorded span for outbound request, returning empty response"
        );
        return Resolved::synthesized(HttpResponse::empty());
    };

    tracing::info!(
        url = %live.url,
        candidates = candidates.len(),
        "Found recorded spans for outbound request"
    );

    let (span_id, chosen) = candidates
        .iter()
        .copied()
        .find(|(_, http)| {
            http.method.as_deref() == Some(live.method.as_str()) && http.request_body == live.body
        })
        .unwrap_or(first);

    Resolved::recorded(span_id, chosen.response.clone())
}

fn same_prefix(a: &str, b: &str, len: usize) -> bool {
    a.chars().take(len).eq(b.chars().take(len))
}
