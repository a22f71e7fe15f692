//! Inbound replay seam
//!
//! An inbound replayer re-issues a trace's root request against the service
//! under test. While it runs, every outbound call the service makes is
//! answered through the resolver it was handed.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::InboundError;
use crate::matching::{HttpCall, NamedCall, OutboundResolver, StatementCall};
use crate::span::{IndexedTrace, RecordedCall, RootRequest};

/// Replays the root request of one trace
#[async_trait]
pub trait InboundReplayer: Send + Sync {
    /// Replay `trace`, answering outbound calls through `resolver`
    async fn replay(
        &self,
        trace: &IndexedTrace,
        resolver: &dyn OutboundResolver,
    ) -> std::result::Result<(), InboundError>;
}

/// Replayer that issues no inbound request and instead re-issues every
/// recorded child call through the resolver, in recorded order.
///
/// Replaying a document against itself this way should resolve every call
/// from a recorded span.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunReplayer;

impl DryRunReplayer {
    fn reissue(call: &RecordedCall, resolver: &dyn OutboundResolver) {
        if let Some(http) = &call.http {
            let mut live = HttpCall::new(http.method.clone().unwrap_or_default(), &http.url);
            live.body = http.request_body.clone();
            resolver.resolve_http(&live);
        } else if let Some(named) = &call.call {
            let mut live = NamedCall::new(&named.name);
            live.body = named.request_body.clone();
            resolver.resolve_call(&live);
        } else if let Some(statement) = &call.statement {
            let values = statement
                .values
                .as_deref()
                .and_then(|v| serde_json::from_str::<Vec<Value>>(v).ok())
                .unwrap_or_default();
            resolver.resolve_statement(&StatementCall::new(&statement.text).with_values(values));
        }
    }
}

#[async_trait]
impl InboundReplayer for DryRunReplayer {
    async fn replay(
        &self,
        trace: &IndexedTrace,
        resolver: &dyn OutboundResolver,
    ) -> std::result::Result<(), InboundError> {
        if trace.root == RootRequest::Unclassified {
            return Err(InboundError::Unsupported {
                span_id: trace.root_span_id().to_string(),
                reason: "root is neither an HTTP request nor a named call".to_string(),
            });
        }

        tracing::debug!(
            trace_id = %trace.trace_id(),
            root = %trace.root.describe(),
            calls = trace.calls.len(),
            "Dry-run replay"
        );

        for call in &trace.calls {
            Self::reissue(call, resolver);
        }
        Ok(())
    }
}
