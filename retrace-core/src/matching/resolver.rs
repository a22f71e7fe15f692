//! Resolver capability handed to inbound replayers

use std::sync::Mutex;

use super::{
    CallKind, HttpCall, MatchDecision, MatchLedger, NamedCall, Resolved, StatementCall,
    StatementOutcome, match_call, match_http, match_statement,
};
use crate::span::{CallResponse, HttpResponse, IndexedTrace};

/// Answers intercepted outbound calls from recorded data.
///
/// The interception layer consults this for every outbound call the service
/// makes while one inbound request is being replayed.
pub trait OutboundResolver: Send + Sync {
    /// Resolve a request/response call
    fn resolve_http(&self, call: &HttpCall) -> Resolved<HttpResponse>;

    /// Resolve a named procedure call
    fn resolve_call(&self, call: &NamedCall) -> Resolved<CallResponse>;

    /// Resolve a parameterized statement
    fn resolve_statement(&self, call: &StatementCall) -> Resolved<StatementOutcome>;
}

/// State shared across the traces of one replay run
#[derive(Debug, Default)]
pub struct ReplaySession {
    ledger: Mutex<MatchLedger>,
}

impl ReplaySession {
    /// Fresh session with an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Point matching at the root of `trace`.
    ///
    /// Lookups through the returned focus only ever see this trace's root
    /// children.
    pub fn focus<'s>(&'s self, trace: &'s IndexedTrace) -> SpanFocus<'s> {
        SpanFocus {
            session: self,
            trace,
        }
    }

    /// Copy of the decisions made so far
    pub fn ledger(&self) -> MatchLedger {
        self.lock().clone()
    }

    /// Recorded and synthesized decision counts so far
    pub fn tally(&self) -> (usize, usize) {
        let ledger = self.lock();
        (ledger.recorded(), ledger.synthesized())
    }

    /// Consume the session, returning its ledger
    pub fn into_ledger(self) -> MatchLedger {
        self.ledger.into_inner().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, decision: MatchDecision) {
        self.lock().push(decision);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MatchLedger> {
        self.ledger.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A session focused on the trace currently being replayed
#[derive(Debug, Clone, Copy)]
pub struct SpanFocus<'s> {
    session: &'s ReplaySession,
    trace: &'s IndexedTrace,
}

impl SpanFocus<'_> {
    /// Trace in focus
    pub fn trace(&self) -> &IndexedTrace {
        self.trace
    }

    fn note<T>(&self, kind: CallKind, resolved: &Resolved<T>) {
        self.session.record(MatchDecision {
            trace_id: self.trace.trace_id().to_string(),
            kind,
            span_id: resolved.span_id.clone(),
            origin: resolved.origin,
        });
    }
}

impl OutboundResolver for SpanFocus<'_> {
    fn resolve_http(&self, call: &HttpCall) -> Resolved<HttpResponse> {
        let resolved = match_http(&self.trace.calls, call);
        self.note(CallKind::Http, &resolved);
        resolved
    }

    fn resolve_call(&self, call: &NamedCall) -> Resolved<CallResponse> {
        let resolved = match_call(&self.trace.calls, call);
        self.note(CallKind::Call, &resolved);
        resolved
    }

    fn resolve_statement(&self, call: &StatementCall) -> Resolved<StatementOutcome> {
        let resolved = match_statement(&self.trace.calls, call);
        self.note(CallKind::Statement, &resolved);
        resolved
    }
}
