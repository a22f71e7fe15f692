//! Record of matcher decisions
//!
//! Replay is deterministic given a deterministic document, so two runs over
//! the same input must produce the same decision sequence. The ledger keeps
//! that sequence and condenses it into a digest for comparison.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::ResponseOrigin;

/// Shape of the outbound call that was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallKind {
    /// Request/response call
    Http,
    /// Named procedure call
    Call,
    /// Parameterized statement
    Statement,
}

impl CallKind {
    fn as_str(&self) -> &'static str {
        match self {
            CallKind::Http => "http",
            CallKind::Call => "call",
            CallKind::Statement => "statement",
        }
    }
}

/// One matcher decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchDecision {
    /// Trace being replayed
    pub trace_id: String,
    /// Call shape
    pub kind: CallKind,
    /// Chosen span, or the no-match sentinel id
    pub span_id: String,
    /// Recorded or synthesized
    pub origin: ResponseOrigin,
}

/// Ordered log of matcher decisions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchLedger {
    entries: Vec<MatchDecision>,
}

impl MatchLedger {
    /// Empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a decision
    pub fn push(&mut self, decision: MatchDecision) {
        self.entries.push(decision);
    }

    /// All decisions, in order
    pub fn entries(&self) -> &[MatchDecision] {
        &self.entries
    }

    /// Number of decisions
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no decision was recorded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Decisions answered from recorded spans
    pub fn recorded(&self) -> usize {
        self.count(ResponseOrigin::Recorded)
    }

    /// Decisions answered with a sentinel
    pub fn synthesized(&self) -> usize {
        self.count(ResponseOrigin::Synthesized)
    }

    /// Decisions made while replaying `trace_id`
    pub fn for_trace<'a>(&'a self, trace_id: &'a str) -> impl Iterator<Item = &'a MatchDecision> {
        self.entries.iter().filter(move |d| d.trace_id == trace_id)
    }

    /// SHA-256 over the decision sequence, hex encoded
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for decision in &self.entries {
            hasher.update(decision.trace_id.as_bytes());
            hasher.update([0u8]);
            hasher.update(decision.kind.as_str().as_bytes());
            hasher.update([0u8]);
            hasher.update(decision.span_id.as_bytes());
            hasher.update([0u8]);
            hasher.update([u8::from(decision.origin == ResponseOrigin::Recorded)]);
            hasher.update([b'\n']);
        }
        format!("{:x}", hasher.finalize())
    }

    fn count(&self, origin: ResponseOrigin) -> usize {
        self.entries.iter().filter(|d| d.origin == origin).count()
    }
}
