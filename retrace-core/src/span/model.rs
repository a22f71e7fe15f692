//! Captured trace document shape
//!
//! Mirrors the JSON written by the capture side: a document holds traces,
//! each trace holds spans, `spans[0]` is the inbound request.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{ReplayError, Result};

/// Top-level captured document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraceDocument {
    /// All captured traces, in capture order
    #[serde(default)]
    pub traces: Vec<Trace>,
}

impl TraceDocument {
    /// Parse a document from its JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Number of traces in the document
    pub fn len(&self) -> usize {
        self.traces.len()
    }

    /// Whether the document holds no traces
    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }
}

/// One captured inbound request and everything it caused
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trace {
    /// Trace identifier
    pub trace_id: String,

    /// Spans of the trace; the first is the root
    #[serde(default)]
    pub spans: Vec<Span>,
}

impl Trace {
    /// Root span (`spans[0]`)
    pub fn root(&self) -> Option<&Span> {
        self.spans.first()
    }

    /// Root span, or an error naming the trace if it has none
    pub fn require_root(&self) -> Result<&Span> {
        self.root().ok_or_else(|| ReplayError::EmptyTrace {
            trace_id: self.trace_id.clone(),
        })
    }
}

/// One recorded operation with protocol-tagged labels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Span {
    /// Span identifier
    pub span_id: String,

    /// Opaque string labels; typed decoding happens in [`super::view`]
    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    /// Operations triggered by this one
    #[serde(default)]
    pub children: Vec<Span>,
}

impl Span {
    /// Create a span with no labels or children
    pub fn new(span_id: impl Into<String>) -> Self {
        Self {
            span_id: span_id.into(),
            labels: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// Builder: add a label
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Builder: add a child span
    pub fn with_child(mut self, child: Span) -> Self {
        self.children.push(child);
        self
    }

    /// Look up a label value
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}
