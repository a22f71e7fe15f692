//! Outbound call matching
//!
//! During replay every outbound call the service makes is answered from the
//! recorded children of the root span currently being replayed. There is one
//! matcher per call shape:
//!
//! - [`match_http`]: request/response calls, keyed by a URL prefix
//! - [`match_call`]: named procedure calls, keyed by name
//! - [`match_statement`]: parameterized statements, ranked by longest common
//!   prefix of the statement text
//!
//! Matchers never fail. When no recorded child fits, they return a
//! synthesized sentinel whose [`ResponseOrigin`] tells it apart from a
//! genuine recorded answer.

mod call;
mod http;
mod ledger;
mod resolver;
mod statement;

pub use call::match_call;
pub use http::{URL_PREFIX_LEN, match_http};
pub use ledger::{CallKind, MatchDecision, MatchLedger};
pub use resolver::{OutboundResolver, ReplaySession, SpanFocus};
pub use statement::{common_prefix_len, match_statement};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::span::{QueryResult, StatementError};

/// Span id reported when no recorded child matched
pub const NO_MATCH_SPAN_ID: &str = "no-matching-span-id";

/// Outcome of a replayed statement
pub type StatementOutcome = std::result::Result<QueryResult, StatementError>;

/// Where a resolved response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseOrigin {
    /// Taken from a recorded child span
    Recorded,
    /// Fallback sentinel; nothing matched
    Synthesized,
}

/// Response chosen for a live outbound call
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
    /// Span the response came from, or [`NO_MATCH_SPAN_ID`]
    pub span_id: String,
    /// Response payload
    pub response: T,
    /// Whether the payload was recorded or synthesized
    pub origin: ResponseOrigin,
}

impl<T> Resolved<T> {
    /// Response taken from a recorded span
    pub fn recorded(span_id: impl Into<String>, response: T) -> Self {
        Self {
            span_id: span_id.into(),
            response,
            origin: ResponseOrigin::Recorded,
        }
    }

    /// Sentinel response for a miss
    pub fn synthesized(response: T) -> Self {
        Self {
            span_id: NO_MATCH_SPAN_ID.to_string(),
            response,
            origin: ResponseOrigin::Synthesized,
        }
    }

    /// Whether nothing matched
    pub fn is_miss(&self) -> bool {
        self.origin == ResponseOrigin::Synthesized
    }
}

/// Live outbound HTTP call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpCall {
    /// Full URL, query string included
    pub url: String,
    /// Method
    pub method: String,
    /// Serialized body
    pub body: Option<String>,
}

impl HttpCall {
    /// Call with no body
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: method.into(),
            body: None,
        }
    }

    /// Builder: set the body
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// Live outbound named call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedCall {
    /// Procedure name
    pub name: String,
    /// Serialized request
    pub body: Option<String>,
}

impl NamedCall {
    /// Call with no body
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: None,
        }
    }

    /// Builder: set the body
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// Live outbound statement
#[derive(Debug, Clone, PartialEq)]
pub struct StatementCall {
    /// Statement text
    pub text: String,
    /// Bound values; carried for logging, not used for matching
    pub values: Vec<Value>,
}

impl StatementCall {
    /// Statement with no bound values
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            values: Vec::new(),
        }
    }

    /// Builder: set bound values
    pub fn with_values(mut self, values: Vec<Value>) -> Self {
        self.values = values;
        self
    }
}
