//! Typed views over span labels
//!
//! Labels arrive as an opaque string bag. Each trace is indexed once at load
//! time: the root is classified and every root child is decoded into the
//! protocol views the matchers consume, so malformed data is caught before
//! replay instead of surfacing mid-trace.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::labels;
use super::model::{Span, Trace};
use crate::error::{ReplayError, Result};

/// Default status when a recorded HTTP child carries none
pub const DEFAULT_STATUS: u16 = 200;

/// Message used when a failed statement recorded no message
pub const DEFAULT_STATEMENT_ERROR: &str = "error from replay data";

/// What the root span of a trace represents
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootRequest {
    /// Inbound HTTP request
    Http {
        /// Recorded method, if any
        method: Option<String>,
        /// Request target path
        target: String,
    },
    /// Inbound named procedure call
    Call {
        /// Procedure name
        name: String,
    },
    /// Root carries neither marker and is not replayed
    Unclassified,
}

impl RootRequest {
    /// Classify a root span by its labels.
    ///
    /// An HTTP target takes precedence over a call name, so every root maps
    /// to at most one kind. Empty label values count as absent.
    pub fn classify(root: &Span) -> Self {
        if let Some(target) = non_empty(root, labels::HTTP_TARGET) {
            return RootRequest::Http {
                method: root.label(labels::HTTP_METHOD).map(str::to_string),
                target: target.to_string(),
            };
        }
        if let Some(name) = non_empty(root, labels::CALL_NAME) {
            return RootRequest::Call {
                name: name.to_string(),
            };
        }
        RootRequest::Unclassified
    }

    /// Short human-readable description for logs
    pub fn describe(&self) -> String {
        match self {
            RootRequest::Http { method, target } => {
                format!("{} {}", method.as_deref().unwrap_or("?"), target)
            }
            RootRequest::Call { name } => name.clone(),
            RootRequest::Unclassified => "<unclassified>".to_string(),
        }
    }
}

/// Response reconstructed for an outbound HTTP call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpResponse {
    /// Status code
    pub status: u16,
    /// Response body
    pub body: String,
    /// Response headers
    pub headers: BTreeMap<String, Value>,
}

impl HttpResponse {
    /// Empty `200` response used when nothing matched
    pub fn empty() -> Self {
        Self {
            status: DEFAULT_STATUS,
            body: String::new(),
            headers: BTreeMap::new(),
        }
    }
}

/// Response reconstructed for an outbound named call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallResponse {
    /// Serialized response
    pub body: String,
}

impl CallResponse {
    /// Empty response used when nothing matched
    pub fn empty() -> Self {
        Self {
            body: String::new(),
        }
    }
}

/// Successful statement result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Returned rows
    #[serde(default)]
    pub rows: Vec<Value>,

    /// Affected row count (populated for INSERT, UPDATE, ...)
    #[serde(rename = "rowCount", default, skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,
}

impl QueryResult {
    /// Result with no rows
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Structured database error reconstructed from recorded labels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
#[serde(rename_all = "camelCase")]
pub struct StatementError {
    /// Error message
    pub message: String,
    /// Schema involved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    /// Table involved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    /// Column involved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    /// Data type involved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    /// Violated constraint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraint: Option<String>,
}

impl StatementError {
    /// Error with only a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            schema: None,
            table: None,
            column: None,
            data_type: None,
            constraint: None,
        }
    }

    fn from_span(span: &Span) -> Self {
        let owned = |key: &str| span.label(key).map(str::to_string);
        Self {
            message: non_empty(span, labels::ERROR_MESSAGE)
                .unwrap_or(DEFAULT_STATEMENT_ERROR)
                .to_string(),
            schema: owned(labels::ERROR_SCHEMA),
            table: owned(labels::ERROR_TABLE),
            column: owned(labels::ERROR_COLUMN),
            data_type: owned(labels::ERROR_DATA_TYPE),
            constraint: owned(labels::ERROR_CONSTRAINT),
        }
    }
}

/// Recorded outbound HTTP call
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedHttp {
    /// Full recorded URL
    pub url: String,
    /// Recorded method
    pub method: Option<String>,
    /// Recorded request body
    pub request_body: Option<String>,
    /// Recorded response
    pub response: HttpResponse,
}

/// Recorded outbound named call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedNamedCall {
    /// Procedure name
    pub name: String,
    /// Recorded request body
    pub request_body: Option<String>,
    /// Recorded response
    pub response: CallResponse,
}

/// Recorded outbound statement
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedStatement {
    /// Statement text
    pub text: String,
    /// Bound values as recorded (not used for matching)
    pub values: Option<String>,
    /// Recorded outcome
    pub outcome: std::result::Result<QueryResult, StatementError>,
}

/// One child of a root span, decoded into every protocol view it supports
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    /// Span identifier of the child
    pub span_id: String,
    /// HTTP view, when the child carries a URL
    pub http: Option<RecordedHttp>,
    /// Named-call view, when the child carries a call name
    pub call: Option<RecordedNamedCall>,
    /// Statement view, when the child carries statement text
    pub statement: Option<RecordedStatement>,
}

impl RecordedCall {
    /// Decode a child span
    pub fn decode(span: &Span) -> Result<Self> {
        Ok(Self {
            span_id: span.span_id.clone(),
            http: decode_http(span)?,
            call: decode_call(span),
            statement: decode_statement(span)?,
        })
    }
}

/// A trace prepared for replay: the raw trace plus its decoded views
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedTrace {
    /// Raw trace as handed to the inbound replayer
    pub trace: Trace,
    /// Classified root
    pub root: RootRequest,
    /// Decoded children of the root, in recorded order
    pub calls: Vec<RecordedCall>,
}

impl IndexedTrace {
    /// Classify the root and decode its children.
    ///
    /// Children of an unclassified root are never replayed and stay undecoded.
    pub fn index(trace: Trace) -> Result<Self> {
        let root_span = trace.require_root()?;
        let root = RootRequest::classify(root_span);
        let calls = match root {
            RootRequest::Unclassified => Vec::new(),
            _ => root_span
                .children
                .iter()
                .map(RecordedCall::decode)
                .collect::<Result<Vec<_>>>()?,
        };

        Ok(Self { trace, root, calls })
    }

    /// Trace identifier
    pub fn trace_id(&self) -> &str {
        &self.trace.trace_id
    }

    /// Root span identifier
    pub fn root_span_id(&self) -> &str {
        // index() guarantees a root
        self.trace
            .root()
            .map(|root| root.span_id.as_str())
            .unwrap_or_default()
    }
}

fn non_empty<'a>(span: &'a Span, key: &str) -> Option<&'a str> {
    span.label(key).filter(|value| !value.is_empty())
}

fn invalid(span: &Span, key: &'static str, reason: impl ToString) -> ReplayError {
    ReplayError::InvalidLabel {
        span_id: span.span_id.clone(),
        key,
        reason: reason.to_string(),
    }
}

fn decode_http(span: &Span) -> Result<Option<RecordedHttp>> {
    let Some(url) = span.label(labels::HTTP_URL) else {
        return Ok(None);
    };

    let status = match span.label(labels::HTTP_STATUS_CODE) {
        Some(raw) => raw
            .trim()
            .parse::<u16>()
            .map_err(|e| invalid(span, labels::HTTP_STATUS_CODE, e))?,
        None => DEFAULT_STATUS,
    };

    let headers = match span.label(labels::HTTP_RESPONSE_HEADERS) {
        Some(raw) => serde_json::from_str::<BTreeMap<String, Value>>(raw)
            .map_err(|e| invalid(span, labels::HTTP_RESPONSE_HEADERS, e))?,
        None => BTreeMap::new(),
    };

    Ok(Some(RecordedHttp {
        url: url.to_string(),
        method: span.label(labels::HTTP_METHOD).map(str::to_string),
        request_body: span.label(labels::HTTP_REQUEST_BODY).map(str::to_string),
        response: HttpResponse {
            status,
            body: span
                .label(labels::HTTP_RESPONSE_BODY)
                .unwrap_or_default()
                .to_string(),
            headers,
        },
    }))
}

fn decode_call(span: &Span) -> Option<RecordedNamedCall> {
    span.label(labels::CALL_NAME).map(|name| RecordedNamedCall {
        name: name.to_string(),
        request_body: span.label(labels::CALL_REQUEST_BODY).map(str::to_string),
        response: CallResponse {
            body: span
                .label(labels::CALL_RESPONSE_BODY)
                .unwrap_or_default()
                .to_string(),
        },
    })
}

fn decode_statement(span: &Span) -> Result<Option<RecordedStatement>> {
    let Some(text) = non_empty(span, labels::DB_STATEMENT) else {
        return Ok(None);
    };

    let outcome = match non_empty(span, labels::DB_RESULTS) {
        Some(raw) => Ok(serde_json::from_str::<QueryResult>(raw)
            .map_err(|e| invalid(span, labels::DB_RESULTS, e))?),
        None => Err(StatementError::from_span(span)),
    };

    Ok(Some(RecordedStatement {
        text: text.to_string(),
        values: span.label(labels::DB_VALUES).map(str::to_string),
        outcome,
    }))
}
