//! Captured span model and its typed views
//!
//! A trace document is loaded once and never mutated. [`IndexedTrace`]
//! pairs each raw trace with the decoded protocol views of its root's
//! children, which is all the matchers ever look at.

pub mod labels;
mod model;
mod view;

pub use model::{Span, Trace, TraceDocument};
pub use view::{
    CallResponse, DEFAULT_STATEMENT_ERROR, DEFAULT_STATUS, HttpResponse, IndexedTrace,
    QueryResult, RecordedCall, RecordedHttp, RecordedNamedCall, RecordedStatement, RootRequest,
    StatementError,
};
