//! # Retrace - replay matching for record/replay regression testing
//!
//! Production traffic of an instrumented service is captured as trace trees:
//! one tree per inbound request, with a child span for every outbound call
//! that request made. Retrace replays those inbound requests against a new
//! build of the service and answers each intercepted outbound call from the
//! recorded children, so two versions can be compared without live
//! dependencies.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use retrace_core::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = ReplayConfig::load()?;
//!     let runner = ReplayRunner::from_config(
//!         config,
//!         Arc::new(DryRunReplayer),
//!         Arc::new(NoopExporter),
//!     )?;
//!
//!     let summary = runner.run().await?;
//!     println!("replayed {} traces", summary.attempted());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **Span model**: the captured document, plus typed views decoded once
//!   at load
//! - **Domains**: traces partitioned by root kind, replayed one domain after
//!   another
//! - **Matchers**: pick the recorded child answering a live outbound call,
//!   or synthesize a distinguishable miss
//! - **Orchestrator**: checkpointed, sequential, failure-isolating replay

pub mod checkpoint;
pub mod config;
pub mod domain;
pub mod error;
pub mod identity;
pub mod matching;
pub mod notify;
pub mod orchestrator;
pub mod replayer;
pub mod source;
pub mod span;
pub mod telemetry;

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::checkpoint::{CheckpointStore, FileCheckpoint, MemoryCheckpoint, resume_index};
    pub use crate::config::{
        ConfigBuilder, IdentityConfig, NotifyConfig, ReplayConfig, SourceConfig, StorageConfig,
        TimingConfig,
    };
    pub use crate::domain::{ReplayDomain, ReplayPlan};
    pub use crate::error::{InboundError, ReplayError, Result};
    pub use crate::identity::{RunMetadata, resolve_version};
    pub use crate::matching::{
        HttpCall, MatchLedger, NO_MATCH_SPAN_ID, NamedCall, OutboundResolver, ReplaySession,
        Resolved, ResponseOrigin, SpanFocus, StatementCall, StatementOutcome,
    };
    pub use crate::notify::{CompletionNotifier, LogNotifier, PubSubNotifier, ReplayCompletion};
    pub use crate::orchestrator::{DomainReport, ReplayOrchestrator, ReplayRunner, ReplaySummary};
    pub use crate::replayer::{DryRunReplayer, InboundReplayer};
    pub use crate::source::{ObjectStoreSource, TraceDocumentLoader, TraceSource};
    pub use crate::span::{
        CallResponse, HttpResponse, IndexedTrace, QueryResult, RootRequest, Span,
        StatementError, Trace, TraceDocument,
    };
    pub use crate::telemetry::{NoopExporter, TelemetryExporter};
}
