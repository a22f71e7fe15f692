//! Replay domains
//!
//! Traces are partitioned by what their root represents. Each domain is
//! replayed by its own inbound mechanism, one domain after another.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ReplayError, Result};
use crate::span::{IndexedTrace, RootRequest, TraceDocument};

/// A partition of traces replayed through one inbound mechanism
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayDomain {
    /// Request/response traffic keyed by target path
    Http,
    /// Named procedure calls
    Call,
}

impl ReplayDomain {
    /// Processing order of domains within a run
    pub const ORDER: [ReplayDomain; 2] = [ReplayDomain::Http, ReplayDomain::Call];

    /// Domain a classified root belongs to, if any
    pub fn of(root: &RootRequest) -> Option<Self> {
        match root {
            RootRequest::Http { .. } => Some(ReplayDomain::Http),
            RootRequest::Call { .. } => Some(ReplayDomain::Call),
            RootRequest::Unclassified => None,
        }
    }

    /// Stable short name, used in logs and checkpoint file names
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplayDomain::Http => "http",
            ReplayDomain::Call => "call",
        }
    }
}

impl fmt::Display for ReplayDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A trace document split into per-domain, ordered trace lists
#[derive(Debug, Clone, Default)]
pub struct ReplayPlan {
    http: Vec<IndexedTrace>,
    call: Vec<IndexedTrace>,
    unclassified: usize,
    quarantined: Vec<(ReplayDomain, String)>,
}

impl ReplayPlan {
    /// Index every trace and partition by domain, preserving document order.
    ///
    /// A classified trace with an undecodable child label is logged and left
    /// out of the plan; the rest of the document still replays.
    ///
    /// # Errors
    ///
    /// Fails if any trace lacks a root.
    pub fn partition(document: TraceDocument) -> Result<Self> {
        let mut plan = ReplayPlan::default();

        for trace in document.traces {
            let root = RootRequest::classify(trace.require_root()?);
            let Some(domain) = ReplayDomain::of(&root) else {
                plan.unclassified += 1;
                continue;
            };

            let trace_id = trace.trace_id.clone();
            match IndexedTrace::index(trace) {
                Ok(indexed) => match domain {
                    ReplayDomain::Http => plan.http.push(indexed),
                    ReplayDomain::Call => plan.call.push(indexed),
                },
                Err(ReplayError::InvalidLabel {
                    span_id,
                    key,
                    reason,
                }) => {
                    tracing::error!(
                        domain = %domain,
                        trace_id = %trace_id,
                        span_id = %span_id,
                        key,
                        reason = %reason,
                        "Undecodable label, trace quarantined"
                    );
                    plan.quarantined.push((domain, trace_id));
                }
                Err(e) => return Err(e),
            }
        }

        tracing::info!(
            http = plan.http.len(),
            call = plan.call.len(),
            unclassified = plan.unclassified,
            quarantined = plan.quarantined.len(),
            "Partitioned trace document"
        );

        Ok(plan)
    }

    /// Traces of one domain, in document order
    pub fn traces(&self, domain: ReplayDomain) -> &[IndexedTrace] {
        match domain {
            ReplayDomain::Http => &self.http,
            ReplayDomain::Call => &self.call,
        }
    }

    /// Number of traces whose root fits no domain
    pub fn unclassified(&self) -> usize {
        self.unclassified
    }

    /// Number of `domain` traces left out because a label failed to decode
    pub fn quarantined(&self, domain: ReplayDomain) -> usize {
        self.quarantined.iter().filter(|(d, _)| *d == domain).count()
    }

    /// Identifiers of quarantined traces, in document order
    pub fn quarantined_ids(&self) -> impl Iterator<Item = &str> {
        self.quarantined.iter().map(|(_, id)| id.as_str())
    }

    /// Total number of replayable traces
    pub fn replayable(&self) -> usize {
        self.http.len() + self.call.len()
    }
}
