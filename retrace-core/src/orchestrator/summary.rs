//! Run reports

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::ReplayDomain;

/// Outcome of replaying one domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainReport {
    /// Domain replayed
    pub domain: ReplayDomain,
    /// Traces in the domain
    pub total: usize,
    /// First index attempted in this run
    pub start_index: usize,
    /// Traces attempted in this run
    pub attempted: usize,
    /// Attempted traces whose inbound replay failed
    pub failed: usize,
    /// Outbound calls answered from recorded spans
    pub recorded: usize,
    /// Outbound calls answered with a sentinel
    pub synthesized: usize,
    /// Traces left out of replay because a label failed to decode
    #[serde(default)]
    pub quarantined: usize,
}

impl DomainReport {
    pub(crate) fn new(domain: ReplayDomain, total: usize, start_index: usize) -> Self {
        Self {
            domain,
            total,
            start_index,
            attempted: 0,
            failed: 0,
            recorded: 0,
            synthesized: 0,
            quarantined: 0,
        }
    }

    /// Traces skipped because an earlier run already attempted them
    pub fn skipped(&self) -> usize {
        self.start_index.min(self.total)
    }
}

/// Outcome of a whole replay run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaySummary {
    /// Unique run identifier
    pub run_id: Uuid,
    /// When replay started
    pub started_at: DateTime<Utc>,
    /// When the last domain finished
    pub finished_at: DateTime<Utc>,
    /// Version under test, once resolved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Per-domain reports, in processing order
    pub domains: Vec<DomainReport>,
    /// Traces whose root fit no domain
    pub unclassified: usize,
    /// Number of matcher decisions
    pub decisions: usize,
    /// SHA-256 of the matcher decision sequence
    pub ledger_digest: String,
}

impl ReplaySummary {
    /// Report for `domain`, if it was replayed
    pub fn domain(&self, domain: ReplayDomain) -> Option<&DomainReport> {
        self.domains.iter().find(|report| report.domain == domain)
    }

    /// Total traces attempted across domains
    pub fn attempted(&self) -> usize {
        self.domains.iter().map(|report| report.attempted).sum()
    }

    /// Total inbound failures across domains
    pub fn failed(&self) -> usize {
        self.domains.iter().map(|report| report.failed).sum()
    }

    /// Total quarantined traces across domains
    pub fn quarantined(&self) -> usize {
        self.domains.iter().map(|report| report.quarantined).sum()
    }
}
