//! Sequential, resumable replay of a partitioned trace document
//!
//! Each domain is replayed front to back by its own inbound replayer.
//! Before trace `i` is attempted, `i` is written to the domain's checkpoint;
//! a restarted run resumes at `i + 1`. A failing trace is logged and
//! skipped. Between traces the telemetry pipeline is flushed and the loop
//! pauses, which is also where cancellation is observed.
//!
//! Traces are never replayed concurrently: the resolver handed to a
//! replayer is focused on exactly one trace.

mod runner;
mod summary;

pub use runner::ReplayRunner;
pub use summary::{DomainReport, ReplaySummary};

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::checkpoint::{CheckpointStore, resume_index};
use crate::domain::{ReplayDomain, ReplayPlan};
use crate::error::{ReplayError, Result};
use crate::matching::ReplaySession;
use crate::replayer::InboundReplayer;
use crate::span::IndexedTrace;
use crate::telemetry::TelemetryExporter;

/// Replayer and checkpoint bound to one domain
struct DomainLane {
    domain: ReplayDomain,
    replayer: Arc<dyn InboundReplayer>,
    checkpoint: Arc<dyn CheckpointStore>,
}

/// Drives replay of every domain in a [`ReplayPlan`]
pub struct ReplayOrchestrator {
    lanes: Vec<DomainLane>,
    exporter: Arc<dyn TelemetryExporter>,
    pause: Duration,
    cancel: CancellationToken,
}

impl std::fmt::Debug for ReplayOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplayOrchestrator")
            .field(
                "domains",
                &self.lanes.iter().map(|lane| lane.domain).collect::<Vec<_>>(),
            )
            .field("pause", &self.pause)
            .finish()
    }
}

impl ReplayOrchestrator {
    /// Orchestrator flushing through `exporter`, with no domains bound yet
    pub fn new(exporter: Arc<dyn TelemetryExporter>) -> Self {
        Self {
            lanes: Vec::new(),
            exporter,
            pause: Duration::ZERO,
            cancel: CancellationToken::new(),
        }
    }

    /// Bind `domain` to a replayer and checkpoint.
    ///
    /// Binding a domain twice replaces the earlier binding.
    pub fn with_domain(
        mut self,
        domain: ReplayDomain,
        replayer: Arc<dyn InboundReplayer>,
        checkpoint: Arc<dyn CheckpointStore>,
    ) -> Self {
        self.lanes.retain(|lane| lane.domain != domain);
        self.lanes.push(DomainLane {
            domain,
            replayer,
            checkpoint,
        });
        self.lanes.sort_by_key(|lane| lane.domain);
        self
    }

    /// Pause between traces
    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    /// Token observed between traces
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Cancellation token of this orchestrator
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Telemetry exporter of this orchestrator
    pub fn exporter(&self) -> &Arc<dyn TelemetryExporter> {
        &self.exporter
    }

    /// Whether any bound domain has a checkpoint from an earlier run
    pub fn is_resuming(&self) -> Result<bool> {
        for lane in &self.lanes {
            if lane.checkpoint.load()?.is_some() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Replay every bound domain of `plan`, in domain order.
    ///
    /// # Errors
    ///
    /// Checkpoint persistence failures and cancellation abort the run.
    /// Inbound replay failures do not.
    pub async fn replay(&self, plan: &ReplayPlan) -> Result<ReplaySummary> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let session = ReplaySession::new();
        let mut domains = Vec::with_capacity(self.lanes.len());

        for domain in ReplayDomain::ORDER {
            let traces = plan.traces(domain);
            match self.lanes.iter().find(|lane| lane.domain == domain) {
                Some(lane) => {
                    let mut report = self.replay_domain(lane, traces, &session).await?;
                    report.quarantined = plan.quarantined(domain);
                    domains.push(report);
                }
                None if !traces.is_empty() => {
                    tracing::warn!(
                        domain = %domain,
                        traces = traces.len(),
                        "No replayer bound for domain, skipping"
                    );
                }
                None => {}
            }
        }

        let ledger = session.into_ledger();
        let summary = ReplaySummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            version: None,
            domains,
            unclassified: plan.unclassified(),
            decisions: ledger.len(),
            ledger_digest: ledger.digest(),
        };

        tracing::info!(
            run_id = %summary.run_id,
            attempted = summary.attempted(),
            failed = summary.failed(),
            quarantined = summary.quarantined(),
            decisions = summary.decisions,
            "Replay finished"
        );

        Ok(summary)
    }

    async fn replay_domain(
        &self,
        lane: &DomainLane,
        traces: &[IndexedTrace],
        session: &ReplaySession,
    ) -> Result<DomainReport> {
        let start = resume_index(lane.checkpoint.load()?);
        let mut report = DomainReport::new(lane.domain, traces.len(), start);

        if start > 0 {
            tracing::info!(
                domain = %lane.domain,
                start,
                total = traces.len(),
                "Resuming domain from checkpoint"
            );
        } else {
            tracing::info!(domain = %lane.domain, total = traces.len(), "Replaying domain");
        }

        let (recorded_before, synthesized_before) = session.tally();

        for (index, trace) in traces.iter().enumerate().skip(start) {
            if self.cancel.is_cancelled() {
                return Err(ReplayError::Cancelled);
            }

            lane.checkpoint.save(index)?;

            let focus = session.focus(trace);
            let span = tracing::info_span!(
                "replay_trace",
                domain = %lane.domain,
                index,
                trace_id = %trace.trace_id()
            );

            if let Err(e) = lane.replayer.replay(trace, &focus).instrument(span).await {
                tracing::error!(
                    domain = %lane.domain,
                    index,
                    trace_id = %trace.trace_id(),
                    root = %trace.root.describe(),
                    error = %e,
                    "Inbound replay failed, continuing with next trace"
                );
                report.failed += 1;
            }
            report.attempted += 1;

            if let Err(e) = self.exporter.flush().await {
                tracing::warn!(trace_id = %trace.trace_id(), error = %e, "Telemetry flush failed");
            }

            self.pause(self.pause).await?;
        }

        let (recorded_after, synthesized_after) = session.tally();
        report.recorded = recorded_after - recorded_before;
        report.synthesized = synthesized_after - synthesized_before;

        tracing::info!(
            domain = %lane.domain,
            attempted = report.attempted,
            failed = report.failed,
            synthesized = report.synthesized,
            "Domain done"
        );

        Ok(report)
    }

    /// Sleep for `duration`, returning early with [`ReplayError::Cancelled`]
    /// if the token fires
    pub async fn pause(&self, duration: Duration) -> Result<()> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ReplayError::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }

    /// Flush and shut down the telemetry pipeline
    pub async fn finish(&self) -> Result<()> {
        self.exporter.flush().await?;
        self.exporter.shutdown().await
    }

    /// Delete every bound domain's checkpoint
    pub fn clear_checkpoints(&self) -> Result<()> {
        for lane in &self.lanes {
            lane.checkpoint.clear()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
