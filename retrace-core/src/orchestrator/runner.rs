//! End-to-end run: startup, replay, shutdown, notification, cleanup

use std::sync::Arc;

use super::{ReplayOrchestrator, ReplaySummary};
use crate::checkpoint::FileCheckpoint;
use crate::config::ReplayConfig;
use crate::domain::{ReplayDomain, ReplayPlan};
use crate::error::Result;
use crate::identity::resolve_version;
use crate::notify::{CompletionNotifier, ReplayCompletion, notifier_from_config};
use crate::replayer::InboundReplayer;
use crate::source::{ObjectStoreSource, TraceDocumentLoader, TraceSource};
use crate::telemetry::TelemetryExporter;

/// Runs one complete replay of the configured service
pub struct ReplayRunner {
    config: ReplayConfig,
    loader: TraceDocumentLoader,
    orchestrator: ReplayOrchestrator,
    notifier: Box<dyn CompletionNotifier>,
}

impl ReplayRunner {
    /// Assemble a runner from parts
    pub fn new(
        config: ReplayConfig,
        loader: TraceDocumentLoader,
        orchestrator: ReplayOrchestrator,
        notifier: Box<dyn CompletionNotifier>,
    ) -> Self {
        Self {
            config,
            loader,
            orchestrator,
            notifier,
        }
    }

    /// Runner wired from configuration: object-store source, file
    /// checkpoints for both domains, and the configured notifier.
    ///
    /// `replayer` serves both domains.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built.
    pub fn from_config(
        config: ReplayConfig,
        replayer: Arc<dyn InboundReplayer>,
        exporter: Arc<dyn TelemetryExporter>,
    ) -> Result<Self> {
        let source: Arc<dyn TraceSource> = Arc::new(ObjectStoreSource::new(&config.source)?);
        let loader = TraceDocumentLoader::new(
            source,
            config.identity.object_prefix(),
            config.storage.cache_path.clone(),
        );

        let mut orchestrator =
            ReplayOrchestrator::new(exporter).with_pause(config.timing.inter_trace_pause());
        for domain in ReplayDomain::ORDER {
            orchestrator = orchestrator.with_domain(
                domain,
                replayer.clone(),
                Arc::new(FileCheckpoint::for_domain(&config.storage.checkpoint_dir, domain)),
            );
        }

        let notifier = notifier_from_config(&config.notify)?;
        Ok(Self::new(config, loader, orchestrator, notifier))
    }

    /// Orchestrator driving the domains
    pub fn orchestrator(&self) -> &ReplayOrchestrator {
        &self.orchestrator
    }

    /// Run to completion.
    ///
    /// Waits out the startup delay, resolves the version under test, loads
    /// and partitions the document, replays every domain, shuts telemetry
    /// down, waits the completion grace period, publishes the completion and
    /// finally removes checkpoints and the cached document.
    ///
    /// # Errors
    ///
    /// Any error before the completion is acknowledged leaves checkpoints in
    /// place, so the next run resumes.
    pub async fn run(&self) -> Result<ReplaySummary> {
        let identity = &self.config.identity;
        tracing::info!(
            service = %identity.service,
            environment = %identity.environment,
            delay_secs = self.config.timing.startup_delay_secs,
            "Waiting for service startup"
        );
        self.orchestrator
            .pause(self.config.timing.startup_delay())
            .await?;

        let version = resolve_version(identity).await?;
        tracing::info!(version = %version, "Replaying against version");

        let resuming = self.orchestrator.is_resuming()?;
        let document = self.loader.load(resuming).await?;
        let plan = ReplayPlan::partition(document)?;

        let mut summary = self.orchestrator.replay(&plan).await?;
        summary.version = Some(version.clone());

        self.orchestrator.finish().await?;
        self.orchestrator
            .pause(self.config.timing.completion_grace)
            .await?;

        let completion = ReplayCompletion::new(identity, &version)?;
        self.notifier.notify(&completion).await?;

        self.orchestrator.clear_checkpoints()?;
        self.loader.clear_cache().await?;
        tracing::info!(run_id = %summary.run_id, "Checkpoints and cache cleared");

        Ok(summary)
    }
}
