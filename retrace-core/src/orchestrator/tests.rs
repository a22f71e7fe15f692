//! Orchestrator and runner behaviour

use super::*;
use crate::checkpoint::{FileCheckpoint, MemoryCheckpoint};
use crate::config::{ConfigBuilder, StorageConfig, TimingConfig};
use crate::error::InboundError;
use crate::matching::{NamedCall, OutboundResolver};
use crate::notify::{CompletionNotifier, ReplayCompletion};
use crate::source::{TraceDocumentLoader, TraceSource};
use crate::span::{Span, Trace, TraceDocument, labels};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

#[derive(Default)]
struct ScriptedReplayer {
    fail_on: HashSet<String>,
    cancel_after: Option<(String, CancellationToken)>,
    seen: Mutex<Vec<String>>,
}

impl ScriptedReplayer {
    fn failing(ids: &[&str]) -> Self {
        Self {
            fail_on: ids.iter().map(|id| id.to_string()).collect(),
            ..Default::default()
        }
    }

    fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl InboundReplayer for ScriptedReplayer {
    async fn replay(
        &self,
        trace: &IndexedTrace,
        resolver: &dyn OutboundResolver,
    ) -> std::result::Result<(), InboundError> {
        let id = trace.trace_id().to_string();
        self.seen.lock().unwrap().push(id.clone());

        resolver.resolve_call(&NamedCall::new("stock.Get"));
        resolver.resolve_call(&NamedCall::new("billing.Charge"));

        if let Some((after, token)) = &self.cancel_after {
            if *after == id {
                token.cancel();
            }
        }
        if self.fail_on.contains(&id) {
            return Err(anyhow::anyhow!("connection refused").into());
        }
        Ok(())
    }
}

#[derive(Default)]
struct CountingExporter {
    flushes: AtomicUsize,
    shutdowns: AtomicUsize,
    cancel_on_shutdown: Option<CancellationToken>,
}

#[async_trait]
impl TelemetryExporter for CountingExporter {
    async fn flush(&self) -> Result<()> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        if let Some(token) = &self.cancel_on_shutdown {
            token.cancel();
        }
        Ok(())
    }
}

struct FixedSource(String);

#[async_trait]
impl TraceSource for FixedSource {
    async fn fetch_latest(&self, _prefix: &str) -> Result<String> {
        Ok(self.0.clone())
    }
}

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<ReplayCompletion>>,
    reject: bool,
}

#[async_trait]
impl CompletionNotifier for RecordingNotifier {
    async fn notify(&self, completion: &ReplayCompletion) -> Result<()> {
        if self.reject {
            return Err(ReplayError::Notification {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        self.sent.lock().unwrap().push(completion.clone());
        Ok(())
    }
}

fn http_trace(id: &str) -> Trace {
    Trace {
        trace_id: id.to_string(),
        spans: vec![Span::new(format!("{}-root", id))
            .with_label(labels::HTTP_TARGET, "/orders")
            .with_label(labels::HTTP_METHOD, "POST")
            .with_child(
                Span::new(format!("{}-stock", id))
                    .with_label(labels::CALL_NAME, "stock.Get")
                    .with_label(labels::CALL_RESPONSE_BODY, "{}"),
            )],
    }
}

fn call_trace(id: &str) -> Trace {
    Trace {
        trace_id: id.to_string(),
        spans: vec![
            Span::new(format!("{}-root", id)).with_label(labels::CALL_NAME, "orders.Create"),
        ],
    }
}

fn document(http: usize, call: usize) -> TraceDocument {
    let mut traces: Vec<Trace> = (0..http).map(|i| http_trace(&format!("http-{}", i))).collect();
    traces.extend((0..call).map(|i| call_trace(&format!("call-{}", i))));
    TraceDocument { traces }
}

fn plan(http: usize, call: usize) -> ReplayPlan {
    ReplayPlan::partition(document(http, call)).unwrap()
}

fn orchestrator(
    replayer: Arc<ScriptedReplayer>,
    http: Arc<MemoryCheckpoint>,
    call: Arc<MemoryCheckpoint>,
    exporter: Arc<CountingExporter>,
) -> ReplayOrchestrator {
    ReplayOrchestrator::new(exporter)
        .with_domain(ReplayDomain::Call, replayer.clone(), call)
        .with_domain(ReplayDomain::Http, replayer, http)
}

#[tokio::test]
async fn failing_trace_does_not_abort_domain() {
    let replayer = Arc::new(ScriptedReplayer::failing(&["http-3"]));
    let http = Arc::new(MemoryCheckpoint::new());
    let exporter = Arc::new(CountingExporter::default());
    let orchestrator = orchestrator(
        replayer.clone(),
        http.clone(),
        Arc::new(MemoryCheckpoint::new()),
        exporter.clone(),
    );

    let summary = orchestrator.replay(&plan(10, 0)).await.unwrap();

    let report = summary.domain(ReplayDomain::Http).unwrap();
    assert_eq!(report.attempted, 10);
    assert_eq!(report.failed, 1);
    assert_eq!(replayer.seen().len(), 10);
    assert_eq!(http.history(), (0..10).collect::<Vec<_>>());
    assert_eq!(exporter.flushes.load(Ordering::SeqCst), 10);
}

#[tokio::test]
async fn domains_run_http_then_call() {
    let replayer = Arc::new(ScriptedReplayer::default());
    let orchestrator = orchestrator(
        replayer.clone(),
        Arc::new(MemoryCheckpoint::new()),
        Arc::new(MemoryCheckpoint::new()),
        Arc::new(CountingExporter::default()),
    );

    let summary = orchestrator.replay(&plan(2, 2)).await.unwrap();

    assert_eq!(replayer.seen(), vec!["http-0", "http-1", "call-0", "call-1"]);
    let order: Vec<_> = summary.domains.iter().map(|r| r.domain).collect();
    assert_eq!(order, vec![ReplayDomain::Http, ReplayDomain::Call]);
}

#[tokio::test]
async fn resumes_after_checkpointed_index() {
    let replayer = Arc::new(ScriptedReplayer::default());
    let http = Arc::new(MemoryCheckpoint::at(4));
    let orchestrator = orchestrator(
        replayer.clone(),
        http.clone(),
        Arc::new(MemoryCheckpoint::new()),
        Arc::new(CountingExporter::default()),
    );
    assert!(orchestrator.is_resuming().unwrap());

    let summary = orchestrator.replay(&plan(10, 0)).await.unwrap();

    let report = summary.domain(ReplayDomain::Http).unwrap();
    assert_eq!(report.start_index, 5);
    assert_eq!(report.skipped(), 5);
    assert_eq!(report.attempted, 5);
    assert_eq!(replayer.seen().first().map(String::as_str), Some("http-5"));
    assert_eq!(http.history(), vec![5, 6, 7, 8, 9]);
}

#[tokio::test]
async fn checkpoint_on_last_index_replays_nothing() {
    let replayer = Arc::new(ScriptedReplayer::default());
    let orchestrator = orchestrator(
        replayer.clone(),
        Arc::new(MemoryCheckpoint::at(2)),
        Arc::new(MemoryCheckpoint::new()),
        Arc::new(CountingExporter::default()),
    );

    let summary = orchestrator.replay(&plan(3, 0)).await.unwrap();

    assert_eq!(summary.attempted(), 0);
    assert!(replayer.seen().is_empty());
}

#[tokio::test]
async fn call_domain_is_checkpointed_too() {
    let replayer = Arc::new(ScriptedReplayer::default());
    let call = Arc::new(MemoryCheckpoint::at(0));
    let orchestrator = orchestrator(
        replayer.clone(),
        Arc::new(MemoryCheckpoint::new()),
        call.clone(),
        Arc::new(CountingExporter::default()),
    );

    orchestrator.replay(&plan(1, 3)).await.unwrap();

    assert_eq!(replayer.seen(), vec!["http-0", "call-1", "call-2"]);
    assert_eq!(call.history(), vec![1, 2]);
}

#[tokio::test]
async fn reports_recorded_and_synthesized_counts() {
    let orchestrator = orchestrator(
        Arc::new(ScriptedReplayer::default()),
        Arc::new(MemoryCheckpoint::new()),
        Arc::new(MemoryCheckpoint::new()),
        Arc::new(CountingExporter::default()),
    );

    let summary = orchestrator.replay(&plan(3, 2)).await.unwrap();

    // Each http trace records stock.Get only; call traces record nothing
    let http = summary.domain(ReplayDomain::Http).unwrap();
    assert_eq!((http.recorded, http.synthesized), (3, 3));
    let call = summary.domain(ReplayDomain::Call).unwrap();
    assert_eq!((call.recorded, call.synthesized), (0, 4));
    assert_eq!(summary.decisions, 10);
}

#[tokio::test]
async fn identical_runs_produce_identical_ledgers() {
    let run = || async {
        orchestrator(
            Arc::new(ScriptedReplayer::failing(&["http-1"])),
            Arc::new(MemoryCheckpoint::new()),
            Arc::new(MemoryCheckpoint::new()),
            Arc::new(CountingExporter::default()),
        )
        .replay(&plan(4, 2))
        .await
        .unwrap()
    };

    let first = run().await;
    let second = run().await;
    assert_ne!(first.run_id, second.run_id);
    assert_eq!(first.ledger_digest, second.ledger_digest);
}

#[tokio::test]
async fn cancellation_stops_at_pause_and_keeps_checkpoint() {
    let token = CancellationToken::new();
    let replayer = Arc::new(ScriptedReplayer {
        cancel_after: Some(("http-2".to_string(), token.clone())),
        ..Default::default()
    });
    let http = Arc::new(MemoryCheckpoint::new());
    let orchestrator = orchestrator(
        replayer.clone(),
        http.clone(),
        Arc::new(MemoryCheckpoint::new()),
        Arc::new(CountingExporter::default()),
    )
    .with_pause(Duration::from_secs(60))
    .with_cancellation(token);

    let result = orchestrator.replay(&plan(5, 0)).await;

    assert!(matches!(result, Err(ReplayError::Cancelled)));
    assert_eq!(replayer.seen(), vec!["http-0", "http-1", "http-2"]);
    assert_eq!(http.current(), Some(2));
}

#[tokio::test(start_paused = true)]
async fn pauses_between_traces() {
    let orchestrator = orchestrator(
        Arc::new(ScriptedReplayer::default()),
        Arc::new(MemoryCheckpoint::new()),
        Arc::new(MemoryCheckpoint::new()),
        Arc::new(CountingExporter::default()),
    )
    .with_pause(Duration::from_millis(10));

    let started = tokio::time::Instant::now();
    orchestrator.replay(&plan(3, 0)).await.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(30));
}

struct RunnerFixture {
    dir: TempDir,
    replayer: Arc<ScriptedReplayer>,
    exporter: Arc<CountingExporter>,
    cancel: CancellationToken,
}

impl RunnerFixture {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            replayer: Arc::new(ScriptedReplayer::default()),
            exporter: Arc::new(CountingExporter::default()),
            cancel: CancellationToken::new(),
        }
    }

    /// Fixture whose token fires once telemetry shuts down, before the
    /// completion grace period
    fn cancelled_on_shutdown() -> Self {
        let cancel = CancellationToken::new();
        Self {
            exporter: Arc::new(CountingExporter {
                cancel_on_shutdown: Some(cancel.clone()),
                ..Default::default()
            }),
            cancel,
            ..Self::new()
        }
    }

    fn cache_path(&self) -> std::path::PathBuf {
        self.dir.path().join("replay.json")
    }

    fn checkpoint(&self, domain: ReplayDomain) -> FileCheckpoint {
        FileCheckpoint::for_domain(self.dir.path(), domain)
    }

    fn runner(
        &self,
        fetched: TraceDocument,
        notifier: RecordingNotifier,
    ) -> (ReplayRunner, Arc<RecordingNotifier>) {
        let config = ConfigBuilder::new()
            .identity("replayer@acme", "orders")
            .version("v1.4.0")
            .timing(TimingConfig::immediate())
            .storage(StorageConfig {
                cache_path: self.cache_path(),
                checkpoint_dir: self.dir.path().to_path_buf(),
            })
            .build();

        let source = Arc::new(FixedSource(serde_json::to_string(&fetched).unwrap()));
        let loader =
            TraceDocumentLoader::new(source, config.identity.object_prefix(), self.cache_path());

        let mut orchestrator =
            ReplayOrchestrator::new(self.exporter.clone()).with_cancellation(self.cancel.clone());
        for domain in ReplayDomain::ORDER {
            orchestrator = orchestrator.with_domain(
                domain,
                self.replayer.clone(),
                Arc::new(self.checkpoint(domain)),
            );
        }

        let notifier = Arc::new(notifier);
        let runner = ReplayRunner::new(
            config,
            loader,
            orchestrator,
            Box::new(SharedNotifier(notifier.clone())),
        );
        (runner, notifier)
    }
}

struct SharedNotifier(Arc<RecordingNotifier>);

#[async_trait]
impl CompletionNotifier for SharedNotifier {
    async fn notify(&self, completion: &ReplayCompletion) -> Result<()> {
        self.0.notify(completion).await
    }
}

#[tokio::test]
async fn full_run_notifies_and_cleans_up() {
    let fixture = RunnerFixture::new();
    let (runner, notifier) = fixture.runner(document(3, 2), RecordingNotifier::default());

    let summary = runner.run().await.unwrap();

    assert_eq!(summary.attempted(), 5);
    assert_eq!(summary.version.as_deref(), Some("v1.4.0"));
    assert_eq!(fixture.exporter.shutdowns.load(Ordering::SeqCst), 1);

    let sent = notifier.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].service, "orders");
    assert_eq!(sent[0].version, "v1.4.0");

    assert!(!fixture.checkpoint(ReplayDomain::Http).path().exists());
    assert!(!fixture.checkpoint(ReplayDomain::Call).path().exists());
    assert!(!fixture.cache_path().exists());
}

#[tokio::test]
async fn rejected_notification_keeps_checkpoints() {
    let fixture = RunnerFixture::new();
    let (runner, _) = fixture.runner(
        document(2, 1),
        RecordingNotifier {
            reject: true,
            ..Default::default()
        },
    );

    let result = runner.run().await;

    assert!(matches!(result, Err(ReplayError::Notification { status: 503, .. })));
    assert_eq!(fixture.checkpoint(ReplayDomain::Http).load().unwrap(), Some(1));
    assert_eq!(fixture.checkpoint(ReplayDomain::Call).load().unwrap(), Some(0));
    assert!(fixture.cache_path().exists());
}

#[tokio::test]
async fn cancellation_during_completion_grace_skips_notification() {
    let fixture = RunnerFixture::cancelled_on_shutdown();
    let (runner, notifier) = fixture.runner(document(2, 0), RecordingNotifier::default());

    let result = runner.run().await;

    assert!(matches!(result, Err(ReplayError::Cancelled)));
    assert_eq!(fixture.exporter.shutdowns.load(Ordering::SeqCst), 1);
    assert!(notifier.sent.lock().unwrap().is_empty());
    assert_eq!(fixture.checkpoint(ReplayDomain::Http).load().unwrap(), Some(1));
    assert!(fixture.cache_path().exists());
}

#[tokio::test]
async fn resumed_run_replays_cached_document() {
    let fixture = RunnerFixture::new();
    let mut cached = document(0, 0);
    cached.traces = vec![http_trace("old-0"), http_trace("old-1"), http_trace("old-2")];
    std::fs::write(fixture.cache_path(), serde_json::to_string(&cached).unwrap()).unwrap();
    fixture.checkpoint(ReplayDomain::Http).save(1).unwrap();

    let (runner, _) = fixture.runner(document(3, 0), RecordingNotifier::default());
    runner.run().await.unwrap();

    assert_eq!(fixture.replayer.seen(), vec!["old-2"]);
}
