//! Telemetry export seam
//!
//! Spans emitted by the service under replay are exported by whatever
//! pipeline the host process installs. The orchestrator only needs to flush
//! it between traces and shut it down at the end of a run.

use async_trait::async_trait;

use crate::error::Result;

/// Handle on the span export pipeline
#[async_trait]
pub trait TelemetryExporter: Send + Sync {
    /// Push out everything buffered so far
    async fn flush(&self) -> Result<()>;

    /// Flush and stop the pipeline
    async fn shutdown(&self) -> Result<()>;
}

/// Exporter for processes without an export pipeline
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopExporter;

#[async_trait]
impl TelemetryExporter for NoopExporter {
    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        tracing::debug!("Telemetry exporter shut down");
        Ok(())
    }
}
