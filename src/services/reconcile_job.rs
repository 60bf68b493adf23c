//! Periodic reconciliation sweep.
//!
//! Reconciliation normally runs lazily when an episode is read. This job
//! additionally sweeps every episode on an interval so stale steps are
//! corrected even when nobody is looking.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

use crate::engine::WorkflowEngine;

/// Totals from one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub episodes: usize,
    pub corrected: usize,
    pub failures: usize,
}

pub struct ReconcileJob {
    engine: Arc<WorkflowEngine>,
    interval: Duration,
    shutdown_rx: Option<mpsc::Receiver<()>>,
}

impl ReconcileJob {
    pub fn new(engine: Arc<WorkflowEngine>, interval: Duration) -> Self {
        Self {
            engine,
            interval,
            shutdown_rx: None,
        }
    }

    /// Job configured from `reconcile.interval_secs`; `None` when disabled
    pub fn from_interval_secs(engine: Arc<WorkflowEngine>, secs: u64) -> Option<Self> {
        (secs > 0).then(|| Self::new(engine, Duration::from_secs(secs)))
    }

    /// Set shutdown receiver
    pub fn with_shutdown(mut self, rx: mpsc::Receiver<()>) -> Self {
        self.shutdown_rx = Some(rx);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run the sweep loop until the shutdown channel fires or closes
    #[instrument(skip(self))]
    pub async fn run(&mut self) -> Result<()> {
        info!(interval = ?self.interval, "Reconcile job started");

        let mut interval = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.sweep().await {
                        Ok(summary) if summary.corrected > 0 || summary.failures > 0 => info!(
                            episodes = summary.episodes,
                            corrected = summary.corrected,
                            failures = summary.failures,
                            "Reconcile sweep finished"
                        ),
                        Ok(summary) => debug!(episodes = summary.episodes, "Reconcile sweep found nothing"),
                        Err(e) => error!(error = %e, "Reconcile sweep failed"),
                    }
                }
                _ = async {
                    if let Some(ref mut rx) = self.shutdown_rx {
                        rx.recv().await
                    } else {
                        std::future::pending::<Option<()>>().await
                    }
                } => {
                    info!("Reconcile job shutting down");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Reconcile every known episode once
    pub async fn sweep(&self) -> Result<SweepSummary> {
        let engine = Arc::clone(&self.engine);
        let summary = tokio::task::spawn_blocking(move || -> Result<SweepSummary> {
            let mut summary = SweepSummary::default();
            for episode in engine.episode_ids()? {
                summary.episodes += 1;
                match engine.reconcile(episode) {
                    Ok(report) => {
                        summary.corrected += report.corrected.len();
                        summary.failures += report.failures.len();
                    }
                    Err(e) => {
                        summary.failures += 1;
                        warn!(episode = %episode, error = %e, "Could not reconcile episode");
                    }
                }
            }
            Ok(summary)
        })
        .await??;
        Ok(summary)
    }
}
