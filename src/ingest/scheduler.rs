// src/ingest/scheduler.rs
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::ScheduleConfig;
use crate::error::PipelineError;
use crate::ingest::pipeline::Pipeline;
use crate::ingest::types::SourceFamily;
use crate::translate::orchestrator::TranslationOrchestrator;

/// "Run in progress" flag shared by the timer and the manual trigger.
#[derive(Debug, Default)]
pub struct RunGuard {
    running: AtomicBool,
}

/// Held for the duration of a run; releases the guard on drop (including
/// when the run future is cancelled).
#[derive(Debug)]
pub struct RunPermit<'a> {
    guard: &'a RunGuard,
}

impl RunGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self) -> Option<RunPermit<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunPermit { guard: self })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl Drop for RunPermit<'_> {
    fn drop(&mut self) {
        self.guard.running.store(false, Ordering::Release);
    }
}

/// Run `job` every `every`, first tick immediately. Each tick spawns the job
/// so a slow run never delays the timer; overlapping runs are rejected by the
/// job's own [`RunGuard`].
pub fn spawn_periodic<F, Fut>(job: &'static str, every: Duration, mut make: F) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let every = every.max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            counter!("scheduler_ticks_total", "job" => job).increment(1);
            tokio::spawn(make());
        }
    })
}

/// Owns the five independent timers: one per source family plus the
/// translation sweep and the retry sweep.
pub struct Scheduler {
    pipeline: Arc<Pipeline>,
    orchestrator: Arc<TranslationOrchestrator>,
    cfg: ScheduleConfig,
}

impl Scheduler {
    pub fn new(
        pipeline: Arc<Pipeline>,
        orchestrator: Arc<TranslationOrchestrator>,
        cfg: ScheduleConfig,
    ) -> Self {
        Self {
            pipeline,
            orchestrator,
            cfg,
        }
    }

    pub fn spawn_all(&self) -> Vec<JoinHandle<()>> {
        crate::ingest::ensure_metrics_described();
        let mut handles = Vec::with_capacity(SourceFamily::ALL.len() + 2);

        for family in SourceFamily::ALL {
            let pipeline = self.pipeline.clone();
            let every = Duration::from_secs(self.cfg.family_secs(family));
            handles.push(spawn_periodic(family.as_str(), every, move || {
                let pipeline = pipeline.clone();
                async move {
                    match pipeline.run_family(family).await {
                        Ok(_) => {}
                        Err(PipelineError::RunInProgress(_)) => {
                            counter!("scheduler_skipped_total", "job" => family.as_str())
                                .increment(1);
                            tracing::info!(%family, "previous run still in progress; tick skipped");
                        }
                        Err(e) => tracing::error!(%family, error = %e, "scheduled run aborted"),
                    }
                }
            }));
        }

        let orch = self.orchestrator.clone();
        handles.push(spawn_periodic(
            "translation",
            Duration::from_secs(self.cfg.translation_secs),
            move || {
                let orch = orch.clone();
                async move {
                    match orch.run_sweep().await {
                        Ok(_) => {}
                        Err(PipelineError::SweepInProgress) => {
                            counter!("scheduler_skipped_total", "job" => "translation").increment(1);
                        }
                        Err(e) => tracing::error!(error = %e, "translation sweep aborted"),
                    }
                }
            },
        ));

        let orch = self.orchestrator.clone();
        handles.push(spawn_periodic(
            "retry-sweep",
            Duration::from_secs(self.cfg.retry_sweep_secs),
            move || {
                let orch = orch.clone();
                async move {
                    if let Err(e) = orch.requeue_failed() {
                        tracing::error!(error = %e, "retry sweep failed");
                    }
                }
            },
        ));

        tracing::info!(
            news_secs = self.cfg.news_secs,
            known_events_secs = self.cfg.known_events_secs,
            api_events_secs = self.cfg.api_events_secs,
            translation_secs = self.cfg.translation_secs,
            retry_sweep_secs = self.cfg.retry_sweep_secs,
            "scheduler started"
        );
        handles
    }
}
