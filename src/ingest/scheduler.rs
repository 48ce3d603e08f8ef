// src/ingest/scheduler.rs
//! Owned periodic trigger for background jobs.
//!
//! A [`Scheduler`] fires its job once at start (unless disabled) and then at
//! every [`Cadence`] boundary. Each tick runs in its own task, so a job that
//! fails or panics never stops the loop. A boundary that arrives while the
//! previous tick is still running is skipped.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use cron::Schedule;
use metrics::counter;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Source of wall-clock time for boundary computation.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Local>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Wall time that moves with tokio's clock, so `tokio::time::pause` / `advance`
/// drive it in tests.
pub struct TokioClock {
    wall_origin: DateTime<Local>,
    origin: tokio::time::Instant,
}

impl TokioClock {
    pub fn starting_at(wall_origin: DateTime<Local>) -> Self {
        Self {
            wall_origin,
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Local> {
        let elapsed = chrono::Duration::from_std(self.origin.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.wall_origin + elapsed
    }
}

#[derive(Debug, Clone)]
pub enum Cadence {
    /// Cron expression evaluated in the process local time zone.
    Cron(Box<Schedule>),
    Every(Duration),
}

impl Cadence {
    /// Parse a cron expression, auto-prepending "0 " for 5-field expressions.
    ///
    /// The `cron` crate wants `sec min hour dom mon dow`.
    pub fn cron(expr: &str) -> Result<Self, cron::error::Error> {
        let trimmed = expr.trim();
        let schedule = if trimmed.split_whitespace().count() == 5 {
            Schedule::from_str(&format!("0 {trimmed}"))?
        } else {
            Schedule::from_str(trimmed)?
        };
        Ok(Cadence::Cron(Box::new(schedule)))
    }

    /// First boundary strictly after `from`.
    pub fn next_after(&self, from: DateTime<Local>) -> Option<DateTime<Local>> {
        match self {
            Cadence::Cron(schedule) => schedule.after(&from).next(),
            Cadence::Every(period) => chrono::Duration::from_std(*period)
                .ok()
                .filter(|d| *d > chrono::Duration::zero())
                .map(|d| from + d),
        }
    }
}

#[async_trait::async_trait]
pub trait Job: Send + Sync + 'static {
    async fn run(&self) -> anyhow::Result<()>;
    fn name(&self) -> &'static str;
}

pub struct Scheduler {
    cadence: Cadence,
    clock: Arc<dyn Clock>,
    run_at_startup: bool,
}

/// Keeps the scheduler alive. Dropping it stops the loop as well; `stop` also
/// waits for an in-flight tick to finish.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            error!(error = %e, "scheduler loop ended abnormally");
        }
    }
}

impl Scheduler {
    pub fn new(cadence: Cadence) -> Self {
        Self {
            cadence,
            clock: Arc::new(SystemClock),
            run_at_startup: true,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn run_at_startup(mut self, yes: bool) -> Self {
        self.run_at_startup = yes;
        self
    }

    pub fn start(self, job: Arc<dyn Job>) -> SchedulerHandle {
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(self.run_loop(job, rx));
        SchedulerHandle { shutdown: tx, task }
    }

    async fn run_loop(self, job: Arc<dyn Job>, mut shutdown: watch::Receiver<bool>) {
        info!(target: "ingest", job = job.name(), cadence = ?self.cadence, "scheduler started");

        let mut current: Option<JoinHandle<()>> = None;
        if self.run_at_startup {
            current = Some(spawn_tick(&job));
        }

        let mut last_target: Option<DateTime<Local>> = None;
        loop {
            let now = self.clock.now();
            // Never aim at the same boundary twice, even if we woke a hair early.
            let from = match last_target {
                Some(t) if t > now => t,
                _ => now,
            };
            let Some(target) = self.cadence.next_after(from) else {
                warn!(job = job.name(), "cadence has no further boundaries, scheduler stopping");
                break;
            };
            last_target = Some(target);
            let delay = (target - now).to_std().unwrap_or(Duration::ZERO);
            debug!(job = job.name(), next = %target, "waiting for next tick");

            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tokio::time::sleep(delay) => {}
            }

            if let Some(h) = current.as_ref() {
                if !h.is_finished() {
                    debug!(job = job.name(), "previous tick still running, skipping");
                    counter!("news_ingest_skipped_ticks_total").increment(1);
                    continue;
                }
            }
            current = Some(spawn_tick(&job));
        }

        if let Some(h) = current {
            let _ = h.await;
        }
        info!(target: "ingest", job = job.name(), "scheduler stopped");
    }
}

fn spawn_tick(job: &Arc<dyn Job>) -> JoinHandle<()> {
    let job = Arc::clone(job);
    tokio::spawn(async move {
        let name = job.name();
        let inner = tokio::spawn(async move { job.run().await });
        match inner.await {
            Ok(Ok(())) => debug!(job = name, "tick finished"),
            Ok(Err(e)) => warn!(job = name, error = ?e, "tick failed"),
            Err(e) => error!(job = name, error = %e, "tick panicked"),
        }
    })
}
