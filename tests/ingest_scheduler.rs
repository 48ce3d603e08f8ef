// tests/ingest_scheduler.rs
//
// Scheduler timing under tokio's paused clock. `TokioClock` moves wall time
// along with `tokio::time`, so two simulated hours pass instantly.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Local, TimeZone};
use election_hub::ingest::scheduler::{Cadence, Job, Scheduler, TokioClock};

const MIN: u64 = 60;
const HOUR: u64 = 60 * MIN;

#[derive(Clone, Copy)]
enum Behavior {
    Succeed,
    Fail,
    Panic,
    Busy(Duration),
}

struct CountingJob {
    starts: Arc<AtomicUsize>,
    behavior: Behavior,
}

impl CountingJob {
    fn new(behavior: Behavior) -> (Arc<Self>, Arc<AtomicUsize>) {
        let starts = Arc::new(AtomicUsize::new(0));
        let job = Arc::new(Self {
            starts: starts.clone(),
            behavior,
        });
        (job, starts)
    }
}

#[async_trait]
impl Job for CountingJob {
    async fn run(&self) -> anyhow::Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            Behavior::Succeed => Ok(()),
            Behavior::Fail => anyhow::bail!("feed unreachable"),
            Behavior::Panic => panic!("job blew up"),
            Behavior::Busy(d) => {
                tokio::time::sleep(d).await;
                Ok(())
            }
        }
    }

    fn name(&self) -> &'static str {
        "counting"
    }
}

/// Every-cadence scheduler on a clock that follows tokio's paused time.
fn every_hour() -> Scheduler {
    Scheduler::new(Cadence::Every(Duration::from_secs(HOUR)))
        .with_clock(Arc::new(TokioClock::starting_at(Local::now())))
}

async fn advance(secs: u64) {
    tokio::time::sleep(Duration::from_secs(secs)).await;
}

#[tokio::test(start_paused = true)]
async fn fires_at_startup_then_on_even_hours() {
    let wall = Local.with_ymd_and_hms(2024, 1, 15, 1, 30, 0).unwrap();
    let (job, starts) = CountingJob::new(Behavior::Succeed);

    let handle = Scheduler::new(Cadence::cron("0 0 */2 * * *").unwrap())
        .with_clock(Arc::new(TokioClock::starting_at(wall)))
        .start(job);

    advance(1).await;
    assert_eq!(starts.load(Ordering::SeqCst), 1, "startup tick");

    // Still short of 02:00.
    advance(29 * MIN - 2).await;
    assert_eq!(starts.load(Ordering::SeqCst), 1);

    // Crosses 02:00.
    advance(2 * MIN).await;
    assert_eq!(starts.load(Ordering::SeqCst), 2, "02:00 tick");

    // Two simulated hours later the 04:00 boundary has fired exactly once.
    advance(2 * HOUR).await;
    assert_eq!(starts.load(Ordering::SeqCst), 3, "04:00 tick");

    handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn startup_run_can_be_disabled() {
    let wall = Local.with_ymd_and_hms(2024, 1, 15, 3, 0, 0).unwrap();
    let (job, starts) = CountingJob::new(Behavior::Succeed);

    let handle = Scheduler::new(Cadence::cron("0 */2 * * *").unwrap())
        .with_clock(Arc::new(TokioClock::starting_at(wall)))
        .run_at_startup(false)
        .start(job);

    advance(MIN).await;
    assert_eq!(starts.load(Ordering::SeqCst), 0);

    advance(HOUR).await;
    assert_eq!(starts.load(Ordering::SeqCst), 1, "04:00 tick");

    handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn failing_job_keeps_the_loop_alive() {
    let (job, starts) = CountingJob::new(Behavior::Fail);
    let handle = every_hour().start(job);

    advance(3 * HOUR + 30 * MIN).await;
    assert_eq!(starts.load(Ordering::SeqCst), 4);

    handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn panicking_job_keeps_the_loop_alive() {
    let (job, starts) = CountingJob::new(Behavior::Panic);
    let handle = every_hour().start(job);

    advance(2 * HOUR + 30 * MIN).await;
    assert_eq!(starts.load(Ordering::SeqCst), 3);

    handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn tick_is_skipped_while_previous_still_runs() {
    let (job, starts) = CountingJob::new(Behavior::Busy(Duration::from_secs(90 * MIN)));
    let handle = every_hour().start(job);

    // Startup run occupies 0..90m, so the 60m boundary is skipped.
    advance(70 * MIN).await;
    assert_eq!(starts.load(Ordering::SeqCst), 1);

    // 120m starts the second run.
    advance(60 * MIN).await;
    assert_eq!(starts.load(Ordering::SeqCst), 2);

    // 180m is skipped, 240m runs.
    advance(2 * HOUR).await;
    assert_eq!(starts.load(Ordering::SeqCst), 3);

    handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn stop_ends_the_schedule() {
    let (job, starts) = CountingJob::new(Behavior::Succeed);
    let handle = every_hour().start(job);

    advance(1).await;
    handle.stop().await;
    let seen = starts.load(Ordering::SeqCst);
    assert_eq!(seen, 1);

    advance(5 * HOUR).await;
    assert_eq!(starts.load(Ordering::SeqCst), seen);
}
