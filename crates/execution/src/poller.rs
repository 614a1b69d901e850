//! Poller - drives the execution engine on a timer.
//!
//! At most one cycle runs at a time: the timer loop and [`Poller::trigger`]
//! share a busy flag, and a tick that finds a cycle in flight is skipped.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tasksched_core::Time;
use tasksched_storage::{LogStore, ScheduleStore, TaskStore};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::cron::{CronError, CronExpression};
use crate::engine::{CycleReport, ExecutionEngine, ExecutionError};

/// Wait used when a cron expression never fires again.
const FALLBACK_INTERVAL: Duration = Duration::from_secs(60);

/// When the poller wakes up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollSchedule {
    /// On every minute matching a cron expression
    Cron(CronExpression),
    /// At a fixed interval
    Every(Duration),
}

impl PollSchedule {
    /// How long to sleep from `now` until the next tick.
    pub fn until_next(&self, now: Time) -> Duration {
        match self {
            PollSchedule::Every(interval) => *interval,
            PollSchedule::Cron(cron) => match cron.next_after(&now) {
                Some(next) => (next - now).to_std().unwrap_or(FALLBACK_INTERVAL),
                None => {
                    warn!("Cron expression '{}' has no upcoming match, polling every minute", cron);
                    FALLBACK_INTERVAL
                }
            },
        }
    }
}

impl Default for PollSchedule {
    fn default() -> Self {
        PollSchedule::Every(FALLBACK_INTERVAL)
    }
}

impl FromStr for PollSchedule {
    type Err = CronError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CronExpression::parse(s).map(PollSchedule::Cron)
    }
}

impl fmt::Display for PollSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollSchedule::Cron(cron) => write!(f, "{}", cron),
            PollSchedule::Every(interval) => write!(f, "every {}ms", interval.as_millis()),
        }
    }
}

/// Snapshot of the poller for status queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollerStatus {
    /// Whether the timer loop is running
    pub is_running: bool,
    /// The configured cadence
    pub schedule: String,
}

struct Running {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Owns the timer loop around an [`ExecutionEngine`].
pub struct Poller<S> {
    engine: Arc<ExecutionEngine<S>>,
    schedule: PollSchedule,
    busy: Arc<AtomicBool>,
    running: Mutex<Option<Running>>,
}

impl<S> Poller<S>
where
    S: ScheduleStore + TaskStore + LogStore + 'static,
{
    /// Create a stopped poller.
    pub fn new(engine: Arc<ExecutionEngine<S>>, schedule: PollSchedule) -> Self {
        Self {
            engine,
            schedule,
            busy: Arc::new(AtomicBool::new(false)),
            running: Mutex::new(None),
        }
    }

    /// Start the timer loop. Returns `false` if it is already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> bool {
        let mut running = match self.running.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if running.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            warn!("Poller is already running");
            return false;
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(poll_loop(
            self.engine.clone(),
            self.schedule.clone(),
            self.busy.clone(),
            shutdown_rx,
        ));
        *running = Some(Running { shutdown, handle });

        info!("Poller started with schedule: {}", self.schedule);
        true
    }

    /// Stop the timer loop and wait for it to exit. A cycle that is in
    /// flight finishes first. Returns `false` if it was not running.
    pub async fn stop(&self) -> bool {
        let running = match self.running.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let Some(running) = running else {
            debug!("Poller is not running");
            return false;
        };

        let _ = running.shutdown.send(true);
        if let Err(e) = running.handle.await {
            error!("Poller loop ended abnormally: {}", e);
        }
        info!("Poller stopped");
        true
    }

    /// Current state.
    pub fn status(&self) -> PollerStatus {
        let is_running = match self.running.lock() {
            Ok(guard) => guard.as_ref().is_some_and(|r| !r.handle.is_finished()),
            Err(poisoned) => poisoned.into_inner().as_ref().is_some_and(|r| !r.handle.is_finished()),
        };
        PollerStatus {
            is_running,
            schedule: self.schedule.to_string(),
        }
    }

    /// Run one cycle now, outside the timer. Returns `None` if a cycle is
    /// already in flight.
    pub async fn trigger(&self) -> Option<Result<CycleReport, ExecutionError>> {
        run_exclusive(&self.engine, &self.busy).await
    }

    /// The engine this poller drives.
    pub fn engine(&self) -> &Arc<ExecutionEngine<S>> {
        &self.engine
    }
}

async fn poll_loop<S>(
    engine: Arc<ExecutionEngine<S>>,
    schedule: PollSchedule,
    busy: Arc<AtomicBool>,
    mut shutdown: watch::Receiver<bool>,
) where
    S: ScheduleStore + TaskStore + LogStore,
{
    loop {
        let wait = schedule.until_next(chrono::Utc::now());
        debug!("Next poll in {:?}", wait);

        let closed = tokio::select! {
            _ = tokio::time::sleep(wait) => false,
            changed = shutdown.changed() => changed.is_err(),
        };
        if closed || *shutdown.borrow() {
            break;
        }

        match run_exclusive(&engine, &busy).await {
            None => warn!("Previous cycle still running, skipping this tick"),
            Some(Err(e)) => error!("Execution cycle failed: {}", e),
            Some(Ok(_)) => {}
        }
    }
}

async fn run_exclusive<S>(
    engine: &ExecutionEngine<S>,
    busy: &Arc<AtomicBool>,
) -> Option<Result<CycleReport, ExecutionError>>
where
    S: ScheduleStore + TaskStore + LogStore,
{
    if busy
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        return None;
    }
    let _guard = BusyGuard(busy.clone());
    Some(engine.run_cycle().await)
}

/// Clears the busy flag when a cycle ends, even by panic.
struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_cron_wait_reaches_next_minute() {
        let schedule: PollSchedule = "*/1 * * * *".parse().unwrap();
        let now = chrono::Utc.with_ymd_and_hms(2026, 1, 1, 10, 0, 15).unwrap();
        assert_eq!(schedule.until_next(now), Duration::from_secs(45));
    }

    #[test]
    fn test_impossible_cron_falls_back() {
        let schedule: PollSchedule = "0 0 30 2 *".parse().unwrap();
        assert_eq!(schedule.until_next(chrono::Utc::now()), FALLBACK_INTERVAL);
    }

    #[test]
    fn test_display() {
        assert_eq!(PollSchedule::Every(Duration::from_millis(250)).to_string(), "every 250ms");
        assert_eq!("*/1 * * * *".parse::<PollSchedule>().unwrap().to_string(), "*/1 * * * *");
        assert!("nonsense".parse::<PollSchedule>().is_err());
    }
}
