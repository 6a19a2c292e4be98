//! Adaptive refresh of run bundles that have not finished yet.
//!
//! A poller task fetches only the tracked rows of one worksheet. The
//! controller publishes the current target through a `watch` channel after
//! every reload; the task exits as soon as that target names a different
//! worksheet or no longer tracks anything. [`PollerSlot`] guarantees that at
//! most one task is alive.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::api::{ApiError, WorksheetApi, WorksheetPayload};

/// Tick `n` (1-indexed) waits `max(min(cap, n * step), slow_factor *
/// previous request duration)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffSchedule {
    pub step: Duration,
    pub cap: Duration,
    pub slow_factor: u32,
}

impl Default for BackoffSchedule {
    fn default() -> Self {
        Self {
            step: Duration::from_secs(1),
            cap: Duration::from_secs(3),
            slow_factor: 5,
        }
    }
}

impl BackoffSchedule {
    pub fn delay(&self, tick: u32, previous_request: Duration) -> Duration {
        let ramp = self.step.saturating_mul(tick.max(1)).min(self.cap);
        ramp.max(previous_request.saturating_mul(self.slow_factor))
    }
}

/// What the poller should be refreshing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollTarget {
    pub worksheet_uuid: String,
    pub tracked: Vec<String>,
}

#[derive(Debug)]
pub struct PollUpdate {
    pub worksheet_uuid: String,
    pub tick: u32,
    pub result: Result<WorksheetPayload, ApiError>,
}

/// Handle to a running poller task. Dropping it cancels the task.
pub struct PollerHandle {
    worksheet_uuid: String,
    target_tx: watch::Sender<PollTarget>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl PollerHandle {
    pub fn worksheet_uuid(&self) -> &str {
        &self.worksheet_uuid
    }

    pub fn update(&self, target: PollTarget) {
        self.target_tx.send_replace(target);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Start polling `target` on the current tokio runtime. Every fetch result
/// is handed to `sink`, tagged with the worksheet it was issued for.
pub fn spawn_poller<F>(
    api: Arc<dyn WorksheetApi>,
    schedule: BackoffSchedule,
    target: PollTarget,
    sink: F,
) -> PollerHandle
where
    F: Fn(PollUpdate) + Send + Sync + 'static,
{
    let worksheet_uuid = target.worksheet_uuid.clone();
    let (target_tx, target_rx) = watch::channel(target);
    let cancel = CancellationToken::new();
    let task = tokio::spawn(run_poller(
        api,
        schedule,
        worksheet_uuid.clone(),
        target_rx,
        cancel.clone(),
        sink,
    ));
    PollerHandle {
        worksheet_uuid,
        target_tx,
        cancel,
        task,
    }
}

/// The live target, or `None` once the poller has nothing left to do for
/// `observed`.
fn live_target(rx: &watch::Receiver<PollTarget>, observed: &str) -> Option<PollTarget> {
    let target = rx.borrow();
    if target.worksheet_uuid != observed || target.tracked.is_empty() {
        return None;
    }
    Some(target.clone())
}

async fn run_poller<F>(
    api: Arc<dyn WorksheetApi>,
    schedule: BackoffSchedule,
    observed: String,
    target_rx: watch::Receiver<PollTarget>,
    cancel: CancellationToken,
    sink: F,
) where
    F: Fn(PollUpdate) + Send + Sync + 'static,
{
    let mut tick: u32 = 1;
    let mut previous_request = Duration::ZERO;
    debug!(worksheet = %observed, "Poller started");

    loop {
        if live_target(&target_rx, &observed).is_none() {
            break;
        }
        let delay = schedule.delay(tick, previous_request);
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
        // The target may have moved on while we slept.
        let Some(target) = live_target(&target_rx, &observed) else {
            break;
        };

        let started = Instant::now();
        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            result = api.fetch_partial(&target.worksheet_uuid, &target.tracked) => result,
        };
        previous_request = started.elapsed();
        debug!(
            worksheet = %observed,
            tick,
            tracked = target.tracked.len(),
            elapsed_ms = previous_request.as_millis() as u64,
            "Poll tick"
        );
        sink(PollUpdate {
            worksheet_uuid: observed.clone(),
            tick,
            result,
        });
        tick = tick.saturating_add(1);
    }
    debug!(worksheet = %observed, ticks = tick - 1, "Poller stopped");
}

/// Whatever [`PollerSlot::sync`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerChange {
    Unchanged,
    Started,
    Updated,
    Stopped,
}

/// Holds the single live poller.
#[derive(Default)]
pub struct PollerSlot {
    current: Option<PollerHandle>,
}

impl PollerSlot {
    pub fn is_running(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn stop(&mut self) -> PollerChange {
        match self.current.take() {
            Some(handle) => {
                handle.cancel();
                PollerChange::Stopped
            }
            None => PollerChange::Unchanged,
        }
    }

    /// Converge on `desired`: stop when `None`, retarget a live poller for
    /// the same worksheet, otherwise replace it with a fresh one from
    /// `start`.
    pub fn sync<S>(&mut self, desired: Option<PollTarget>, start: S) -> PollerChange
    where
        S: FnOnce(PollTarget) -> PollerHandle,
    {
        let Some(target) = desired.filter(|target| !target.tracked.is_empty()) else {
            return self.stop();
        };
        if let Some(handle) = &self.current {
            if handle.worksheet_uuid() == target.worksheet_uuid && !handle.is_finished() {
                handle.update(target);
                return PollerChange::Updated;
            }
        }
        self.stop();
        self.current = Some(start(target));
        PollerChange::Started
    }
}
