//! Background rotation scheduling.
//!
//! Wall-clock time is divided into fixed-length periods counted from the Unix
//! epoch, shifted by the zone offset so that a one-day period turns over at
//! local midnight. The scheduler thread sleeps until the next boundary (or a
//! shutdown signal, whichever comes first) and then asks the executor to
//! rotate.

use {
    crate::{executor::Executor, RotateLogError},
    chrono::{DateTime, FixedOffset, TimeDelta, Utc},
    std::{
        sync::{
            mpsc::{self, Receiver, RecvTimeoutError, SyncSender},
            Arc,
        },
        thread::{self, JoinHandle},
        time::Duration,
    },
};

const NANOS_PER_SEC: i128 = 1_000_000_000;

/// Time remaining from `now` until the next rotation boundary.
///
/// The boundary is strictly after `now`: an instant sitting exactly on a
/// boundary waits a full period. `period` must be non-zero.
pub fn until_next_rotation(now: DateTime<Utc>, period: Duration, offset: FixedOffset) -> Duration {
    let period_nanos = period.as_nanos() as i128;
    if period_nanos == 0 {
        return Duration::ZERO;
    }
    let local_nanos = i128::from(now.timestamp()) * NANOS_PER_SEC
        + i128::from(now.timestamp_subsec_nanos())
        + i128::from(offset.local_minus_utc()) * NANOS_PER_SEC;
    let wait = period_nanos - local_nanos.rem_euclid(period_nanos);
    Duration::new(
        (wait / NANOS_PER_SEC) as u64,
        (wait % NANOS_PER_SEC) as u32,
    )
}

/// The next rotation boundary after `now`, or `None` if it lies beyond what
/// `DateTime<Utc>` can represent.
pub fn next_boundary(now: DateTime<Utc>, period: Duration, offset: FixedOffset) -> Option<DateTime<Utc>> {
    if period.is_zero() {
        return None;
    }
    let wait = TimeDelta::from_std(until_next_rotation(now, period, offset)).ok()?;
    now.checked_add_signed(wait)
}

/// Handle to the running scheduler thread.
pub(crate) struct Scheduler {
    shutdown: SyncSender<()>,
    handle: JoinHandle<()>,
}

impl Scheduler {
    pub(crate) fn spawn(executor: Arc<Executor>) -> Result<Self, RotateLogError> {
        // One slot: a pending shutdown never blocks the sender.
        let (shutdown, signal) = mpsc::sync_channel(1);
        let handle = thread::Builder::new()
            .name("rotatelog-scheduler".to_string())
            .spawn(move || run(&executor, &signal))
            .map_err(|err| RotateLogError::SpawnSchedulerFailed(err.to_string()))?;
        Ok(Scheduler { shutdown, handle })
    }

    /// Signal the thread to stop and wait for it to exit.
    pub(crate) fn shutdown(self) {
        // Full means a signal is already queued, Disconnected means the
        // thread is gone. Neither needs handling.
        let _ = self.shutdown.try_send(());
        drop(self.shutdown);

        if self.handle.join().is_err() {
            tracing::error!("rotation scheduler thread panicked");
        }
    }
}

fn run(executor: &Executor, signal: &Receiver<()>) {
    let policy = executor.policy();
    let (period, offset) = (policy.period(), policy.offset());
    tracing::debug!(period = ?period, template = %policy.template(), "rotation scheduler started");

    loop {
        let Some(boundary) = next_boundary(executor.now(), period, offset) else {
            tracing::warn!("next rotation boundary is out of range, waiting for shutdown only");
            let _ = signal.recv();
            break;
        };

        if !wait_until(executor, boundary, signal) {
            break;
        }
        // Rotate with the current instant, not the boundary: after a long
        // suspension this is a single rotation into today's file.
        executor.rotate_scheduled(executor.now());
    }

    tracing::debug!(template = %policy.template(), "rotation scheduler stopped");
}

/// Block until the clock reaches `boundary`. Returns false on shutdown.
fn wait_until(executor: &Executor, boundary: DateTime<Utc>, signal: &Receiver<()>) -> bool {
    loop {
        let remaining = (boundary - executor.now()).to_std().unwrap_or(Duration::ZERO);
        if remaining.is_zero() {
            return true;
        }
        match signal.recv_timeout(remaining) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => return false,
            // timers may fire slightly ahead of the wall clock, so re-check
            Err(RecvTimeoutError::Timeout) => {}
        }
    }
}
