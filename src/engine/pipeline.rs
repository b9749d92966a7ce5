//! Producer/worker plumbing shared by both clustering passes.
//!
//! One producer feeds a bounded channel; workers drain it. Dropping the
//! producer's sender closes the channel, which every worker observes once
//! the queue is empty. The calling thread polls progress until every task
//! has exited, then joins them and surfaces panics and fatal errors.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::ClusterConfig;
use crate::store::{AptamerId, StoreError};
use crate::ClusterError;

/// Which clustering pass produced a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PassKind {
    /// First iteration: seeds and absorption.
    SeedFormation,
    /// Later iterations: anchor-based merging.
    ConsensusMerge,
}

impl fmt::Display for PassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassKind::SeedFormation => write!(f, "seed formation"),
            PassKind::ConsensusMerge => write!(f, "consensus merge"),
        }
    }
}

/// Counters describing one finished pass.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PassReport {
    /// Pass type.
    pub kind: PassKind,
    /// Work items dequeued (buckets or anchor candidates).
    pub items: usize,
    /// Aptamers examined.
    pub sequences: usize,
    /// Distance computations performed.
    pub comparisons: usize,
    /// Store writes that changed an assignment.
    pub assignments: usize,
    /// Assignments abandoned after a retry.
    pub skipped: usize,
}

/// Shared counters updated by workers.
#[derive(Debug, Default)]
pub(crate) struct PassStats {
    pub items: AtomicUsize,
    pub sequences: AtomicUsize,
    pub comparisons: AtomicUsize,
    pub assignments: AtomicUsize,
    pub skipped: AtomicUsize,
}

impl PassStats {
    pub fn add(counter: &AtomicUsize, value: usize) {
        counter.fetch_add(value, Ordering::Relaxed);
    }

    pub fn report(&self, kind: PassKind) -> PassReport {
        PassReport {
            kind,
            items: self.items.load(Ordering::Relaxed),
            sequences: self.sequences.load(Ordering::Relaxed),
            comparisons: self.comparisons.load(Ordering::Relaxed),
            assignments: self.assignments.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }
}

/// Queue and scheduling parameters of one pass.
#[derive(Debug, Clone)]
pub(crate) struct PipelineSettings {
    pub kind: PassKind,
    pub capacity: usize,
    /// Concurrently active tasks, producer included.
    pub tasks: usize,
    pub progress_interval: Duration,
}

impl PipelineSettings {
    pub fn seed(config: &ClusterConfig) -> Self {
        Self {
            kind: PassKind::SeedFormation,
            capacity: config.seed_queue_capacity,
            tasks: config.worker_count(),
            progress_interval: config.progress_interval,
        }
    }

    pub fn merge(config: &ClusterConfig) -> Self {
        Self {
            kind: PassKind::ConsensusMerge,
            capacity: config.merge_queue_capacity,
            tasks: config.worker_count(),
            progress_interval: config.progress_interval,
        }
    }

    /// The producer counts as one task; at least one worker always runs.
    fn workers(&self) -> usize {
        self.tasks.saturating_sub(1).max(1)
    }
}

/// Run `work` over every item of `items` on a pool of workers.
///
/// A fatal error from `work` stops the producer and the remaining workers;
/// the first such error is returned once every task has been joined.
pub(crate) fn run_pipeline<T, I, W>(
    settings: &PipelineSettings,
    stats: &PassStats,
    total_items: usize,
    items: I,
    work: W,
) -> Result<(), ClusterError>
where
    T: Send,
    I: IntoIterator<Item = T>,
    I::IntoIter: Send,
    W: Fn(T) -> Result<(), ClusterError> + Sync,
{
    let abort = AtomicBool::new(false);
    let failure: Mutex<Option<ClusterError>> = Mutex::new(None);
    let workers = settings.workers();
    let items = items.into_iter();

    debug!(pass = %settings.kind, workers, capacity = settings.capacity, "starting pass");

    thread::scope(|scope| {
        let (tx, rx) = bounded::<T>(settings.capacity);
        // Never sent on: disconnects once every task has dropped its clone.
        let (alive_tx, alive_rx) = bounded::<()>(0);

        let producer = {
            let alive = alive_tx.clone();
            let abort = &abort;
            scope.spawn(move || {
                let _alive = alive;
                for item in items {
                    if abort.load(Ordering::Relaxed) || tx.send(item).is_err() {
                        break;
                    }
                }
            })
        };

        let handles: Vec<_> = (0..workers)
            .map(|_| {
                let rx = rx.clone();
                let alive = alive_tx.clone();
                let (abort, failure, work) = (&abort, &failure, &work);
                scope.spawn(move || {
                    let _alive = alive;
                    for item in rx.iter() {
                        if abort.load(Ordering::Relaxed) {
                            break;
                        }
                        PassStats::add(&stats.items, 1);
                        if let Err(err) = work(item) {
                            abort.store(true, Ordering::Relaxed);
                            let mut slot = failure.lock();
                            if slot.is_none() {
                                *slot = Some(err);
                            }
                            break;
                        }
                    }
                })
            })
            .collect();
        drop(rx);
        drop(alive_tx);

        while let Err(RecvTimeoutError::Timeout) = alive_rx.recv_timeout(settings.progress_interval) {
            info!(
                pass = %settings.kind,
                done = stats.items.load(Ordering::Relaxed),
                total = total_items,
                "progress"
            );
        }

        let mut panicked = None;
        if let Err(payload) = producer.join() {
            panicked = Some(panic_message(payload));
        }
        for handle in handles {
            if let Err(payload) = handle.join() {
                if panicked.is_none() {
                    panicked = Some(panic_message(payload));
                }
            }
        }
        if let Some(message) = panicked {
            return Err(ClusterError::WorkerPanicked {
                pass: settings.kind.to_string(),
                message,
            });
        }
        Ok(())
    })?;

    match failure.into_inner() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Apply a store write, retrying once; failures are counted as skipped.
pub(crate) fn write_with_retry<F>(stats: &PassStats, id: AptamerId, mut write: F) -> bool
where
    F: FnMut() -> Result<(), StoreError>,
{
    if let Err(first) = write() {
        debug!(id, error = %first, "assignment failed, retrying");
        if let Err(second) = write() {
            warn!(id, error = %second, "assignment skipped after retry");
            PassStats::add(&stats.skipped, 1);
            return false;
        }
    }
    true
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(tasks: usize) -> PipelineSettings {
        PipelineSettings {
            kind: PassKind::SeedFormation,
            capacity: 4,
            tasks,
            progress_interval: Duration::from_millis(5),
        }
    }

    #[test]
    fn every_item_is_processed_once() {
        let stats = PassStats::default();
        let sum = AtomicUsize::new(0);
        run_pipeline(&settings(4), &stats, 1000, 0..1000usize, |item| {
            sum.fetch_add(item, Ordering::Relaxed);
            Ok(())
        })
        .unwrap();
        assert_eq!(sum.into_inner(), 999 * 1000 / 2);
        assert_eq!(stats.report(PassKind::SeedFormation).items, 1000);
    }

    #[test]
    fn single_task_still_runs_a_worker() {
        let stats = PassStats::default();
        run_pipeline(&settings(1), &stats, 10, 0..10usize, |_| Ok(())).unwrap();
        assert_eq!(stats.items.load(Ordering::Relaxed), 10);
    }

    #[test]
    fn fatal_error_is_surfaced() {
        let stats = PassStats::default();
        let result = run_pipeline(&settings(3), &stats, 100, 0..100u32, |item| {
            if item == 17 {
                Err(ClusterError::MissingSequence(item))
            } else {
                Ok(())
            }
        });
        assert!(matches!(result, Err(ClusterError::MissingSequence(17))));
    }

    #[test]
    fn worker_panic_is_surfaced() {
        let stats = PassStats::default();
        let result = run_pipeline(&settings(2), &stats, 10, 0..10u32, |item| {
            if item == 3 {
                panic!("bad item");
            }
            Ok(())
        });
        match result {
            Err(ClusterError::WorkerPanicked { message, .. }) => assert_eq!(message, "bad item"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn retry_recovers_from_single_failure() {
        let stats = PassStats::default();
        let mut attempts = 0;
        let ok = write_with_retry(&stats, 1, || {
            attempts += 1;
            if attempts == 1 {
                Err(StoreError::ReadOnly)
            } else {
                Ok(())
            }
        });
        assert!(ok);
        assert_eq!(stats.skipped.load(Ordering::Relaxed), 0);

        let ok = write_with_retry(&stats, 1, || Err(StoreError::ReadOnly));
        assert!(!ok);
        assert_eq!(stats.skipped.load(Ordering::Relaxed), 1);
    }
}
