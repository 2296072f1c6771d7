#![forbid(unsafe_code)]

//! Coalescing job queue flushed once per scheduler tick.
//!
//! Jobs are keyed by [`JobId`]. The first push of an id schedules a flush on
//! the owning [`Scheduler`]; later pushes of the same id before the flush
//! either replace the pending job (override jobs) or are dropped.
//!
//! # Invariants
//!
//! 1. At most one flush is scheduled at a time.
//! 2. Within a flush, jobs run in the order their ids were first queued.
//! 3. A pending id always runs its most recently pushed override closure.
//! 4. Jobs pushed while a flush is running run in that same flush.
//!
//! # Failure Modes
//!
//! - Dropping the scheduler before the flush tick discards pending jobs.
//! - A job that re-pushes its own id from inside `execute` runs again in the
//!   same flush; an unconditional self-push never terminates.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use crate::scheduler::Scheduler;

/// Identity used for de-duplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub u64);

/// A deferred unit of work.
pub struct Job {
    id: JobId,
    override_previous: bool,
    execute: Box<dyn FnOnce()>,
}

impl Job {
    /// A job that is dropped if its id is already pending.
    pub fn new(id: JobId, execute: impl FnOnce() + 'static) -> Self {
        Self {
            id,
            override_previous: false,
            execute: Box::new(execute),
        }
    }

    /// A job that replaces a pending job with the same id.
    pub fn overriding(id: JobId, execute: impl FnOnce() + 'static) -> Self {
        Self {
            id,
            override_previous: true,
            execute: Box::new(execute),
        }
    }

    /// The job's de-duplication id.
    #[must_use]
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Whether this job replaces a pending job with the same id.
    #[must_use]
    pub fn overrides(&self) -> bool {
        self.override_previous
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("override_previous", &self.override_previous)
            .finish()
    }
}

struct BatcherInner {
    queue: RefCell<IndexMap<JobId, Job>>,
    waiting: Cell<bool>,
    flushes: Cell<u64>,
    scheduler: Scheduler,
}

/// Shared, clonable batcher handle.
#[derive(Clone)]
pub struct Batcher {
    inner: Rc<BatcherInner>,
}

impl Batcher {
    /// Create a batcher that flushes on `scheduler`.
    #[must_use]
    pub fn new(scheduler: Scheduler) -> Self {
        Self {
            inner: Rc::new(BatcherInner {
                queue: RefCell::new(IndexMap::new()),
                waiting: Cell::new(false),
                flushes: Cell::new(0),
                scheduler,
            }),
        }
    }

    /// Queue `job`, scheduling a flush if none is pending.
    pub fn push(&self, job: Job) {
        {
            let mut queue = self.inner.queue.borrow_mut();
            if let Some(pending) = queue.get_mut(&job.id) {
                if job.override_previous {
                    *pending = job;
                } else {
                    tracing::trace!(target: "tether::batcher", id = job.id.0, "duplicate job dropped");
                }
            } else {
                queue.insert(job.id, job);
            }
        }
        if !self.inner.waiting.replace(true) {
            let weak: Weak<BatcherInner> = Rc::downgrade(&self.inner);
            self.inner.scheduler.next_tick(move || {
                if let Some(inner) = weak.upgrade() {
                    Batcher { inner }.flush();
                }
            });
        }
    }

    /// Run every pending job now. Returns the number executed.
    pub fn flush(&self) -> usize {
        let mut ran = 0;
        loop {
            let next = self.inner.queue.borrow_mut().shift_remove_index(0);
            let Some((_, job)) = next else {
                break;
            };
            (job.execute)();
            ran += 1;
        }
        self.inner.waiting.set(false);
        self.inner.flushes.set(self.inner.flushes.get() + 1);
        tracing::trace!(target: "tether::batcher", ran, "flushed");
        ran
    }

    /// Number of pending jobs.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.queue.borrow().len()
    }

    /// Whether a flush is scheduled.
    #[must_use]
    pub fn is_waiting(&self) -> bool {
        self.inner.waiting.get()
    }

    /// Number of completed flushes.
    #[must_use]
    pub fn flush_count(&self) -> u64 {
        self.inner.flushes.get()
    }
}

impl std::fmt::Debug for Batcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Batcher")
            .field("pending", &self.pending())
            .field("waiting", &self.is_waiting())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn setup() -> (Scheduler, Batcher, Rc<RefCell<Vec<(u64, u32)>>>) {
        let scheduler = Scheduler::new();
        let batcher = Batcher::new(scheduler.clone());
        (scheduler, batcher, Rc::new(RefCell::new(Vec::new())))
    }

    fn record(log: &Rc<RefCell<Vec<(u64, u32)>>>, id: u64, value: u32) -> impl FnOnce() + 'static {
        let log = Rc::clone(log);
        move || log.borrow_mut().push((id, value))
    }

    #[test]
    fn push_defers_to_scheduler() {
        let (scheduler, batcher, log) = setup();
        batcher.push(Job::overriding(JobId(1), record(&log, 1, 0)));

        assert!(log.borrow().is_empty());
        assert!(batcher.is_waiting());
        assert_eq!(scheduler.pending(), 1);

        scheduler.tick();
        assert_eq!(*log.borrow(), vec![(1, 0)]);
        assert!(!batcher.is_waiting());
        assert_eq!(batcher.flush_count(), 1);
    }

    #[test]
    fn override_keeps_last_closure_and_first_position() {
        let (scheduler, batcher, log) = setup();
        batcher.push(Job::overriding(JobId(1), record(&log, 1, 1)));
        batcher.push(Job::overriding(JobId(2), record(&log, 2, 1)));
        batcher.push(Job::overriding(JobId(1), record(&log, 1, 2)));

        assert_eq!(scheduler.pending(), 1, "only one flush scheduled");
        scheduler.tick();
        assert_eq!(*log.borrow(), vec![(1, 2), (2, 1)]);
    }

    #[test]
    fn non_override_duplicate_is_dropped() {
        let (scheduler, batcher, log) = setup();
        batcher.push(Job::new(JobId(7), record(&log, 7, 1)));
        batcher.push(Job::new(JobId(7), record(&log, 7, 2)));
        scheduler.tick();
        assert_eq!(*log.borrow(), vec![(7, 1)]);
    }

    #[test]
    fn jobs_pushed_during_flush_run_in_same_flush() {
        let (scheduler, batcher, log) = setup();
        let handle = batcher.clone();
        let inner_log = Rc::clone(&log);
        batcher.push(Job::overriding(JobId(1), move || {
            inner_log.borrow_mut().push((1, 0));
            handle.push(Job::overriding(JobId(2), record(&inner_log, 2, 0)));
        }));

        scheduler.tick();
        assert_eq!(*log.borrow(), vec![(1, 0), (2, 0)]);
        assert_eq!(batcher.pending(), 0);
        assert!(scheduler.is_idle(), "no second flush scheduled");
    }

    #[test]
    fn new_cycle_after_flush() {
        let (scheduler, batcher, log) = setup();
        batcher.push(Job::overriding(JobId(1), record(&log, 1, 1)));
        scheduler.tick();
        batcher.push(Job::overriding(JobId(1), record(&log, 1, 2)));
        scheduler.tick();
        assert_eq!(*log.borrow(), vec![(1, 1), (1, 2)]);
        assert_eq!(batcher.flush_count(), 2);
    }

    #[test]
    fn dropped_batcher_flush_is_noop() {
        let (scheduler, batcher, log) = setup();
        batcher.push(Job::overriding(JobId(1), record(&log, 1, 1)));
        drop(batcher);
        let report = scheduler.tick();
        assert_eq!(report.ran, 1);
        assert!(log.borrow().is_empty());
    }

    proptest! {
        #[test]
        fn each_id_runs_once_with_its_last_value(
            pushes in prop::collection::vec((0u64..6, any::<u32>()), 1..40),
        ) {
            let (scheduler, batcher, log) = setup();
            for &(id, value) in &pushes {
                batcher.push(Job::overriding(JobId(id), record(&log, id, value)));
            }
            scheduler.run_until_idle();

            let mut expected_order: Vec<u64> = Vec::new();
            for &(id, _) in &pushes {
                if !expected_order.contains(&id) {
                    expected_order.push(id);
                }
            }
            let expected: Vec<(u64, u32)> = expected_order
                .iter()
                .map(|id| {
                    let last = pushes.iter().rev().find(|(i, _)| i == id).map(|(_, v)| *v);
                    (*id, last.unwrap_or_default())
                })
                .collect();
            prop_assert_eq!(log.borrow().clone(), expected);
        }
    }
}
