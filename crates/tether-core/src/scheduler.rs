#![forbid(unsafe_code)]

//! Host-driven next-tick scheduler.
//!
//! The scheduler stands in for the browser's microtask/timer queue. Work is
//! queued with [`Scheduler::next_tick`] and runs only when the host calls
//! [`Scheduler::tick`] (one turn) or [`Scheduler::run_until_idle`].
//!
//! # Invariants
//!
//! 1. A task never runs inside the call that queued it.
//! 2. Tasks run in FIFO order within a tick.
//! 3. Tasks queued while a tick runs are deferred to the following tick.
//! 4. A failing task does not stop the remaining tasks of its tick; the
//!    failure is collected in the [`TickReport`].

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

/// Error produced by a fallible task.
pub type TaskError = Box<dyn std::error::Error + 'static>;

type Task = Box<dyn FnOnce() -> Result<(), TaskError>>;

/// Upper bound on ticks for [`Scheduler::run_until_idle`].
pub const MAX_TICKS_UNTIL_IDLE: u64 = 10_000;

/// Outcome of one or more ticks.
#[derive(Debug, Default)]
pub struct TickReport {
    /// Number of tasks executed.
    pub ran: usize,
    /// Number of ticks taken.
    pub ticks: u64,
    /// Errors returned by fallible tasks, in execution order.
    pub failures: Vec<TaskError>,
}

impl TickReport {
    /// Whether no task failed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Convert into a `Result`, surfacing the first failure.
    pub fn into_result(self) -> Result<usize, TaskError> {
        match self.failures.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(self.ran),
        }
    }

    fn absorb(&mut self, other: TickReport) {
        self.ran += other.ran;
        self.ticks += other.ticks;
        self.failures.extend(other.failures);
    }
}

#[derive(Default)]
struct SchedulerInner {
    queue: RefCell<VecDeque<Task>>,
    ticks: Cell<u64>,
}

/// Shared, clonable scheduler handle.
#[derive(Clone, Default)]
pub struct Scheduler {
    inner: Rc<SchedulerInner>,
}

/// Non-owning scheduler handle for tasks that must not keep it alive.
#[derive(Clone)]
pub struct WeakScheduler {
    inner: Weak<SchedulerInner>,
}

impl WeakScheduler {
    /// Upgrade to a strong handle if the scheduler is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<Scheduler> {
        self.inner.upgrade().map(|inner| Scheduler { inner })
    }
}

impl Scheduler {
    /// Create an idle scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `task` for the next tick.
    pub fn next_tick(&self, task: impl FnOnce() + 'static) {
        self.next_tick_fallible(move || {
            task();
            Ok(())
        });
    }

    /// Queue a task whose failure is reported by the tick that runs it.
    pub fn next_tick_fallible(&self, task: impl FnOnce() -> Result<(), TaskError> + 'static) {
        self.inner.queue.borrow_mut().push_back(Box::new(task));
    }

    /// Number of queued tasks.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.queue.borrow().len()
    }

    /// Whether nothing is queued.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.inner.queue.borrow().is_empty()
    }

    /// Number of ticks that have run so far.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.inner.ticks.get()
    }

    /// Downgrade to a weak handle.
    #[must_use]
    pub fn downgrade(&self) -> WeakScheduler {
        WeakScheduler {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Run every task queued before this call.
    pub fn tick(&self) -> TickReport {
        let batch = std::mem::take(&mut *self.inner.queue.borrow_mut());
        let mut report = TickReport {
            ticks: 1,
            ..TickReport::default()
        };
        for task in batch {
            report.ran += 1;
            if let Err(err) = task() {
                tracing::debug!(target: "tether::scheduler", error = %err, "task failed");
                report.failures.push(err);
            }
        }
        self.inner.ticks.set(self.inner.ticks.get() + 1);
        report
    }

    /// Tick until the queue is empty.
    ///
    /// Stops after [`MAX_TICKS_UNTIL_IDLE`] ticks if tasks keep requeueing
    /// themselves.
    pub fn run_until_idle(&self) -> TickReport {
        let mut report = TickReport::default();
        while !self.is_idle() {
            if report.ticks >= MAX_TICKS_UNTIL_IDLE {
                tracing::warn!(
                    target: "tether::scheduler",
                    pending = self.pending(),
                    "scheduler did not become idle"
                );
                break;
            }
            report.absorb(self.tick());
        }
        report
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("pending", &self.pending())
            .field("ticks", &self.ticks())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Boom;

    impl std::fmt::Display for Boom {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "boom")
        }
    }

    impl std::error::Error for Boom {}

    #[test]
    fn tasks_do_not_run_synchronously() {
        let scheduler = Scheduler::new();
        let ran = Rc::new(Cell::new(false));
        let r = Rc::clone(&ran);
        scheduler.next_tick(move || r.set(true));

        assert!(!ran.get());
        assert_eq!(scheduler.pending(), 1);
        scheduler.tick();
        assert!(ran.get());
        assert!(scheduler.is_idle());
    }

    #[test]
    fn fifo_within_a_tick() {
        let scheduler = Scheduler::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        for i in 0..4 {
            let o = Rc::clone(&order);
            scheduler.next_tick(move || o.borrow_mut().push(i));
        }
        let report = scheduler.tick();
        assert_eq!(report.ran, 4);
        assert_eq!(*order.borrow(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn nested_tasks_wait_for_next_tick() {
        let scheduler = Scheduler::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        let handle = scheduler.clone();
        let o = Rc::clone(&order);
        scheduler.next_tick(move || {
            o.borrow_mut().push("outer");
            let o2 = Rc::clone(&o);
            handle.next_tick(move || o2.borrow_mut().push("inner"));
        });

        scheduler.tick();
        assert_eq!(*order.borrow(), vec!["outer"]);
        scheduler.tick();
        assert_eq!(*order.borrow(), vec!["outer", "inner"]);
        assert_eq!(scheduler.ticks(), 2);
    }

    #[test]
    fn run_until_idle_drains_chains() {
        let scheduler = Scheduler::new();
        let count = Rc::new(Cell::new(0));
        fn chain(s: Scheduler, count: Rc<Cell<u32>>, left: u32) {
            if left == 0 {
                return;
            }
            let next = s.clone();
            s.next_tick(move || {
                count.set(count.get() + 1);
                chain(next, count, left - 1);
            });
        }
        chain(scheduler.clone(), Rc::clone(&count), 5);

        let report = scheduler.run_until_idle();
        assert_eq!(count.get(), 5);
        assert_eq!(report.ticks, 5);
        assert!(report.is_clean());
    }

    #[test]
    fn failures_are_collected_and_do_not_stop_the_tick() {
        let scheduler = Scheduler::new();
        let ran = Rc::new(Cell::new(false));
        scheduler.next_tick_fallible(|| Err(Box::new(Boom)));
        let r = Rc::clone(&ran);
        scheduler.next_tick(move || r.set(true));

        let report = scheduler.tick();
        assert!(ran.get());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].to_string(), "boom");
    }

    #[test]
    fn into_result_surfaces_first_failure() {
        let scheduler = Scheduler::new();
        scheduler.next_tick(|| {});
        assert_eq!(scheduler.tick().into_result().ok(), Some(1));

        scheduler.next_tick_fallible(|| Err(Box::new(Boom)));
        assert!(scheduler.tick().into_result().is_err());
    }

    #[test]
    fn weak_handle_does_not_keep_scheduler_alive() {
        let scheduler = Scheduler::new();
        let weak = scheduler.downgrade();
        assert!(weak.upgrade().is_some());
        drop(scheduler);
        assert!(weak.upgrade().is_none());
    }
}
