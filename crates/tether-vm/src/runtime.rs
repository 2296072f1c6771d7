#![forbid(unsafe_code)]

//! Shared context for view-models.
//!
//! A [`Runtime`] owns the tick scheduler, the watcher batcher, the watcher
//! id allocator, the document, the transition runner and the configuration.
//! Every view-model created from the same runtime shares these.
//!
//! A runtime can be installed as the thread's current runtime with
//! [`Runtime::install`], which [`crate::ViewModel::current`] uses. Tests
//! normally build isolated runtimes and pass them explicitly.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tether_core::{Batcher, Config, Diagnostics, Scheduler, TickReport};
use tether_dom::{Document, EffectRunner, TransitionRunner};

use crate::error::RuntimeError;

thread_local! {
    static CURRENT: RefCell<Option<Runtime>> = const { RefCell::new(None) };
}

/// Unique id of a watcher registration. Never reused within a runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatcherId(u64);

impl WatcherId {
    /// Get the raw id value.
    #[inline]
    pub const fn id(self) -> u64 {
        self.0
    }
}

struct RuntimeInner {
    scheduler: Scheduler,
    batcher: Batcher,
    next_watcher: Cell<u64>,
    document: Document,
    transitions: Rc<dyn TransitionRunner>,
    config: Rc<Config>,
    diagnostics: Diagnostics,
}

/// Shared, clonable runtime handle.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    /// Runtime with default configuration, a fresh document and the default
    /// [`EffectRunner`].
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    #[must_use]
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::default()
    }

    /// The thread's installed runtime, if any.
    #[must_use]
    pub fn current() -> Option<Self> {
        CURRENT.with(|current| current.borrow().clone())
    }

    /// Install as the thread's current runtime until the guard drops.
    pub fn install(&self) -> Result<RuntimeGuard, RuntimeError> {
        CURRENT.with(|current| {
            let mut current = current.borrow_mut();
            if current.is_some() {
                return Err(RuntimeError::AlreadyInstalled);
            }
            *current = Some(self.clone());
            Ok(RuntimeGuard { _private: () })
        })
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    pub fn batcher(&self) -> &Batcher {
        &self.inner.batcher
    }

    pub fn document(&self) -> &Document {
        &self.inner.document
    }

    pub fn config(&self) -> &Rc<Config> {
        &self.inner.config
    }

    pub fn diagnostics(&self) -> Diagnostics {
        self.inner.diagnostics
    }

    pub fn transitions(&self) -> &Rc<dyn TransitionRunner> {
        &self.inner.transitions
    }

    /// Allocate the next watcher id.
    pub fn next_watcher_id(&self) -> WatcherId {
        let id = self.inner.next_watcher.get();
        self.inner.next_watcher.set(id + 1);
        WatcherId(id)
    }

    /// Run one scheduler tick.
    pub fn tick(&self) -> TickReport {
        self.inner.scheduler.tick()
    }

    /// Tick until no work is queued.
    pub fn run_until_idle(&self) -> TickReport {
        self.inner.scheduler.run_until_idle()
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("scheduler", &self.inner.scheduler)
            .field("batcher", &self.inner.batcher)
            .field("next_watcher", &self.inner.next_watcher.get())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Runtime`].
#[derive(Default)]
pub struct RuntimeBuilder {
    config: Option<Config>,
    document: Option<Document>,
    scheduler: Option<Scheduler>,
    transitions: Option<Rc<dyn TransitionRunner>>,
}

impl RuntimeBuilder {
    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    #[must_use]
    pub fn document(mut self, document: Document) -> Self {
        self.document = Some(document);
        self
    }

    #[must_use]
    pub fn scheduler(mut self, scheduler: Scheduler) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    #[must_use]
    pub fn transitions(mut self, runner: Rc<dyn TransitionRunner>) -> Self {
        self.transitions = Some(runner);
        self
    }

    #[must_use]
    pub fn build(self) -> Runtime {
        let config = self.config.unwrap_or_default();
        let scheduler = self.scheduler.unwrap_or_default();
        let diagnostics = Diagnostics::from_config(&config);
        Runtime {
            inner: Rc::new(RuntimeInner {
                batcher: Batcher::new(scheduler.clone()),
                scheduler,
                next_watcher: Cell::new(1),
                document: self.document.unwrap_or_default(),
                transitions: self
                    .transitions
                    .unwrap_or_else(|| Rc::new(EffectRunner::new())),
                config: Rc::new(config),
                diagnostics,
            }),
        }
    }
}

/// Clears the thread's current runtime on drop.
#[must_use = "dropping this guard uninstalls the runtime"]
pub struct RuntimeGuard {
    _private: (),
}

impl Drop for RuntimeGuard {
    fn drop(&mut self) {
        CURRENT.with(|current| current.borrow_mut().take());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watcher_ids_increase() {
        let rt = Runtime::new();
        let a = rt.next_watcher_id();
        let b = rt.next_watcher_id();
        assert!(b > a);
        assert_eq!(a.id(), 1);
    }

    #[test]
    fn runtimes_are_isolated() {
        let a = Runtime::new();
        let b = Runtime::new();
        a.next_watcher_id();
        assert_eq!(b.next_watcher_id().id(), 1);
        assert!(!a.document().ptr_eq(b.document()));
    }

    #[test]
    fn install_and_uninstall() {
        let rt = Runtime::new();
        assert!(Runtime::current().is_none());
        {
            let _guard = rt.install().unwrap();
            assert!(Runtime::current().is_some_and(|c| c.ptr_eq(&rt)));
            assert!(matches!(
                Runtime::new().install(),
                Err(RuntimeError::AlreadyInstalled)
            ));
        }
        assert!(Runtime::current().is_none());
    }

    #[test]
    fn builder_uses_config() {
        let rt = Runtime::builder()
            .config(Config::default().with_debug(true).with_prefix("t"))
            .build();
        assert!(rt.diagnostics().debug);
        assert_eq!(rt.config().prefix, "t");
    }

    #[test]
    fn batcher_flushes_on_runtime_scheduler() {
        let rt = Runtime::new();
        let ran = Rc::new(Cell::new(false));
        let r = Rc::clone(&ran);
        rt.batcher()
            .push(tether_core::Job::overriding(tether_core::JobId(1), move || r.set(true)));
        assert!(!ran.get());
        rt.tick();
        assert!(ran.get());
    }
}
