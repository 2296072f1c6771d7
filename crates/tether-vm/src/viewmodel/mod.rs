#![forbid(unsafe_code)]

//! The view-model handle.
//!
//! A [`ViewModel`] pairs a JSON data envelope with a [`Compiler`]. The data
//! is a plain `serde_json::Value` object, so serializing it never exposes
//! instance methods; everything else is reached through methods on the
//! handle.
//!
//! # Lifecycle
//!
//! ```text
//! deferred() ──init()──▶ Compiled ──destroy()──▶ Destroyed
//! new() ────────────────▶ Compiled
//! ```
//!
//! Operations split across submodules:
//!
//! - `data`: `get`, `set`, `watch`, `unwatch`
//! - `events`: `emit`, `on`, `once`, `off`, `broadcast`, `dispatch`
//! - `dom`: `append_to`, `remove`, `before`, `after`
//!
//! # Invariants
//!
//! 1. No `RefCell` borrow on the instance is held while user code runs
//!    (hooks, listeners, watch callbacks, DOM callbacks).
//! 2. A destroyed instance never becomes compiled again.
//! 3. The data envelope is always a JSON object.

mod data;
mod dom;
mod events;

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use ahash::AHashMap;
use tether_core::{ListenerId, Value};
use tether_dom::NodeId;

use crate::compiler::Compiler;
use crate::error::VmError;
use crate::options::Options;
use crate::runtime::Runtime;

pub use data::{WatchCallback, watch_callback};
pub use dom::DomCallback;

pub(crate) enum State {
    Uncompiled,
    Compiled(Rc<Compiler>),
    Destroyed,
}

/// `(keypath, callback allocation)` identifying one watch registration.
pub(crate) type WatchKey = (String, usize);

pub(crate) struct VmInner {
    runtime: Runtime,
    pub(crate) data: RefCell<Value>,
    pub(crate) state: RefCell<State>,
    pub(crate) el: Cell<Option<NodeId>>,
    pub(crate) watchers: RefCell<AHashMap<WatchKey, Vec<ListenerId>>>,
}

/// Shared view-model handle. Clones refer to the same instance.
#[derive(Clone)]
pub struct ViewModel {
    pub(crate) inner: Rc<VmInner>,
}

/// Non-owning view-model handle.
#[derive(Clone)]
pub struct WeakViewModel {
    inner: Weak<VmInner>,
}

impl WeakViewModel {
    #[must_use]
    pub fn upgrade(&self) -> Option<ViewModel> {
        self.inner.upgrade().map(|inner| ViewModel { inner })
    }
}

impl ViewModel {
    /// Create and compile an instance.
    pub fn new(runtime: &Runtime, options: Options) -> Result<Self, VmError> {
        let vm = Self::deferred(runtime);
        vm.init(options)?;
        Ok(vm)
    }

    /// Create an instance without compiling it. Call [`ViewModel::init`]
    /// later.
    #[must_use]
    pub fn deferred(runtime: &Runtime) -> Self {
        runtime.diagnostics().call("new");
        Self {
            inner: Rc::new(VmInner {
                runtime: runtime.clone(),
                data: RefCell::new(Value::Object(Default::default())),
                state: RefCell::new(State::Uncompiled),
                el: Cell::new(None),
                watchers: RefCell::new(AHashMap::new()),
            }),
        }
    }

    /// Create and compile an instance on the thread's installed runtime.
    pub fn current(options: Options) -> Result<Self, VmError> {
        let runtime = Runtime::current().ok_or(VmError::NoRuntime)?;
        Self::new(&runtime, options)
    }

    /// Compile a deferred instance.
    pub fn init(&self, options: Options) -> Result<(), VmError> {
        let diagnostics = self.runtime().diagnostics();
        diagnostics.call("$init");
        match &*self.inner.state.borrow() {
            State::Uncompiled => {}
            State::Compiled(_) => {
                diagnostics.warn("$init called on a compiled view-model");
                return Err(VmError::AlreadyCompiled);
            }
            State::Destroyed => return Err(VmError::Destroyed),
        }
        Compiler::build(self, options).map(drop)
    }

    /// Tear the instance down.
    ///
    /// Runs `before_destroy`, drops every watcher, destroys children last
    /// to first, unlinks from the parent, removes the element through the
    /// transition runner unless `preserve_dom`, then runs `after_destroy`
    /// and drops every event listener. Destroying twice, or from a hook
    /// or listener while teardown runs, is a no-op.
    ///
    /// Teardown always finishes. If a child or the element removal fails,
    /// the instance is still destroyed and the first error is returned.
    ///
    /// With a deferred leave transition (a CSS effect on an attached
    /// element) the element is removed on a later tick, so the `detached`
    /// hook runs after `after_destroy`, on the destroyed instance.
    pub fn destroy(&self, preserve_dom: bool) -> Result<(), VmError> {
        self.trace("$destroy");
        let compiler = match &*self.inner.state.borrow() {
            State::Uncompiled => return Err(VmError::NotCompiled),
            State::Destroyed => return Ok(()),
            State::Compiled(compiler) => Rc::clone(compiler),
        };
        compiler.destroy(self, preserve_dom)
    }

    /// The compiler of a compiled instance.
    pub fn compiler(&self) -> Result<Rc<Compiler>, VmError> {
        match &*self.inner.state.borrow() {
            State::Compiled(compiler) => Ok(Rc::clone(compiler)),
            State::Uncompiled => Err(VmError::NotCompiled),
            State::Destroyed => Err(VmError::Destroyed),
        }
    }

    pub fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }

    /// The bound element. Kept after destruction.
    #[must_use]
    pub fn el(&self) -> Option<NodeId> {
        self.inner.el.get()
    }

    #[must_use]
    pub fn parent(&self) -> Option<ViewModel> {
        self.compiler().ok()?.parent_vm()
    }

    /// Topmost ancestor, or `self`.
    #[must_use]
    pub fn root(&self) -> ViewModel {
        let mut current = self.clone();
        while let Some(parent) = current.parent() {
            current = parent;
        }
        current
    }

    /// Live children in registration order.
    #[must_use]
    pub fn children(&self) -> Vec<ViewModel> {
        self.compiler()
            .map(|c| c.children.borrow().iter().map(|link| link.vm.clone()).collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn is_compiled(&self) -> bool {
        matches!(*self.inner.state.borrow(), State::Compiled(_))
    }

    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        matches!(*self.inner.state.borrow(), State::Destroyed)
    }

    /// Snapshot of the data envelope.
    #[must_use]
    pub fn data(&self) -> Value {
        self.inner.data.borrow().clone()
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakViewModel {
        WeakViewModel {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Whether two handles refer to the same instance.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn trace(&self, method: &str) {
        self.inner.runtime.diagnostics().call(method);
    }
}

impl std::fmt::Debug for ViewModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &*self.inner.state.borrow() {
            State::Uncompiled => "uncompiled",
            State::Compiled(_) => "compiled",
            State::Destroyed => "destroyed",
        };
        f.debug_struct("ViewModel")
            .field("state", &state)
            .field("el", &self.el())
            .field("data", &*self.inner.data.borrow())
            .finish()
    }
}
