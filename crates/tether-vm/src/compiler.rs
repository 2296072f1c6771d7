#![forbid(unsafe_code)]

//! Builds and tears down a live view-model.
//!
//! The [`Compiler`] owns what a compiled instance needs beyond its data:
//! the change observer, the instance event bus, the bound element, the links
//! to its parent and children, and its lifecycle hooks.
//!
//! # Invariants
//!
//! 1. A child link is created only while compiling a child with a compiled
//!    parent, so the instance tree is acyclic.
//! 2. Parents hold strong child links; children hold a weak parent link.
//! 3. `destroy` runs at most once. Calls made while teardown is running,
//!    from hooks or listeners, and calls after it are no-ops.
//! 4. Teardown always completes once started; a DOM removal error is
//!    returned after the instance is marked destroyed.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Result |
//! |---------|-------|--------|
//! | Unresolvable `el` | selector matches nothing | `VmError::ElementNotFound` |
//! | Non-element `el` | `el` names a text node | `DomError::NotAnElement` |
//! | Bad data | `data` is a scalar or array | `VmError::InvalidData` |
//! | Bad parent | parent deferred or destroyed | `VmError::ParentNotCompiled` |

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tether_core::{Emitter, Value};
use tether_dom::{DomError, EffectRegistry, NodeId, Target, TransitionContext, TransitionEffect};

use crate::error::VmError;
use crate::options::{Hook, LifecycleHook, Options};
use crate::runtime::Runtime;
use crate::viewmodel::{State, ViewModel, WeakViewModel};

/// Link from a child to its parent.
pub(crate) struct ParentLink {
    pub(crate) vm: WeakViewModel,
}

/// Link from a parent to a child.
#[derive(Clone)]
pub(crate) struct ChildLink {
    pub(crate) vm: ViewModel,
    pub(crate) emitter: Emitter,
}

/// Compiled state of a view-model.
pub struct Compiler {
    observer: Emitter,
    emitter: Emitter,
    el: NodeId,
    parent: Option<ParentLink>,
    pub(crate) children: RefCell<Vec<ChildLink>>,
    effect: Option<TransitionEffect>,
    effects: Rc<EffectRegistry>,
    hooks: Vec<(LifecycleHook, Hook)>,
    compiling: Cell<bool>,
    destroying: Cell<bool>,
    destroyed: Cell<bool>,
}

impl Compiler {
    /// Compile `vm` with `options` and store the result on it.
    pub(crate) fn build(vm: &ViewModel, options: Options) -> Result<Rc<Self>, VmError> {
        let runtime = vm.runtime().clone();
        let _span = tracing::debug_span!(target: "tether::vm", "compile").entered();

        let el = resolve_element(&runtime, &options)?;
        let data = match options.data {
            Value::Object(map) => map,
            Value::Null => Default::default(),
            _ => return Err(VmError::InvalidData),
        };
        let parent = match &options.parent {
            Some(parent) => {
                let parent_compiler = parent.compiler().map_err(|_| VmError::ParentNotCompiled)?;
                Some((parent.clone(), parent_compiler))
            }
            None => None,
        };

        {
            let mut own = vm.inner.data.borrow_mut();
            if let Value::Object(own) = &mut *own {
                own.extend(data);
            }
        }

        let compiler = Rc::new(Self {
            observer: Emitter::new(),
            emitter: Emitter::new(),
            el,
            parent: parent.as_ref().map(|(vm, _)| ParentLink { vm: vm.downgrade() }),
            children: RefCell::new(Vec::new()),
            effect: options.effect,
            effects: Rc::new(options.effects),
            hooks: options.hooks,
            compiling: Cell::new(true),
            destroying: Cell::new(false),
            destroyed: Cell::new(false),
        });
        vm.inner.el.set(Some(el));
        *vm.inner.state.borrow_mut() = State::Compiled(Rc::clone(&compiler));

        if let Some((_, parent_compiler)) = &parent {
            parent_compiler.children.borrow_mut().push(ChildLink {
                vm: vm.clone(),
                emitter: compiler.emitter.clone(),
            });
        }

        compiler.exec_hook(vm, LifecycleHook::Created);
        compiler.exec_hook(vm, LifecycleHook::Ready);
        compiler.compiling.set(false);
        tracing::debug!(target: "tether::vm", %el, "compiled");
        Ok(compiler)
    }

    /// Change observer raising `change:<keypath>` events.
    pub fn observer(&self) -> &Emitter {
        &self.observer
    }

    /// Instance event bus.
    pub fn emitter(&self) -> &Emitter {
        &self.emitter
    }

    pub fn el(&self) -> NodeId {
        self.el
    }

    /// Whether construction is still running.
    pub fn is_compiling(&self) -> bool {
        self.compiling.get()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    pub fn child_count(&self) -> usize {
        self.children.borrow().len()
    }

    pub(crate) fn parent_vm(&self) -> Option<ViewModel> {
        self.parent.as_ref()?.vm.upgrade()
    }

    /// Run the option hooks for `point`, then emit `hook:<name>`.
    pub(crate) fn exec_hook(&self, vm: &ViewModel, point: LifecycleHook) {
        for (_, hook) in self.hooks.iter().filter(|(p, _)| *p == point) {
            hook(vm);
        }
        self.emitter.emit(&format!("hook:{}", point.name()), &[]);
    }

    pub(crate) fn transition_context(&self, runtime: &Runtime) -> TransitionContext {
        TransitionContext {
            document: runtime.document().clone(),
            scheduler: runtime.scheduler().clone(),
            config: Rc::clone(runtime.config()),
            effects: Rc::clone(&self.effects),
            effect: self.effect.clone(),
            compiling: self.compiling.get(),
        }
    }

    /// Tear down `vm`. See [`ViewModel::destroy`].
    pub(crate) fn destroy(&self, vm: &ViewModel, preserve_dom: bool) -> Result<(), VmError> {
        if self.destroying.replace(true) {
            return Ok(());
        }
        let _span = tracing::debug_span!(target: "tether::vm", "destroy", el = %self.el).entered();

        self.exec_hook(vm, LifecycleHook::BeforeDestroy);

        self.observer.off_all();
        vm.inner.watchers.borrow_mut().clear();

        let mut result = Ok(());
        let children = self.children.borrow().clone();
        for child in children.iter().rev() {
            result = result.and(child.vm.destroy(false));
        }

        if let Some(parent) = self.parent_vm()
            && let Ok(parent_compiler) = parent.compiler()
        {
            parent_compiler
                .children
                .borrow_mut()
                .retain(|link| !link.vm.ptr_eq(vm));
        }

        if !preserve_dom {
            result = result.and(vm.remove(None).map(drop));
        }

        self.destroyed.set(true);
        *vm.inner.state.borrow_mut() = State::Destroyed;
        self.exec_hook(vm, LifecycleHook::AfterDestroy);
        self.emitter.off_all();
        match &result {
            Ok(()) => tracing::debug!(target: "tether::vm", "destroyed"),
            Err(err) => tracing::debug!(target: "tether::vm", %err, "destroyed with error"),
        }
        result
    }
}

impl std::fmt::Debug for Compiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compiler")
            .field("el", &self.el)
            .field("children", &self.child_count())
            .field("compiling", &self.compiling.get())
            .field("destroyed", &self.destroyed.get())
            .finish_non_exhaustive()
    }
}

fn resolve_element(runtime: &Runtime, options: &Options) -> Result<NodeId, VmError> {
    let document = runtime.document();
    let Some(target) = &options.el else {
        return Ok(document.create_element(options.tag.as_deref().unwrap_or("div")));
    };
    let node = target.resolve(document)?.ok_or_else(|| {
        VmError::ElementNotFound(match target {
            Target::Selector(selector) => selector.clone(),
            Target::Node(node) => node.to_string(),
        })
    })?;
    if !document.is_element(node) {
        return Err(DomError::NotAnElement(node).into());
    }
    Ok(node)
}
