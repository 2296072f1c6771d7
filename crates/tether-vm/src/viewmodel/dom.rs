#![forbid(unsafe_code)]

//! DOM attachment through the transition runner.
//!
//! Each method resolves its target up front, then hands the runner a
//! completion that performs the mutation, queues the caller's callback for
//! the next tick, and runs the `attached` or `detached` hook. The returned
//! [`TransitionCode`] tells which transition path was taken.
//!
//! A target that resolves to nothing fails inside the completion with
//! [`DomError::NotFound`]; a target without a parent fails `before`/`after`
//! with [`DomError::NoParent`]. A malformed selector fails immediately.

use std::rc::Rc;

use tether_dom::{
    Completion, Direction, Document, DomError, NodeId, Target, TransitionCode,
};

use super::ViewModel;
use crate::compiler::Compiler;
use crate::error::VmError;
use crate::options::LifecycleHook;

/// Callback run on the tick after an attachment completes.
pub type DomCallback = Box<dyn FnOnce()>;

impl ViewModel {
    /// Append the element to `target` with an enter transition.
    pub fn append_to(
        &self,
        target: impl Into<Target>,
        cb: Option<DomCallback>,
    ) -> Result<TransitionCode, VmError> {
        self.trace("$appendTo");
        let target = target.into();
        let resolved = self.resolve(&target)?;
        self.transition(Direction::Enter, cb, move |doc, el| {
            let parent = resolved.ok_or_else(|| not_found(&target))?;
            doc.append_child(parent, el)
        })
    }

    /// Detach the element with a leave transition. A detached element is
    /// left as is.
    pub fn remove(&self, cb: Option<DomCallback>) -> Result<TransitionCode, VmError> {
        self.trace("$remove");
        self.transition(Direction::Leave, cb, |doc, el| match doc.parent_node(el) {
            Some(parent) => doc.remove_child(parent, el),
            None => Ok(()),
        })
    }

    /// Insert the element just before `target`.
    pub fn before(
        &self,
        target: impl Into<Target>,
        cb: Option<DomCallback>,
    ) -> Result<TransitionCode, VmError> {
        self.trace("$before");
        let target = target.into();
        let resolved = self.resolve(&target)?;
        self.transition(Direction::Enter, cb, move |doc, el| {
            let anchor = resolved.ok_or_else(|| not_found(&target))?;
            let parent = doc.parent_node(anchor).ok_or(DomError::NoParent(anchor))?;
            doc.insert_before(parent, el, Some(anchor))
        })
    }

    /// Insert the element just after `target`.
    pub fn after(
        &self,
        target: impl Into<Target>,
        cb: Option<DomCallback>,
    ) -> Result<TransitionCode, VmError> {
        self.trace("$after");
        let target = target.into();
        let resolved = self.resolve(&target)?;
        self.transition(Direction::Enter, cb, move |doc, el| {
            let anchor = resolved.ok_or_else(|| not_found(&target))?;
            let parent = doc.parent_node(anchor).ok_or(DomError::NoParent(anchor))?;
            doc.insert_before(parent, el, doc.next_sibling(anchor))
        })
    }

    fn resolve(&self, target: &Target) -> Result<Option<NodeId>, VmError> {
        let resolved = target.resolve(self.runtime().document())?;
        if resolved.is_none() {
            self.runtime()
                .diagnostics()
                .warn(&format!("attachment target {target:?} not found"));
        }
        Ok(resolved)
    }

    fn transition(
        &self,
        direction: Direction,
        cb: Option<DomCallback>,
        mutate: impl FnOnce(&Document, NodeId) -> Result<(), DomError> + 'static,
    ) -> Result<TransitionCode, VmError> {
        let compiler = self.compiler()?;
        let runtime = self.runtime();
        let el = compiler.el();
        let completion = self.completion(&compiler, direction, el, cb, mutate);
        let ctx = compiler.transition_context(runtime);
        Ok(runtime.transitions().run(el, direction, completion, &ctx)?)
    }

    fn completion(
        &self,
        compiler: &Rc<Compiler>,
        direction: Direction,
        el: NodeId,
        cb: Option<DomCallback>,
        mutate: impl FnOnce(&Document, NodeId) -> Result<(), DomError> + 'static,
    ) -> Completion {
        let document = self.runtime().document().clone();
        let scheduler = self.runtime().scheduler().clone();
        let compiler = Rc::clone(compiler);
        let vm = self.downgrade();
        let hook = match direction {
            Direction::Enter => LifecycleHook::Attached,
            Direction::Leave => LifecycleHook::Detached,
        };
        Box::new(move || {
            mutate(&document, el)?;
            if let Some(cb) = cb {
                scheduler.next_tick(cb);
            }
            if let Some(vm) = vm.upgrade() {
                compiler.exec_hook(&vm, hook);
            }
            Ok(())
        })
    }
}

fn not_found(target: &Target) -> DomError {
    DomError::NotFound(match target {
        Target::Selector(selector) => format!("no element matches '{selector}'"),
        Target::Node(node) => format!("node {node}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Options;
    use crate::runtime::Runtime;
    use std::cell::{Cell, RefCell};
    use tether_core::json;
    use tether_dom::TransitionEffect;

    fn flag() -> (Rc<Cell<bool>>, Option<DomCallback>) {
        let flag = Rc::new(Cell::new(false));
        let f = Rc::clone(&flag);
        let cb: DomCallback = Box::new(move || f.set(true));
        (flag, Some(cb))
    }

    fn container(rt: &Runtime, id: &str) -> NodeId {
        let doc = rt.document();
        let el = doc.create_element("div");
        doc.set_attribute(el, "id", id).unwrap();
        doc.append_child(doc.body(), el).unwrap();
        el
    }

    #[test]
    fn append_to_selector_defers_callback() {
        let rt = Runtime::new();
        let target = container(&rt, "target");
        let vm = ViewModel::new(&rt, Options::new()).unwrap();
        let (ran, cb) = flag();

        let code = vm.append_to("#target", cb).unwrap();
        assert_eq!(code, TransitionCode::Skip);
        assert_eq!(rt.document().parent_node(vm.el().unwrap()), Some(target));
        assert!(!ran.get(), "callback never runs inside the call");

        rt.tick();
        assert!(ran.get());
    }

    #[test]
    fn before_and_after_place_relative_to_target() {
        let rt = Runtime::new();
        let doc = rt.document().clone();
        let anchor = container(&rt, "anchor");
        let first = ViewModel::new(&rt, Options::new()).unwrap();
        let second = ViewModel::new(&rt, Options::new()).unwrap();
        let third = ViewModel::new(&rt, Options::new()).unwrap();

        first.before("#anchor", None).unwrap();
        second.after(anchor, None).unwrap();
        third.after("#anchor", None).unwrap();

        assert_eq!(
            doc.children(doc.body()),
            vec![first.el().unwrap(), anchor, third.el().unwrap(), second.el().unwrap()]
        );
    }

    #[test]
    fn remove_detached_element_still_schedules_callback() {
        let rt = Runtime::new();
        let vm = ViewModel::new(&rt, Options::new()).unwrap();
        let (ran, cb) = flag();
        vm.remove(cb).unwrap();
        rt.tick();
        assert!(ran.get());
    }

    #[test]
    fn missing_target_fails_at_mutation() {
        let rt = Runtime::new();
        let vm = ViewModel::new(&rt, Options::new()).unwrap();
        assert!(matches!(
            vm.append_to("#nowhere", None),
            Err(VmError::Dom(DomError::NotFound(_)))
        ));
        assert!(matches!(
            vm.append_to("#bad >", None),
            Err(VmError::Dom(DomError::InvalidSelector(_)))
        ));
        let detached = rt.document().create_element("p");
        assert_eq!(
            vm.before(detached, None),
            Err(VmError::Dom(DomError::NoParent(detached)))
        );
    }

    #[test]
    fn attach_and_detach_hooks_fire() {
        let rt = Runtime::new();
        container(&rt, "app");
        let log = Rc::new(RefCell::new(Vec::new()));
        let (a, d) = (Rc::clone(&log), Rc::clone(&log));
        let vm = ViewModel::new(
            &rt,
            Options::new()
                .hook(LifecycleHook::Attached, move |_| a.borrow_mut().push("attached"))
                .hook(LifecycleHook::Detached, move |_| d.borrow_mut().push("detached")),
        )
        .unwrap();

        vm.append_to("#app", None).unwrap();
        vm.remove(None).unwrap();
        assert_eq!(*log.borrow(), vec!["attached", "detached"]);
    }

    #[test]
    fn css_leave_completes_on_tick() {
        let rt = Runtime::new();
        let target = container(&rt, "list");
        let vm = ViewModel::new(
            &rt,
            Options::new()
                .effect(TransitionEffect::css("fade"))
                .data(json!({})),
        )
        .unwrap();
        let el = vm.el().unwrap();
        let doc = rt.document();

        assert_eq!(vm.append_to(target, None).unwrap(), TransitionCode::CssEnter);
        assert!(doc.has_class(el, "fade-enter"));
        rt.tick();

        let (ran, cb) = flag();
        assert_eq!(vm.remove(cb).unwrap(), TransitionCode::CssLeave);
        assert!(doc.is_connected(el));
        assert!(doc.has_class(el, "fade-leave"));

        rt.tick();
        assert!(!doc.is_connected(el));
        assert!(!ran.get(), "callback waits one more tick");
        rt.tick();
        assert!(ran.get());
    }

    #[test]
    fn dom_methods_require_compiler() {
        let rt = Runtime::new();
        let vm = ViewModel::deferred(&rt);
        assert_eq!(vm.remove(None), Err(VmError::NotCompiled));
    }
}
