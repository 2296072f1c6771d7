#![forbid(unsafe_code)]

//! Instance events and propagation through the instance tree.

use tether_core::{ListenerId, Value};

use super::ViewModel;
use crate::error::VmError;

impl ViewModel {
    /// Emit `event` on this instance only. Returns the listeners invoked.
    pub fn emit(&self, event: &str, args: &[Value]) -> Result<usize, VmError> {
        self.trace("$emit");
        Ok(self.compiler()?.emitter().emit(event, args))
    }

    pub fn on(&self, event: &str, handler: impl Fn(&[Value]) + 'static) -> Result<ListenerId, VmError> {
        self.trace("$on");
        Ok(self.compiler()?.emitter().on(event, handler))
    }

    /// Listen for the next `event` only.
    pub fn once(
        &self,
        event: &str,
        handler: impl Fn(&[Value]) + 'static,
    ) -> Result<ListenerId, VmError> {
        self.trace("$once");
        Ok(self.compiler()?.emitter().once(event, handler))
    }

    /// Remove one listener, or all listeners for `event` when `None`.
    pub fn off(&self, event: &str, listener: Option<ListenerId>) -> Result<usize, VmError> {
        self.trace("$off");
        Ok(self.compiler()?.emitter().off(event, listener))
    }

    /// Emit `event` on every descendant.
    ///
    /// Children are visited last to first; each child receives the event
    /// before its own descendants. The child list is snapshotted first, and
    /// children destroyed meanwhile are skipped.
    pub fn broadcast(&self, event: &str, args: &[Value]) -> Result<(), VmError> {
        self.trace("$broadcast");
        let children = self.compiler()?.children.borrow().clone();
        for child in children.iter().rev() {
            if child.vm.is_destroyed() {
                continue;
            }
            child.emitter.emit(event, args);
            if child.vm.is_destroyed() {
                continue;
            }
            child.vm.broadcast(event, args)?;
        }
        Ok(())
    }

    /// Emit `event` on this instance, then on each ancestor up to the root.
    pub fn dispatch(&self, event: &str, args: &[Value]) -> Result<(), VmError> {
        self.trace("$dispatch");
        let compiler = self.compiler()?;
        compiler.emitter().emit(event, args);
        match compiler.parent_vm() {
            Some(parent) if !parent.is_destroyed() => parent.dispatch(event, args),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Options;
    use crate::runtime::Runtime;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::rc::Rc;
    use tether_core::json;

    type Log = Rc<RefCell<Vec<String>>>;

    fn listen(vm: &ViewModel, name: &str, event: &str, log: &Log) {
        let (name, log) = (name.to_owned(), Rc::clone(log));
        vm.on(event, move |_| log.borrow_mut().push(name.clone()))
            .unwrap();
    }

    #[test]
    fn emit_on_off_once() {
        let rt = Runtime::new();
        let vm = ViewModel::new(&rt, Options::new()).unwrap();
        let got = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&got);
        let id = vm
            .on("ping", move |args| sink.borrow_mut().push(args.to_vec()))
            .unwrap();
        let sink = Rc::clone(&got);
        vm.once("ping", move |_| sink.borrow_mut().push(vec![json!("once")]))
            .unwrap();

        assert_eq!(vm.emit("ping", &[json!(1), json!(2)]).unwrap(), 2);
        assert_eq!(vm.emit("ping", &[json!(3)]).unwrap(), 1);
        assert_eq!(vm.off("ping", Some(id)).unwrap(), 1);
        assert_eq!(vm.emit("ping", &[]).unwrap(), 0);
        assert_eq!(
            *got.borrow(),
            vec![vec![json!(1), json!(2)], vec![json!("once")], vec![json!(3)]]
        );
    }

    #[test]
    fn broadcast_order_is_reverse_depth_first() {
        let rt = Runtime::new();
        let root = ViewModel::new(&rt, Options::new()).unwrap();
        let a = ViewModel::new(&rt, Options::new().parent(&root)).unwrap();
        let b = ViewModel::new(&rt, Options::new().parent(&root)).unwrap();
        let a1 = ViewModel::new(&rt, Options::new().parent(&a)).unwrap();

        let log = Log::default();
        for (name, vm) in [("root", &root), ("a", &a), ("b", &b), ("a1", &a1)] {
            listen(vm, name, "x", &log);
        }
        root.broadcast("x", &[]).unwrap();
        assert_eq!(*log.borrow(), vec!["b", "a", "a1"]);
    }

    #[test]
    fn dispatch_walks_ancestors_only() {
        let rt = Runtime::new();
        let root = ViewModel::new(&rt, Options::new()).unwrap();
        let mid = ViewModel::new(&rt, Options::new().parent(&root)).unwrap();
        let sibling = ViewModel::new(&rt, Options::new().parent(&root)).unwrap();
        let leaf = ViewModel::new(&rt, Options::new().parent(&mid)).unwrap();

        let log = Log::default();
        for (name, vm) in [("root", &root), ("mid", &mid), ("sibling", &sibling), ("leaf", &leaf)] {
            listen(vm, name, "y", &log);
        }
        leaf.dispatch("y", &[json!("payload")]).unwrap();
        assert_eq!(*log.borrow(), vec!["leaf", "mid", "root"]);
    }

    #[test]
    fn broadcast_skips_child_destroyed_mid_walk() {
        let rt = Runtime::new();
        let root = ViewModel::new(&rt, Options::new()).unwrap();
        let a = ViewModel::new(&rt, Options::new().parent(&root)).unwrap();
        let b = ViewModel::new(&rt, Options::new().parent(&root)).unwrap();

        let log = Log::default();
        listen(&a, "a", "x", &log);
        let victim = a.clone();
        let sink = Rc::clone(&log);
        b.on("x", move |_| {
            sink.borrow_mut().push("b".into());
            victim.destroy(true).unwrap();
        })
        .unwrap();

        root.broadcast("x", &[]).unwrap();
        assert_eq!(*log.borrow(), vec!["b"]);
        assert_eq!(root.children().len(), 1);
    }

    #[test]
    fn events_require_compiler() {
        let rt = Runtime::new();
        let vm = ViewModel::deferred(&rt);
        assert_eq!(vm.emit("x", &[]), Err(VmError::NotCompiled));
        assert_eq!(vm.broadcast("x", &[]), Err(VmError::NotCompiled));
        assert_eq!(vm.dispatch("x", &[]), Err(VmError::NotCompiled));
    }
}
