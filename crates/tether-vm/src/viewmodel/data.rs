#![forbid(unsafe_code)]

//! Keypath access and change watching.
//!
//! Reads fall back to the parent chain when the own data has no value
//! (`null` counts as a value). Writes only touch the own data.
//!
//! A watcher subscribes to `change:<key>` on the observer. Each raw change
//! pushes an overriding job keyed by the watcher id into the runtime's
//! batcher, so a callback runs at most once per flush with the arguments of
//! the last change. Jobs of a destroyed instance are dropped.

use std::rc::Rc;

use tether_core::{Job, JobId, Value, keypath};

use super::{ViewModel, WatchKey};
use crate::error::VmError;
use crate::runtime::WatcherId;

/// Watch callback. Identity for `unwatch` is the `Rc` allocation.
pub type WatchCallback = Rc<dyn Fn(&ViewModel, &[Value])>;

/// Wrap a closure as a [`WatchCallback`].
pub fn watch_callback(f: impl Fn(&ViewModel, &[Value]) + 'static) -> WatchCallback {
    Rc::new(f)
}

fn watch_key(key: &str, callback: &WatchCallback) -> WatchKey {
    (key.to_owned(), Rc::as_ptr(callback).cast::<()>() as usize)
}

impl ViewModel {
    /// Value at `path`, falling back to ancestors when absent.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<Value> {
        self.trace("$get");
        let own = keypath::get(&self.inner.data.borrow(), path).cloned();
        match own {
            Some(value) => Some(value),
            None => self.parent()?.get(path),
        }
    }

    /// Write `value` at `path` in this instance's data.
    ///
    /// On a compiled instance the observer then receives `change:<path>`
    /// followed by `change:<ancestor>` for each ancestor path, deepest
    /// first, each carrying the current value at that path.
    pub fn set(&self, path: &str, value: Value) -> Result<(), VmError> {
        self.trace("$set");
        if self.is_destroyed() {
            return Err(VmError::Destroyed);
        }
        keypath::set(&mut self.inner.data.borrow_mut(), path, value)?;
        let Ok(compiler) = self.compiler() else {
            return Ok(());
        };
        for changed in std::iter::once(path).chain(keypath::ancestors(path)) {
            let current = keypath::get(&self.inner.data.borrow(), changed)
                .cloned()
                .unwrap_or(Value::Null);
            compiler
                .observer()
                .emit(&format!("change:{changed}"), &[current]);
        }
        Ok(())
    }

    /// Call `callback` after `key` changes, batched per scheduler tick.
    pub fn watch(&self, key: &str, callback: WatchCallback) -> Result<WatcherId, VmError> {
        self.trace("$watch");
        let compiler = self.compiler()?;
        let runtime = self.runtime();
        let id = runtime.next_watcher_id();
        let batcher = runtime.batcher().clone();
        let weak = self.downgrade();
        let table_key = watch_key(key, &callback);

        let listener = compiler.observer().on(&format!("change:{key}"), move |args| {
            let args = args.to_vec();
            let weak = weak.clone();
            let callback = Rc::clone(&callback);
            batcher.push(Job::overriding(JobId(id.id()), move || {
                if let Some(vm) = weak.upgrade()
                    && !vm.is_destroyed()
                {
                    callback(&vm, &args);
                }
            }));
        });
        self.inner
            .watchers
            .borrow_mut()
            .entry(table_key)
            .or_default()
            .push(listener);
        if runtime.diagnostics().debug {
            tracing::trace!(target: "tether::vm", key, watcher = id.id(), "watch");
        }
        Ok(id)
    }

    /// Stop watching `key`.
    ///
    /// With `Some(callback)` only the registrations of that callback are
    /// removed; with `None` every listener on `change:<key>` is. Returns
    /// the number of listeners removed.
    pub fn unwatch(&self, key: &str, callback: Option<&WatchCallback>) -> Result<usize, VmError> {
        self.trace("$unwatch");
        let compiler = self.compiler()?;
        let event = format!("change:{key}");
        let removed = match callback {
            Some(callback) => {
                let listeners = self
                    .inner
                    .watchers
                    .borrow_mut()
                    .remove(&watch_key(key, callback))
                    .unwrap_or_default();
                listeners
                    .into_iter()
                    .map(|listener| compiler.observer().off(&event, Some(listener)))
                    .sum()
            }
            None => {
                self.inner
                    .watchers
                    .borrow_mut()
                    .retain(|(watched, _), _| watched != key);
                compiler.observer().off(&event, None)
            }
        };
        Ok(removed)
    }
}
