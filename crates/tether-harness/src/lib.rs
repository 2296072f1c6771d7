#![forbid(unsafe_code)]

//! Test fixtures for Tether.
//!
//! [`Fixture`] owns a runtime and builds instances and mount points on its
//! document. [`EventLog`] records listener, hook and callback activity in
//! call order. [`assert_markup!`] compares a subtree's serialized markup
//! with a readable diff on mismatch.
//!
//! # Example
//!
//! ```
//! use tether::prelude::*;
//! use tether_harness::{EventLog, Fixture};
//!
//! let fx = Fixture::new();
//! let log = EventLog::new();
//! let vm = fx.vm(Options::new()).unwrap();
//! vm.on("ping", log.recorder("vm")).unwrap();
//! vm.emit("ping", &[]).unwrap();
//! assert_eq!(log.entries(), vec!["vm"]);
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use proptest::prelude::*;
use tether::prelude::*;

#[doc(hidden)]
pub mod __private {
    pub use pretty_assertions;
}

/// Assert that the markup of `node` in `doc` equals `expected`.
#[macro_export]
macro_rules! assert_markup {
    ($doc:expr, $node:expr, $expected:expr $(,)?) => {{
        let actual = $doc.outer_html($node);
        $crate::__private::pretty_assertions::assert_eq!(
            actual.as_str(),
            $expected,
            "markup mismatch for node {}",
            $node
        );
    }};
}

/// A runtime plus helpers for building instances on its document.
pub struct Fixture {
    runtime: Runtime,
}

impl Fixture {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Fixture whose runtime uses `config`.
    #[must_use]
    pub fn with_config(config: Config) -> Self {
        Self {
            runtime: Runtime::builder().config(config).build(),
        }
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn doc(&self) -> &Document {
        self.runtime.document()
    }

    /// Append a `<div id="{id}">` to the body and return it.
    pub fn mount(&self, id: &str) -> NodeId {
        let doc = self.doc();
        let el = doc.create_element("div");
        if let Err(err) = doc.set_attribute(el, "id", id) {
            panic!("mount point {id}: {err}");
        }
        if let Err(err) = doc.append_child(doc.body(), el) {
            panic!("mount point {id}: {err}");
        }
        el
    }

    pub fn vm(&self, options: Options) -> Result<ViewModel, VmError> {
        ViewModel::new(&self.runtime, options)
    }

    /// Compile a child of `parent` with empty options.
    pub fn child(&self, parent: &ViewModel) -> Result<ViewModel, VmError> {
        self.vm(Options::new().parent(parent))
    }

    /// Run one scheduler tick and fail on any task error.
    pub fn tick(&self) -> usize {
        match self.runtime.tick().into_result() {
            Ok(ran) => ran,
            Err(err) => panic!("tick failed: {err}"),
        }
    }
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Fixture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fixture")
            .field("pending", &self.runtime.scheduler().pending())
            .finish_non_exhaustive()
    }
}

/// Shared, ordered record of named events.
#[derive(Clone, Default, Debug)]
pub struct EventLog {
    entries: Rc<RefCell<Vec<String>>>,
}

impl EventLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.entries.borrow_mut().push(entry.into());
    }

    /// Event listener that records `name`.
    pub fn recorder(&self, name: &str) -> impl Fn(&[Value]) + 'static {
        let (log, name) = (self.clone(), name.to_owned());
        move |_| log.push(name.clone())
    }

    /// Event listener that records `name` with its arguments, as
    /// `name:arg1,arg2`.
    pub fn recorder_with_args(&self, name: &str) -> impl Fn(&[Value]) + 'static {
        let (log, name) = (self.clone(), name.to_owned());
        move |args| {
            let args: Vec<String> = args.iter().map(Value::to_string).collect();
            log.push(format!("{name}:{}", args.join(",")));
        }
    }

    /// Lifecycle hook that records `name`.
    pub fn hook(&self, name: &str) -> impl Fn(&ViewModel) + 'static {
        let (log, name) = (self.clone(), name.to_owned());
        move |_| log.push(name.clone())
    }

    /// Watch callback that records `name` with its arguments.
    pub fn watcher(&self, name: &str) -> WatchCallback {
        let record = self.recorder_with_args(name);
        watch_callback(move |_, args| record(args))
    }

    /// DOM callback that records `name`.
    pub fn callback(&self, name: &str) -> Option<DomCallback> {
        let (log, name) = (self.clone(), name.to_owned());
        Some(Box::new(move || log.push(name)))
    }

    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.entries.borrow().clone()
    }

    /// Return the entries recorded so far and clear the log.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.entries.borrow_mut())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

/// Dotted keypaths of one to `depth` lowercase segments.
pub fn keypath_strategy(depth: usize) -> impl Strategy<Value = String> {
    prop::collection::vec("[a-z]{1,4}", 1..=depth.max(1)).prop_map(|segments| segments.join("."))
}

/// JSON scalars: null, booleans, integers and short strings.
pub fn scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[a-z ]{0,8}".prop_map(Value::from),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mount_points_are_connected() {
        let fx = Fixture::new();
        let app = fx.mount("app");
        assert!(fx.doc().is_connected(app));
        assert_markup!(fx.doc(), app, r#"<div id="app"></div>"#);
    }

    #[test]
    fn log_take_clears() {
        let log = EventLog::new();
        log.push("a");
        log.recorder_with_args("b")(&[json!(1), json!("x")]);
        assert_eq!(log.take(), vec!["a", r#"b:1,"x""#]);
        assert!(log.is_empty());
    }
}
