#![forbid(unsafe_code)]

//! View-model instances.
//!
//! A [`ViewModel`] binds a JSON data object to an element in the runtime's
//! document, notifies watchers of data changes through a batched scheduler,
//! and takes part in a parent/child tree with scoped event propagation.
//!
//! ```
//! use tether_vm::{Options, Runtime, ViewModel, watch_callback};
//! use tether_core::json;
//!
//! let rt = Runtime::new();
//! let vm = ViewModel::new(&rt, Options::new().data(json!({ "count": 0 }))).unwrap();
//! vm.watch("count", watch_callback(|_, args| println!("count -> {}", args[0]))).unwrap();
//! vm.set("count", json!(1)).unwrap();
//! vm.set("count", json!(2)).unwrap();
//! rt.tick(); // prints "count -> 2" once
//! ```

pub mod compiler;
pub mod error;
pub mod options;
pub mod runtime;
pub mod viewmodel;

pub use compiler::Compiler;
pub use error::{RuntimeError, VmError};
pub use options::{Hook, LifecycleHook, Options};
pub use runtime::{Runtime, RuntimeBuilder, RuntimeGuard, WatcherId};
pub use viewmodel::{DomCallback, ViewModel, WatchCallback, WeakViewModel, watch_callback};
