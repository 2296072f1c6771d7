#![forbid(unsafe_code)]

//! Tether: reactive view-models bound to a document.
//!
//! This crate re-exports the workspace crates and offers a [`prelude`].
//!
//! ```
//! use tether::prelude::*;
//!
//! let rt = Runtime::new();
//! let parent = ViewModel::new(&rt, Options::new().data(json!({ "user": { "name": "ada" } }))).unwrap();
//! let child = ViewModel::new(&rt, Options::new().parent(&parent)).unwrap();
//! assert_eq!(child.get("user.name"), Some(json!("ada")));
//!
//! child.append_to(rt.document().body(), None).unwrap();
//! assert!(rt.document().is_connected(child.el().unwrap()));
//! ```

pub use tether_core as core;
pub use tether_dom as dom;
pub use tether_vm as vm;

pub use tether_core::{Config, ConfigError, Value, json};
pub use tether_dom::{Document, DomError, NodeId, Target, TransitionCode};
pub use tether_vm::{Options, Runtime, ViewModel, VmError};

pub mod prelude {
    //! Common imports.

    pub use tether_core::{Config, ListenerId, Value, json};
    pub use tether_dom::{
        Direction, Document, DomError, Done, EffectRegistry, JsEffect, NodeId, Target,
        TransitionCode, TransitionEffect,
    };
    pub use tether_vm::{
        DomCallback, LifecycleHook, Options, Runtime, ViewModel, VmError, WatchCallback,
        WatcherId, watch_callback,
    };
}
