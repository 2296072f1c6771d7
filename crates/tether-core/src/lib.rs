#![forbid(unsafe_code)]

//! Core reactive plumbing for Tether.
//!
//! - [`keypath`]: dotted-path get/set over [`serde_json::Value`] data.
//! - [`emitter`]: the event bus used for both observers and instance events.
//! - [`scheduler`]: a host-driven next-tick task queue.
//! - [`batcher`]: id-keyed, coalescing job queue flushed on a scheduler tick.
//! - [`config`]: framework configuration with file loading.
//! - [`logging`]: `tracing` helpers gated by configuration.
//!
//! Everything here is single-threaded (`Rc`/`RefCell`). Handles are cheap to
//! clone and share state.

pub mod batcher;
pub mod config;
pub mod emitter;
pub mod keypath;
pub mod logging;
pub mod scheduler;

pub use batcher::{Batcher, Job, JobId};
pub use config::{Config, ConfigError};
pub use emitter::{Emitter, Handler, ListenerId};
pub use keypath::KeypathError;
pub use logging::Diagnostics;
pub use scheduler::{Scheduler, TaskError, TickReport};

/// Re-exported so downstream crates and callers share one `Value` type.
pub use serde_json::{Value, json};
