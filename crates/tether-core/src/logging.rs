#![forbid(unsafe_code)]

//! Diagnostics gated by the `debug` and `silent` config switches.
//!
//! Instance methods report themselves through [`Diagnostics::call`] when
//! `debug` is on, and misuse is reported through [`Diagnostics::warn`]
//! unless `silent` is on. Both go through `tracing`; nothing is printed
//! unless the host installs a subscriber.
//!
//! With the `tracing-json` feature, [`init_json_subscriber`] installs a JSON
//! formatter filtered by `RUST_LOG`.

use crate::config::Config;

/// Target used for per-call instance traces.
pub const VM_TARGET: &str = "tether::vm";

/// Copy of the diagnostic switches from a [`Config`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Diagnostics {
    /// Trace every instance method call.
    pub debug: bool,
    /// Drop warnings.
    pub silent: bool,
}

impl Diagnostics {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            debug: config.debug,
            silent: config.silent,
        }
    }

    /// Record an instance method call. Returns whether it was traced.
    pub fn call(&self, method: &str) -> bool {
        if !self.debug {
            return false;
        }
        tracing::trace!(target: VM_TARGET, method, "call");
        true
    }

    /// Record a warning. Returns whether it was emitted.
    pub fn warn(&self, message: &str) -> bool {
        if self.silent {
            return false;
        }
        tracing::warn!(target: VM_TARGET, "{message}");
        true
    }
}

/// Install a global JSON subscriber filtered by `RUST_LOG`.
///
/// Returns `false` if a global subscriber was already installed.
#[cfg(feature = "tracing-json")]
pub fn init_json_subscriber() -> bool {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_warn_but_do_not_trace() {
        let diag = Diagnostics::from_config(&Config::default());
        assert!(!diag.call("$get"));
        assert!(diag.warn("something odd"));
    }

    #[test]
    fn debug_traces_calls() {
        let diag = Diagnostics::from_config(&Config::default().with_debug(true));
        assert!(diag.call("$set"));
    }

    #[test]
    fn silent_drops_warnings() {
        let diag = Diagnostics::from_config(&Config::default().with_silent(true));
        assert!(!diag.warn("ignored"));
    }
}
