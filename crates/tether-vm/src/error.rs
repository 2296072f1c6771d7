#![forbid(unsafe_code)]

use tether_core::KeypathError;
use tether_dom::DomError;

/// Errors from view-model operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VmError {
    /// The instance was created deferred and has not been initialized.
    NotCompiled,
    /// `init` was called on an instance that is already compiled.
    AlreadyCompiled,
    /// The instance has been destroyed.
    Destroyed,
    /// No runtime is installed on this thread.
    NoRuntime,
    /// The `el` option did not resolve to an element.
    ElementNotFound(String),
    /// The `data` option was neither an object nor null.
    InvalidData,
    /// The `parent` option refers to an instance without a compiler.
    ParentNotCompiled,
    /// A keypath write failed.
    Keypath(KeypathError),
    /// A DOM operation failed.
    Dom(DomError),
}

impl std::fmt::Display for VmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotCompiled => write!(f, "view-model is not compiled"),
            Self::AlreadyCompiled => write!(f, "view-model is already compiled"),
            Self::Destroyed => write!(f, "view-model has been destroyed"),
            Self::NoRuntime => write!(f, "no runtime installed on this thread"),
            Self::ElementNotFound(target) => write!(f, "element not found: {target}"),
            Self::InvalidData => write!(f, "data option must be an object"),
            Self::ParentNotCompiled => write!(f, "parent view-model is not compiled"),
            Self::Keypath(err) => write!(f, "keypath error: {err}"),
            Self::Dom(err) => write!(f, "dom error: {err}"),
        }
    }
}

impl std::error::Error for VmError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Keypath(err) => Some(err),
            Self::Dom(err) => Some(err),
            _ => None,
        }
    }
}

impl From<KeypathError> for VmError {
    fn from(err: KeypathError) -> Self {
        Self::Keypath(err)
    }
}

impl From<DomError> for VmError {
    fn from(err: DomError) -> Self {
        Self::Dom(err)
    }
}

/// Errors from runtime installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// Another runtime is already installed on this thread.
    AlreadyInstalled,
}

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyInstalled => write!(f, "a runtime is already installed on this thread"),
        }
    }
}

impl std::error::Error for RuntimeError {}
