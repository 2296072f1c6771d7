#![forbid(unsafe_code)]

//! DOM host for Tether view-models.
//!
//! - [`document`]: an arena-backed in-memory document.
//! - [`selector`]: the CSS selector subset used by `query_selector`.
//! - [`transition`]: enter/leave effects applied around attachment.

pub mod document;
pub mod error;
pub mod selector;
pub mod transition;

pub use document::{Document, NodeId};
pub use error::DomError;
pub use selector::SelectorList;
pub use transition::{
    Completion, Direction, Done, EffectRegistry, EffectRunner, JsEffect, JsHook,
    TransitionCode, TransitionContext, TransitionEffect, TransitionRunner,
};

/// Where to attach an element: a selector resolved against the document, or
/// a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Selector(String),
    Node(NodeId),
}

impl Target {
    /// Resolve against `document`. A selector that matches nothing yields
    /// `Ok(None)`; a malformed one is an error.
    pub fn resolve(&self, document: &Document) -> Result<Option<NodeId>, DomError> {
        match self {
            Self::Selector(selector) => document.query_selector(selector),
            Self::Node(node) if document.exists(*node) => Ok(Some(*node)),
            Self::Node(node) => Err(DomError::UnknownNode(*node)),
        }
    }
}

impl From<&str> for Target {
    fn from(selector: &str) -> Self {
        Self::Selector(selector.to_owned())
    }
}

impl From<String> for Target {
    fn from(selector: String) -> Self {
        Self::Selector(selector)
    }
}

impl From<NodeId> for Target {
    fn from(node: NodeId) -> Self {
        Self::Node(node)
    }
}
