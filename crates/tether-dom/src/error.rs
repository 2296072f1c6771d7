#![forbid(unsafe_code)]

use crate::document::NodeId;

/// Errors from document mutation, lookup and selector parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomError {
    /// A target could not be resolved, or a node is not where it was expected.
    NotFound(String),
    /// The node has no parent to insert relative to.
    NoParent(NodeId),
    /// The insertion would create a cycle or attach under a non-element.
    HierarchyRequest { parent: NodeId, child: NodeId },
    /// The selector could not be parsed.
    InvalidSelector(String),
    /// The id does not belong to this document.
    UnknownNode(NodeId),
    /// An element-only operation was applied to a text node.
    NotAnElement(NodeId),
}

impl std::fmt::Display for DomError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(what) => write!(f, "not found: {what}"),
            Self::NoParent(node) => write!(f, "node {node} has no parent"),
            Self::HierarchyRequest { parent, child } => {
                write!(f, "cannot insert {child} under {parent}")
            }
            Self::InvalidSelector(selector) => write!(f, "invalid selector '{selector}'"),
            Self::UnknownNode(node) => write!(f, "unknown node {node}"),
            Self::NotAnElement(node) => write!(f, "node {node} is not an element"),
        }
    }
}

impl std::error::Error for DomError {}
