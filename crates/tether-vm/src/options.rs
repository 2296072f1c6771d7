#![forbid(unsafe_code)]

//! Construction options for a view-model.

use std::rc::Rc;

use tether_core::Value;
use tether_dom::{EffectRegistry, JsEffect, Target, TransitionEffect};

use crate::viewmodel::ViewModel;

/// Lifecycle points at which hooks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleHook {
    Created,
    Ready,
    Attached,
    Detached,
    BeforeDestroy,
    AfterDestroy,
}

impl LifecycleHook {
    /// Name used in the `hook:<name>` event.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Ready => "ready",
            Self::Attached => "attached",
            Self::Detached => "detached",
            Self::BeforeDestroy => "beforeDestroy",
            Self::AfterDestroy => "afterDestroy",
        }
    }
}

/// Lifecycle hook callback.
pub type Hook = Rc<dyn Fn(&ViewModel)>;

/// Options consumed by [`ViewModel::new`] and [`ViewModel::init`].
#[derive(Clone, Default)]
pub struct Options {
    pub(crate) el: Option<Target>,
    pub(crate) tag: Option<String>,
    pub(crate) data: Value,
    pub(crate) parent: Option<ViewModel>,
    pub(crate) effect: Option<TransitionEffect>,
    pub(crate) effects: EffectRegistry,
    pub(crate) hooks: Vec<(LifecycleHook, Hook)>,
}

impl Options {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind to an existing element. Without this a detached element is
    /// created.
    #[must_use]
    pub fn el(mut self, target: impl Into<Target>) -> Self {
        self.el = Some(target.into());
        self
    }

    /// Tag of the element created when no `el` is given. Defaults to `div`.
    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Initial data. Must be a JSON object (or null for none).
    #[must_use]
    pub fn data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    /// Link under `parent` for keypath fallback and event propagation.
    #[must_use]
    pub fn parent(mut self, parent: &ViewModel) -> Self {
        self.parent = Some(parent.clone());
        self
    }

    /// Transition effect that overrides the element's attributes.
    #[must_use]
    pub fn effect(mut self, effect: TransitionEffect) -> Self {
        self.effect = Some(effect);
        self
    }

    /// Register a JS effect for `<prefix>-effect="id"`.
    #[must_use]
    pub fn register_effect(mut self, id: impl Into<String>, effect: JsEffect) -> Self {
        self.effects = self.effects.register(id, effect);
        self
    }

    /// Add a lifecycle hook. Several hooks for one point run in order.
    #[must_use]
    pub fn hook(mut self, point: LifecycleHook, hook: impl Fn(&ViewModel) + 'static) -> Self {
        self.hooks.push((point, Rc::new(hook)));
        self
    }
}

impl std::fmt::Debug for Options {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Options")
            .field("el", &self.el)
            .field("tag", &self.tag)
            .field("data", &self.data)
            .field("parent", &self.parent.is_some())
            .field("effect", &self.effect)
            .field("hooks", &self.hooks.len())
            .finish_non_exhaustive()
    }
}
